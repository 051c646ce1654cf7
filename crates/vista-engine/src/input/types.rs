use std::fmt;
use std::path::PathBuf;

/// Wheel units per notch on a standard mouse.
pub const WHEEL_UNITS_PER_NOTCH: f32 = 120.0;

/// Logical pixels treated as one wheel notch for high-precision devices.
pub const PIXELS_PER_NOTCH: f32 = 40.0;

/// Keyboard key identifier.
///
/// The runtime maps physical key codes into these variants; anything else is
/// `Unknown` with the platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Space,

    Shift,
    Control,
    Alt,
    Meta,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Unknown(u32),
}

impl Key {
    pub fn is_modifier(self) -> bool {
        matches!(self, Key::Shift | Key::Control | Key::Alt | Key::Meta)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseButtonState {
    Pressed,
    Released,
}

/// Modifier keys state.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Mouse wheel delta as reported by the platform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MouseWheelDelta {
    Line { x: f32, y: f32 },
    Pixel { x: f32, y: f32 },
}

impl MouseWheelDelta {
    /// Vertical delta in wheel units (120 per notch, positive away from the user).
    pub fn vertical_units(self) -> f32 {
        match self {
            MouseWheelDelta::Line { y, .. } => y * WHEEL_UNITS_PER_NOTCH,
            MouseWheelDelta::Pixel { y, .. } => y / PIXELS_PER_NOTCH * WHEEL_UNITS_PER_NOTCH,
        }
    }
}

/// Pointer position in logical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerMoveEvent {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerButtonEvent {
    pub button: MouseButton,
    pub state: MouseButtonState,
    pub x: f32,
    pub y: f32,
    pub modifiers: Modifiers,
}

/// Platform-agnostic input events emitted by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    ModifiersChanged(Modifiers),

    Key {
        key: Key,
        state: KeyState,
        modifiers: Modifiers,
        repeat: bool,
    },

    PointerMoved(PointerMoveEvent),
    PointerButton(PointerButtonEvent),

    MouseWheel {
        delta: MouseWheelDelta,
        modifiers: Modifiers,
    },

    /// A file was dropped onto the window.
    FileDropped(PathBuf),

    PointerLeft,
    Focused(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_is_one_notch() {
        assert_eq!(MouseWheelDelta::Line { x: 0.0, y: 1.0 }.vertical_units(), 120.0);
        assert_eq!(MouseWheelDelta::Line { x: 3.0, y: -2.0 }.vertical_units(), -240.0);
    }

    #[test]
    fn pixel_deltas_scale_to_notches() {
        let d = MouseWheelDelta::Pixel { x: 0.0, y: PIXELS_PER_NOTCH };
        assert_eq!(d.vertical_units(), WHEEL_UNITS_PER_NOTCH);
    }
}
