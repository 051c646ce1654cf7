use glam::Vec3;

use crate::input::{InputEvent, Key, KeyState, Modifiers, MouseButton, MouseButtonState};
use crate::scene::{Framing3D, SharedRenderData};

/// Keyboard step, in world units.
pub const KEY_STEP: f32 = 0.1;

/// World units per logical pixel of drag.
pub const DRAG_FACTOR: f32 = 0.035;

/// Degrees of field of view per wheel unit (120 units per notch).
pub const WHEEL_FACTOR: f32 = 1.0 / 20.0;

/// Camera control for the 3D framing.
///
/// Keys step the eye (or the look-at point while Shift is held), a left-button
/// drag moves it in the view plane and the wheel zooms. Every event is ignored
/// while the control is disabled or the render data is in 2D mode.
#[derive(Debug)]
pub struct Trackball {
    render_data: SharedRenderData,
    enabled: bool,
    modifiers: Modifiers,
    drag_from: Option<(f32, f32)>,
    pointer: Option<(f32, f32)>,
    original: Option<Framing3D>,
}

impl Trackball {
    pub fn new(render_data: SharedRenderData) -> Self {
        Self {
            render_data,
            enabled: false,
            modifiers: Modifiers::NONE,
            drag_from: None,
            pointer: None,
            original: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turning the control on remembers the current framing so that
    /// [`Trackball::restore_original`] can go back to it.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.original = Some(self.render_data.snapshot().framing_3d);
            log::info!("trackball enabled");
        } else if !enabled && self.enabled {
            log::info!("trackball disabled");
        }
        self.enabled = enabled;
        self.drag_from = None;
    }

    /// Framing captured when the control was last enabled.
    pub fn original(&self) -> Option<Framing3D> {
        self.original
    }

    /// Puts back the framing captured by the last enable. Returns `false`
    /// when there is nothing to restore.
    pub fn restore_original(&mut self) -> bool {
        let Some(framing) = self.original else {
            return false;
        };
        self.render_data.update(|d| d.framing_3d = framing);
        log::info!("3D framing restored");
        true
    }

    fn active(&self) -> bool {
        self.enabled && self.render_data.snapshot().is_3d()
    }

    /// Feeds one input event. Returns `true` when the framing changed.
    pub fn handle(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::ModifiersChanged(m) => {
                self.modifiers = *m;
                false
            }
            InputEvent::PointerMoved(p) => {
                self.pointer = Some((p.x, p.y));
                self.drag_to(p.x, p.y)
            }
            InputEvent::PointerButton(b) if b.button == MouseButton::Left => {
                self.pointer = Some((b.x, b.y));
                match b.state {
                    MouseButtonState::Pressed if self.active() => self.drag_from = Some((b.x, b.y)),
                    _ => self.drag_from = None,
                }
                false
            }
            InputEvent::PointerLeft => {
                self.pointer = None;
                self.drag_from = None;
                false
            }
            InputEvent::Key {
                key,
                state: KeyState::Pressed,
                modifiers,
                ..
            } => {
                self.modifiers = *modifiers;
                self.step(*key)
            }
            InputEvent::MouseWheel { delta, .. } => self.zoom(delta.vertical_units()),
            _ => false,
        }
    }

    fn step(&mut self, key: Key) -> bool {
        let offset = match key {
            Key::W => Vec3::new(0.0, 0.0, -KEY_STEP),
            Key::S => Vec3::new(0.0, 0.0, KEY_STEP),
            Key::A => Vec3::new(-KEY_STEP, 0.0, 0.0),
            Key::D => Vec3::new(KEY_STEP, 0.0, 0.0),
            Key::Q => Vec3::new(0.0, KEY_STEP, 0.0),
            Key::E => Vec3::new(0.0, -KEY_STEP, 0.0),
            _ => return false,
        };
        self.translate(offset)
    }

    fn drag_to(&mut self, x: f32, y: f32) -> bool {
        let Some((lx, ly)) = self.drag_from else {
            return false;
        };
        if !self.active() {
            self.drag_from = None;
            return false;
        }
        self.drag_from = Some((x, y));
        self.translate(Vec3::new(DRAG_FACTOR * (x - lx), DRAG_FACTOR * (y - ly), 0.0))
    }

    fn translate(&mut self, offset: Vec3) -> bool {
        if !self.active() {
            return false;
        }
        let shift = self.modifiers.shift;
        self.render_data.update(|d| {
            if shift {
                d.framing_3d.look_at += offset;
            } else {
                d.framing_3d.position += offset;
            }
        });
        true
    }

    fn zoom(&mut self, units: f32) -> bool {
        if !self.active() || units == 0.0 {
            return false;
        }
        self.render_data.update(|d| d.framing_3d.zoom(units * WHEEL_FACTOR));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MouseWheelDelta, PointerButtonEvent, PointerMoveEvent};
    use crate::scene::{RenderData, RenderMode, FOV_MAX_DEG, FOV_MIN_DEG};

    fn trackball(mode: RenderMode) -> (Trackball, SharedRenderData) {
        let data = SharedRenderData::new(RenderData {
            mode,
            ..RenderData::default()
        });
        (Trackball::new(data.clone()), data)
    }

    fn key(key: Key, modifiers: Modifiers) -> InputEvent {
        InputEvent::Key {
            key,
            state: KeyState::Pressed,
            modifiers,
            repeat: false,
        }
    }

    fn button(state: MouseButtonState, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerButton(PointerButtonEvent {
            button: MouseButton::Left,
            state,
            x,
            y,
            modifiers: Modifiers::NONE,
        })
    }

    fn wheel(notches: f32) -> InputEvent {
        InputEvent::MouseWheel {
            delta: MouseWheelDelta::Line { x: 0.0, y: notches },
            modifiers: Modifiers::NONE,
        }
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    // ── gating ────────────────────────────────────────────────────────────

    #[test]
    fn disabled_ignores_everything() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        let before = data.snapshot();
        assert!(!tb.handle(&key(Key::W, Modifiers::NONE)));
        assert!(!tb.handle(&wheel(3.0)));
        assert_eq!(data.snapshot(), before);
    }

    #[test]
    fn two_d_mode_ignores_everything() {
        let (mut tb, data) = trackball(RenderMode::Render2D);
        tb.set_enabled(true);
        let before = data.snapshot();
        assert!(!tb.handle(&key(Key::W, Modifiers::NONE)));
        tb.handle(&button(MouseButtonState::Pressed, 0.0, 0.0));
        assert!(!tb.handle(&InputEvent::PointerMoved(PointerMoveEvent { x: 10.0, y: 10.0 })));
        assert!(!tb.handle(&wheel(-2.0)));
        assert_eq!(data.snapshot(), before);
    }

    // ── keyboard ──────────────────────────────────────────────────────────

    #[test]
    fn keys_step_the_eye() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        tb.set_enabled(true);
        for k in [Key::W, Key::W, Key::D, Key::Q] {
            assert!(tb.handle(&key(k, Modifiers::NONE)));
        }
        let f = data.snapshot().framing_3d;
        assert!(approx(f.position, Vec3::new(0.1, 0.1, 4.8)));
        assert_eq!(f.look_at, Vec3::ZERO);
    }

    #[test]
    fn shift_moves_the_look_at_point() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        tb.set_enabled(true);
        tb.handle(&key(Key::A, Modifiers::SHIFT));
        tb.handle(&key(Key::E, Modifiers::SHIFT));
        let f = data.snapshot().framing_3d;
        assert!(approx(f.look_at, Vec3::new(-0.1, -0.1, 0.0)));
        assert!(approx(f.position, Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn other_keys_are_not_consumed() {
        let (mut tb, _) = trackball(RenderMode::Render3D);
        tb.set_enabled(true);
        assert!(!tb.handle(&key(Key::R, Modifiers::NONE)));
    }

    // ── drag ──────────────────────────────────────────────────────────────

    #[test]
    fn left_drag_moves_in_the_view_plane() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        tb.set_enabled(true);
        tb.handle(&button(MouseButtonState::Pressed, 100.0, 100.0));
        assert!(tb.handle(&InputEvent::PointerMoved(PointerMoveEvent { x: 120.0, y: 90.0 })));
        tb.handle(&button(MouseButtonState::Released, 120.0, 90.0));
        assert!(!tb.handle(&InputEvent::PointerMoved(PointerMoveEvent { x: 200.0, y: 200.0 })));

        let f = data.snapshot().framing_3d;
        assert!(approx(f.position, Vec3::new(0.7, -0.35, 5.0)));
    }

    #[test]
    fn hover_without_button_does_nothing() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        tb.set_enabled(true);
        let before = data.snapshot();
        assert!(!tb.handle(&InputEvent::PointerMoved(PointerMoveEvent { x: 50.0, y: 50.0 })));
        assert_eq!(data.snapshot(), before);
    }

    // ── wheel ─────────────────────────────────────────────────────────────

    #[test]
    fn one_notch_is_six_degrees() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        tb.set_enabled(true);
        tb.handle(&wheel(1.0));
        assert!((data.snapshot().framing_3d.fov_deg - 28.6).abs() < 1e-4);
    }

    #[test]
    fn wheel_never_leaves_the_fov_range() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        tb.set_enabled(true);
        for _ in 0..50 {
            tb.handle(&wheel(-1.0));
            let fov = data.snapshot().framing_3d.fov_deg;
            assert!((FOV_MIN_DEG..=FOV_MAX_DEG).contains(&fov));
        }
        assert_eq!(data.snapshot().framing_3d.fov_deg, FOV_MIN_DEG);
        for _ in 0..50 {
            tb.handle(&wheel(4.0));
        }
        assert_eq!(data.snapshot().framing_3d.fov_deg, FOV_MAX_DEG);
    }

    // ── restore ───────────────────────────────────────────────────────────

    #[test]
    fn restore_returns_to_the_framing_at_enable() {
        let (mut tb, data) = trackball(RenderMode::Render3D);
        assert!(!tb.restore_original());

        tb.set_enabled(true);
        let original = data.snapshot().framing_3d;
        tb.handle(&key(Key::S, Modifiers::NONE));
        tb.handle(&wheel(2.0));
        assert_ne!(data.snapshot().framing_3d, original);

        tb.set_enabled(false);
        assert!(tb.restore_original());
        assert_eq!(data.snapshot().framing_3d, original);
        assert_eq!(tb.original(), Some(original));
    }
}
