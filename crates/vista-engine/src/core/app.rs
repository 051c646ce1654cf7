use winit::event::WindowEvent;

use crate::input::InputEvent;

use super::ctx::{FrameCtx, SetupCtx};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by the viewer shell.
///
/// All callbacks run on the GUI thread. The window is repainted only when
/// asked to: after input, a resize, or a [`crate::window::Waker::wake`].
pub trait App {
    /// Called once, after the window and its GPU device exist.
    fn on_gpu_ready(&mut self, ctx: SetupCtx<'_, '_>) -> AppControl;

    /// Raw window events, before input translation.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Translated input. Return `true` to request a repaint.
    fn on_input(&mut self, event: &InputEvent) -> bool {
        let _ = event;
        false
    }

    /// A wake-up from another thread. Return `true` to request a repaint.
    fn on_wake(&mut self) -> bool {
        true
    }

    /// Called for each repaint.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called once before the runtime returns.
    fn on_exit(&mut self) {}
}
