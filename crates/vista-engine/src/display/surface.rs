//! On-screen presentation of the resolved offscreen frame.

use glam::Mat4;

use crate::config::{OUTPUT_RESOLUTION, REFERENCE_ASPECT};
use crate::coords::{TextureSize, Viewport};
use crate::paint::Color;
use crate::render::{
    AttachmentKey, Drawable, PaddingPolicy, PixelFormat, RectangleDrawable, RenderCtx, RenderTarget, TextureTarget,
};
use crate::scene::FrameSlot;

/// Color of the bars around the 16:9 viewport.
const BACKGROUND: Color = Color::BLACK;

/// Window-side consumer of the render thread's frames.
///
/// Samples the current [`FrameSlot`] texture with a full-screen quad (in
/// pixel coordinates) inside a centered 16:9 viewport. The
/// first successful paint fires the `initialized` callback, which is where
/// the shell starts the render thread.
pub struct DisplaySurface {
    presenter: RectangleDrawable,
    frame_slot: FrameSlot,
    key: Option<AttachmentKey>,
    shown_generation: Option<u64>,
    viewport: Viewport,
    painted: bool,
    on_initialized: Option<Box<dyn FnOnce()>>,
}

impl DisplaySurface {
    pub fn new(frame_slot: FrameSlot) -> Self {
        let mut presenter = RectangleDrawable::with_target("display", TextureTarget::Rectangle, PaddingPolicy::None);
        presenter.use_external_texture(true);

        Self {
            presenter,
            frame_slot,
            key: None,
            shown_generation: None,
            viewport: Viewport::default(),
            painted: false,
            on_initialized: None,
        }
    }

    /// Callback run once, after the first paint.
    pub fn on_initialized(&mut self, callback: impl FnOnce() + 'static) {
        self.on_initialized = Some(Box::new(callback));
    }

    /// Builds the presenter for the window's attachment formats. Called again
    /// when the surface format changes.
    pub fn initialize(&mut self, ctx: &RenderCtx<'_>) {
        log::info!("initializing display surface ({:?})", ctx.color_format);
        self.presenter.initialize(ctx);
        self.presenter
            .change_texture_size_and_format(ctx, OUTPUT_RESOLUTION, PixelFormat::Rgba);
        self.key = Some(ctx.attachment_key());
        self.shown_generation = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.key.is_some()
    }

    /// Recomputes the 16:9 viewport for a window of `logical` size.
    pub fn resize(&mut self, logical: (f32, f32), scale_factor: f32) {
        self.viewport = Viewport::centered_with_aspect(logical, scale_factor, REFERENCE_ASPECT);
        log::debug!(
            "display viewport {}x{} at ({}, {})",
            self.viewport.width,
            self.viewport.height,
            self.viewport.x,
            self.viewport.y
        );
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Size of the frame the presenter samples.
    pub fn source_size(&self) -> TextureSize {
        self.presenter.texture_source_size()
    }

    /// Picks up a new resolved texture when the render thread reallocated its
    /// targets.
    fn sync_frame(&mut self, ctx: &RenderCtx<'_>) {
        let Some(frame) = self.frame_slot.current() else {
            if self.shown_generation.take().is_some() {
                self.presenter.set_external_texture(None);
            }
            return;
        };
        if self.shown_generation == Some(frame.generation) {
            return;
        }
        if frame.size != self.presenter.texture_source_size() {
            self.presenter
                .change_texture_size_and_format(ctx, frame.size, PixelFormat::Rgba);
        }
        self.presenter.set_external_texture(Some(frame.view));
        self.shown_generation = Some(frame.generation);
        log::debug!("display now samples frame generation {}", frame.generation);
    }

    /// Records the present pass into `target`.
    ///
    /// Returns `false` when nothing was drawn (not initialized or no frame
    /// published yet); the target is cleared either way.
    pub fn paint(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) -> bool {
        if self.key != Some(ctx.attachment_key()) {
            self.initialize(ctx);
        }
        self.sync_frame(ctx);

        let viewport = self.viewport.is_valid().then_some(self.viewport);
        let drawn = {
            let mut pass = target.begin_pass("vista present pass", BACKGROUND, viewport);
            if self.shown_generation.is_some() && self.presenter.ready_for_rendering() {
                self.presenter.prepare(Mat4::IDENTITY);
                self.presenter.draw(ctx, &mut pass);
                true
            } else {
                false
            }
        };

        if !self.painted {
            self.painted = true;
            if let Some(callback) = self.on_initialized.take() {
                log::debug!("display surface painted for the first time");
                callback();
            }
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::render::Flip;

    #[test]
    fn presenter_samples_unflipped_pixel_coordinates() {
        let surface = DisplaySurface::new(FrameSlot::default());
        assert!(surface.presenter.uses_external_texture());
        assert_eq!(surface.presenter.flip(), Flip::NONE);
        assert_eq!(surface.presenter.texture_target(), TextureTarget::Rectangle);
        assert!(!surface.is_initialized());
    }

    #[test]
    fn resize_letterboxes_to_sixteen_by_nine() {
        let mut surface = DisplaySurface::new(FrameSlot::default());
        surface.resize((800.0, 800.0), 2.0);
        let v = surface.viewport();
        assert_eq!(v.width, 1600.0);
        assert!((v.height - 900.0).abs() < 1e-2);
        assert!((v.y - 350.0).abs() < 1e-2);
    }

    #[test]
    fn initialized_callback_is_registered_once() {
        let fired = Rc::new(Cell::new(0));
        let mut surface = DisplaySurface::new(FrameSlot::default());
        let f = Rc::clone(&fired);
        surface.on_initialized(move || f.set(f.get() + 1));
        assert!(surface.on_initialized.is_some());
        assert_eq!(fired.get(), 0);
    }
}
