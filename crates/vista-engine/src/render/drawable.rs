//! The drawable capability shared by quad and mesh drawables.

use glam::Mat4;

use super::RenderCtx;

/// Data every drawable carries.
#[derive(Debug, Clone)]
pub struct DrawableBase {
    display_name: String,
    model: Mat4,
    view_projection: Mat4,
    initialized: bool,
    allow_updates: bool,
    layer: i32,
    fallback_alpha: f32,
}

impl DrawableBase {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            model: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            initialized: false,
            allow_updates: true,
            layer: 0,
            fallback_alpha: 1.0,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    pub fn set_model_matrix(&mut self, model: Mat4) {
        self.model = model;
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    pub fn set_view_projection(&mut self, vp: Mat4) {
        self.view_projection = vp;
    }

    /// `view_projection * model`.
    pub fn mvp(&self) -> Mat4 {
        self.view_projection * self.model
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    pub fn allow_updates(&self) -> bool {
        self.allow_updates
    }

    pub fn set_allow_updates(&mut self, allow: bool) {
        self.allow_updates = allow;
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    pub fn alpha(&self) -> f32 {
        self.fallback_alpha
    }

    /// Stores `alpha` clamped to `[0, 1]`; NaN becomes opaque.
    pub fn set_fallback_alpha(&mut self, alpha: f32) {
        self.fallback_alpha = if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) };
    }
}

/// A positionable entity with GPU state that is redrawn every frame.
///
/// Lifecycle: constructed without GPU state, `initialize` acquires it (and
/// rebuilds it when called again), then `prepare` + `draw` once per frame.
/// GPU resources are released on drop.
///
/// Failures never propagate: a drawable whose setup failed logs the reason and
/// draws nothing.
pub trait Drawable: Send {
    fn base(&self) -> &DrawableBase;
    fn base_mut(&mut self) -> &mut DrawableBase;

    /// Acquires (or rebuilds) pipelines, buffers and textures.
    fn initialize(&mut self, ctx: &RenderCtx<'_>);

    /// Stores the view-projection used by the next `draw`.
    fn prepare(&mut self, view_projection: Mat4) {
        self.base_mut().set_view_projection(view_projection);
    }

    /// Records the draw into `pass`.
    ///
    /// Sets its own pipeline and bind groups, so whatever the previous
    /// drawable bound does not leak into this one.
    fn draw(&mut self, ctx: &RenderCtx<'_>, pass: &mut wgpu::RenderPass<'_>);

    /// Whether `draw` would record anything.
    fn ready_for_rendering(&self) -> bool {
        self.base().is_initialized()
    }

    fn display_name(&self) -> &str {
        self.base().display_name()
    }

    fn alpha(&self) -> f32 {
        self.base().alpha()
    }

    fn set_fallback_alpha(&mut self, alpha: f32) {
        self.base_mut().set_fallback_alpha(alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_alpha_is_clamped() {
        let mut b = DrawableBase::new("quad");
        b.set_fallback_alpha(1.5);
        assert_eq!(b.alpha(), 1.0);
        b.set_fallback_alpha(-0.25);
        assert_eq!(b.alpha(), 0.0);
        b.set_fallback_alpha(0.4);
        assert_eq!(b.alpha(), 0.4);
        b.set_fallback_alpha(f32::NAN);
        assert_eq!(b.alpha(), 1.0);
    }

    #[test]
    fn new_base_is_uninitialized_identity() {
        let b = DrawableBase::new("mesh");
        assert!(!b.is_initialized());
        assert!(b.allow_updates());
        assert_eq!(b.mvp(), Mat4::IDENTITY);
        assert_eq!(b.display_name(), "mesh");
    }

    #[test]
    fn mvp_applies_model_first() {
        let mut b = DrawableBase::new("x");
        b.set_model_matrix(Mat4::from_translation(glam::Vec3::X));
        b.set_view_projection(Mat4::from_scale(glam::Vec3::splat(2.0)));
        let p = b.mvp().transform_point3(glam::Vec3::ZERO);
        assert_eq!(p, glam::Vec3::new(2.0, 0.0, 0.0));
    }
}
