use std::sync::Arc;

use glam::Mat4;
use parking_lot::RwLock;

use super::{Framing2D, Framing3D};

const ORTHO_NEAR: f32 = -100.0;
const ORTHO_FAR: f32 = 100.0;
const PERSPECTIVE_ASPECT: f32 = 1.0;
const PERSPECTIVE_NEAR: f32 = 0.1;
const PERSPECTIVE_FAR: f32 = 1000.0;

/// Which framing drives the scene projection.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum RenderMode {
    Render2D,
    #[default]
    Render3D,
}

/// Camera state shared between the GUI thread and the render thread.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct RenderData {
    pub mode: RenderMode,
    pub framing_2d: Framing2D,
    pub framing_3d: Framing3D,
}

impl RenderData {
    pub fn is_3d(&self) -> bool {
        self.mode == RenderMode::Render3D
    }

    /// View-projection of the active framing.
    pub fn projection_matrix(&self) -> Mat4 {
        match self.mode {
            RenderMode::Render2D => {
                let f = self.framing_2d;
                Mat4::orthographic_rh(f.left, f.right, f.bottom, f.top, ORTHO_NEAR, ORTHO_FAR)
            }
            RenderMode::Render3D => {
                let f = self.framing_3d;
                let projection = Mat4::perspective_rh(
                    f.fov_deg.to_radians(),
                    PERSPECTIVE_ASPECT,
                    PERSPECTIVE_NEAR,
                    PERSPECTIVE_FAR,
                );
                projection * Mat4::look_at_rh(f.position, f.look_at, glam::Vec3::Y)
            }
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            RenderMode::Render2D => RenderMode::Render3D,
            RenderMode::Render3D => RenderMode::Render2D,
        };
    }
}

/// Lock-guarded render data. Writers are on the GUI thread; the render thread
/// copies a snapshot once per pass.
#[derive(Debug, Clone, Default)]
pub struct SharedRenderData {
    inner: Arc<RwLock<RenderData>>,
}

impl SharedRenderData {
    pub fn new(data: RenderData) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    pub fn snapshot(&self) -> RenderData {
        *self.inner.read()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut RenderData) -> R) -> R {
        f(&mut *self.inner.write())
    }

    pub fn set(&self, data: RenderData) {
        *self.inner.write() = data;
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn default_framing_sees_the_origin() {
        let data = RenderData::default();
        assert!(data.is_3d());
        let p = data.projection_matrix().project_point3(Vec3::ZERO);
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
        assert!(p.z > 0.0 && p.z < 1.0);
    }

    #[test]
    fn default_2d_framing_is_identity_in_xy() {
        let data = RenderData {
            mode: RenderMode::Render2D,
            ..RenderData::default()
        };
        let p = data.projection_matrix().project_point3(Vec3::new(0.5, -0.25, 0.0));
        assert!((p.x - 0.5).abs() < 1e-6 && (p.y + 0.25).abs() < 1e-6);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let shared = SharedRenderData::default();
        let before = shared.snapshot();
        shared.update(|d| d.framing_3d.zoom(10.0));
        assert_ne!(shared.snapshot(), before);
        assert_eq!(before, RenderData::default());
    }

    #[test]
    fn toggle_switches_mode() {
        let mut d = RenderData::default();
        d.toggle_mode();
        assert_eq!(d.mode, RenderMode::Render2D);
        d.toggle_mode();
        assert_eq!(d.mode, RenderMode::Render3D);
    }
}
