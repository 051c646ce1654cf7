use std::ops::{Add, Mul, Sub};

use glam::Vec3;

/// Field-of-view bounds of the 3D framing, in degrees.
pub const FOV_MIN_DEG: f32 = 5.0;
pub const FOV_MAX_DEG: f32 = 80.0;

/// Orthographic bounds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Framing2D {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Default for Framing2D {
    fn default() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            bottom: -1.0,
            top: 1.0,
        }
    }
}

impl Framing2D {
    pub fn new(left: f32, right: f32, bottom: f32, top: f32) -> Self {
        Self { left, right, bottom, top }
    }

    /// `self + (to - self) * t`.
    pub fn lerp(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Add for Framing2D {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Self::new(self.left + o.left, self.right + o.right, self.bottom + o.bottom, self.top + o.top)
    }
}

impl Sub for Framing2D {
    type Output = Self;

    fn sub(self, o: Self) -> Self {
        Self::new(self.left - o.left, self.right - o.right, self.bottom - o.bottom, self.top - o.top)
    }
}

impl Mul<f32> for Framing2D {
    type Output = Self;

    fn mul(self, t: f32) -> Self {
        Self::new(self.left * t, self.right * t, self.bottom * t, self.top * t)
    }
}

/// Eye, target and vertical field of view.
///
/// The arithmetic operators work on raw fields so that differences can be
/// formed; only [`Framing3D::set_fov`] and [`Framing3D::zoom`] clamp.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Framing3D {
    pub position: Vec3,
    pub look_at: Vec3,
    pub fov_deg: f32,
}

impl Default for Framing3D {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            look_at: Vec3::ZERO,
            fov_deg: 22.6,
        }
    }
}

impl Framing3D {
    pub fn new(position: Vec3, look_at: Vec3, fov_deg: f32) -> Self {
        Self {
            position,
            look_at,
            fov_deg: clamp_fov(fov_deg),
        }
    }

    pub fn set_fov(&mut self, fov_deg: f32) {
        self.fov_deg = clamp_fov(fov_deg);
    }

    /// Adds `delta_deg` to the field of view, clamped.
    pub fn zoom(&mut self, delta_deg: f32) {
        self.set_fov(self.fov_deg + delta_deg);
    }

    pub fn lerp(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

fn clamp_fov(fov_deg: f32) -> f32 {
    if fov_deg.is_nan() {
        return FOV_MIN_DEG;
    }
    fov_deg.clamp(FOV_MIN_DEG, FOV_MAX_DEG)
}

impl Add for Framing3D {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Self {
            position: self.position + o.position,
            look_at: self.look_at + o.look_at,
            fov_deg: self.fov_deg + o.fov_deg,
        }
    }
}

impl Sub for Framing3D {
    type Output = Self;

    fn sub(self, o: Self) -> Self {
        Self {
            position: self.position - o.position,
            look_at: self.look_at - o.look_at,
            fov_deg: self.fov_deg - o.fov_deg,
        }
    }
}

impl Mul<f32> for Framing3D {
    type Output = Self;

    fn mul(self, t: f32) -> Self {
        Self {
            position: self.position * t,
            look_at: self.look_at * t,
            fov_deg: self.fov_deg * t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    // ── interpolation ─────────────────────────────────────────────────────

    #[test]
    fn lerp_2d_is_per_field() {
        let a = Framing2D::new(-1.0, 1.0, -1.0, 1.0);
        let b = Framing2D::new(-3.0, 5.0, 0.0, 2.0);
        for t in [0.0, 0.25, 0.5, 1.0] {
            let f = a.lerp(b, t);
            assert!(close(f.left, -1.0 - 2.0 * t));
            assert!(close(f.right, 1.0 + 4.0 * t));
            assert!(close(f.bottom, -1.0 + t));
            assert!(close(f.top, 1.0 + t));
        }
    }

    #[test]
    fn lerp_3d_is_per_field() {
        let a = Framing3D::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 20.0);
        let b = Framing3D::new(Vec3::new(2.0, -4.0, 1.0), Vec3::new(1.0, 1.0, 1.0), 60.0);
        let f = a.lerp(b, 0.5);
        assert!((f.position - Vec3::new(1.0, -2.0, 3.0)).length() < 1e-5);
        assert!((f.look_at - Vec3::splat(0.5)).length() < 1e-5);
        assert!(close(f.fov_deg, 40.0));
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }

    // ── field of view ─────────────────────────────────────────────────────

    #[test]
    fn fov_stays_in_range_for_any_zoom_sequence() {
        let mut f = Framing3D::default();
        let deltas = [-3.0, -100.0, 7.5, 250.0, -0.1, 1e9, -1e9, 6.0, -6.0, f32::NAN];
        for d in deltas.iter().cycle().take(200) {
            f.zoom(*d);
            assert!((FOV_MIN_DEG..=FOV_MAX_DEG).contains(&f.fov_deg), "fov {}", f.fov_deg);
        }
    }

    #[test]
    fn constructor_clamps_fov() {
        assert_eq!(Framing3D::new(Vec3::ZERO, Vec3::Z, 1.0).fov_deg, FOV_MIN_DEG);
        assert_eq!(Framing3D::new(Vec3::ZERO, Vec3::Z, 179.0).fov_deg, FOV_MAX_DEG);
    }
}
