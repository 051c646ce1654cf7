use super::TextureSize;

/// Pixel rectangle inside a render target (top-left origin, physical pixels).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport covering the whole target.
    #[inline]
    pub fn full(size: TextureSize) -> Self {
        Self::new(0.0, 0.0, size.width as f32, size.height as f32)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Largest centered viewport of aspect `aspect` inside a `logical` window
    /// of the given scale factor.
    ///
    /// Wider windows get pillarbox bars left and right, taller windows get
    /// letterbox bars top and bottom. The result is in physical pixels.
    pub fn centered_with_aspect(logical: (f32, f32), scale_factor: f32, aspect: f32) -> Self {
        let (w, h) = logical;
        if w <= 0.0 || h <= 0.0 || aspect <= 0.0 {
            return Self::default();
        }

        if w / h > aspect {
            let fitted_w = aspect * h;
            Self::new(
                scale_factor * (w - fitted_w) / 2.0,
                0.0,
                scale_factor * fitted_w,
                scale_factor * h,
            )
        } else {
            let fitted_h = w / aspect;
            Self::new(
                0.0,
                scale_factor * (h - fitted_h) / 2.0,
                scale_factor * w,
                scale_factor * fitted_h,
            )
        }
    }

    /// Clamps the viewport into a target of `size`, as wgpu requires.
    pub fn clamped_to(self, size: TextureSize) -> Self {
        let tw = size.width as f32;
        let th = size.height as f32;
        let x = self.x.clamp(0.0, tw);
        let y = self.y.clamp(0.0, th);
        Self::new(x, y, self.width.min(tw - x).max(0.0), self.height.min(th - y).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: f32 = 16.0 / 9.0;

    #[test]
    fn exact_aspect_fills_window() {
        let v = Viewport::centered_with_aspect((1600.0, 900.0), 1.0, WIDE);
        assert_eq!(v, Viewport::new(0.0, 0.0, 1600.0, 900.0));
    }

    #[test]
    fn wide_window_gets_side_bars() {
        let v = Viewport::centered_with_aspect((2000.0, 900.0), 1.0, WIDE);
        assert!((v.width - 1600.0).abs() < 1e-3);
        assert!((v.x - 200.0).abs() < 1e-3);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn tall_window_gets_top_bottom_bars() {
        let v = Viewport::centered_with_aspect((1600.0, 1200.0), 2.0, WIDE);
        assert!((v.width - 3200.0).abs() < 1e-3);
        assert!((v.height - 1800.0).abs() < 1e-3);
        assert!((v.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_window_yields_invalid_viewport() {
        assert!(!Viewport::centered_with_aspect((0.0, 10.0), 1.0, WIDE).is_valid());
    }

    #[test]
    fn clamp_keeps_inside_target() {
        let v = Viewport::new(-5.0, 10.0, 200.0, 200.0).clamped_to(TextureSize::new(100, 100));
        assert_eq!(v, Viewport::new(0.0, 10.0, 100.0, 90.0));
    }
}
