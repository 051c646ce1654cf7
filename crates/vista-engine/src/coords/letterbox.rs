use super::TextureSize;

/// Quad extents in normalized device coordinates (+Y up).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadExtents {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl QuadExtents {
    pub const FULL: QuadExtents = QuadExtents {
        left: -1.0,
        right: 1.0,
        bottom: -1.0,
        top: 1.0,
    };

    /// Extents of a quad showing a `source` sized texture on an output of
    /// aspect `reference_aspect` without stretching.
    ///
    /// A source with the reference aspect fills `[-1, 1]` on both axes; wider
    /// sources shrink vertically, narrower ones horizontally.
    pub fn letterboxed(source: TextureSize, reference_aspect: f32) -> Self {
        if source.is_empty() || reference_aspect <= 0.0 {
            return Self::FULL;
        }

        let vertex_aspect = source.aspect() / reference_aspect;
        let mut e = Self::FULL;
        if vertex_aspect > 1.0 {
            e.top = 1.0 / vertex_aspect;
            e.bottom = -e.top;
        } else if vertex_aspect < 1.0 {
            e.right = vertex_aspect;
            e.left = -e.right;
        }
        e
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Corner positions in top-right, bottom-right, bottom-left, top-left order.
    pub fn corners(&self) -> [[f32; 3]; 4] {
        [
            [self.right, self.top, 0.0],
            [self.right, self.bottom, 0.0],
            [self.left, self.bottom, 0.0],
            [self.left, self.top, 0.0],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF: f32 = 16.0 / 9.0;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn reference_aspect_is_full_screen() {
        assert_eq!(QuadExtents::letterboxed(TextureSize::new(1920, 1080), REF), QuadExtents::FULL);
    }

    #[test]
    fn wider_source_shrinks_vertically() {
        // 32:9 → vertex aspect 2
        let e = QuadExtents::letterboxed(TextureSize::new(3200, 900), REF);
        assert!(close(e.top, 0.5) && close(e.bottom, -0.5));
        assert_eq!((e.left, e.right), (-1.0, 1.0));
    }

    #[test]
    fn narrower_source_shrinks_horizontally() {
        // square → vertex aspect 9/16
        let e = QuadExtents::letterboxed(TextureSize::new(500, 500), REF);
        assert!(close(e.right, 9.0 / 16.0) && close(e.left, -9.0 / 16.0));
        assert_eq!((e.bottom, e.top), (-1.0, 1.0));
    }

    #[test]
    fn letterbox_keeps_source_aspect_on_reference_output() {
        for (w, h) in [(101, 77), (640, 480), (4000, 1000), (1, 1000)] {
            let e = QuadExtents::letterboxed(TextureSize::new(w, h), REF);
            let on_screen = (e.width() * REF) / e.height();
            assert!(close(on_screen, w as f32 / h as f32), "{w}x{h}");
        }
    }

    #[test]
    fn corners_follow_quad_order() {
        let c = QuadExtents::FULL.corners();
        assert_eq!(c[0], [1.0, 1.0, 0.0]);
        assert_eq!(c[2], [-1.0, -1.0, 0.0]);
    }
}
