//! CPU-side texture bookkeeping for quad drawables.
//!
//! Everything here is GPU free: padding, pixel layouts, corner texture
//! coordinates and the "does this resize need a new texture" decision.

use std::borrow::Cow;

use crate::coords::TextureSize;

// ── padding ───────────────────────────────────────────────────────────────

/// How allocated texture sizes are rounded up from the source size.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum PaddingPolicy {
    None,
    #[default]
    MultipleOfFour,
    PowerOfTwo,
}

#[inline]
pub fn next_multiple_of_four(n: u32) -> u32 {
    n.saturating_add(3) & !3
}

#[inline]
pub fn next_power_of_two(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

impl PaddingPolicy {
    #[inline]
    pub fn pad(self, n: u32) -> u32 {
        match self {
            PaddingPolicy::None => n,
            PaddingPolicy::MultipleOfFour => next_multiple_of_four(n),
            PaddingPolicy::PowerOfTwo => next_power_of_two(n),
        }
    }

    pub fn pad_size(self, size: TextureSize) -> TextureSize {
        TextureSize::new(self.pad(size.width), self.pad(size.height))
    }
}

// ── target ────────────────────────────────────────────────────────────────

/// Sampling convention of a quad texture, fixed at construction.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TextureTarget {
    /// Normalized coordinates; allocation is padded.
    #[default]
    D2,
    /// Pixel coordinates in `[0, w] x [0, h]`; allocation is never padded.
    Rectangle,
}

impl TextureTarget {
    pub fn allocated_size(self, source: TextureSize, policy: PaddingPolicy) -> TextureSize {
        match self {
            TextureTarget::D2 => policy.pad_size(source),
            TextureTarget::Rectangle => source,
        }
    }

    /// Extent of the source region in texture coordinates.
    pub fn uv_extent(self, source: TextureSize, allocated: TextureSize) -> (f32, f32) {
        match self {
            TextureTarget::Rectangle => (source.width as f32, source.height as f32),
            TextureTarget::D2 => {
                let w = if allocated.width > 0 {
                    source.width as f32 / allocated.width as f32
                } else {
                    1.0
                };
                let h = if allocated.height > 0 {
                    source.height as f32 / allocated.height as f32
                } else {
                    1.0
                };
                (w, h)
            }
        }
    }

    pub fn unnormalized(self) -> bool {
        self == TextureTarget::Rectangle
    }
}

// ── pixel format ──────────────────────────────────────────────────────────

/// Channel layout of source pixel data.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    Rgb,
    #[default]
    Rgba,
    Bgra,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
        }
    }

    /// BGRA is stored as-is in an RGBA texture and swapped in the shader.
    pub fn swaps_red_blue(self) -> bool {
        self == PixelFormat::Bgra
    }

    /// GPU format of the texture holding this layout.
    ///
    /// wgpu has no 3-channel 8-bit format, RGB data is expanded on upload.
    pub fn texture_format(self) -> wgpu::TextureFormat {
        wgpu::TextureFormat::Rgba8UnormSrgb
    }
}

/// Converts `data` from one channel layout to another.
pub fn convert_pixels<'a>(data: &'a [u8], from: PixelFormat, to: PixelFormat) -> Cow<'a, [u8]> {
    if from == to {
        return Cow::Borrowed(data);
    }

    let pixels = data.chunks_exact(from.channels());
    let mut out = Vec::with_capacity(pixels.len() * to.channels());
    for px in pixels {
        let (r, g, b, a) = match from {
            PixelFormat::Rgb => (px[0], px[1], px[2], 255),
            PixelFormat::Rgba => (px[0], px[1], px[2], px[3]),
            PixelFormat::Bgra => (px[2], px[1], px[0], px[3]),
        };
        match to {
            PixelFormat::Rgb => out.extend_from_slice(&[r, g, b]),
            PixelFormat::Rgba => out.extend_from_slice(&[r, g, b, a]),
            PixelFormat::Bgra => out.extend_from_slice(&[b, g, r, a]),
        }
    }
    Cow::Owned(out)
}

/// Bytes as uploaded to a texture of `format.texture_format()`.
///
/// Only RGB changes (alpha appended); BGRA keeps its byte order.
pub fn upload_bytes(data: &[u8], format: PixelFormat) -> Cow<'_, [u8]> {
    match format {
        PixelFormat::Rgb => convert_pixels(data, PixelFormat::Rgb, PixelFormat::Rgba),
        PixelFormat::Rgba | PixelFormat::Bgra => Cow::Borrowed(data),
    }
}

// ── corner texture coordinates ────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Flip {
    pub vertical: bool,
    pub horizontal: bool,
}

impl Flip {
    pub const NONE: Flip = Flip { vertical: false, horizontal: false };
    pub const VERTICAL: Flip = Flip { vertical: true, horizontal: false };
    pub const HORIZONTAL: Flip = Flip { vertical: false, horizontal: true };
    pub const BOTH: Flip = Flip { vertical: true, horizontal: true };
}

/// Texture coordinates of the quad corners, in top-right, bottom-right,
/// bottom-left, top-left order, for a source region of extent `(w, h)`.
///
/// The four cases are listed explicitly; the quad winding makes the
/// both-flipped case differ from composing the single flips.
pub fn corner_uvs(flip: Flip, w: f32, h: f32) -> [[f32; 2]; 4] {
    match (flip.vertical, flip.horizontal) {
        (false, false) => [[w, h], [w, 0.0], [0.0, 0.0], [0.0, h]],
        (true, false) => [[w, 0.0], [w, h], [0.0, h], [0.0, 0.0]],
        (false, true) => [[0.0, h], [0.0, 0.0], [w, 0.0], [w, h]],
        (true, true) => [[0.0, 0.0], [0.0, h], [w, h], [w, 0.0]],
    }
}

// ── resize planning ───────────────────────────────────────────────────────

/// Source vs. allocated size of one texture slot.
#[derive(Debug, Clone, Default)]
pub struct TextureLayout {
    source: TextureSize,
    allocated: TextureSize,
    format: Option<PixelFormat>,

    /// Incremented on every (re)allocation.
    generation: u64,
}

/// What a size/format change requires.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResizePlan {
    /// Same source size and format: nothing to do.
    Unchanged,
    /// Padding absorbed the change: keep the texture, recompute coordinates.
    SourceOnly,
    /// A new texture of `allocated` size is needed.
    Reallocate { allocated: TextureSize },
}

impl TextureLayout {
    pub fn source(&self) -> TextureSize {
        self.source
    }

    pub fn allocated(&self) -> TextureSize {
        self.allocated
    }

    pub fn format(&self) -> Option<PixelFormat> {
        self.format
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_allocated(&self) -> bool {
        self.format.is_some() && !self.allocated.is_empty()
    }

    /// Applies a requested change and reports what the GPU side must do.
    pub fn plan(
        &mut self,
        size: TextureSize,
        format: PixelFormat,
        target: TextureTarget,
        policy: PaddingPolicy,
    ) -> ResizePlan {
        let same_format = self.format == Some(format);
        if same_format && size == self.source {
            return ResizePlan::Unchanged;
        }

        let allocated = target.allocated_size(size, policy);
        self.source = size;
        if same_format && allocated == self.allocated {
            return ResizePlan::SourceOnly;
        }

        self.allocated = allocated;
        self.format = Some(format);
        self.generation += 1;
        ResizePlan::Reallocate { allocated }
    }

    /// Texture coordinate extent of the source region.
    pub fn uv_extent(&self, target: TextureTarget) -> (f32, f32) {
        target.uv_extent(self.source, self.allocated)
    }

    pub fn clear(&mut self) {
        self.source = TextureSize::default();
        self.allocated = TextureSize::default();
        self.format = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── padding ───────────────────────────────────────────────────────────

    #[test]
    fn multiple_of_four_invariant() {
        for w in 0..=600u32 {
            let a = PaddingPolicy::MultipleOfFour.pad(w);
            assert_eq!(a, (w + 3) & !3);
            assert!(a >= w);
            assert_eq!(a % 4, 0);
            assert!(a - w < 4);
        }
    }

    #[test]
    fn power_of_two_is_smallest_not_below() {
        for n in 1..=8192u32 {
            let p = PaddingPolicy::PowerOfTwo.pad(n);
            assert!(p.is_power_of_two());
            assert!(p >= n);
            assert!(p == 1 || p / 2 < n, "n={n} p={p}");
        }
    }

    #[test]
    fn rectangle_target_is_never_padded() {
        let s = TextureSize::new(101, 77);
        assert_eq!(TextureTarget::Rectangle.allocated_size(s, PaddingPolicy::PowerOfTwo), s);
        assert_eq!(
            TextureTarget::D2.allocated_size(s, PaddingPolicy::MultipleOfFour),
            TextureSize::new(104, 80)
        );
    }

    // ── texture coordinates ───────────────────────────────────────────────

    #[test]
    fn corner_uv_table() {
        let (w, h) = (3.0, 2.0);
        assert_eq!(corner_uvs(Flip::NONE, w, h), [[w, h], [w, 0.0], [0.0, 0.0], [0.0, h]]);
        assert_eq!(corner_uvs(Flip::VERTICAL, w, h), [[w, 0.0], [w, h], [0.0, h], [0.0, 0.0]]);
        assert_eq!(corner_uvs(Flip::HORIZONTAL, w, h), [[0.0, h], [0.0, 0.0], [w, 0.0], [w, h]]);
        assert_eq!(corner_uvs(Flip::BOTH, w, h), [[0.0, 0.0], [0.0, h], [w, h], [w, 0.0]]);
    }

    #[test]
    fn uv_extent_normalizes_for_2d_only() {
        let src = TextureSize::new(101, 77);
        let alloc = TextureSize::new(104, 80);
        let (u, v) = TextureTarget::D2.uv_extent(src, alloc);
        assert!((u - 101.0 / 104.0).abs() < 1e-6 && (v - 77.0 / 80.0).abs() < 1e-6);
        assert_eq!(TextureTarget::Rectangle.uv_extent(src, src), (101.0, 77.0));
        assert_eq!(TextureTarget::D2.uv_extent(src, TextureSize::default()), (1.0, 1.0));
    }

    // ── pixel conversion ──────────────────────────────────────────────────

    #[test]
    fn rgb_is_expanded_for_upload() {
        let rgb = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(&*upload_bytes(&rgb, PixelFormat::Rgb), &[1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn bgra_converts_to_rgba() {
        let bgra = [10u8, 20, 30, 40];
        assert_eq!(&*convert_pixels(&bgra, PixelFormat::Bgra, PixelFormat::Rgba), &[30, 20, 10, 40]);
        assert!(matches!(convert_pixels(&bgra, PixelFormat::Bgra, PixelFormat::Bgra), Cow::Borrowed(_)));
    }

    // ── resize planning ───────────────────────────────────────────────────

    fn plan(l: &mut TextureLayout, w: u32, h: u32, f: PixelFormat) -> ResizePlan {
        l.plan(TextureSize::new(w, h), f, TextureTarget::D2, PaddingPolicy::MultipleOfFour)
    }

    #[test]
    fn identical_request_keeps_texture() {
        let mut l = TextureLayout::default();
        assert_eq!(
            plan(&mut l, 1920, 1080, PixelFormat::Rgba),
            ResizePlan::Reallocate { allocated: TextureSize::new(1920, 1080) }
        );
        let generation = l.generation();
        assert_eq!(plan(&mut l, 1920, 1080, PixelFormat::Rgba), ResizePlan::Unchanged);
        assert_eq!(l.generation(), generation);
    }

    #[test]
    fn padding_absorbs_small_changes() {
        let mut l = TextureLayout::default();
        plan(&mut l, 101, 77, PixelFormat::Rgba);
        assert_eq!(l.allocated(), TextureSize::new(104, 80));
        assert_eq!(plan(&mut l, 102, 78, PixelFormat::Rgba), ResizePlan::SourceOnly);
        assert_eq!(l.source(), TextureSize::new(102, 78));
        assert_eq!(l.generation(), 1);
    }

    #[test]
    fn format_change_reallocates() {
        let mut l = TextureLayout::default();
        plan(&mut l, 64, 64, PixelFormat::Rgba);
        assert!(matches!(plan(&mut l, 64, 64, PixelFormat::Bgra), ResizePlan::Reallocate { .. }));
        assert_eq!(l.generation(), 2);
    }
}
