use std::path::Path;

use image::DynamicImage;

use crate::coords::TextureSize;
use crate::render::PixelFormat;

use super::AssetError;

/// Decoded 2D pixel buffer, tightly packed rows, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub size: TextureSize,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl ImageAsset {
    /// Wraps raw pixels, checking the buffer length.
    pub fn new(size: TextureSize, format: PixelFormat, pixels: Vec<u8>) -> Result<Self, AssetError> {
        let expected = size.width as usize * size.height as usize * format.channels();
        if pixels.len() != expected {
            return Err(AssetError::PixelCount {
                len: pixels.len(),
                size,
                format,
            });
        }
        Ok(Self { size, format, pixels })
    }

    /// Decodes a file. RGB sources stay RGB, everything else becomes RGBA.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_dynamic(img))
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        let size = TextureSize::new(img.width(), img.height());
        match img {
            DynamicImage::ImageRgb8(buf) => Self {
                size,
                format: PixelFormat::Rgb,
                pixels: buf.into_raw(),
            },
            other => Self {
                size,
                format: PixelFormat::Rgba,
                pixels: other.into_rgba8().into_raw(),
            },
        }
    }

    /// An image filled with one RGBA color.
    pub fn solid(size: TextureSize, rgba: [u8; 4]) -> Self {
        let count = size.width as usize * size.height as usize;
        Self {
            size,
            format: PixelFormat::Rgba,
            pixels: rgba.repeat(count),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_checked() {
        let size = TextureSize::new(2, 2);
        assert!(ImageAsset::new(size, PixelFormat::Rgb, vec![0; 12]).is_ok());
        assert!(matches!(
            ImageAsset::new(size, PixelFormat::Rgba, vec![0; 12]),
            Err(AssetError::PixelCount { len: 12, .. })
        ));
    }

    #[test]
    fn rgb_sources_stay_rgb() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3])));
        let asset = ImageAsset::from_dynamic(img);
        assert_eq!(asset.format, PixelFormat::Rgb);
        assert_eq!(asset.size, TextureSize::new(3, 2));
        assert_eq!(asset.pixels.len(), 18);
    }

    #[test]
    fn gray_sources_become_rgba() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 1, image::Luma([7])));
        let asset = ImageAsset::from_dynamic(img);
        assert_eq!(asset.format, PixelFormat::Rgba);
        assert_eq!(asset.pixels, vec![7, 7, 7, 255, 7, 7, 7, 255]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ImageAsset::load("/nonexistent/vista-test.png").unwrap_err();
        assert!(matches!(err, AssetError::Image { .. }));
    }
}
