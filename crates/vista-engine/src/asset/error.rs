use std::path::PathBuf;

use thiserror::Error;

use crate::coords::TextureSize;
use crate::render::PixelFormat;

/// Decoder failures.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to decode image '{}': {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to import glTF '{}': {source}", path.display())]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("'{}' contains no drawable primitives", path.display())]
    NoPrimitives { path: PathBuf },

    #[error("{len} bytes do not hold a {size} {format:?} image")]
    PixelCount {
        len: usize,
        size: TextureSize,
        format: PixelFormat,
    },
}
