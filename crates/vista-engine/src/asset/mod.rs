//! Decoder boundaries: image files and glTF scenes to plain CPU data.

mod error;
mod image_asset;
mod mesh_asset;

pub use error::AssetError;
pub use image_asset::ImageAsset;
pub use mesh_asset::{MeshAsset, MeshVertex, PrimitiveAsset};
