use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::coords::TextureSize;
use crate::render::PixelFormat;

use super::{AssetError, ImageAsset};

/// Interleaved vertex as stored in mesh vertex buffers.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// One triangle-list primitive of a decoded mesh.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveAsset {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,

    /// Index into [`MeshAsset::images`] of the base color image.
    pub texture: Option<usize>,
}

/// Decoded glTF scene, flattened to primitives.
#[derive(Debug, Clone, Default)]
pub struct MeshAsset {
    pub primitives: Vec<PrimitiveAsset>,

    /// Images in document order; `None` where the pixel format is unsupported.
    pub images: Vec<Option<ImageAsset>>,

    /// Non-fatal decoder findings.
    pub warnings: Vec<String>,
}

impl MeshAsset {
    /// Imports a `.gltf`/`.glb` file with its buffers and images.
    ///
    /// Missing normals and texture coordinates default to zero, missing
    /// indices to the sequential vertex order.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let (document, buffers, images) = gltf::import(path).map_err(|source| AssetError::Gltf {
            path: path.to_path_buf(),
            source,
        })?;

        let mut asset = MeshAsset::default();

        for (i, data) in images.into_iter().enumerate() {
            let converted = convert_image(data);
            if converted.is_none() {
                asset.warnings.push(format!("image {i}: unsupported pixel format"));
            }
            asset.images.push(converted);
        }

        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                let label = format!("mesh {} primitive {}", mesh.index(), primitive.index());
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    asset.warnings.push(format!("{label}: {:?} is not a triangle list", primitive.mode()));
                    continue;
                }

                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

                let Some(positions) = reader.read_positions() else {
                    asset.warnings.push(format!("{label}: no POSITION attribute"));
                    continue;
                };
                let mut vertices: Vec<MeshVertex> = positions
                    .map(|position| MeshVertex {
                        position,
                        ..MeshVertex::default()
                    })
                    .collect();

                if let Some(normals) = reader.read_normals() {
                    for (v, n) in vertices.iter_mut().zip(normals) {
                        v.normal = n;
                    }
                }
                if let Some(uvs) = reader.read_tex_coords(0) {
                    for (v, uv) in vertices.iter_mut().zip(uvs.into_f32()) {
                        v.uv = uv;
                    }
                }

                let indices = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..vertices.len() as u32).collect(),
                };

                let texture = primitive
                    .material()
                    .pbr_metallic_roughness()
                    .base_color_texture()
                    .map(|info| info.texture().source().index());

                asset.primitives.push(PrimitiveAsset {
                    vertices,
                    indices,
                    texture,
                });
            }
        }

        if asset.primitives.is_empty() {
            return Err(AssetError::NoPrimitives { path: path.to_path_buf() });
        }
        Ok(asset)
    }

    /// Base color image of `primitive`, if it resolves.
    pub fn texture_of(&self, primitive: &PrimitiveAsset) -> Option<&ImageAsset> {
        primitive
            .texture
            .and_then(|i| self.images.get(i))
            .and_then(Option::as_ref)
    }
}

fn convert_image(data: gltf::image::Data) -> Option<ImageAsset> {
    use gltf::image::Format;

    let size = TextureSize::new(data.width, data.height);
    match data.format {
        Format::R8G8B8 => ImageAsset::new(size, PixelFormat::Rgb, data.pixels).ok(),
        Format::R8G8B8A8 => ImageAsset::new(size, PixelFormat::Rgba, data.pixels).ok(),
        Format::R8 => {
            let pixels = data.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect();
            ImageAsset::new(size, PixelFormat::Rgba, pixels).ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
    }

    #[test]
    fn gray_images_expand_to_rgba() {
        let data = gltf::image::Data {
            pixels: vec![10, 20],
            format: gltf::image::Format::R8,
            width: 2,
            height: 1,
        };
        let img = convert_image(data).unwrap();
        assert_eq!(img.pixels, vec![10, 10, 10, 255, 20, 20, 20, 255]);
    }

    #[test]
    fn unresolved_texture_reference() {
        let asset = MeshAsset {
            primitives: vec![PrimitiveAsset {
                texture: Some(3),
                ..PrimitiveAsset::default()
            }],
            images: vec![Some(ImageAsset::solid(TextureSize::new(1, 1), [0; 4]))],
            warnings: Vec::new(),
        };
        assert!(asset.texture_of(&asset.primitives[0]).is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            MeshAsset::load("/nonexistent/vista-test.gltf"),
            Err(AssetError::Gltf { .. })
        ));
    }
}
