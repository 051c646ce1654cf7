//! Static textured mesh drawable.
//!
//! One vertex/index buffer pair and one base color texture per primitive.
//! The model spins about (1, 1, 0) by a fixed step per drawn frame.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use image::imageops::FilterType;
use wgpu::util::DeviceExt;

use crate::asset::{AssetError, ImageAsset, MeshAsset, MeshVertex, PrimitiveAsset};
use crate::config::{MESH_POSITION_SCALE, MESH_ROTATION_STEP_DEG};
use crate::coords::TextureSize;

use super::common::{
    alpha_blend, check_buffer_size, check_texture_size, create_checked_shader, culled_triangles,
    depth_state, multisample, sampler_entry, texture_entry, uniform_entry, uniform_size,
};
use super::texture_layout::{convert_pixels, PixelFormat};
use super::{AttachmentKey, Drawable, DrawableBase, RenderCtx};

const ROTATION_AXIS: Vec3 = Vec3::new(1.0, 1.0, 0.0);

const FIXED_FOV_DEG: f32 = 90.0;
const FIXED_ASPECT: f32 = 1.0;
const FIXED_NEAR: f32 = 0.01;
const FIXED_FAR: f32 = 1000.0;
const FIXED_VIEW_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -3.0);

/// Which projection a mesh is drawn with.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum MeshProjection {
    /// 90° perspective with aspect 1 and a fixed camera offset; ignores the
    /// scene framing.
    #[default]
    Fixed,
    /// The scene's view-projection, like quads.
    Scene,
}

/// Projection * view of [`MeshProjection::Fixed`].
pub fn fixed_view_projection() -> Mat4 {
    Mat4::perspective_rh(FIXED_FOV_DEG.to_radians(), FIXED_ASPECT, FIXED_NEAR, FIXED_FAR)
        * Mat4::from_translation(FIXED_VIEW_OFFSET)
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct MeshUniform {
    mvp: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    alpha: f32,
    _pad: [f32; 3],
}

const VERTEX_ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3, // position
    1 => Float32x3, // normal
    2 => Float32x2  // uv
];

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

// ── primitive building ────────────────────────────────────────────────────

/// Result of building the primitives of one asset.
#[derive(Debug)]
pub struct BuildReport<P> {
    pub built: Vec<P>,
    pub skipped: usize,
}

/// Uploads images, then builds every primitive that has a texture.
///
/// A primitive whose texture reference does not resolve, or whose build
/// fails, is skipped with one logged error; the rest still build.
pub(crate) fn build_primitives<T, P>(
    asset: &MeshAsset,
    mut upload_texture: impl FnMut(usize, &ImageAsset) -> anyhow::Result<T>,
    mut build: impl FnMut(usize, &PrimitiveAsset, &T) -> anyhow::Result<P>,
) -> BuildReport<P> {
    let textures: Vec<Option<T>> = asset
        .images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let image = image.as_ref()?;
            upload_texture(i, image)
                .inspect_err(|e| log::error!("mesh image {i}: {e:#}"))
                .ok()
        })
        .collect();

    let mut report = BuildReport {
        built: Vec::with_capacity(asset.primitives.len()),
        skipped: 0,
    };

    for (i, primitive) in asset.primitives.iter().enumerate() {
        let texture = primitive
            .texture
            .and_then(|t| textures.get(t))
            .and_then(Option::as_ref);
        let Some(texture) = texture else {
            log::error!("mesh primitive {i}: missing texture, skipped");
            report.skipped += 1;
            continue;
        };
        match build(i, primitive, texture) {
            Ok(p) => report.built.push(p),
            Err(e) => {
                log::error!("mesh primitive {i}: {e:#}, skipped");
                report.skipped += 1;
            }
        }
    }
    report
}

/// Full mip chain of `image` as RGBA8, base level first.
pub(crate) fn mip_chain(image: &ImageAsset) -> Vec<(TextureSize, Vec<u8>)> {
    let rgba = convert_pixels(&image.pixels, image.format, PixelFormat::Rgba).into_owned();
    let Some(mut level) = image::RgbaImage::from_raw(image.size.width, image.size.height, rgba) else {
        return Vec::new();
    };

    let mut chain = Vec::new();
    loop {
        let (w, h) = level.dimensions();
        let next = (w > 1 || h > 1)
            .then(|| image::imageops::resize(&level, (w / 2).max(1), (h / 2).max(1), FilterType::Triangle));
        chain.push((TextureSize::new(w, h), level.into_raw()));
        match next {
            Some(n) => level = n,
            None => break,
        }
    }
    chain
}

// ── drawable ──────────────────────────────────────────────────────────────

struct MeshTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuPrimitive {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    index_count: u32,
    bind_group: wgpu::BindGroup,
}

struct MeshGpu {
    key: AttachmentKey,
    pipeline: Option<wgpu::RenderPipeline>,
    uniform: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    primitives: Vec<GpuPrimitive>,
}

pub struct MeshDrawable {
    base: DrawableBase,
    asset: MeshAsset,
    position_scale: f32,
    projection: MeshProjection,
    rotation_deg: f32,
    rotation_step_deg: f32,
    skipped: usize,
    gpu: Option<MeshGpu>,
}

impl MeshDrawable {
    pub fn new(display_name: impl Into<String>, asset: MeshAsset) -> Self {
        Self {
            base: DrawableBase::new(display_name),
            asset,
            position_scale: MESH_POSITION_SCALE,
            projection: MeshProjection::default(),
            rotation_deg: 0.0,
            rotation_step_deg: MESH_ROTATION_STEP_DEG,
            skipped: 0,
            gpu: None,
        }
    }

    /// Decodes `path` and names the drawable after it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let asset = MeshAsset::load(path)?;
        for w in &asset.warnings {
            log::warn!("{}: {w}", path.display());
        }
        Ok(Self::new(path.display().to_string(), asset))
    }

    pub fn with_projection(mut self, projection: MeshProjection) -> Self {
        self.projection = projection;
        self
    }

    /// Scale applied to positions when the vertex buffers are built.
    pub fn with_position_scale(mut self, scale: f32) -> Self {
        self.position_scale = scale;
        self
    }

    pub fn projection(&self) -> MeshProjection {
        self.projection
    }

    pub fn asset(&self) -> &MeshAsset {
        &self.asset
    }

    /// Primitives with GPU buffers.
    pub fn primitive_count(&self) -> usize {
        self.gpu.as_ref().map_or(0, |g| g.primitives.len())
    }

    /// Primitives dropped by the last `initialize`.
    pub fn skipped_primitives(&self) -> usize {
        self.skipped
    }

    pub fn rotation_deg(&self) -> f32 {
        self.rotation_deg
    }

    /// Steps the spin and returns the new model matrix.
    pub fn advance_rotation(&mut self) -> Mat4 {
        self.rotation_deg = (self.rotation_deg + self.rotation_step_deg) % 360.0;
        let model = Mat4::from_axis_angle(ROTATION_AXIS.normalize(), self.rotation_deg.to_radians());
        self.base.set_model_matrix(model);
        model
    }

    fn view_projection(&self) -> Mat4 {
        match self.projection {
            MeshProjection::Fixed => fixed_view_projection(),
            MeshProjection::Scene => self.base.view_projection(),
        }
    }

    fn build_pipeline(ctx: &RenderCtx<'_>, layouts: &[&wgpu::BindGroupLayout]) -> Option<wgpu::RenderPipeline> {
        let shader = create_checked_shader(
            ctx,
            "vista mesh shader",
            include_str!("shaders/mesh.wgsl"),
            ctx.debug_log,
        )?;
        let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vista mesh pipeline layout"),
            bind_group_layouts: layouts,
            immediate_size: 0,
        });
        Some(ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("vista mesh pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.color_format,
                    blend: Some(alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: culled_triangles(wgpu::FrontFace::Ccw),
            depth_stencil: depth_state(ctx),
            multisample: multisample(ctx),
            multiview_mask: None,
            cache: None,
        }))
    }

    fn upload_texture(ctx: &RenderCtx<'_>, index: usize, image: &ImageAsset) -> anyhow::Result<MeshTexture> {
        let label = format!("vista mesh image {index}");
        check_texture_size(ctx.device, image.size.width, image.size.height, &label)?;

        let chain = mip_chain(image);
        anyhow::ensure!(!chain.is_empty(), "{label}: pixel buffer does not match {}", image.size);

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: image.size.to_extent(),
            mip_level_count: chain.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (mip_level, (size, pixels)) in chain.iter().enumerate() {
            ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size.width * 4),
                    rows_per_image: Some(size.height),
                },
                size.to_extent(),
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(MeshTexture {
            _texture: texture,
            view,
        })
    }
}

impl Drawable for MeshDrawable {
    fn base(&self) -> &DrawableBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DrawableBase {
        &mut self.base
    }

    fn initialize(&mut self, ctx: &RenderCtx<'_>) {
        self.gpu = None;

        let uniform_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vista mesh uniform bgl"),
            entries: &[uniform_entry::<MeshUniform>(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let texture_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vista mesh texture bgl"),
            entries: &[sampler_entry(0), texture_entry(1)],
        });

        let pipeline = Self::build_pipeline(ctx, &[&uniform_layout, &texture_layout]);
        if pipeline.is_none() {
            log::error!("mesh '{}' has no pipeline", self.base.display_name());
        }

        let uniform = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vista mesh ubo"),
            size: uniform_size::<MeshUniform>().map_or(0, |s| s.get()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vista mesh uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vista mesh sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let scale = self.position_scale;
        let report = build_primitives(
            &self.asset,
            |i, image| Self::upload_texture(ctx, i, image),
            |i, primitive, texture: &MeshTexture| {
                let vertices: Vec<MeshVertex> = primitive
                    .vertices
                    .iter()
                    .map(|v| MeshVertex {
                        position: (Vec3::from(v.position) * scale).to_array(),
                        ..*v
                    })
                    .collect();
                let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
                let index_bytes: &[u8] = bytemuck::cast_slice(&primitive.indices);
                check_buffer_size(ctx.device, vertex_bytes.len() as u64, "mesh vertex buffer")?;
                check_buffer_size(ctx.device, index_bytes.len() as u64, "mesh index buffer")?;

                let vbo = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("vista mesh vbo {i}")),
                    contents: vertex_bytes,
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let ibo = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("vista mesh ibo {i}")),
                    contents: index_bytes,
                    usage: wgpu::BufferUsages::INDEX,
                });
                let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("vista mesh texture bind group"),
                    layout: &texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Sampler(&sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        },
                    ],
                });
                Ok(GpuPrimitive {
                    vbo,
                    ibo,
                    index_count: primitive.indices.len() as u32,
                    bind_group,
                })
            },
        );

        log::info!(
            "mesh '{}': {} of {} primitives ready",
            self.base.display_name(),
            report.built.len(),
            self.asset.primitives.len()
        );
        self.skipped = report.skipped;
        self.gpu = Some(MeshGpu {
            key: ctx.attachment_key(),
            pipeline,
            uniform,
            uniform_bind_group,
            primitives: report.built,
        });
        self.base.set_initialized(true);
    }

    fn ready_for_rendering(&self) -> bool {
        self.gpu
            .as_ref()
            .is_some_and(|g| g.pipeline.is_some() && !g.primitives.is_empty())
    }

    fn draw(&mut self, ctx: &RenderCtx<'_>, pass: &mut wgpu::RenderPass<'_>) {
        if !self.ready_for_rendering() {
            return;
        }
        let model = self.advance_rotation();
        let mvp = self.view_projection() * model;

        let Some(gpu) = self.gpu.as_ref() else { return };
        let Some(pipeline) = gpu.pipeline.as_ref() else { return };
        if gpu.key != ctx.attachment_key() {
            log::warn!("mesh '{}' drawn into a pass it was not initialized for", self.base.display_name());
            return;
        }

        let uniform = MeshUniform {
            mvp: mvp.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            alpha: self.base.alpha(),
            _pad: [0.0; 3],
        };
        ctx.queue.write_buffer(&gpu.uniform, 0, bytemuck::bytes_of(&uniform));

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &gpu.uniform_bind_group, &[]);
        for p in &gpu.primitives {
            pass.set_bind_group(1, &p.bind_group, &[]);
            pass.set_vertex_buffer(0, p.vbo.slice(..));
            pass.set_index_buffer(p.ibo.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..p.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(texture: Option<usize>) -> PrimitiveAsset {
        PrimitiveAsset {
            vertices: vec![MeshVertex::default(); 3],
            indices: vec![0, 1, 2],
            texture,
        }
    }

    fn asset(primitives: Vec<PrimitiveAsset>) -> MeshAsset {
        MeshAsset {
            primitives,
            images: vec![Some(ImageAsset::solid(TextureSize::new(2, 2), [255; 4]))],
            warnings: Vec::new(),
        }
    }

    // ── partial builds ────────────────────────────────────────────────────

    #[test]
    fn one_failed_primitive_leaves_the_rest() {
        let a = asset(vec![primitive(Some(0)), primitive(Some(0)), primitive(Some(0)), primitive(Some(0))]);
        let report = build_primitives(
            &a,
            |_, _| Ok(()),
            |i, _, _| {
                anyhow::ensure!(i != 2, "forced failure");
                Ok(i)
            },
        );
        assert_eq!(report.built, vec![0, 1, 3]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn missing_texture_skips_primitive() {
        let a = asset(vec![primitive(Some(0)), primitive(None), primitive(Some(7))]);
        let report = build_primitives(&a, |_, _| Ok(()), |i, _, _| Ok(i));
        assert_eq!(report.built, vec![0]);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn failed_image_upload_skips_its_users() {
        let a = asset(vec![primitive(Some(0)), primitive(Some(0))]);
        let report = build_primitives(
            &a,
            |_, _| -> anyhow::Result<()> { anyhow::bail!("no memory") },
            |i, _, _| Ok(i),
        );
        assert!(report.built.is_empty());
        assert_eq!(report.skipped, 2);
    }

    // ── mipmaps ───────────────────────────────────────────────────────────

    #[test]
    fn mip_chain_halves_to_one_pixel() {
        let img = ImageAsset::solid(TextureSize::new(4, 2), [10, 20, 30, 255]);
        let chain = mip_chain(&img);
        let sizes: Vec<_> = chain.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            sizes,
            vec![TextureSize::new(4, 2), TextureSize::new(2, 1), TextureSize::new(1, 1)]
        );
        assert_eq!(chain[2].1, vec![10, 20, 30, 255]);
    }

    #[test]
    fn mip_chain_expands_rgb() {
        let img = ImageAsset::new(TextureSize::new(1, 1), PixelFormat::Rgb, vec![1, 2, 3]).unwrap();
        assert_eq!(mip_chain(&img), vec![(TextureSize::new(1, 1), vec![1, 2, 3, 255])]);
    }

    // ── animation ─────────────────────────────────────────────────────────

    #[test]
    fn rotation_is_frame_coupled() {
        let mut m = MeshDrawable::new("avocado", MeshAsset::default());
        for _ in 0..90 {
            m.advance_rotation();
        }
        assert!((m.rotation_deg() - 90.0).abs() < 1e-3);

        // The rotation axis itself is fixed by the spin.
        let axis = ROTATION_AXIS.normalize();
        let moved = m.base().model_matrix().transform_vector3(axis);
        assert!((moved - axis).length() < 1e-5);
    }

    #[test]
    fn fixed_projection_sees_the_origin() {
        let p = fixed_view_projection().project_point3(Vec3::ZERO);
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
        assert!(p.z > 0.0 && p.z < 1.0);
    }

    #[test]
    fn uninitialized_mesh_is_not_ready() {
        let m = MeshDrawable::new("m", MeshAsset::default());
        assert!(!m.ready_for_rendering());
        assert_eq!(m.primitive_count(), 0);
    }
}
