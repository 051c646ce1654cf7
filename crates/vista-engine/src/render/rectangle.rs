//! Textured quad drawable.
//!
//! Used for 2D images in the scene and, in external-texture mode, to present
//! the resolved offscreen frame in the window.
//!
//! Texture state (sizes, GPU textures, vertex data) sits behind a mutex so that
//! uploads may come from a thread other than the one recording draws; see
//! [`QuadTextureHandle`].

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use crate::asset::ImageAsset;
use crate::config::REFERENCE_ASPECT;
use crate::coords::{QuadExtents, TextureSize};

use super::common::{
    alpha_blend, check_texture_size, create_checked_shader, culled_triangles, depth_state,
    multisample, sampler_entry, texture_entry, uniform_entry, uniform_size,
};
use super::texture_layout::{
    corner_uvs, upload_bytes, convert_pixels, Flip, PaddingPolicy, PixelFormat, ResizePlan,
    TextureLayout, TextureTarget,
};
use super::{AttachmentKey, Drawable, DrawableBase, RenderCtx};

/// Bind group slot of the primary texture.
pub const COLOR_TEXTURE_BINDING: u32 = 2;

/// Bind group slot of the mask texture.
pub const MASK_TEXTURE_BINDING: u32 = 3;

const UNIFORM_BINDING: u32 = 0;
const SAMPLER_BINDING: u32 = 1;

const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

// ── vertex data ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub mask_uv: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x2, // uv
        2 => Float32x2  // mask uv
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Two triangles over top-right, bottom-right, bottom-left, top-left.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Quad corners in vertex order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum QuadCorner {
    TopRight = 0,
    BottomRight = 1,
    BottomLeft = 2,
    TopLeft = 3,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Axis3 {
    X = 0,
    Y = 1,
    Z = 2,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadUniform {
    mvp: [[f32; 4]; 4],
    alpha: f32,
    swap_rb: u32,
    use_mask: u32,
    blur_mask: u32,
    unnormalized: u32,
    _pad: [u32; 3],
}

// ── texture state ─────────────────────────────────────────────────────────

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Everything guarded by the quad's lock.
struct QuadState {
    target: TextureTarget,
    padding: PaddingPolicy,
    flip: Flip,
    source_format: PixelFormat,

    color: TextureLayout,
    color_texture: Option<GpuTexture>,

    mask_enabled: bool,
    mask: TextureLayout,
    mask_texture: Option<GpuTexture>,

    vertices: [QuadVertex; 4],
    vertices_dirty: bool,
}

/// Moves bottom-up corner coordinates onto textures whose first row is the
/// image's top row.
fn top_left_origin(uvs: [[f32; 2]; 4], extent: f32) -> [[f32; 2]; 4] {
    uvs.map(|[u, v]| [u, extent - v])
}

impl QuadState {
    fn new(target: TextureTarget, padding: PaddingPolicy) -> Self {
        let mut s = Self {
            target,
            padding,
            flip: Flip::NONE,
            source_format: PixelFormat::Rgba,
            color: TextureLayout::default(),
            color_texture: None,
            mask_enabled: false,
            mask: TextureLayout::default(),
            mask_texture: None,
            vertices: [QuadVertex::default(); 4],
            vertices_dirty: true,
        };
        s.update_texture_coordinates();
        s.update_mask_texture_coordinates();
        s
    }

    /// Recomputes letterboxed positions and primary coordinates.
    fn update_texture_coordinates(&mut self) {
        let extents = QuadExtents::letterboxed(self.color.source(), REFERENCE_ASPECT);
        let (w, h) = self.color.uv_extent(self.target);
        let uvs = top_left_origin(corner_uvs(self.flip, w, h), h);
        for ((v, pos), uv) in self.vertices.iter_mut().zip(extents.corners()).zip(uvs) {
            v.position = pos;
            v.uv = uv;
        }
        self.vertices_dirty = true;
    }

    /// Mask coordinates only; positions follow the primary texture.
    fn update_mask_texture_coordinates(&mut self) {
        let (w, h) = self.mask.uv_extent(self.target);
        let uvs = top_left_origin(corner_uvs(self.flip, w, h), h);
        for (v, uv) in self.vertices.iter_mut().zip(uvs) {
            v.mask_uv = uv;
        }
        self.vertices_dirty = true;
    }

    fn change_texture_size_and_format(
        &mut self,
        device: &wgpu::Device,
        size: TextureSize,
        format: PixelFormat,
    ) -> bool {
        match self.color.plan(size, format, self.target, self.padding) {
            ResizePlan::Unchanged => return false,
            ResizePlan::SourceOnly => {
                log::debug!("quad texture source {size}: padding absorbed the change");
            }
            ResizePlan::Reallocate { allocated } => {
                self.color_texture = None;
                match create_texture(device, "vista quad color texture", allocated, format.texture_format()) {
                    Ok(t) => self.color_texture = Some(t),
                    Err(e) => log::error!("failed to allocate quad texture: {e:#}"),
                }
                log::debug!("quad texture {size} ({format:?}) allocated at {allocated}");
            }
        }
        self.source_format = format;
        self.update_texture_coordinates();
        true
    }

    /// Plans a mask resize; `None` while the separate mask is disabled.
    fn plan_mask(&mut self, size: TextureSize) -> Option<ResizePlan> {
        if !self.mask_enabled {
            log::warn!("mask size change requested but separate mask is disabled");
            return None;
        }
        Some(self.mask.plan(size, PixelFormat::Rgba, self.target, self.padding))
    }

    fn change_mask_size(&mut self, device: &wgpu::Device, size: TextureSize) -> bool {
        let Some(plan) = self.plan_mask(size) else {
            return false;
        };
        match plan {
            ResizePlan::Unchanged => return false,
            ResizePlan::SourceOnly => {}
            ResizePlan::Reallocate { allocated } => {
                self.mask_texture = None;
                match create_texture(device, "vista quad mask texture", allocated, MASK_FORMAT) {
                    Ok(t) => self.mask_texture = Some(t),
                    Err(e) => log::error!("failed to allocate mask texture: {e:#}"),
                }
            }
        }
        self.update_mask_texture_coordinates();
        true
    }

    fn set_texture_data(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &ImageAsset) -> bool {
        if image.size.is_empty() {
            log::warn!("ignoring empty image for quad texture");
            return false;
        }
        if image.size != self.color.source() {
            self.change_texture_size_and_format(device, image.size, self.source_format);
        }
        let Some(tex) = self.color_texture.as_ref() else {
            log::warn!("quad texture upload without a texture");
            return false;
        };

        let pixels = convert_pixels(&image.pixels, image.format, self.source_format);
        let bytes = upload_bytes(&pixels, self.source_format);
        write_region(queue, &tex.texture, image.size, 4, &bytes);
        true
    }

    fn set_mask_texture_data(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &ImageAsset) -> bool {
        if !self.mask_enabled || image.size.is_empty() {
            return false;
        }
        if image.size != self.mask.source() {
            self.change_mask_size(device, image.size);
        }
        let Some(tex) = self.mask_texture.as_ref() else {
            return false;
        };
        let bytes = mask_channel(&image.pixels, image.format);
        write_region(queue, &tex.texture, image.size, 1, &bytes);
        true
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    size: TextureSize,
    format: wgpu::TextureFormat,
) -> anyhow::Result<GpuTexture> {
    check_texture_size(device, size.width, size.height, label)?;
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: size.to_extent(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(GpuTexture { texture, view })
}

/// Uploads the `size` region at the texture origin.
fn write_region(queue: &wgpu::Queue, texture: &wgpu::Texture, size: TextureSize, bytes_per_pixel: u32, data: &[u8]) {
    let expected = (size.width * size.height * bytes_per_pixel) as usize;
    if data.len() < expected {
        log::error!("texture upload of {size} needs {expected} bytes, got {}", data.len());
        return;
    }
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data[..expected],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * bytes_per_pixel),
            rows_per_image: Some(size.height),
        },
        size.to_extent(),
    );
}

/// Single-channel mask from an image: alpha when present, red otherwise.
fn mask_channel(pixels: &[u8], format: PixelFormat) -> Vec<u8> {
    let stride = format.channels();
    let channel = match format {
        PixelFormat::Rgb => 0,
        PixelFormat::Rgba | PixelFormat::Bgra => 3,
    };
    pixels.chunks_exact(stride).map(|px| px[channel]).collect()
}

// ── handle ────────────────────────────────────────────────────────────────

/// Cloneable access to a quad's textures from another thread.
///
/// Available once the drawable has been initialized.
#[derive(Clone)]
pub struct QuadTextureHandle {
    state: Arc<Mutex<QuadState>>,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl QuadTextureHandle {
    pub fn change_texture_size_and_format(&self, size: TextureSize, format: PixelFormat) -> bool {
        self.state.lock().change_texture_size_and_format(&self.device, size, format)
    }

    pub fn change_mask_size(&self, size: TextureSize) -> bool {
        self.state.lock().change_mask_size(&self.device, size)
    }

    pub fn set_texture_data(&self, image: &ImageAsset) -> bool {
        self.state.lock().set_texture_data(&self.device, &self.queue, image)
    }

    pub fn set_mask_texture_data(&self, image: &ImageAsset) -> bool {
        self.state.lock().set_mask_texture_data(&self.device, &self.queue, image)
    }
}

// ── drawable ──────────────────────────────────────────────────────────────

struct QuadGpu {
    key: AttachmentKey,
    device: wgpu::Device,
    queue: wgpu::Queue,

    pipeline: Option<wgpu::RenderPipeline>,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform: wgpu::Buffer,
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,

    /// Bound in the mask slot when no separate mask is used.
    blank_mask: GpuTexture,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct BindKey {
    color: u64,
    mask: u64,
    external: u64,
    mask_enabled: bool,
}

pub struct RectangleDrawable {
    base: DrawableBase,
    state: Arc<Mutex<QuadState>>,

    use_external_texture: bool,
    external_view: Option<wgpu::TextureView>,
    external_generation: u64,

    mask_blur: bool,

    gpu: Option<QuadGpu>,
    bind_group: Option<(BindKey, wgpu::BindGroup)>,
}

impl RectangleDrawable {
    /// Creates a quad with a normalized 2D texture target.
    pub fn new(display_name: impl Into<String>, padding: PaddingPolicy) -> Self {
        Self::with_target(display_name, TextureTarget::D2, padding)
    }

    /// Creates a quad with a fixed texture target.
    pub fn with_target(display_name: impl Into<String>, target: TextureTarget, padding: PaddingPolicy) -> Self {
        Self {
            base: DrawableBase::new(display_name),
            state: Arc::new(Mutex::new(QuadState::new(target, padding))),
            use_external_texture: false,
            external_view: None,
            external_generation: 0,
            mask_blur: false,
            gpu: None,
            bind_group: None,
        }
    }

    pub fn texture_handle(&self) -> Option<QuadTextureHandle> {
        let gpu = self.gpu.as_ref()?;
        Some(QuadTextureHandle {
            state: Arc::clone(&self.state),
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
        })
    }

    // ── texture configuration ─────────────────────────────────────────────

    /// (Re)allocates the primary texture; no-op when nothing changed.
    ///
    /// Returns whether the source size or format changed.
    pub fn change_texture_size_and_format(&self, ctx: &RenderCtx<'_>, size: TextureSize, format: PixelFormat) -> bool {
        self.state.lock().change_texture_size_and_format(ctx.device, size, format)
    }

    /// (Re)allocates the mask texture; only valid with a separate mask.
    pub fn change_mask_size(&self, ctx: &RenderCtx<'_>, size: TextureSize) -> bool {
        self.state.lock().change_mask_size(ctx.device, size)
    }

    pub fn set_texture_data(&self, ctx: &RenderCtx<'_>, image: &ImageAsset) -> bool {
        self.state.lock().set_texture_data(ctx.device, ctx.queue, image)
    }

    pub fn set_mask_texture_data(&self, ctx: &RenderCtx<'_>, image: &ImageAsset) -> bool {
        self.state.lock().set_mask_texture_data(ctx.device, ctx.queue, image)
    }

    /// Enables or disables the separate mask and rebuilds GPU state.
    pub fn enable_separate_mask(&mut self, ctx: &RenderCtx<'_>, enabled: bool, blur: bool) {
        log::debug!(
            "quad '{}': separate mask {} / blur {}",
            self.base.display_name(),
            if enabled { "enabled" } else { "disabled" },
            if blur { "enabled" } else { "disabled" }
        );
        {
            let mut state = self.state.lock();
            if state.mask_enabled == enabled {
                return;
            }
            state.mask_enabled = enabled;
            if !enabled {
                state.mask.clear();
                state.mask_texture = None;
                state.update_mask_texture_coordinates();
            }
        }
        if enabled {
            self.mask_blur = blur;
        }
        self.initialize(ctx);
    }

    pub fn has_separate_mask(&self) -> bool {
        self.state.lock().mask_enabled
    }

    /// Renders geometry with a texture supplied by the caller instead of the
    /// quad's own.
    pub fn use_external_texture(&mut self, external: bool) {
        self.use_external_texture = external;
    }

    pub fn uses_external_texture(&self) -> bool {
        self.use_external_texture
    }

    /// Supplies the texture sampled in external mode.
    pub fn set_external_texture(&mut self, view: Option<wgpu::TextureView>) {
        self.external_view = view;
        self.external_generation += 1;
    }

    pub fn set_flip_vertically(&self, flip: bool) {
        let mut s = self.state.lock();
        if s.flip.vertical != flip {
            s.flip.vertical = flip;
            s.update_texture_coordinates();
            s.update_mask_texture_coordinates();
        }
    }

    pub fn set_flip_horizontally(&self, flip: bool) {
        let mut s = self.state.lock();
        if s.flip.horizontal != flip {
            s.flip.horizontal = flip;
            s.update_texture_coordinates();
            s.update_mask_texture_coordinates();
        }
    }

    pub fn flip(&self) -> Flip {
        self.state.lock().flip
    }

    // ── queries ───────────────────────────────────────────────────────────

    pub fn texture_target(&self) -> TextureTarget {
        self.state.lock().target
    }

    pub fn source_pixel_format(&self) -> PixelFormat {
        self.state.lock().source_format
    }

    pub fn texture_source_size(&self) -> TextureSize {
        self.state.lock().color.source()
    }

    /// Allocated (padded) size of the primary texture.
    pub fn texture_size(&self) -> TextureSize {
        self.state.lock().color.allocated()
    }

    /// Incremented every time the primary texture is reallocated.
    pub fn texture_generation(&self) -> u64 {
        self.state.lock().color.generation()
    }

    pub fn mask_source_size(&self) -> TextureSize {
        self.state.lock().mask.source()
    }

    pub fn mask_size(&self) -> TextureSize {
        self.state.lock().mask.allocated()
    }

    /// True while no source size has been set.
    pub fn is_empty(&self) -> bool {
        self.state.lock().color.source().is_empty()
    }

    pub fn vertices(&self) -> [QuadVertex; 4] {
        self.state.lock().vertices
    }

    /// Overrides one coordinate of a corner position.
    ///
    /// Takes effect on the next upload; texture size changes recompute positions.
    pub fn set_vertex_position(&self, corner: QuadCorner, axis: Axis3, value: f32) {
        let mut s = self.state.lock();
        s.vertices[corner as usize].position[axis as usize] = value;
    }

    /// Schedules the vertex data for upload before the next draw.
    pub fn upload_vertex_data(&self) {
        self.state.lock().vertices_dirty = true;
    }

    /// Whether any part of the quad lies inside the clip cube after the
    /// current model-view-projection.
    pub fn is_visible(&self) -> bool {
        let mvp = self.base.mvp();
        let vertices = self.state.lock().vertices;
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in vertices {
            let p = mvp.project_point3(Vec3::from(v.position));
            min = min.min(p);
            max = max.max(p);
        }
        max.x > -1.0 && min.x < 1.0 && max.y > -1.0 && min.y < 1.0 && max.z >= 0.0 && min.z <= 1.0
    }

    // ── GPU setup ─────────────────────────────────────────────────────────

    fn build_gpu(&self, ctx: &RenderCtx<'_>) -> QuadGpu {
        let bind_group_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vista quad bgl"),
            entries: &[
                uniform_entry::<QuadUniform>(UNIFORM_BINDING, wgpu::ShaderStages::VERTEX_FRAGMENT),
                sampler_entry(SAMPLER_BINDING),
                texture_entry(COLOR_TEXTURE_BINDING),
                texture_entry(MASK_TEXTURE_BINDING),
            ],
        });

        let pipeline = create_checked_shader(
            ctx,
            "vista quad shader",
            include_str!("shaders/rectangle.wgsl"),
            ctx.debug_log,
        )
        .map(|shader| {
            let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("vista quad pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });
            ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("vista quad pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[QuadVertex::layout()],
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
                // TR, BR, BL is clockwise with +Y up.
                primitive: culled_triangles(wgpu::FrontFace::Cw),
                depth_stencil: depth_state(ctx),
                multisample: multisample(ctx),
                multiview_mask: None,
                cache: None,
            })
        });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vista quad sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let uniform = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vista quad ubo"),
            size: uniform_size::<QuadUniform>().map_or(0, |s| s.get()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertices = self.state.lock().vertices;
        let vbo = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vista quad vbo"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let ibo = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vista quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let blank = ctx.device.create_texture_with_data(
            ctx.queue,
            &wgpu::TextureDescriptor {
                label: Some("vista quad blank mask"),
                size: TextureSize::new(1, 1).to_extent(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: MASK_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255u8],
        );
        let blank_view = blank.create_view(&wgpu::TextureViewDescriptor::default());

        QuadGpu {
            key: ctx.attachment_key(),
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            pipeline,
            bind_group_layout,
            sampler,
            uniform,
            vbo,
            ibo,
            blank_mask: GpuTexture {
                texture: blank,
                view: blank_view,
            },
        }
    }
}

impl Drawable for RectangleDrawable {
    fn base(&self) -> &DrawableBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut DrawableBase {
        &mut self.base
    }

    fn initialize(&mut self, ctx: &RenderCtx<'_>) {
        let gpu = self.build_gpu(ctx);
        if gpu.pipeline.is_none() {
            log::error!("quad '{}' has no pipeline", self.base.display_name());
        }
        self.gpu = Some(gpu);
        self.bind_group = None;
        self.state.lock().vertices_dirty = true;
        self.base.set_initialized(true);
    }

    fn ready_for_rendering(&self) -> bool {
        self.gpu.as_ref().is_some_and(|g| g.pipeline.is_some()) && !self.is_empty()
    }

    fn draw(&mut self, ctx: &RenderCtx<'_>, pass: &mut wgpu::RenderPass<'_>) {
        let Some(gpu) = self.gpu.as_ref() else { return };
        let Some(pipeline) = gpu.pipeline.as_ref() else { return };
        if gpu.key != ctx.attachment_key() {
            log::warn!("quad '{}' drawn into a pass it was not initialized for", self.base.display_name());
            return;
        }

        let mut state = self.state.lock();
        if state.color.source().is_empty() {
            return;
        }

        let color_view = if self.use_external_texture {
            let Some(view) = self.external_view.as_ref() else { return };
            view
        } else {
            let Some(tex) = state.color_texture.as_ref() else {
                log::warn!("quad '{}' drawn without a texture", self.base.display_name());
                return;
            };
            &tex.view
        };

        let mask_texture = state.mask_texture.as_ref().filter(|_| state.mask_enabled);
        let key = BindKey {
            color: if self.use_external_texture { 0 } else { state.color.generation() },
            mask: if mask_texture.is_some() { state.mask.generation() } else { 0 },
            external: if self.use_external_texture { self.external_generation } else { 0 },
            mask_enabled: mask_texture.is_some(),
        };

        if self.bind_group.as_ref().is_none_or(|(k, _)| *k != key) {
            let mask_view = mask_texture.map_or(&gpu.blank_mask.view, |t| &t.view);
            let bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("vista quad bind group"),
                layout: &gpu.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: UNIFORM_BINDING,
                        resource: gpu.uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: SAMPLER_BINDING,
                        resource: wgpu::BindingResource::Sampler(&gpu.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: COLOR_TEXTURE_BINDING,
                        resource: wgpu::BindingResource::TextureView(color_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: MASK_TEXTURE_BINDING,
                        resource: wgpu::BindingResource::TextureView(mask_view),
                    },
                ],
            });
            self.bind_group = Some((key, bg));
        }
        let Some((_, bind_group)) = self.bind_group.as_ref() else { return };

        if state.vertices_dirty {
            ctx.queue.write_buffer(&gpu.vbo, 0, bytemuck::cast_slice(&state.vertices));
            state.vertices_dirty = false;
        }

        let uniform = QuadUniform {
            mvp: self.base.mvp().to_cols_array_2d(),
            alpha: self.base.alpha(),
            swap_rb: u32::from(!self.use_external_texture && state.source_format.swaps_red_blue()),
            use_mask: u32::from(key.mask_enabled),
            blur_mask: u32::from(key.mask_enabled && self.mask_blur),
            unnormalized: u32::from(state.target.unnormalized()),
            _pad: [0; 3],
        };
        ctx.queue.write_buffer(&gpu.uniform, 0, bytemuck::bytes_of(&uniform));

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, gpu.vbo.slice(..));
        pass.set_index_buffer(gpu.ibo.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_source(w: u32, h: u32) -> QuadState {
        let mut s = QuadState::new(TextureTarget::D2, PaddingPolicy::MultipleOfFour);
        s.color.plan(TextureSize::new(w, h), PixelFormat::Rgba, s.target, s.padding);
        s.update_texture_coordinates();
        s
    }

    #[test]
    fn uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<QuadUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<QuadUniform>(), 96);
    }

    #[test]
    fn full_hd_fills_the_output() {
        let s = state_with_source(1920, 1080);
        assert_eq!(s.vertices[QuadCorner::TopRight as usize].position, [1.0, 1.0, 0.0]);
        assert_eq!(s.vertices[QuadCorner::BottomLeft as usize].position, [-1.0, -1.0, 0.0]);
        assert_eq!(s.vertices[QuadCorner::TopRight as usize].uv, [1.0, 0.0]);
        assert_eq!(s.vertices[QuadCorner::BottomLeft as usize].uv, [0.0, 1.0]);
    }

    #[test]
    fn padded_source_uses_partial_uv_range() {
        let s = state_with_source(101, 77);
        let [u, v] = s.vertices[QuadCorner::BottomRight as usize].uv;
        assert!((u - 101.0 / 104.0).abs() < 1e-6);
        assert!((v - 77.0 / 80.0).abs() < 1e-6);
        assert_eq!(s.vertices[QuadCorner::TopRight as usize].uv[1], 0.0);
    }

    #[test]
    fn flip_swaps_corner_uvs() {
        let mut s = state_with_source(1920, 1080);
        s.flip = Flip::VERTICAL;
        s.update_texture_coordinates();
        assert_eq!(s.vertices[QuadCorner::TopRight as usize].uv, [1.0, 1.0]);
        assert_eq!(s.vertices[QuadCorner::TopLeft as usize].uv, [0.0, 1.0]);
    }

    #[test]
    fn rectangle_target_uses_pixel_coordinates() {
        let mut s = QuadState::new(TextureTarget::Rectangle, PaddingPolicy::MultipleOfFour);
        s.color.plan(TextureSize::new(101, 77), PixelFormat::Rgba, s.target, s.padding);
        s.update_texture_coordinates();
        assert_eq!(s.vertices[0].uv, [101.0, 0.0]);
        assert_eq!(s.color.allocated(), TextureSize::new(101, 77));
    }

    #[test]
    fn mask_resize_is_refused_while_disabled() {
        let mut s = QuadState::new(TextureTarget::D2, PaddingPolicy::MultipleOfFour);
        assert_eq!(s.plan_mask(TextureSize::new(101, 77)), None);
        assert!(s.mask.source().is_empty());

        s.mask_enabled = true;
        assert_eq!(
            s.plan_mask(TextureSize::new(101, 77)),
            Some(ResizePlan::Reallocate { allocated: TextureSize::new(104, 80) })
        );
        assert_eq!(s.mask.source(), TextureSize::new(101, 77));
        assert_eq!(s.plan_mask(TextureSize::new(101, 77)), Some(ResizePlan::Unchanged));
    }

    #[test]
    fn mask_channel_prefers_alpha() {
        assert_eq!(mask_channel(&[1, 2, 3, 4, 5, 6, 7, 8], PixelFormat::Rgba), vec![4, 8]);
        assert_eq!(mask_channel(&[9, 2, 3], PixelFormat::Rgb), vec![9]);
    }

    #[test]
    fn vertex_override_and_visibility() {
        let quad = RectangleDrawable::new("q", PaddingPolicy::MultipleOfFour);
        quad.state.lock().color.plan(
            TextureSize::new(1920, 1080),
            PixelFormat::Rgba,
            TextureTarget::D2,
            PaddingPolicy::MultipleOfFour,
        );
        quad.state.lock().update_texture_coordinates();
        assert!(quad.is_visible());

        for corner in [QuadCorner::TopRight, QuadCorner::BottomRight, QuadCorner::BottomLeft, QuadCorner::TopLeft] {
            quad.set_vertex_position(corner, Axis3::X, 5.0);
        }
        assert!(!quad.is_visible());
    }

    #[test]
    fn quad_behind_the_near_plane_is_hidden() {
        let quad = RectangleDrawable::new("q", PaddingPolicy::None);
        {
            let mut s = quad.state.lock();
            s.color.plan(TextureSize::new(64, 64), PixelFormat::Rgba, TextureTarget::D2, PaddingPolicy::None);
            s.update_texture_coordinates();
        }
        assert!(quad.is_visible());

        for corner in [QuadCorner::TopRight, QuadCorner::BottomRight, QuadCorner::BottomLeft, QuadCorner::TopLeft] {
            quad.set_vertex_position(corner, Axis3::Z, -0.5);
        }
        assert!(!quad.is_visible());
    }

    #[test]
    fn empty_quad_is_not_ready() {
        let quad = RectangleDrawable::new("q", PaddingPolicy::None);
        assert!(quad.is_empty());
        assert!(!quad.ready_for_rendering());
    }
}
