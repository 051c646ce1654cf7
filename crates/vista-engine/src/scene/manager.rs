//! Offscreen scene rendering.
//!
//! The scene manager owns the multisample and resolve targets and the ordered
//! drawable list. Every pass clears, draws all drawables in insertion order
//! and resolves the multisampled color and depth into single-sample textures.
//! The display samples the resolved color.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::asset::{ImageAsset, MeshAsset};
use crate::config::{RendererConfig, CLEAR_COLOR};
use crate::coords::TextureSize;
use crate::critical;
use crate::device::{install_default_error_handler, GpuContext, OffscreenSurface};
use crate::logging::{DebugMessageLog, DebugSeverity, DebugSource};
use crate::paint::Color;
use crate::render::{check_texture_size, DepthResolve, Drawable, MeshDrawable, RectangleDrawable, RenderCtx, RenderTarget};

use super::SharedRenderData;

/// Lifecycle of a [`SceneManager`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SceneState {
    Uninitialized,
    Initializing,
    Ready,
    CleaningUp,
}

/// The latest resolved color target, as published to the display.
#[derive(Debug, Clone)]
pub struct ResolvedFrame {
    pub view: wgpu::TextureView,
    pub size: TextureSize,

    /// Incremented whenever the targets are reallocated.
    pub generation: u64,
}

/// Shared slot holding the current [`ResolvedFrame`].
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    inner: Arc<RwLock<Option<ResolvedFrame>>>,
}

impl FrameSlot {
    pub fn current(&self) -> Option<ResolvedFrame> {
        self.inner.read().clone()
    }

    pub fn generation(&self) -> Option<u64> {
        self.inner.read().as_ref().map(|f| f.generation)
    }

    fn publish(&self, frame: ResolvedFrame) {
        *self.inner.write() = Some(frame);
    }

    fn clear(&self) {
        *self.inner.write() = None;
    }
}

struct Framebuffers {
    size: TextureSize,
    samples: u32,

    /// `None` when the adapter cannot multisample; the pass then renders
    /// straight into the resolve targets.
    msaa_color: Option<wgpu::TextureView>,
    msaa_depth: Option<wgpu::TextureView>,
    depth_resolve: Option<DepthResolve>,

    resolve: wgpu::Texture,
    resolve_view: wgpu::TextureView,
    resolve_depth: wgpu::Texture,
    resolve_depth_view: wgpu::TextureView,
}

impl Framebuffers {
    fn allocate(context: &GpuContext, surface: &OffscreenSurface) -> anyhow::Result<Self> {
        let size = surface.size();
        let device = context.device();
        check_texture_size(device, size.width, size.height, "offscreen target")?;

        let color_format = surface.color_format();
        let depth_format = surface.depth_format();
        let requested = surface.requested_samples();
        let samples = context.supported_sample_count(requested, &[color_format, depth_format]);
        if samples != requested {
            log::warn!("{requested}x multisampling unsupported, using {samples}x");
        }

        let texture = |label: &str, format, sample_count, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: size.to_extent(),
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };
        let resolve_usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;

        let msaa_color = (samples > 1).then(|| {
            texture(
                "vista msaa color",
                color_format,
                samples,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
            .create_view(&wgpu::TextureViewDescriptor::default())
        });
        let msaa_depth = (samples > 1).then(|| {
            texture(
                "vista msaa depth",
                depth_format,
                samples,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            )
            .create_view(&wgpu::TextureViewDescriptor::default())
        });

        let resolve = texture("vista resolve color", color_format, 1, resolve_usage);
        let resolve_view = resolve.create_view(&wgpu::TextureViewDescriptor::default());
        let resolve_depth = texture("vista resolve depth", depth_format, 1, resolve_usage);
        let resolve_depth_view = resolve_depth.create_view(&wgpu::TextureViewDescriptor::default());

        let depth_resolve = match msaa_depth.as_ref() {
            Some(source) => {
                let ctx = RenderCtx::new(device, context.queue(), color_format, Some(depth_format), samples);
                let pass = DepthResolve::new(&ctx, source);
                anyhow::ensure!(pass.is_some(), "depth resolve pass could not be built");
                pass
            }
            None => None,
        };

        log::info!("offscreen targets {size} allocated ({samples}x)");
        Ok(Self {
            size,
            samples,
            msaa_color,
            msaa_depth,
            depth_resolve,
            resolve,
            resolve_view,
            resolve_depth,
            resolve_depth_view,
        })
    }

    /// Depth attachment of the scene pass.
    fn pass_depth(&self) -> &wgpu::TextureView {
        self.msaa_depth.as_ref().unwrap_or(&self.resolve_depth_view)
    }
}

fn render_ctx<'a>(
    context: &'a GpuContext,
    surface: &OffscreenSurface,
    framebuffers: &Framebuffers,
    debug_log: Option<&'a DebugMessageLog>,
) -> RenderCtx<'a> {
    RenderCtx::new(
        context.device(),
        context.queue(),
        surface.color_format(),
        Some(surface.depth_format()),
        framebuffers.samples,
    )
    .with_debug_log(debug_log)
}

/// Owns the offscreen targets and the drawables rendered into them.
///
/// All methods that touch the GPU must run on the thread owning the context
/// handed to [`SceneManager::initialize`]; other threads are refused.
pub struct SceneManager {
    state: SceneState,
    config: RendererConfig,
    render_data: SharedRenderData,

    context: Option<GpuContext>,
    surface: Option<OffscreenSurface>,
    framebuffers: Option<Framebuffers>,
    objects: Vec<Box<dyn Drawable>>,

    gpu_debugging: bool,
    debug_log: Option<Arc<DebugMessageLog>>,

    /// Last reason `render` was refused; repeats are not logged again.
    last_refusal: Option<String>,

    frame_slot: FrameSlot,
    generation: u64,
}

impl SceneManager {
    pub fn new(config: RendererConfig, render_data: SharedRenderData) -> Self {
        let gpu_debugging = config.gpu_debugging;
        Self {
            state: SceneState::Uninitialized,
            config,
            render_data,
            context: None,
            surface: None,
            framebuffers: None,
            objects: Vec::new(),
            gpu_debugging,
            debug_log: None,
            last_refusal: None,
            frame_slot: FrameSlot::default(),
            generation: 0,
        }
    }

    /// Publishes resolved frames into `slot` instead of a private one.
    pub fn with_frame_slot(mut self, slot: FrameSlot) -> Self {
        self.frame_slot = slot;
        self
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SceneState::Ready
    }

    pub fn render_data(&self) -> &SharedRenderData {
        &self.render_data
    }

    pub fn frame_slot(&self) -> &FrameSlot {
        &self.frame_slot
    }

    pub fn context(&self) -> Option<&GpuContext> {
        self.context.as_ref()
    }

    /// Sample count of the allocated targets.
    pub fn sample_count(&self) -> Option<u32> {
        self.framebuffers.as_ref().map(|f| f.samples)
    }

    pub fn debug_log(&self) -> Option<&DebugMessageLog> {
        self.debug_log.as_deref()
    }

    /// Context for building drawables against the offscreen targets.
    ///
    /// `None` unless ready and called on the owning thread.
    pub fn render_context(&self) -> Option<RenderCtx<'_>> {
        self.ready_ctx("render context")
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Takes the context and surface, allocates the targets and renders once.
    ///
    /// Returns `false` (and keeps nothing) when the context is not usable from
    /// the calling thread or the targets cannot be allocated.
    pub fn initialize(&mut self, context: GpuContext, surface: OffscreenSurface) -> bool {
        if self.state != SceneState::Uninitialized {
            log::warn!("scene manager initialized twice");
            return false;
        }

        if let Err(e) = context.make_current().and_then(|()| surface.check_thread()) {
            critical!("cannot make the GPU context current: {e}");
            return false;
        }
        self.state = SceneState::Initializing;

        if self.gpu_debugging {
            self.debug_log = Some(install_debug_logger(context.device()));
        }

        let framebuffers = match Framebuffers::allocate(&context, &surface) {
            Ok(f) => f,
            Err(e) => {
                log::error!("failed to allocate offscreen targets: {e:#}");
                install_default_error_handler(context.device());
                self.debug_log = None;
                self.state = SceneState::Uninitialized;
                return false;
            }
        };

        self.context = Some(context);
        self.surface = Some(surface);
        self.publish(&framebuffers);
        self.framebuffers = Some(framebuffers);
        self.state = SceneState::Ready;

        // warm-up
        self.render();
        true
    }

    /// Renders one pass. Returns `false` unless ready and on the owning thread.
    pub fn render(&mut self) -> bool {
        if self.state != SceneState::Ready {
            return false;
        }
        let (Some(context), Some(surface), Some(fb)) =
            (self.context.as_ref(), self.surface.as_ref(), self.framebuffers.as_ref())
        else {
            return false;
        };
        if let Err(e) = context.make_current() {
            if note_refusal(&mut self.last_refusal, e.to_string()) {
                critical!("render skipped: {e}");
            }
            return false;
        }
        self.last_refusal = None;

        let view_projection = self.render_data.snapshot().projection_matrix();
        let ctx = render_ctx(context, surface, fb, self.debug_log.as_deref());

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("vista scene encoder"),
        });
        {
            let mut target = match fb.msaa_color.as_ref() {
                Some(msaa) => RenderTarget::new(&mut encoder, msaa).with_resolve(&fb.resolve_view),
                None => RenderTarget::new(&mut encoder, &fb.resolve_view),
            }
            .with_stored_depth(fb.pass_depth());

            let mut pass = target.begin_pass("vista scene pass", Color::from(CLEAR_COLOR), None);
            for object in self.objects.iter_mut() {
                object.prepare(view_projection);
                if object.ready_for_rendering() {
                    object.draw(&ctx, &mut pass);
                }
            }
        }
        if let Some(depth_resolve) = fb.depth_resolve.as_ref() {
            depth_resolve.encode(&mut encoder, &fb.resolve_depth_view);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));

        if let Some(log) = self.debug_log.as_deref() {
            let errors = log.take_pending_errors();
            if errors > 0 {
                log::error!("{errors} GPU error(s) during the scene pass");
            }
        }
        true
    }

    /// Releases everything. A no-op when already uninitialized.
    ///
    /// Refused (returns `false`) on any thread other than the context owner.
    pub fn clean_up(&mut self) -> bool {
        if self.state == SceneState::Uninitialized {
            return false;
        }
        if let Some(context) = self.context.as_ref() {
            if let Err(e) = context.check_thread() {
                critical!("clean up refused: {e}");
                return false;
            }
        }

        self.state = SceneState::CleaningUp;
        self.objects.clear();
        self.framebuffers = None;
        self.frame_slot.clear();

        if let Some(context) = self.context.take() {
            if self.debug_log.take().is_some() {
                install_default_error_handler(context.device());
            }
        }
        self.surface = None;
        self.state = SceneState::Uninitialized;
        log::info!("scene manager cleaned up");
        true
    }

    // ── objects ───────────────────────────────────────────────────────────

    /// Initializes `object` and appends it to the draw order.
    pub fn add_object(&mut self, mut object: Box<dyn Drawable>) -> bool {
        let Some(ctx) = self.ready_ctx("add object") else {
            return false;
        };
        object.initialize(&ctx);
        log::info!("added '{}' ({} objects)", object.display_name(), self.objects.len() + 1);
        self.objects.push(object);
        true
    }

    /// Decodes an image file and adds it as a quad.
    pub fn add_texture_object(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match ImageAsset::load(path) {
            Ok(image) => self.add_image(file_label(path), &image),
            Err(e) => {
                log::error!("{e}");
                false
            }
        }
    }

    /// Adds a quad showing `image`.
    pub fn add_image(&mut self, name: impl Into<String>, image: &ImageAsset) -> bool {
        let Some(ctx) = self.ready_ctx("add image") else {
            return false;
        };
        let mut quad = RectangleDrawable::new(name, self.config.padding);
        quad.initialize(&ctx);
        quad.change_texture_size_and_format(&ctx, image.size, image.format);
        if !quad.set_texture_data(&ctx, image) {
            log::error!("image '{}' could not be uploaded", quad.display_name());
            return false;
        }
        log::info!("added image '{}' {}", quad.display_name(), image.size);
        self.objects.push(Box::new(quad));
        true
    }

    /// Decodes a glTF file and adds it as a mesh.
    pub fn add_mesh_object(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match MeshDrawable::load(path) {
            Ok(mesh) => self.push_mesh(mesh),
            Err(e) => {
                log::error!("{e}");
                false
            }
        }
    }

    pub fn add_mesh(&mut self, name: impl Into<String>, asset: MeshAsset) -> bool {
        self.push_mesh(MeshDrawable::new(name, asset))
    }

    fn push_mesh(&mut self, mesh: MeshDrawable) -> bool {
        let mesh = mesh.with_projection(self.config.mesh_projection);
        self.add_object(Box::new(mesh))
    }

    pub fn render_objects(&self) -> &[Box<dyn Drawable>] {
        &self.objects
    }

    pub fn render_object_count(&self) -> usize {
        self.objects.len()
    }

    /// Position of the first object named `name`.
    pub fn object_index(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.display_name() == name)
    }

    pub fn object(&self, index: usize) -> Option<&dyn Drawable> {
        self.objects.get(index).map(|o| o.as_ref())
    }

    pub fn clear_objects(&mut self) {
        self.objects.clear();
    }

    // ── settings ──────────────────────────────────────────────────────────

    /// Reallocates both targets at `size`.
    ///
    /// Drawables are rebuilt when the sample count changes.
    pub fn on_output_settings_changed(&mut self, size: TextureSize) -> bool {
        if !self.is_ready() {
            return false;
        }
        let (Some(context), Some(surface)) = (self.context.as_ref(), self.surface.as_mut()) else {
            return false;
        };
        if let Err(e) = context.make_current() {
            critical!("output settings change refused: {e}");
            return false;
        }

        surface.set_size(size);
        let framebuffers = match Framebuffers::allocate(context, surface) {
            Ok(f) => f,
            Err(e) => {
                log::error!("failed to reallocate offscreen targets: {e:#}");
                return false;
            }
        };

        let samples_changed = self.framebuffers.as_ref().map(|f| f.samples) != Some(framebuffers.samples);
        self.publish(&framebuffers);
        self.framebuffers = Some(framebuffers);
        self.config.output_size = size;

        if samples_changed {
            let (Some(context), Some(surface), Some(fb)) =
                (self.context.as_ref(), self.surface.as_ref(), self.framebuffers.as_ref())
            else {
                return true;
            };
            let ctx = render_ctx(context, surface, fb, self.debug_log.as_deref());
            for object in self.objects.iter_mut() {
                object.initialize(&ctx);
            }
        }
        true
    }

    /// Installs or removes the throttled GPU message logger.
    pub fn change_gpu_debugging(&mut self, enabled: bool) {
        self.gpu_debugging = enabled;
        let Some(context) = self.context.as_ref() else {
            return;
        };
        if let Err(e) = context.check_thread() {
            critical!("GPU debugging change refused: {e}");
            return;
        }
        match (enabled, self.debug_log.is_some()) {
            (true, false) => {
                self.debug_log = Some(install_debug_logger(context.device()));
                log::info!("GPU debugging enabled");
            }
            (false, true) => {
                install_default_error_handler(context.device());
                self.debug_log = None;
                log::info!("GPU debugging disabled");
            }
            _ => {}
        }
    }

    /// Copies the resolved color target to the CPU as tightly packed RGBA8.
    ///
    /// Blocks until the GPU is done.
    pub fn read_resolved_pixels(&self) -> anyhow::Result<Vec<u8>> {
        let (Some(context), Some(fb)) = (self.context.as_ref(), self.framebuffers.as_ref()) else {
            anyhow::bail!("scene manager is not initialized");
        };
        read_texture(context, &fb.resolve, wgpu::TextureAspect::All, fb.size, 4)
    }

    /// Copies the resolved depth target to the CPU, one value per pixel.
    ///
    /// Blocks until the GPU is done.
    pub fn read_resolved_depth(&self) -> anyhow::Result<Vec<f32>> {
        let (Some(context), Some(fb)) = (self.context.as_ref(), self.framebuffers.as_ref()) else {
            anyhow::bail!("scene manager is not initialized");
        };
        let bytes = read_texture(context, &fb.resolve_depth, wgpu::TextureAspect::DepthOnly, fb.size, 4)?;
        Ok(bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned::<f32>).collect())
    }

    // ── helpers ───────────────────────────────────────────────────────────

    fn ready_ctx(&self, what: &str) -> Option<RenderCtx<'_>> {
        if !self.is_ready() {
            log::warn!("{what}: scene manager is not ready");
            return None;
        }
        let (context, surface, fb) =
            (self.context.as_ref()?, self.surface.as_ref()?, self.framebuffers.as_ref()?);
        if let Err(e) = context.make_current() {
            critical!("{what}: {e}");
            return None;
        }
        Some(render_ctx(context, surface, fb, self.debug_log.as_deref()))
    }

    fn publish(&mut self, framebuffers: &Framebuffers) {
        self.generation += 1;
        self.frame_slot.publish(ResolvedFrame {
            view: framebuffers.resolve_view.clone(),
            size: framebuffers.size,
            generation: self.generation,
        });
    }
}

impl Drop for SceneManager {
    fn drop(&mut self) {
        if self.state != SceneState::Uninitialized && !self.clean_up() {
            log::warn!("scene manager dropped off its GPU thread; resources released by wgpu");
        }
    }
}

/// Records `reason` as the latest refusal. `true` when it differs from the
/// previous one and should be reported.
fn note_refusal(last: &mut Option<String>, reason: String) -> bool {
    if last.as_deref() == Some(reason.as_str()) {
        return false;
    }
    *last = Some(reason);
    true
}

/// Copies one aspect of `texture` into tightly packed rows.
fn read_texture(
    context: &GpuContext,
    texture: &wgpu::Texture,
    aspect: wgpu::TextureAspect,
    size: TextureSize,
    bytes_per_pixel: u32,
) -> anyhow::Result<Vec<u8>> {
    context.make_current()?;
    let device = context.device();

    let row = size.width * bytes_per_pixel;
    let padded_row = row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("vista readback"),
        size: u64::from(padded_row) * u64::from(size.height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("vista readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(size.height),
            },
        },
        size.to_extent(),
    );
    context.queue().submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::PollType::wait_indefinitely())?;
    rx.recv()??;

    let mut pixels = Vec::with_capacity((row * size.height) as usize);
    {
        let mapped = slice.get_mapped_range();
        for chunk in mapped.chunks_exact(padded_row as usize) {
            pixels.extend_from_slice(&chunk[..row as usize]);
        }
    }
    buffer.unmap();
    Ok(pixels)
}

/// Routes uncaptured device errors through a throttled message log.
///
/// The callback runs synchronously on the thread that issued the failing call.
fn install_debug_logger(device: &wgpu::Device) -> Arc<DebugMessageLog> {
    let log = Arc::new(DebugMessageLog::new());
    let sink = Arc::clone(&log);
    device.on_uncaptured_error(Arc::new(move |e: wgpu::Error| {
        sink.record(DebugSource::Device, DebugSeverity::High, &e.to_string());
    }));
    log::debug!("GPU debug logger installed");
    log
}

/// Objects loaded from disk are named by their full path.
fn file_label(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manager_is_uninitialized() {
        let m = SceneManager::new(RendererConfig::default(), SharedRenderData::default());
        assert_eq!(m.state(), SceneState::Uninitialized);
        assert_eq!(m.render_object_count(), 0);
        assert!(m.frame_slot().current().is_none());
    }

    #[test]
    fn render_before_initialize_is_a_no_op() {
        let mut m = SceneManager::new(RendererConfig::default(), SharedRenderData::default());
        assert!(!m.render());
        assert!(!m.clean_up());
        assert!(!m.clean_up());
    }

    #[test]
    fn objects_need_a_ready_manager() {
        let mut m = SceneManager::new(RendererConfig::default(), SharedRenderData::default());
        let image = ImageAsset::solid(TextureSize::new(4, 4), [255; 4]);
        assert!(!m.add_image("img", &image));
        assert!(!m.add_texture_object("/nonexistent/vista.png"));
        assert!(!m.add_mesh_object("/nonexistent/vista.gltf"));
        assert_eq!(m.object_index("img"), None);
    }

    #[test]
    fn file_label_keeps_the_directory() {
        assert_eq!(file_label(Path::new("/a/b/photo.png")), "/a/b/photo.png");
        assert_ne!(file_label(Path::new("/a/photo.png")), file_label(Path::new("/b/photo.png")));
    }

    #[test]
    fn repeated_refusal_is_reported_once() {
        let mut last = None;
        assert!(note_refusal(&mut last, "GPU device lost: Destroyed".into()));
        for _ in 0..30 {
            assert!(!note_refusal(&mut last, "GPU device lost: Destroyed".into()));
        }
        assert!(note_refusal(&mut last, "wrong thread".into()));

        last = None;
        assert!(note_refusal(&mut last, "GPU device lost: Destroyed".into()));
    }
}
