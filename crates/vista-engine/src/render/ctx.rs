use crate::coords::Viewport;
use crate::logging::DebugMessageLog;
use crate::paint::Color;

/// Drawable-facing context: device/queue plus the attachment formats of the
/// pass the drawable will be recorded into.
///
/// Pipelines are built against these formats, so a drawable initialized for
/// the offscreen target cannot be drawn into the window surface.
#[derive(Clone, Copy)]
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,

    /// Throttled sink for shader compiler messages, when GPU debugging is on.
    pub debug_log: Option<&'a DebugMessageLog>,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        sample_count: u32,
    ) -> Self {
        Self {
            device,
            queue,
            color_format,
            depth_format,
            sample_count,
            debug_log: None,
        }
    }

    pub fn with_debug_log(mut self, log: Option<&'a DebugMessageLog>) -> Self {
        self.debug_log = log;
        self
    }

    /// Identity of the attachment layout, used to detect stale pipelines.
    pub fn attachment_key(&self) -> AttachmentKey {
        AttachmentKey {
            color_format: self.color_format,
            depth_format: self.depth_format,
            sample_count: self.sample_count,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttachmentKey {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

/// Attachments of one pass (encoder + views).
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,

    /// Single-sample texture the multisampled color is resolved into.
    pub resolve_view: Option<&'a wgpu::TextureView>,

    pub depth_view: Option<&'a wgpu::TextureView>,

    /// Whether depth survives the pass (for a later depth resolve).
    pub keep_depth: bool,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self {
            encoder,
            color_view,
            resolve_view: None,
            depth_view: None,
            keep_depth: false,
        }
    }

    pub fn with_resolve(mut self, view: &'a wgpu::TextureView) -> Self {
        self.resolve_view = Some(view);
        self
    }

    pub fn with_depth(mut self, view: &'a wgpu::TextureView) -> Self {
        self.depth_view = Some(view);
        self
    }

    /// Attaches depth and stores it at the end of the pass.
    pub fn with_stored_depth(mut self, view: &'a wgpu::TextureView) -> Self {
        self.depth_view = Some(view);
        self.keep_depth = true;
        self
    }

    /// Begins a pass clearing color (and depth, when attached).
    ///
    /// The multisampled color is discarded after the resolve. Depth is
    /// discarded unless attached with [`RenderTarget::with_stored_depth`].
    pub fn begin_pass(&mut self, label: &str, clear: Color, viewport: Option<Viewport>) -> wgpu::RenderPass<'_> {
        let color_store = if self.resolve_view.is_some() {
            wgpu::StoreOp::Discard
        } else {
            wgpu::StoreOp::Store
        };

        let depth_store = if self.keep_depth {
            wgpu::StoreOp::Store
        } else {
            wgpu::StoreOp::Discard
        };

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.color_view,
                resolve_target: self.resolve_view,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                    store: color_store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: self.depth_view.map(|view| {
                wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: depth_store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if let Some(v) = viewport.filter(|v| v.is_valid()) {
            pass.set_viewport(v.x, v.y, v.width, v.height, 0.0, 1.0);
        }
        pass
    }
}
