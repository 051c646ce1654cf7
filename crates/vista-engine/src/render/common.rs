//! Shared pipeline state and creation helpers used by all drawables.

use std::num::NonZeroU64;

use crate::logging::{DebugMessageLog, DebugSeverity, DebugSource};

use super::RenderCtx;

// ── fixed-function state ──────────────────────────────────────────────────

/// Straight-alpha blending (src-alpha, one-minus-src-alpha).
pub(crate) fn alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState::ALPHA_BLENDING
}

/// Depth test `Less` with writes, when the pass has a depth attachment.
pub(crate) fn depth_state(ctx: &RenderCtx<'_>) -> Option<wgpu::DepthStencilState> {
    ctx.depth_format.map(|format| wgpu::DepthStencilState {
        format,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    })
}

/// Triangle list with back-face culling and the given front face.
pub(crate) fn culled_triangles(front_face: wgpu::FrontFace) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face,
        cull_mode: Some(wgpu::Face::Back),
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

pub(crate) fn multisample(ctx: &RenderCtx<'_>) -> wgpu::MultisampleState {
    wgpu::MultisampleState {
        count: ctx.sample_count.max(1),
        mask: !0,
        alpha_to_coverage_enabled: false,
    }
}

// ── bindings ──────────────────────────────────────────────────────────────

/// Minimum binding size of a uniform of type `T`.
pub(crate) fn uniform_size<T>() -> Option<NonZeroU64> {
    NonZeroU64::new(std::mem::size_of::<T>() as u64)
}

pub(crate) fn uniform_entry<T>(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: uniform_size::<T>(),
        },
        count: None,
    }
}

pub(crate) fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

// ── shaders ───────────────────────────────────────────────────────────────

/// Creates a shader module and checks its compilation messages.
///
/// Returns `None` when compilation failed; the caller keeps rendering nothing
/// instead of building a pipeline from an invalid module.
pub(crate) fn create_checked_shader(
    ctx: &RenderCtx<'_>,
    label: &str,
    source: &str,
    debug_log: Option<&DebugMessageLog>,
) -> Option<wgpu::ShaderModule> {
    let module = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let info = pollster::block_on(module.get_compilation_info());
    let mut failed = false;
    for msg in &info.messages {
        let severity = match msg.message_type {
            wgpu::CompilationMessageType::Error => {
                failed = true;
                DebugSeverity::High
            }
            wgpu::CompilationMessageType::Warning => DebugSeverity::Medium,
            wgpu::CompilationMessageType::Info => DebugSeverity::Low,
        };
        let line = msg.location.map(|l| l.line_number).unwrap_or(0);
        let text = format!("{label}:{line}: {}", msg.message);
        match debug_log {
            Some(log) => {
                log.record(DebugSource::ShaderCompiler, severity, &text);
            }
            None => log::log!(severity.level(), "shader {text}"),
        }
    }

    if failed {
        log::error!("shader '{label}' failed to compile; drawable will render nothing");
        return None;
    }
    Some(module)
}

// ── buffers ───────────────────────────────────────────────────────────────

/// Checks a buffer of `size` bytes can be created on `device`.
///
/// wgpu reports oversized or empty buffers asynchronously; checking up front
/// lets callers skip the unit and keep going.
pub(crate) fn check_buffer_size(device: &wgpu::Device, size: u64, what: &str) -> anyhow::Result<()> {
    anyhow::ensure!(size > 0, "{what}: empty buffer");
    let max = device.limits().max_buffer_size;
    anyhow::ensure!(size <= max, "{what}: {size} bytes exceeds device limit of {max}");
    Ok(())
}

/// Checks a 2D texture of `width`x`height` can be created on `device`.
pub(crate) fn check_texture_size(device: &wgpu::Device, width: u32, height: u32, what: &str) -> anyhow::Result<()> {
    anyhow::ensure!(width > 0 && height > 0, "{what}: empty texture");
    let max = device.limits().max_texture_dimension_2d;
    anyhow::ensure!(
        width <= max && height <= max,
        "{what}: {width}x{height} exceeds device limit of {max}"
    );
    Ok(())
}
