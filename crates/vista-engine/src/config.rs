//! Fixed output configuration.
//!
//! The render core treats these as compile-time constants. The typed config
//! structs below only bundle them for the places that take a config value
//! (renderer startup, tests that run at a different rate).

use std::time::Duration;

use crate::coords::TextureSize;
use crate::render::{MeshProjection, PaddingPolicy};

/// Resolution of the offscreen multisample and resolve targets.
pub const OUTPUT_RESOLUTION: TextureSize = TextureSize::new(1080, 720);

/// Render loop tick rate.
pub const TARGET_FPS: u32 = 30;

/// Requested multisample count for the offscreen target.
pub const MSAA_SAMPLES: u32 = 8;

/// Reference aspect ratio used to letterbox non 16:9 sources.
pub const REFERENCE_ASPECT: f32 = 16.0 / 9.0;

/// Clear color of the offscreen target (straight RGBA).
pub const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.05, 1.0];

/// Color format of the offscreen targets.
pub const OFFSCREEN_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Depth format of the offscreen multisample target.
pub const OFFSCREEN_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Scale applied to glTF positions at load time.
pub const MESH_POSITION_SCALE: f32 = 10.0;

/// Mesh spin per rendered frame, in degrees.
pub const MESH_ROTATION_STEP_DEG: f32 = 1.0;

/// Bounded wait for the render thread to terminate on shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the render loop to observe a stop request.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Returns the tick interval for `fps` frames per second.
///
/// `fps == 0` is treated as 1.
#[inline]
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1)))
}

/// Render loop configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub target_fps: u32,

    /// Size of the offscreen targets in physical pixels.
    pub output_size: TextureSize,

    /// Requested sample count; lowered to the nearest supported count at init.
    pub sample_count: u32,

    /// Install the throttled GPU debug logger at init.
    pub gpu_debugging: bool,

    /// Padding policy for textures of image drawables.
    pub padding: PaddingPolicy,

    /// Projection used by mesh drawables.
    pub mesh_projection: MeshProjection,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            target_fps: TARGET_FPS,
            output_size: OUTPUT_RESOLUTION,
            sample_count: MSAA_SAMPLES,
            gpu_debugging: cfg!(debug_assertions),
            padding: PaddingPolicy::MultipleOfFour,
            mesh_projection: MeshProjection::Fixed,
        }
    }
}

impl RendererConfig {
    pub fn tick_interval(&self) -> Duration {
        frame_interval(self.target_fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_fps_is_about_33ms() {
        let d = frame_interval(30);
        assert!(d > Duration::from_millis(33) && d < Duration::from_millis(34));
    }

    #[test]
    fn zero_fps_does_not_divide_by_zero() {
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn default_config_uses_constants() {
        let c = RendererConfig::default();
        assert_eq!(c.target_fps, TARGET_FPS);
        assert_eq!(c.output_size, OUTPUT_RESOLUTION);
        assert_eq!(c.sample_count, MSAA_SAMPLES);
        assert_eq!(c.padding, PaddingPolicy::MultipleOfFour);
    }
}
