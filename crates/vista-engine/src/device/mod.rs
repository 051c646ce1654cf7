//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue for the display window
//! - configuring the window surface and acquiring frames from it
//! - sharing the device with the render thread as a [`GpuContext`] with an
//!   explicit, runtime-checked owner thread
//! - describing the offscreen target the render thread draws into

mod context;
mod gpu;
mod init;
mod surface;

pub(crate) use context::install_default_error_handler;
pub use context::{ContextError, GpuContext, OffscreenSurface, ThreadAffinity};
pub use gpu::{Gpu, GpuFrame};
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
