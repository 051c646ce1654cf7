//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the single viewer window, wires them to the
//! GPU layer and lets other threads wake the loop.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx, RuntimeEvent, Waker};
