//! Background render loop.
//!
//! A dedicated thread owns the backend (normally a [`crate::scene::SceneManager`]),
//! consumes typed commands from a channel and renders on a fixed-interval
//! ticker. Frame-ready notifications go out through a callback so the window
//! loop can be woken.

mod backend;
mod handle;
mod worker;

pub use backend::{OffscreenTarget, RenderBackend, ThreadBound};
pub use handle::{Renderer, SceneRenderer};
pub use worker::RenderEvent;
