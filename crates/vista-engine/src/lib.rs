//! Vista engine crate.
//!
//! Offscreen scene rendering on a dedicated thread, presented in a winit
//! window through a display surface.
//!
//! - `render`: drawables (textured quad, glTF mesh) and pipeline helpers
//! - `scene`: camera framing and the scene manager owning the offscreen targets
//! - `renderer`: the fixed-rate render thread and its owning-thread handle
//! - `display`: the on-screen presenter and trackball control
//! - `window` / `core`: the winit runtime and the app contract

pub mod config;
pub mod logging;

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod coords;
pub mod paint;
pub mod render;
pub mod asset;
pub mod scene;
pub mod renderer;
pub mod display;
