//! Coordinate and size types shared by the render core and the display.
//!
//! - `TextureSize`: integer pixel sizes of textures and targets
//! - `Viewport`: pixel rectangle inside a target (top-left origin)
//! - `QuadExtents`: NDC extents of a letterboxed quad (+Y up)

mod letterbox;
mod size;
mod viewport;

pub use letterbox::QuadExtents;
pub use size::TextureSize;
pub use viewport::Viewport;
