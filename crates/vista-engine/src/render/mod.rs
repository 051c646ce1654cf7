//! GPU drawables.
//!
//! Drawables own their pipelines, buffers and textures and record themselves
//! into a pass opened by the scene manager (or the display surface).
//!
//! Convention:
//! - Geometry is in normalized device units, +Y up, centered at the origin.
//! - Pipelines are built against the attachment layout of [`RenderCtx`].

mod common;
mod ctx;
mod depth_resolve;
mod drawable;
mod mesh;
mod rectangle;
mod texture_layout;

pub(crate) use common::check_texture_size;
pub(crate) use depth_resolve::DepthResolve;
pub use ctx::{AttachmentKey, RenderCtx, RenderTarget};
pub use drawable::{Drawable, DrawableBase};
pub use mesh::{fixed_view_projection, BuildReport, MeshDrawable, MeshProjection};
pub use rectangle::{
    Axis3, QuadCorner, QuadTextureHandle, QuadVertex, RectangleDrawable, COLOR_TEXTURE_BINDING,
    MASK_TEXTURE_BINDING, QUAD_INDICES,
};
pub use texture_layout::{
    convert_pixels, corner_uvs, next_multiple_of_four, next_power_of_two, upload_bytes, Flip,
    PaddingPolicy, PixelFormat, ResizePlan, TextureLayout, TextureTarget,
};
