//! Scene state: camera framing and the offscreen scene manager.

mod framing;
mod manager;
mod render_data;

pub use framing::{Framing2D, Framing3D, FOV_MAX_DEG, FOV_MIN_DEG};
pub use manager::{FrameSlot, ResolvedFrame, SceneManager, SceneState};
pub use render_data::{RenderData, RenderMode, SharedRenderData};
