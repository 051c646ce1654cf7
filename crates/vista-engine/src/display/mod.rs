//! GUI-thread side of the viewer: the surface presenting rendered frames and
//! the trackball camera control.

mod surface;
mod trackball;

pub use surface::DisplaySurface;
pub use trackball::{Trackball, DRAG_FACTOR, KEY_STEP, WHEEL_FACTOR};
