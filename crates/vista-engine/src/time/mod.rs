//! Frame timing for the render loop.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameRateReport, FrameTime};
