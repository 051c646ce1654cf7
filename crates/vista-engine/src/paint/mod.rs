//! Color values used for target clears.

mod color;

pub use color::Color;
