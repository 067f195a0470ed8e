//! Pixel-mutating operations and preprocessing pipelines.

pub mod brush;
pub mod fill;
pub mod lineart;
pub mod segment;
