//! Raster editing core for a coloring application.
//!
//! The embedding app decodes a source image into an RGBA8 `image::RgbaImage`
//! and hands it to an [`EditSession`], which prepares it (line-art
//! conversion or color segmentation, chosen by classification), then serves
//! taps and drags as flood fills and brush strokes with snapshot-based
//! undo/redo. Screen navigation, gestures, file save/share and networking
//! are the embedder's problem; this crate only ever sees pixel buffers and
//! coordinates.

pub mod canvas;
pub mod classify;
pub mod error;
pub mod ops;
pub mod session;

pub use error::{Error, Result};
pub use ops::brush::BrushSettings;
pub use ops::lineart::LineArtSettings;
pub use ops::segment::SegmentSettings;
pub use session::{Action, EditSession, Preparation, SessionSettings, Snapshot};
