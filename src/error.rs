use thiserror::Error;

/// Errors surfaced at the core boundary.
///
/// Out-of-range coordinates and operations on an empty session are no-ops by
/// contract, never errors. The preprocessing pipelines recover internally by
/// returning the unmodified input, so the only failure a caller normally sees
/// is a malformed (zero-sized) buffer rejected before any work starts.
#[derive(Error, Debug)]
pub enum Error {
    #[error("empty buffer: {width}x{height}")]
    EmptyBuffer { width: u32, height: u32 },

    #[error("processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, Error>;
