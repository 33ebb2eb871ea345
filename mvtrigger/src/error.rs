//! # Error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while setting up or running motion detection.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid detector configuration. Fatal at initialization.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Sensitivity map could not be read or is not a grayscale image.
    #[error("failed to load sensitivity map {path:?}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    /// Sensitivity map does not cover the macroblock grid exactly.
    #[error("sensitivity map is {}x{}, macroblock grid is {}x{}", found.0, found.1, expected.0, expected.1)]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Could not allocate an owned frame buffer.
    #[error("failed to allocate buffer for {0} motion vectors")]
    Allocation(usize),

    /// Frame does not hold a vector for every macroblock.
    #[error("frame holds {found} motion vectors, grid needs {expected}")]
    FrameTooShort { expected: usize, found: usize },

    /// Detection worker thread could not be created.
    #[error("failed to spawn detection worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// Detection worker is no longer running.
    #[error("detection worker has stopped")]
    WorkerStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde_json")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
