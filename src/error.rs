//! Error types for frame decoding.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding a frame into a bitmap.
///
/// None of these reach the UI as failures: the cache logs them and shows a
/// placeholder instead, or reports the neighbour as not available.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// I/O error while reading the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The image crate could not decode the file
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// The file is a video or another format the decoder cannot render
    #[error("Unsupported media: {path:?}")]
    UnsupportedMedia {
        /// Path of the file that was rejected
        path: PathBuf,
    },

    /// Waiting on an in-flight load took longer than the configured timeout
    #[error("Timed out after {millis} ms waiting for {path:?}")]
    Timeout {
        /// Path of the file being loaded
        path: PathBuf,
        /// Configured timeout
        millis: u64,
    },

    /// The decoder panicked on a prefetch worker
    #[error("Decoder panicked: {0}")]
    WorkerPanic(String),
}

impl DecodeError {
    /// Create an unsupported media error.
    pub fn unsupported(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedMedia { path: path.into() }
    }
}
