//! Framecache - decoded frame cache for camera-trap image review
//!
//! Keeps recently decoded frames of an ordered file sequence in a bounded
//! LRU store, decodes the next frame in the background while the current one
//! is on screen, and derives difference views (previous, next and combined)
//! that make small animals stand out against a static background.

mod bitmap;
mod config;
mod constants;
mod differencer;
mod error;
mod image_cache;
mod sequence;
mod state;

#[cfg(test)]
mod test_support;

pub use bitmap::Bitmap;
pub use config::{CONFIG_VERSION, CacheConfig, ConfigError, LogLevel};
pub use constants::{DEFAULT_BITMAP_CACHE_SIZE, DEFAULT_DIFFERENCE_THRESHOLD};
pub use differencer::{BitmapDifferencer, PixelDifferencer};
pub use error::DecodeError;
pub use image_cache::ImageCache;
pub use sequence::{
    FileId, FileSequence, FileSummary, FolderSequence, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS,
};
pub use state::{
    BitmapStore, DifferenceCache, ImageDifference, ImageDifferenceResult, MoveResult,
    PrefetchSettings, Prefetcher, SequenceCursor,
};
