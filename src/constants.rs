//! Global constants for the frame cache

/// Default number of decoded bitmaps kept in the store
pub const DEFAULT_BITMAP_CACHE_SIZE: usize = 9;

/// Default number of background prefetch workers
pub const DEFAULT_PREFETCH_WORKERS: usize = 2;

/// Default per-pixel threshold for the combined difference
pub const DEFAULT_DIFFERENCE_THRESHOLD: u8 = 20;

/// Edge length of the placeholder bitmap shown for undisplayable files
pub const PLACEHOLDER_SIZE: u32 = 16;

/// Grey level of the placeholder bitmap
pub const PLACEHOLDER_GREY: u8 = 128;
