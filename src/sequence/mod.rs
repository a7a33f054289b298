//! The ordered file sequence the cache navigates.
//!
//! The cache never owns file records. It reads `FileSummary` values by row
//! and hands them back to the sequence when it needs pixels:
//!
//! ```rust,ignore
//! use framecache::{FileSequence, FolderSequence};
//!
//! let sequence = FolderSequence::open("/data/trap-07")?;
//! let first = sequence.get(0).expect("folder is not empty");
//! let pixels = sequence.decode(&first, sequence.folder(), Some(1024))?;
//! ```

mod folder;

pub use folder::{FolderSequence, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::DecodeError;

/// Stable identifier of a file, independent of its row in the selection.
pub type FileId = i64;

/// What the cache needs to know about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// Stable unique identifier
    pub id: FileId,
    /// Path relative to the session folder
    pub path: PathBuf,
    /// False for files known to be corrupt or missing
    pub displayable: bool,
    /// Videos are never decoded or differenced
    pub is_video: bool,
}

impl FileSummary {
    /// Create a summary for a displayable still image.
    pub fn image(id: FileId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
            displayable: true,
            is_video: false,
        }
    }

    /// True if the file is a still image that can be decoded.
    pub fn is_decodable_image(&self) -> bool {
        self.displayable && !self.is_video
    }
}

/// An ordered, randomly indexable sequence of files owned by the caller.
///
/// Implementations are shared with prefetch workers, so they must be
/// `Send + Sync`. The sequence may change between calls (files added,
/// removed or reordered); the cache re-validates rows on every access.
pub trait FileSequence: Send + Sync + 'static {
    /// Number of files in the current selection.
    fn len(&self) -> usize;

    /// True if the selection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summary of the file at `row`, or `None` if out of range.
    fn get(&self, row: usize) -> Option<FileSummary>;

    /// Decode the file's pixels. Blocking.
    ///
    /// # Arguments
    /// * `file` - Summary previously returned by `get`
    /// * `folder` - Folder that `file.path` is relative to
    /// * `desired_width` - Optional width hint; decoders may downscale wider frames
    fn decode(
        &self,
        file: &FileSummary,
        folder: &Path,
        desired_width: Option<u32>,
    ) -> Result<RgbaImage, DecodeError>;
}
