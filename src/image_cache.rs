//! Decoded-frame cache for navigating an ordered sequence of camera-trap files.
//!
//! `ImageCache` is what the UI talks to. It keeps the current position, a
//! bounded store of decoded bitmaps shared with background prefetch workers,
//! and the difference views of the current frame.
//!
//! Navigation is assumed to run mostly forward: every time a bitmap is
//! retrieved, the file after the current one starts decoding in the
//! background.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::config::{CacheConfig, ConfigError};
use crate::differencer::{BitmapDifferencer, PixelDifferencer};
use crate::sequence::{FileId, FileSequence, FileSummary};
use crate::state::{
    BitmapStore, DifferenceCache, ImageDifference, ImageDifferenceResult, MoveResult, Prefetcher,
    SequenceCursor,
};

/// Image cache for one open session.
///
/// All methods are called from one consumer thread. Only the bitmap store
/// and the in-flight decode map are shared with the prefetch workers.
pub struct ImageCache<S: FileSequence, D: BitmapDifferencer = PixelDifferencer> {
    sequence: Arc<S>,
    store: Arc<BitmapStore>,
    prefetcher: Prefetcher<S>,
    cursor: SequenceCursor,
    differences: DifferenceCache,
    differencer: D,
}

impl<S: FileSequence> ImageCache<S> {
    /// Create a cache using the default pixel differencer.
    pub fn new(
        sequence: Arc<S>,
        folder: impl Into<PathBuf>,
        config: &CacheConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_differencer(sequence, folder, config, PixelDifferencer)
    }
}

impl<S: FileSequence, D: BitmapDifferencer> ImageCache<S, D> {
    /// Create a cache with a custom differencing primitive.
    pub fn with_differencer(
        sequence: Arc<S>,
        folder: impl Into<PathBuf>,
        config: &CacheConfig,
        differencer: D,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = Arc::new(BitmapStore::new(config.cache_capacity()?));
        let prefetcher = Prefetcher::new(
            Arc::clone(&sequence),
            folder,
            Arc::clone(&store),
            &config.prefetch_settings(),
        );

        log::info!(
            "Image cache created for {:?} ({} files, {} bitmaps, prefetch {})",
            prefetcher.folder(),
            sequence.len(),
            store.capacity(),
            if prefetcher.is_enabled() { "on" } else { "off" }
        );

        Ok(Self {
            sequence,
            store,
            prefetcher,
            cursor: SequenceCursor::new(),
            differences: DifferenceCache::new(),
            differencer,
        })
    }

    /// Move to `row`.
    ///
    /// On a move to a different file its bitmap is loaded (from the cache,
    /// an in-flight prefetch, or disk), the view resets to `Unaltered`, and
    /// all derived difference bitmaps are dropped. Videos have no bitmap.
    ///
    /// Moving to the file already shown keeps the current view, unless it
    /// is showing a placeholder left by a timed-out wait; that frame is
    /// looked up again.
    pub fn try_move_to_file(&mut self, row: usize) -> MoveResult {
        let result = self.cursor.move_to(self.sequence.as_ref(), row);
        match result {
            MoveResult::OutOfRange => return result,
            MoveResult::SameFile => {
                self.retry_placeholder();
                return result;
            }
            MoveResult::NewFile => {}
        }

        let Some(current) = self.cursor.current().cloned() else {
            return MoveResult::OutOfRange;
        };
        let unaltered = if current.is_video {
            self.prefetch_next();
            None
        } else {
            Some(self.retrieve(&current))
        };
        self.differences.reset(unaltered);
        result
    }

    /// Bitmap for the current view, if it has been computed.
    pub fn current_image(&self) -> Option<Bitmap> {
        self.differences.current().cloned()
    }

    /// Drop the cached bitmap for `id`, e.g. after the file changed on disk.
    ///
    /// If `id` is the current file the cursor and difference views are
    /// reset too, so the next move to it decodes afresh. Returns whether a
    /// cached bitmap was removed.
    pub fn try_invalidate(&mut self, id: FileId) -> bool {
        if self.cursor.current().is_some_and(|current| current.id == id) {
            self.reset();
        }
        self.store.invalidate(id)
    }

    /// Step the previous/next difference cycle.
    pub fn advance_previous_next_cycle(&mut self) {
        let current_available = self.current_frame().is_some();
        let sequence = self.sequence.as_ref();
        let row = self.cursor.row();

        self.differences
            .advance_previous_next_cycle(current_available, |view| {
                let Some(row) = row else {
                    return false;
                };
                let neighbour = match view {
                    ImageDifference::Previous => row.checked_sub(1),
                    ImageDifference::Next => row.checked_add(1),
                    _ => return true,
                };
                neighbour
                    .and_then(|neighbour| sequence.get(neighbour))
                    .is_some_and(|file| file.displayable)
            });
        log::debug!("Difference view: {:?}", self.differences.state());
    }

    /// Toggle between the unaltered frame and the combined difference.
    pub fn advance_combined_cycle(&mut self) {
        self.differences.advance_combined_cycle();
        log::debug!("Difference view: {:?}", self.differences.state());
    }

    /// Compute the difference for the current `Previous` or `Next` view.
    pub fn compute_difference(&mut self) -> ImageDifferenceResult {
        let Some((row, unaltered)) = self.current_frame() else {
            self.differences.force_unaltered();
            return ImageDifferenceResult::CurrentImageNotAvailable;
        };

        let view = self.differences.state();
        let (neighbour, missing) = match view {
            ImageDifference::Previous => (
                row.checked_sub(1),
                ImageDifferenceResult::PreviousImageNotAvailable,
            ),
            ImageDifference::Next => (
                row.checked_add(1),
                ImageDifferenceResult::NextImageNotAvailable,
            ),
            _ => return ImageDifferenceResult::NotCalculable,
        };

        if self.differences.get(view).is_some() {
            return ImageDifferenceResult::Success;
        }

        let Some(comparison) = neighbour.and_then(|neighbour| self.adjacent_bitmap(neighbour))
        else {
            return missing;
        };

        match self
            .differencer
            .subtract(unaltered.pixels(), comparison.pixels())
        {
            Some(difference) => {
                self.differences.store(view, Bitmap::new(difference));
                ImageDifferenceResult::Success
            }
            None => ImageDifferenceResult::NotCalculable,
        }
    }

    /// Compute the combined difference for the `Combined` view.
    pub fn compute_combined_difference(&mut self, threshold: u8) -> ImageDifferenceResult {
        if self.differences.state() != ImageDifference::Combined {
            return ImageDifferenceResult::NotCalculable;
        }

        let Some((row, unaltered)) = self.current_frame() else {
            self.differences.force_unaltered();
            return ImageDifferenceResult::CurrentImageNotAvailable;
        };

        if self.differences.get(ImageDifference::Combined).is_some()
            && self.differences.combined_threshold() == Some(threshold)
        {
            return ImageDifferenceResult::Success;
        }

        let Some(previous) = row
            .checked_sub(1)
            .and_then(|previous| self.adjacent_bitmap(previous))
        else {
            return ImageDifferenceResult::PreviousImageNotAvailable;
        };
        let Some(next) = row
            .checked_add(1)
            .and_then(|next| self.adjacent_bitmap(next))
        else {
            return ImageDifferenceResult::NextImageNotAvailable;
        };

        match self.differencer.combined_difference(
            unaltered.pixels(),
            previous.pixels(),
            next.pixels(),
            threshold,
        ) {
            Some(difference) => {
                self.differences
                    .store_combined(Bitmap::new(difference), threshold);
                ImageDifferenceResult::Success
            }
            None => ImageDifferenceResult::NotCalculable,
        }
    }

    /// Forget the current position and difference views. Cached bitmaps stay.
    pub fn reset(&mut self) {
        self.cursor.reset();
        self.differences.reset(None);
    }

    /// Reset and drop every cached bitmap, e.g. after the folder was reloaded.
    /// Decodes already in flight still commit when they finish.
    pub fn clear_cache(&mut self) {
        self.reset();
        self.store.clear();
    }

    /// Current row, if any.
    pub fn current_row(&self) -> Option<usize> {
        self.cursor.row()
    }

    /// File at the current row.
    pub fn current_file(&self) -> Option<&FileSummary> {
        self.cursor.current()
    }

    /// View currently shown.
    pub fn current_difference_state(&self) -> ImageDifference {
        self.differences.state()
    }

    /// Number of bitmaps in the store.
    pub fn cached_count(&self) -> usize {
        self.store.len()
    }

    /// Check if a bitmap is cached for `id`.
    pub fn is_cached(&self, id: FileId) -> bool {
        self.store.contains(id)
    }

    /// Check if `id` is being decoded in the background.
    pub fn is_prefetching(&self, id: FileId) -> bool {
        self.prefetcher.is_in_flight(id)
    }

    /// Folder file paths are resolved against.
    pub fn folder(&self) -> &Path {
        self.prefetcher.folder()
    }

    /// Summary of the current file as the sequence reports it now, or
    /// `None` if its row no longer holds that file.
    fn live_current(&self) -> Option<FileSummary> {
        let row = self.cursor.row()?;
        let id = self.cursor.current()?.id;
        self.sequence.get(row).filter(|file| file.id == id)
    }

    /// Current row and its unaltered bitmap, if the current file can be differenced.
    fn current_frame(&self) -> Option<(usize, Bitmap)> {
        let current = self.live_current()?;
        if !current.is_decodable_image() {
            return None;
        }
        let unaltered = self.differences.unaltered()?;
        if unaltered.is_placeholder() {
            return None;
        }
        Some((self.cursor.row()?, unaltered.clone()))
    }

    /// Replace a placeholder shown for a displayable still once its real
    /// bitmap can be had. Cached decode failures stay placeholders.
    fn retry_placeholder(&mut self) {
        if !self
            .differences
            .unaltered()
            .is_some_and(Bitmap::is_placeholder)
        {
            return;
        }
        let Some(current) = self.live_current() else {
            return;
        };
        if !current.is_decodable_image() {
            return;
        }

        let bitmap = self.retrieve(&current);
        if !bitmap.is_placeholder() {
            log::debug!("Replacing placeholder for file {}", current.id);
            self.differences.reset(Some(bitmap));
        }
    }

    /// Bitmap for `file`, never failing: undisplayable files, decode
    /// failures and wait timeouts all give a placeholder. Starts the
    /// prefetch of the row after the current one.
    fn retrieve(&self, file: &FileSummary) -> Bitmap {
        let bitmap = if file.displayable {
            self.prefetcher.load(file).unwrap_or_else(|e| {
                log::warn!("Showing placeholder for {:?}: {}", file.path, e);
                Bitmap::placeholder()
            })
        } else {
            Bitmap::placeholder()
        };

        self.prefetch_next();
        bitmap
    }

    /// Start decoding the row after the current one.
    fn prefetch_next(&self) {
        if let Some(next) = self.cursor.row().and_then(|row| row.checked_add(1)) {
            self.prefetcher.try_initiate(next);
        }
    }

    /// Decoded bitmap of a neighbouring row, or `None` if it is out of
    /// range, not a displayable still, or failed to decode.
    fn adjacent_bitmap(&self, row: usize) -> Option<Bitmap> {
        let file = if Some(row) == self.cursor.row() {
            self.cursor.current()?.clone()
        } else {
            self.sequence.get(row)?
        };
        if !file.is_decodable_image() {
            return None;
        }

        let bitmap = self.retrieve(&file);
        if bitmap.is_placeholder() {
            None
        } else {
            Some(bitmap)
        }
    }
}
