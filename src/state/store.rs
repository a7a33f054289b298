//! Bounded store of decoded bitmaps keyed by file id.
//!
//! The recency order tracks when a bitmap was *produced* (inserted), not
//! when it was last read: `try_get` never reorders entries. A frame that is
//! displayed again without being re-inserted can therefore be evicted while
//! a later prefetch is kept.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::bitmap::Bitmap;
use crate::sequence::FileId;

/// Thread-safe LRU map from file id to decoded bitmap.
///
/// Entries and their recency order live in one `LruCache` behind one lock,
/// so the set of cached ids and the recency list can never disagree.
pub struct BitmapStore {
    entries: Mutex<LruCache<FileId, Bitmap>>,
}

impl BitmapStore {
    /// Create an empty store holding at most `capacity` bitmaps.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Maximum number of bitmaps kept.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Number of cached bitmaps.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Check if a bitmap is cached for `id`.
    pub fn contains(&self, id: FileId) -> bool {
        self.entries.lock().contains(&id)
    }

    /// Cached bitmap for `id`. Does not affect recency.
    pub fn try_get(&self, id: FileId) -> Option<Bitmap> {
        self.entries.lock().peek(&id).cloned()
    }

    /// Insert or replace the bitmap for `id` and mark it most recent.
    ///
    /// Returns the id evicted to make room, if any.
    pub fn put(&self, id: FileId, bitmap: Bitmap) -> Option<FileId> {
        let mut entries = self.entries.lock();
        match entries.push(id, bitmap) {
            Some((evicted, _)) if evicted != id => {
                log::debug!(
                    "Evicted bitmap {} to cache {} (cache size: {})",
                    evicted,
                    id,
                    entries.len()
                );
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Remove the bitmap for `id`. Returns whether anything was removed.
    pub fn invalidate(&self, id: FileId) -> bool {
        let removed = self.entries.lock().pop(&id).is_some();
        if removed {
            log::debug!("Invalidated cached bitmap {}", id);
        }
        removed
    }

    /// Id that would be evicted next.
    pub fn least_recent(&self) -> Option<FileId> {
        self.entries.lock().peek_lru().map(|(id, _)| *id)
    }

    /// Cached ids, most recently produced first.
    pub fn ids_by_recency(&self) -> Vec<FileId> {
        self.entries.lock().iter().map(|(id, _)| *id).collect()
    }

    /// Drop every cached bitmap.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        if count > 0 {
            log::info!("Cleared bitmap cache ({} entries)", count);
        }
    }
}
