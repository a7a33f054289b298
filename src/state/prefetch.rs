//! Single-flight bitmap loading with forward prefetch.
//!
//! Every decode, whether started speculatively by `try_initiate` or on
//! demand by `load`, is registered in the in-flight map until its bitmap is
//! committed to the store. A second request for the same file waits on the
//! first instead of decoding again.
//!
//! Lock order is always in-flight map, then store. Completion takes the two
//! locks one after the other, never nested.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::store::BitmapStore;
use super::worker_pool::WorkerPool;
use crate::bitmap::Bitmap;
use crate::error::DecodeError;
use crate::sequence::{FileId, FileSequence, FileSummary};

type InFlightMap = Mutex<HashMap<FileId, Arc<PendingLoad>>>;

/// Completion slot for one in-flight decode.
pub(crate) struct PendingLoad {
    result: Mutex<Option<Bitmap>>,
    done: Condvar,
}

impl PendingLoad {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn finish(&self, bitmap: Bitmap) {
        *self.result.lock() = Some(bitmap);
        self.done.notify_all();
    }

    /// Block until the decode finishes. Returns `None` if `timeout` expires first.
    fn wait(&self, timeout: Option<Duration>) -> Option<Bitmap> {
        let mut result = self.result.lock();
        match timeout {
            None => {
                while result.is_none() {
                    self.done.wait(&mut result);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while result.is_none() {
                    if self.done.wait_until(&mut result, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        result.clone()
    }
}

/// How a `load` request was satisfied.
enum Lookup {
    Cached(Bitmap),
    InFlight(Arc<PendingLoad>),
    Claimed(Arc<PendingLoad>),
}

/// Settings the prefetcher needs from the cache configuration.
#[derive(Debug, Clone, Default)]
pub struct PrefetchSettings {
    /// Number of worker threads; 0 disables speculative prefetch
    pub workers: usize,
    /// Width hint passed to the decoder
    pub decode_width: Option<u32>,
    /// Upper bound on waiting for an in-flight decode
    pub wait_timeout: Option<Duration>,
}

/// Loads bitmaps into the store, decoding each file at most once at a time.
pub struct Prefetcher<S: FileSequence> {
    sequence: Arc<S>,
    folder: Arc<Path>,
    store: Arc<BitmapStore>,
    in_flight: Arc<InFlightMap>,
    pool: Option<WorkerPool>,
    decode_width: Option<u32>,
    wait_timeout: Option<Duration>,
}

impl<S: FileSequence> Prefetcher<S> {
    /// Create a prefetcher. If the worker threads cannot be spawned the
    /// prefetcher still loads on demand, just without speculation.
    pub fn new(
        sequence: Arc<S>,
        folder: impl Into<PathBuf>,
        store: Arc<BitmapStore>,
        settings: &PrefetchSettings,
    ) -> Self {
        let pool = if settings.workers == 0 {
            log::info!("Prefetch disabled");
            None
        } else {
            match WorkerPool::spawn(settings.workers) {
                Ok(pool) => {
                    log::debug!("Prefetch enabled with {} workers", pool.size());
                    Some(pool)
                }
                Err(e) => {
                    log::warn!("Failed to spawn prefetch workers, loading on demand only: {}", e);
                    None
                }
            }
        };

        let folder: PathBuf = folder.into();
        Self {
            sequence,
            folder: Arc::from(folder),
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            pool,
            decode_width: settings.decode_width,
            wait_timeout: settings.wait_timeout,
        }
    }

    /// Folder that file paths are resolved against.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// True if speculative prefetch is running.
    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    /// Check if a decode for `id` is currently running.
    pub fn is_in_flight(&self, id: FileId) -> bool {
        self.in_flight.lock().contains_key(&id)
    }

    /// Number of decodes currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Start decoding the file at `row` in the background.
    ///
    /// Returns false without doing anything if the row is out of range, the
    /// file is not a displayable image, its bitmap is already cached, or a
    /// decode for it is already running.
    pub fn try_initiate(&self, row: usize) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };
        let Some(file) = self.sequence.get(row) else {
            return false;
        };
        if !file.is_decodable_image() {
            return false;
        }

        let pending = {
            let mut in_flight = self.in_flight.lock();
            if in_flight.contains_key(&file.id) || self.store.contains(file.id) {
                return false;
            }
            let pending = Arc::new(PendingLoad::new());
            in_flight.insert(file.id, Arc::clone(&pending));
            pending
        };

        let id = file.id;
        let sequence = Arc::clone(&self.sequence);
        let folder = Arc::clone(&self.folder);
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let decode_width = self.decode_width;
        let job_pending = Arc::clone(&pending);

        let queued = pool.execute(Box::new(move || {
            let bitmap = decode_bitmap(sequence.as_ref(), &file, &folder, decode_width);
            commit(&store, &in_flight, file.id, &job_pending, bitmap);
        }));

        if !queued {
            // Release anyone who found the entry before it is removed
            self.in_flight.lock().remove(&id);
            pending.finish(Bitmap::placeholder());
            return false;
        }

        log::debug!("Prefetching row {} (file {})", row, id);
        true
    }

    /// Bitmap for `file`, from the store, an in-flight decode, or a
    /// synchronous decode on the calling thread.
    ///
    /// Decode failures yield a placeholder bitmap. The only error is a
    /// timeout while waiting on another thread's decode.
    pub fn load(&self, file: &FileSummary) -> Result<Bitmap, DecodeError> {
        let lookup = {
            let mut in_flight = self.in_flight.lock();
            if let Some(bitmap) = self.store.try_get(file.id) {
                Lookup::Cached(bitmap)
            } else if let Some(pending) = in_flight.get(&file.id) {
                Lookup::InFlight(Arc::clone(pending))
            } else {
                let pending = Arc::new(PendingLoad::new());
                in_flight.insert(file.id, Arc::clone(&pending));
                Lookup::Claimed(pending)
            }
        };

        match lookup {
            Lookup::Cached(bitmap) => {
                log::trace!("Cache hit for file {}", file.id);
                Ok(bitmap)
            }
            Lookup::InFlight(pending) => {
                log::debug!("Waiting on in-flight decode of file {}", file.id);
                pending.wait(self.wait_timeout).ok_or_else(|| DecodeError::Timeout {
                    path: file.path.clone(),
                    millis: self.wait_timeout.map_or(0, |t| t.as_millis() as u64),
                })
            }
            Lookup::Claimed(pending) => {
                log::debug!("Cache miss for file {}, decoding synchronously", file.id);
                let bitmap =
                    decode_bitmap(self.sequence.as_ref(), file, &self.folder, self.decode_width);
                commit(&self.store, &self.in_flight, file.id, &pending, bitmap.clone());
                Ok(bitmap)
            }
        }
    }
}

/// Decode `file`, turning every failure (including a panicking decoder) into
/// a placeholder.
fn decode_bitmap<S: FileSequence + ?Sized>(
    sequence: &S,
    file: &FileSummary,
    folder: &Path,
    decode_width: Option<u32>,
) -> Bitmap {
    if !file.is_decodable_image() {
        return Bitmap::placeholder();
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        sequence.decode(file, folder, decode_width)
    }))
    .unwrap_or_else(|payload| Err(DecodeError::WorkerPanic(panic_message(payload.as_ref()))));

    match result {
        Ok(pixels) => Bitmap::new(pixels),
        Err(e) => {
            log::warn!("Failed to decode {:?}: {}", file.path, e);
            Bitmap::placeholder()
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Publish a finished decode: store first, then clear the in-flight entry,
/// then wake waiters.
fn commit(
    store: &BitmapStore,
    in_flight: &InFlightMap,
    id: FileId,
    pending: &Arc<PendingLoad>,
    bitmap: Bitmap,
) {
    store.put(id, bitmap.clone());
    {
        let mut in_flight = in_flight.lock();
        if in_flight
            .get(&id)
            .is_some_and(|current| Arc::ptr_eq(current, pending))
        {
            in_flight.remove(&id);
        }
    }
    pending.finish(bitmap);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemorySequence;
    use std::num::NonZeroUsize;
    use std::thread;

    fn prefetcher(
        sequence: &Arc<MemorySequence>,
        capacity: usize,
        settings: PrefetchSettings,
    ) -> Prefetcher<MemorySequence> {
        let store = Arc::new(BitmapStore::new(NonZeroUsize::new(capacity).unwrap()));
        Prefetcher::new(Arc::clone(sequence), "/frames", store, &settings)
    }

    fn with_workers(workers: usize) -> PrefetchSettings {
        PrefetchSettings {
            workers,
            ..Default::default()
        }
    }

    #[test]
    fn test_concurrent_initiate_decodes_once() {
        let sequence = Arc::new(MemorySequence::new(4).with_decode_delay(Duration::from_millis(50)));
        let prefetcher = prefetcher(&sequence, 4, with_workers(2));

        let launched = thread::scope(|scope| {
            let first = scope.spawn(|| prefetcher.try_initiate(1));
            let second = scope.spawn(|| prefetcher.try_initiate(1));
            [first.join().unwrap(), second.join().unwrap()]
        });
        assert_eq!(launched.iter().filter(|launched| **launched).count(), 1);

        let file = sequence.get(1).unwrap();
        let bitmap = prefetcher.load(&file).unwrap();
        assert_eq!(bitmap, sequence.expected_bitmap(1));
        assert_eq!(sequence.decode_count(), 1);
        assert_eq!(prefetcher.in_flight_count(), 0);
    }

    #[test]
    fn test_initiate_rejects_cached_and_out_of_range() {
        let sequence = Arc::new(MemorySequence::new(3));
        let prefetcher = prefetcher(&sequence, 4, with_workers(1));

        assert!(!prefetcher.try_initiate(3));

        let file = sequence.get(0).unwrap();
        prefetcher.load(&file).unwrap();
        assert!(!prefetcher.try_initiate(0));
        assert_eq!(sequence.decode_count(), 1);
    }

    #[test]
    fn test_initiate_skips_undisplayable_and_video() {
        let sequence = Arc::new(MemorySequence::new(3));
        sequence.set_displayable(1, false);
        sequence.set_video(2, true);
        let prefetcher = prefetcher(&sequence, 4, with_workers(1));

        assert!(!prefetcher.try_initiate(1));
        assert!(!prefetcher.try_initiate(2));
    }

    #[test]
    fn test_load_waits_on_prefetch() {
        let sequence = Arc::new(MemorySequence::new(3).with_decode_delay(Duration::from_millis(30)));
        let prefetcher = prefetcher(&sequence, 4, with_workers(1));

        assert!(prefetcher.try_initiate(2));
        let file = sequence.get(2).unwrap();
        assert!(prefetcher.is_in_flight(file.id));

        let bitmap = prefetcher.load(&file).unwrap();
        assert!(!bitmap.is_placeholder());
        assert_eq!(sequence.decode_count(), 1);
        assert!(!prefetcher.is_in_flight(file.id));
    }

    #[test]
    fn test_failed_decode_clears_in_flight() {
        let sequence = Arc::new(MemorySequence::new(2));
        let file = sequence.get(1).unwrap();
        sequence.fail_decode(file.id);
        let prefetcher = prefetcher(&sequence, 4, with_workers(1));

        assert!(prefetcher.try_initiate(1));
        let bitmap = prefetcher.load(&file).unwrap();
        assert!(bitmap.is_placeholder());
        assert_eq!(prefetcher.in_flight_count(), 0);

        // The placeholder is cached, so no retry is scheduled
        assert!(!prefetcher.try_initiate(1));
    }

    #[test]
    fn test_panicking_decoder_clears_in_flight() {
        let sequence = Arc::new(MemorySequence::new(2));
        let file = sequence.get(0).unwrap();
        sequence.panic_on_decode(file.id);
        let prefetcher = prefetcher(&sequence, 4, with_workers(1));

        assert!(prefetcher.try_initiate(0));
        assert!(prefetcher.load(&file).unwrap().is_placeholder());
        assert_eq!(prefetcher.in_flight_count(), 0);

        // The worker survives and keeps serving
        assert!(prefetcher.try_initiate(1));
        assert!(!prefetcher.load(&sequence.get(1).unwrap()).unwrap().is_placeholder());
    }

    #[test]
    fn test_wait_timeout() {
        let sequence =
            Arc::new(MemorySequence::new(2).with_decode_delay(Duration::from_millis(300)));
        let prefetcher = prefetcher(
            &sequence,
            4,
            PrefetchSettings {
                workers: 1,
                wait_timeout: Some(Duration::from_millis(10)),
                ..Default::default()
            },
        );

        assert!(prefetcher.try_initiate(1));
        let file = sequence.get(1).unwrap();
        assert!(matches!(
            prefetcher.load(&file),
            Err(DecodeError::Timeout { millis: 10, .. })
        ));
    }

    #[test]
    fn test_disabled_prefetch_still_loads() {
        let sequence = Arc::new(MemorySequence::new(2));
        let prefetcher = prefetcher(&sequence, 4, with_workers(0));

        assert!(!prefetcher.is_enabled());
        assert!(!prefetcher.try_initiate(1));
        let file = sequence.get(1).unwrap();
        assert_eq!(prefetcher.load(&file).unwrap(), sequence.expected_bitmap(1));
    }
}
