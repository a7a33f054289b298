//! Cache state: bitmap store, prefetch, cursor and difference views.

mod cursor;
mod difference;
mod prefetch;
mod store;
mod worker_pool;

pub use cursor::{MoveResult, SequenceCursor};
pub use difference::{DifferenceCache, ImageDifference, ImageDifferenceResult};
pub use prefetch::{PrefetchSettings, Prefetcher};
pub use store::BitmapStore;
