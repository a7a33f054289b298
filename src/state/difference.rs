//! Difference view state for the current frame.
//!
//! The UI flips between the unaltered frame and three derived views. Two
//! gestures drive the state:
//!
//! - previous/next cycle: `Unaltered -> Previous -> Next -> Unaltered`,
//!   skipping a view whose neighbour frame cannot be used
//! - combined toggle: `Unaltered <-> Combined`
//!
//! Derived bitmaps are cached per row and dropped whenever the cursor moves
//! to another file.

use crate::bitmap::Bitmap;

/// Which view of the current frame is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageDifference {
    /// The decoded frame itself
    #[default]
    Unaltered,
    /// Difference from the previous frame
    Previous,
    /// Difference from the next frame
    Next,
    /// Pixels that differ from both neighbours
    Combined,
}

impl ImageDifference {
    fn index(self) -> usize {
        match self {
            ImageDifference::Unaltered => 0,
            ImageDifference::Previous => 1,
            ImageDifference::Next => 2,
            ImageDifference::Combined => 3,
        }
    }

    /// Successor in the previous/next cycle.
    fn next_in_cycle(self) -> Self {
        match self {
            ImageDifference::Unaltered => ImageDifference::Previous,
            ImageDifference::Previous => ImageDifference::Next,
            ImageDifference::Next | ImageDifference::Combined => ImageDifference::Unaltered,
        }
    }
}

/// Outcome of a difference computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDifferenceResult {
    Success,
    /// Current file is absent, a video, undisplayable or failed to decode
    CurrentImageNotAvailable,
    PreviousImageNotAvailable,
    NextImageNotAvailable,
    /// Current view has no difference to compute, or the frames can't be combined
    NotCalculable,
}

/// Per-row bitmaps for each view plus the view currently shown.
#[derive(Debug, Clone, Default)]
pub struct DifferenceCache {
    state: ImageDifference,
    bitmaps: [Option<Bitmap>; 4],
    combined_threshold: Option<u8>,
}

impl DifferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to `Unaltered` with only the unaltered bitmap kept.
    pub fn reset(&mut self, unaltered: Option<Bitmap>) {
        self.state = ImageDifference::Unaltered;
        self.bitmaps = [unaltered, None, None, None];
        self.combined_threshold = None;
    }

    pub fn state(&self) -> ImageDifference {
        self.state
    }

    pub(crate) fn force_unaltered(&mut self) {
        self.state = ImageDifference::Unaltered;
    }

    /// Cached bitmap for `view`.
    pub fn get(&self, view: ImageDifference) -> Option<&Bitmap> {
        self.bitmaps[view.index()].as_ref()
    }

    /// Cached bitmap for the current view.
    pub fn current(&self) -> Option<&Bitmap> {
        self.get(self.state)
    }

    pub fn unaltered(&self) -> Option<&Bitmap> {
        self.get(ImageDifference::Unaltered)
    }

    pub(crate) fn store(&mut self, view: ImageDifference, bitmap: Bitmap) {
        self.bitmaps[view.index()] = Some(bitmap);
    }

    /// Threshold the cached combined difference was computed with.
    pub fn combined_threshold(&self) -> Option<u8> {
        self.combined_threshold
    }

    pub(crate) fn store_combined(&mut self, bitmap: Bitmap, threshold: u8) {
        self.store(ImageDifference::Combined, bitmap);
        self.combined_threshold = Some(threshold);
    }

    /// Toggle between `Unaltered` and `Combined`.
    pub fn advance_combined_cycle(&mut self) {
        self.state = match self.state {
            ImageDifference::Previous | ImageDifference::Next | ImageDifference::Combined => {
                ImageDifference::Unaltered
            }
            ImageDifference::Unaltered => ImageDifference::Combined,
        };
    }

    /// Step the previous/next cycle.
    ///
    /// `current_available` is false when the current file is absent, a video
    /// or undisplayable; the state then drops to `Unaltered`. `can_show`
    /// decides whether `Previous` or `Next` may be landed on; a refused view
    /// is skipped in favour of the one after it.
    pub fn advance_previous_next_cycle(
        &mut self,
        current_available: bool,
        can_show: impl Fn(ImageDifference) -> bool,
    ) {
        if !current_available || self.state == ImageDifference::Combined {
            self.state = ImageDifference::Unaltered;
            return;
        }

        let mut candidate = self.state;
        loop {
            candidate = candidate.next_in_cycle();
            match candidate {
                ImageDifference::Previous | ImageDifference::Next if !can_show(candidate) => {
                    continue;
                }
                _ => break,
            }
        }
        self.state = candidate;
    }
}
