//! In-memory file sequence for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use parking_lot::RwLock;

use crate::bitmap::Bitmap;
use crate::error::DecodeError;
use crate::sequence::{FileId, FileSequence, FileSummary};

/// Frames are solid squares whose grey level is derived from the file id.
const FRAME_SIZE: u32 = 4;

/// A sequence of synthetic frames with hooks for failure injection.
pub struct MemorySequence {
    files: RwLock<Vec<FileSummary>>,
    decode_delay: Option<Duration>,
    failing: RwLock<HashSet<FileId>>,
    panicking: RwLock<HashSet<FileId>>,
    sizes: RwLock<HashMap<FileId, (u32, u32)>>,
    decodes: AtomicUsize,
}

impl MemorySequence {
    /// `len` displayable stills; the file at row `r` has id `(r + 1) * 10`.
    pub fn new(len: usize) -> Self {
        let files = (0..len)
            .map(|row| {
                let id = (row as FileId + 1) * 10;
                FileSummary::image(id, format!("frame-{:04}.jpg", row))
            })
            .collect();
        Self {
            files: RwLock::new(files),
            decode_delay: None,
            failing: RwLock::new(HashSet::new()),
            panicking: RwLock::new(HashSet::new()),
            sizes: RwLock::new(HashMap::new()),
            decodes: AtomicUsize::new(0),
        }
    }

    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = Some(delay);
        self
    }

    pub fn set_displayable(&self, row: usize, displayable: bool) {
        self.files.write()[row].displayable = displayable;
    }

    pub fn set_video(&self, row: usize, is_video: bool) {
        self.files.write()[row].is_video = is_video;
    }

    /// Shrink the selection, as if files were filtered out.
    pub fn truncate(&self, len: usize) {
        self.files.write().truncate(len);
    }

    pub fn fail_decode(&self, id: FileId) {
        self.failing.write().insert(id);
    }

    pub fn panic_on_decode(&self, id: FileId) {
        self.panicking.write().insert(id);
    }

    pub fn set_frame_size(&self, id: FileId, width: u32, height: u32) {
        self.sizes.write().insert(id, (width, height));
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn id_at(&self, row: usize) -> FileId {
        self.files.read()[row].id
    }

    fn grey_level(id: FileId) -> u8 {
        (id % 251) as u8
    }

    fn frame(&self, id: FileId) -> RgbaImage {
        let (width, height) = self
            .sizes
            .read()
            .get(&id)
            .copied()
            .unwrap_or((FRAME_SIZE, FRAME_SIZE));
        let grey = Self::grey_level(id);
        RgbaImage::from_pixel(width, height, Rgba([grey, grey, grey, 255]))
    }

    /// The bitmap a successful decode of `row` produces.
    pub fn expected_bitmap(&self, row: usize) -> Bitmap {
        Bitmap::new(self.frame(self.id_at(row)))
    }
}

impl FileSequence for MemorySequence {
    fn len(&self) -> usize {
        self.files.read().len()
    }

    fn get(&self, row: usize) -> Option<FileSummary> {
        self.files.read().get(row).cloned()
    }

    fn decode(
        &self,
        file: &FileSummary,
        _folder: &Path,
        _desired_width: Option<u32>,
    ) -> Result<RgbaImage, DecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.decode_delay {
            std::thread::sleep(delay);
        }
        if self.panicking.read().contains(&file.id) {
            panic!("decoder exploded on {:?}", file.path);
        }
        if self.failing.read().contains(&file.id) {
            return Err(DecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("corrupt frame {:?}", file.path),
            )));
        }
        Ok(self.frame(file.id))
    }
}
