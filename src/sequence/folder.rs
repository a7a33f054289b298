//! File sequence over a folder of camera-trap frames.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use image::imageops::FilterType;
use parking_lot::RwLock;
use web_time::Instant;

use super::{FileId, FileSequence, FileSummary};
use crate::error::DecodeError;

/// Supported still image extensions
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

/// Extensions treated as video clips
pub const VIDEO_EXTENSIONS: &[&str] = &["avi", "mp4", "mov", "asf"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
struct FolderEntry {
    id: FileId,
    path: PathBuf,
    is_video: bool,
}

/// Files in one folder, sorted by name, with ids assigned in that order.
///
/// A file that fails to decode is remembered and reported undisplayable from
/// then on, so the difference engine stops trying to use it as a neighbour.
#[derive(Debug)]
pub struct FolderSequence {
    folder: PathBuf,
    files: Vec<FolderEntry>,
    undisplayable: RwLock<HashSet<FileId>>,
}

impl FolderSequence {
    /// Discover image and video files in a folder, non-recursively.
    pub fn open(folder: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let folder = folder.into();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&folder)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && (has_extension(path, IMAGE_EXTENSIONS)
                        || has_extension(path, VIDEO_EXTENSIONS))
            })
            .collect();

        // Sort by filename for consistent ordering
        paths.sort();

        let files: Vec<FolderEntry> = paths
            .into_iter()
            .enumerate()
            .filter_map(|(index, path)| {
                let relative = path.strip_prefix(&folder).ok()?.to_path_buf();
                Some(FolderEntry {
                    id: index as FileId + 1,
                    is_video: has_extension(&relative, VIDEO_EXTENSIONS),
                    path: relative,
                })
            })
            .collect();

        log::info!("Found {} files in {:?}", files.len(), folder);

        Ok(Self {
            folder,
            files,
            undisplayable: RwLock::new(HashSet::new()),
        })
    }

    /// Folder the file paths are relative to.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Mark a file undisplayable, e.g. after it was found corrupt.
    pub fn mark_undisplayable(&self, id: FileId) {
        if self.undisplayable.write().insert(id) {
            log::debug!("File {} marked undisplayable", id);
        }
    }
}

impl FileSequence for FolderSequence {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn get(&self, row: usize) -> Option<FileSummary> {
        let entry = self.files.get(row)?;
        Some(FileSummary {
            id: entry.id,
            path: entry.path.clone(),
            displayable: !self.undisplayable.read().contains(&entry.id),
            is_video: entry.is_video,
        })
    }

    fn decode(
        &self,
        file: &FileSummary,
        folder: &Path,
        desired_width: Option<u32>,
    ) -> Result<RgbaImage, DecodeError> {
        if file.is_video {
            return Err(DecodeError::unsupported(&file.path));
        }

        let start = Instant::now();
        let full_path = folder.join(&file.path);
        let decoded = match image::open(&full_path) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.mark_undisplayable(file.id);
                return Err(e.into());
            }
        };

        let decoded = match desired_width {
            Some(width) if width > 0 && decoded.width() > width => {
                decoded.resize(width, u32::MAX, FilterType::Triangle)
            }
            _ => decoded,
        };
        let pixels = decoded.to_rgba8();

        log::trace!(
            "Decoded {:?}: {}x{} in {:.1} ms",
            full_path,
            pixels.width(),
            pixels.height(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(pixels)
    }
}
