//! Decoded frame bitmaps shared between the store, prefetch workers and the UI.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::constants::{PLACEHOLDER_GREY, PLACEHOLDER_SIZE};

/// A decoded RGBA frame.
///
/// Cloning is cheap: pixel data is reference counted, so the store, the
/// difference cache and the caller can all hold the same frame.
#[derive(Clone, Debug)]
pub struct Bitmap {
    pixels: Arc<RgbaImage>,
    placeholder: bool,
}

impl Bitmap {
    /// Wrap decoded pixels.
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            placeholder: false,
        }
    }

    /// Flat grey bitmap standing in for a file that cannot be shown.
    pub fn placeholder() -> Self {
        let pixels = RgbaImage::from_pixel(
            PLACEHOLDER_SIZE,
            PLACEHOLDER_SIZE,
            Rgba([PLACEHOLDER_GREY, PLACEHOLDER_GREY, PLACEHOLDER_GREY, 255]),
        );
        Self {
            pixels: Arc::new(pixels),
            placeholder: true,
        }
    }

    /// True if this bitmap stands in for an undisplayable or undecodable file.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Pixel data.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// True if both bitmaps share the same pixel allocation.
    pub fn ptr_eq(&self, other: &Bitmap) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.placeholder == other.placeholder
            && (self.ptr_eq(other) || *self.pixels == *other.pixels)
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(pixels: RgbaImage) -> Self {
        Self::new(pixels)
    }
}
