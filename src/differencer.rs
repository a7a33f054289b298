//! Pixel-wise frame differencing.
//!
//! The image cache does not care how differences are rendered; it hands the
//! frames to a `BitmapDifferencer`. `PixelDifferencer` is the default.

use image::{Rgba, RgbaImage};

/// Bitmap subtraction primitives used by the difference engine.
///
/// Both operations return `None` when the frames cannot be combined, for
/// example because their dimensions differ.
pub trait BitmapDifferencer: Send + Sync {
    /// Difference between the unaltered frame and one neighbour.
    fn subtract(&self, unaltered: &RgbaImage, other: &RgbaImage) -> Option<RgbaImage>;

    /// Thresholded difference against both neighbours.
    ///
    /// A pixel is marked changed only if it differs from *both* the previous
    /// and the next frame by more than `threshold`.
    fn combined_difference(
        &self,
        unaltered: &RgbaImage,
        previous: &RgbaImage,
        next: &RgbaImage,
        threshold: u8,
    ) -> Option<RgbaImage>;
}

/// Absolute per-channel differencing on RGBA frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelDifferencer;

impl PixelDifferencer {
    /// Mean absolute difference over the colour channels.
    fn mean_difference(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
        let sum: u16 = (0..3).map(|c| u16::from(a[c].abs_diff(b[c]))).sum();
        (sum / 3) as u8
    }
}

impl BitmapDifferencer for PixelDifferencer {
    fn subtract(&self, unaltered: &RgbaImage, other: &RgbaImage) -> Option<RgbaImage> {
        if unaltered.dimensions() != other.dimensions() {
            log::debug!(
                "Cannot subtract {:?} from {:?}: dimensions differ",
                other.dimensions(),
                unaltered.dimensions()
            );
            return None;
        }

        let mut difference = RgbaImage::new(unaltered.width(), unaltered.height());
        for ((out, a), b) in difference
            .pixels_mut()
            .zip(unaltered.pixels())
            .zip(other.pixels())
        {
            *out = Rgba([
                a[0].abs_diff(b[0]),
                a[1].abs_diff(b[1]),
                a[2].abs_diff(b[2]),
                255,
            ]);
        }
        Some(difference)
    }

    fn combined_difference(
        &self,
        unaltered: &RgbaImage,
        previous: &RgbaImage,
        next: &RgbaImage,
        threshold: u8,
    ) -> Option<RgbaImage> {
        let dimensions = unaltered.dimensions();
        if previous.dimensions() != dimensions || next.dimensions() != dimensions {
            log::debug!("Cannot compute combined difference: dimensions differ");
            return None;
        }

        let mut difference = RgbaImage::new(dimensions.0, dimensions.1);
        for (((out, current), before), after) in difference
            .pixels_mut()
            .zip(unaltered.pixels())
            .zip(previous.pixels())
            .zip(next.pixels())
        {
            let from_previous = Self::mean_difference(current, before);
            let from_next = Self::mean_difference(current, after);
            let grey = if from_previous > threshold && from_next > threshold {
                from_previous.min(from_next)
            } else {
                0
            };
            *out = Rgba([grey, grey, grey, 255]);
        }
        Some(difference)
    }
}
