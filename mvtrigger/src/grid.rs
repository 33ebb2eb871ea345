//! # Macroblock grid geometry

use crate::error::{Error, Result};

/// Side of a square macroblock, in pixels.
pub const MACROBLOCK_SIZE: usize = 16;

/// Dimensions of a frame's macroblock grid.
///
/// Encoders may pad every row of their vector output with one extra column. `MacroblockGrid`
/// only describes the real macroblocks, padding is resolved per frame through
/// [`row_stride`](Self::row_stride).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacroblockGrid {
    width: usize,
    height: usize,
}

impl MacroblockGrid {
    /// Create a grid with the given number of macroblock columns and rows.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Create a grid that covers a frame of given pixel size.
    ///
    /// Partial macroblocks on the right and bottom edges count as whole ones.
    ///
    /// # Arguments
    ///
    /// * `pixel_width` - width of the encoded frame.
    /// * `pixel_height` - height of the encoded frame.
    pub fn from_pixels(pixel_width: usize, pixel_height: usize) -> Result<Self> {
        if pixel_width == 0 || pixel_height == 0 {
            return Err(Error::Config(format!(
                "frame dimensions must be positive, got {pixel_width}x{pixel_height}"
            )));
        }

        Ok(Self::new(
            (pixel_width + MACROBLOCK_SIZE - 1) / MACROBLOCK_SIZE,
            (pixel_height + MACROBLOCK_SIZE - 1) / MACROBLOCK_SIZE,
        ))
    }

    /// Get width and height of the grid, in macroblocks.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Get the number of macroblocks in the grid.
    ///
    /// This is the same as `width * height`
    pub fn size(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Determine the row stride of a vector buffer with `len` entries.
    ///
    /// Buffers with at least `(width + 1) * height` entries are treated as padded with one extra
    /// column per row, buffers with at least `width * height` entries as dense. Anything shorter
    /// can not cover the grid.
    pub fn row_stride(&self, len: usize) -> Result<usize> {
        let padded = (self.width + 1) * self.height;

        if self.height > 0 && len >= padded {
            Ok(self.width + 1)
        } else if len >= self.size() {
            Ok(self.width)
        } else {
            Err(Error::FrameTooShort {
                expected: self.size(),
                found: len,
            })
        }
    }

    /// Iterate every macroblock of the grid in row-major order.
    ///
    /// The resulting iterator yields `(x, y)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> {
        let (width, height) = self.dim();
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y)))
    }
}
