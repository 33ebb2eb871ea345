//! # Sensitivity map
//!
//! Every macroblock gets its own threshold. Thresholds are stored squared, so that detection can
//! compare them against squared vector lengths directly.

use crate::error::{Error, Result};
use crate::grid::MacroblockGrid;
use image::ColorType;
use log::*;
use std::path::Path;

/// Threshold value that no motion vector can exceed.
pub const SENTINEL: u16 = u16::MAX;

/// Per-macroblock squared magnitude thresholds.
///
/// The map is stored row-major with one extra sentinel column per row, which always holds
/// [`SENTINEL`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensitivityMap {
    cells: Vec<u16>,
    grid: MacroblockGrid,
}

impl SensitivityMap {
    fn cols(grid: &MacroblockGrid) -> usize {
        grid.dim().0 + 1
    }

    /// Build a map with the same sensitivity on every macroblock.
    ///
    /// # Arguments
    ///
    /// * `grid` - macroblock grid to cover.
    /// * `sensitivity` - minimum vector length that counts as motion.
    pub fn build_uniform(grid: MacroblockGrid, sensitivity: u32) -> Self {
        let value = sensitivity.saturating_mul(sensitivity).min(SENTINEL as u32) as u16;
        let (width, height) = grid.dim();

        let cells = (0..height)
            .flat_map(|_| std::iter::repeat(value).take(width).chain([SENTINEL]))
            .collect();

        Self { cells, grid }
    }

    /// Build a map from an 8-bit grayscale image.
    ///
    /// The image must have exactly one pixel per macroblock. Each pixel value is the sensitivity
    /// of its macroblock.
    ///
    /// # Arguments
    ///
    /// * `path` - image file to load.
    /// * `grid` - macroblock grid the image has to match.
    pub fn build_from_image(path: impl AsRef<Path>, grid: MacroblockGrid) -> Result<Self> {
        let path = path.as_ref();

        let load_err = |reason: String| Error::ImageLoad {
            path: path.to_path_buf(),
            reason,
        };

        let img = image::open(path).map_err(|e| load_err(e.to_string()))?;

        match img.color() {
            ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {}
            other => return Err(load_err(format!("expected a grayscale image, got {other:?}"))),
        }

        let img = img.to_luma8();
        let found = (img.width() as usize, img.height() as usize);

        if found != grid.dim() {
            return Err(Error::DimensionMismatch {
                expected: grid.dim(),
                found,
            });
        }

        let (width, _) = grid.dim();

        let cells = img
            .rows()
            .flat_map(|row| {
                row.map(|p| {
                    let v = p.0[0] as u16;
                    v * v
                })
                .chain([SENTINEL])
            })
            .collect::<Vec<_>>();

        debug_assert_eq!(cells.len(), (width + 1) * grid.dim().1);

        info!("Loaded {}x{} sensitivity map from {:?}", found.0, found.1, path);

        Ok(Self { cells, grid })
    }

    /// Get the macroblock grid this map covers.
    pub fn grid(&self) -> MacroblockGrid {
        self.grid
    }

    /// Get width and height of the map, in macroblocks.
    ///
    /// The sentinel column is not included.
    pub fn dim(&self) -> (usize, usize) {
        self.grid.dim()
    }

    /// Get the squared threshold of a macroblock.
    ///
    /// Returns `None` if the coordinates are outside of the grid.
    pub fn threshold_at(&self, x: usize, y: usize) -> Option<u16> {
        let (width, height) = self.dim();
        if x < width && y < height {
            Some(self.cells[y * Self::cols(&self.grid) + x])
        } else {
            None
        }
    }

    /// Get the sentinel cell that terminates a row.
    pub fn sentinel_at(&self, y: usize) -> Option<u16> {
        let (width, height) = self.dim();
        if y < height {
            Some(self.cells[y * Self::cols(&self.grid) + width])
        } else {
            None
        }
    }

    /// Get the thresholds of a single row, without the sentinel.
    pub fn row(&self, y: usize) -> &[u16] {
        let cols = Self::cols(&self.grid);
        let start = y * cols;
        &self.cells[start..start + cols - 1]
    }

    /// Iterate every macroblock threshold of the map.
    ///
    /// The resulting iterator yields `(x, y, threshold)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, u16)> + '_ {
        self.grid.iter().map(move |(x, y)| {
            (x, y, self.cells[y * Self::cols(&self.grid) + x])
        })
    }
}
