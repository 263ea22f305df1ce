//! Deterministic grid tiling over an image surface
//!
//! Enumerates crop rectangles of a fixed size at a fixed step. Profile
//! building samples densely with a step smaller than the tile, collage
//! synthesis covers the canvas with a step equal to the tile. Both walk the
//! grid in the same order (columns outer, rows inner) so a tile's position in
//! the sequence is reproducible across runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::io::error::{Result, invalid_parameter};

/// Axis-aligned crop rectangle, `x0,y0` inclusive and `x1,y1` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropBox {
    /// Left edge
    pub x0: u32,
    /// Top edge
    pub y0: u32,
    /// Right edge (exclusive)
    pub x1: u32,
    /// Bottom edge (exclusive)
    pub y1: u32,
}

impl CropBox {
    /// Create a box from its origin and size
    pub const fn from_origin(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + width,
            y1: y + height,
        }
    }

    /// Box width in pixels
    pub const fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    /// Box height in pixels
    pub const fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    /// Check that the box lies entirely inside a `width` x `height` surface
    pub const fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x0 < self.x1 && self.y0 < self.y1 && self.x1 <= width && self.y1 <= height
    }
}

impl fmt::Display for CropBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Tiling plan for one image surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridTiler {
    image_width: u32,
    image_height: u32,
    tile_width: u32,
    tile_height: u32,
    step_x: u32,
    step_y: u32,
}

impl GridTiler {
    /// Create a tiler with independent horizontal and vertical steps
    ///
    /// # Errors
    ///
    /// Returns an error if any tile dimension or step is zero
    pub fn new(
        image_width: u32,
        image_height: u32,
        tile_width: u32,
        tile_height: u32,
        step_x: u32,
        step_y: u32,
    ) -> Result<Self> {
        for (parameter, value) in [
            ("tile_width", tile_width),
            ("tile_height", tile_height),
            ("step_x", step_x),
            ("step_y", step_y),
        ] {
            if value == 0 {
                return Err(invalid_parameter(parameter, &value, &"must be positive"));
            }
        }

        Ok(Self {
            image_width,
            image_height,
            tile_width,
            tile_height,
            step_x,
            step_y,
        })
    }

    /// Dense sampling with the same step on both axes
    ///
    /// # Errors
    ///
    /// Returns an error if any tile dimension or the step is zero
    pub fn overlapping(
        image_width: u32,
        image_height: u32,
        tile_width: u32,
        tile_height: u32,
        step: u32,
    ) -> Result<Self> {
        Self::new(
            image_width,
            image_height,
            tile_width,
            tile_height,
            step,
            step,
        )
    }

    /// Full coverage where each tile starts where the previous one ended
    ///
    /// # Errors
    ///
    /// Returns an error if any tile dimension is zero
    pub fn non_overlapping(
        image_width: u32,
        image_height: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self> {
        Self::new(
            image_width,
            image_height,
            tile_width,
            tile_height,
            tile_width,
            tile_height,
        )
    }

    /// Check whether at least one tile fits on the surface
    pub const fn fits(&self) -> bool {
        self.tile_width <= self.image_width && self.tile_height <= self.image_height
    }

    /// Number of tile positions along the horizontal axis
    pub const fn columns(&self) -> usize {
        axis_positions(self.image_width, self.tile_width, self.step_x)
    }

    /// Number of tile positions along the vertical axis
    pub const fn rows(&self) -> usize {
        axis_positions(self.image_height, self.tile_height, self.step_y)
    }

    /// Total number of boxes the tiler produces
    pub const fn len(&self) -> usize {
        self.columns() * self.rows()
    }

    /// Check whether the tiler produces no boxes
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tile dimensions (width, height)
    pub const fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    /// Start a fresh enumeration of the boxes
    ///
    /// Each call restarts from the first box, so repeated enumerations of
    /// the same tiler are identical.
    pub const fn boxes(&self) -> TileBoxes {
        TileBoxes {
            tiler: *self,
            column: 0,
            row: 0,
        }
    }
}

// Edge strips narrower than the tile are dropped
const fn axis_positions(extent: u32, tile: u32, step: u32) -> usize {
    if tile > extent || step == 0 {
        0
    } else {
        ((extent - tile) / step) as usize + 1
    }
}

/// Lazy iterator over the boxes of a [`GridTiler`]
#[derive(Debug, Clone)]
pub struct TileBoxes {
    tiler: GridTiler,
    column: usize,
    row: usize,
}

impl Iterator for TileBoxes {
    type Item = CropBox;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.tiler.rows();
        if rows == 0 || self.column >= self.tiler.columns() {
            return None;
        }

        let x = self.column as u32 * self.tiler.step_x;
        let y = self.row as u32 * self.tiler.step_y;
        let crop = CropBox::from_origin(x, y, self.tiler.tile_width, self.tiler.tile_height);

        self.row += 1;
        if self.row >= rows {
            self.row = 0;
            self.column += 1;
        }

        Some(crop)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .tiler
            .len()
            .saturating_sub(self.column * self.tiler.rows() + self.row);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileBoxes {}
