//! Spatial data structures for tiling image surfaces
//!
//! This module contains spatial-related functionality including:
//! - Crop rectangles shared by profiles and collages
//! - Deterministic grid enumeration with overlapping or covering steps

/// Grid tiling and crop rectangles
pub mod grid;

pub use grid::{CropBox, GridTiler, TileBoxes};
