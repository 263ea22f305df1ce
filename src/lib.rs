//! Generative collage: rebuild a target image from visually similar tiles
//! cut out of a gathered image corpus
//!
//! Source images are tiled on a regular grid, each tile is reduced to a small
//! grayscale vector and the vectors are stored in a nearest-neighbor index
//! (a "profile"). A target image is then cut into non-overlapping tiles and
//! every tile is replaced by its nearest profile tile.

#![forbid(unsafe_code)]

/// Profile building and collage synthesis
pub mod algorithm;
/// Tile feature extraction
pub mod analysis;
/// Nearest-neighbor index abstraction and its graph implementation
pub mod index;
/// Input/output operations, configuration and error handling
pub mod io;
/// Profile persistence and enumeration
pub mod profile;
/// Grid tiling of image surfaces
pub mod spatial;

pub use io::error::{CollageError, Result};
