//! Analysis modules for reducing tile content to searchable features

/// Grayscale feature extraction for tiles
pub mod features;

pub use features::{FeatureExtractor, FeatureVector};
