//! Pipeline constants and runtime configuration defaults

use std::path::{Path, PathBuf};

use crate::analysis::features::FeatureExtractor;
use crate::io::error::{Result, invalid_parameter};

// Tiling defaults for profile gathering
/// Default tile width in pixels
pub const DEFAULT_CROP_WIDTH: u32 = 40;
/// Default tile height in pixels
pub const DEFAULT_CROP_HEIGHT: u32 = 40;
/// Default step between overlapping tiles while gathering
pub const DEFAULT_CROP_INCREMENT: u32 = 20;

// Feature vectors are sample width x sample height luminance values
/// Width of the resampled tile
pub const SAMPLE_WIDTH: u32 = 10;
/// Height of the resampled tile
pub const SAMPLE_HEIGHT: u32 = 10;

// Graph index parameters
/// Number of layers in the neighbor graph
pub const LAYER_COUNT: usize = 16;
/// Maximum number of links kept per graph node
pub const MAX_CONNECTIONS: usize = 32;
/// Candidate list size while linking new vectors
pub const EF_CONSTRUCTION: usize = 128;
/// Candidate list size while answering queries
pub const EF_SEARCH: usize = 128;
/// Base name of the graph files inside the index directory
pub const GRAPH_BASENAME: &str = "graph";
/// File holding the index header inside the index directory
pub const INDEX_HEADER_FILE: &str = "header";

/// Number of collage versions produced when none is requested
pub const DEFAULT_VERSION_COUNT: usize = 1;

// Directory layout
/// Root directory holding one subdirectory per profile
pub const PROFILES_DIRECTORY: &str = "profiles";
/// Directory receiving synthesized collages
pub const OUTPUT_DIRECTORY: &str = "output";
/// Default folder scanned for source images
pub const INPUT_DIRECTORY: &str = "input_images";
/// Subdirectory of a profile holding its copied source images
pub const PROFILE_IMAGES_DIRECTORY: &str = "images";
/// Extension of the directory holding the serialized index
pub const TREE_EXTENSION: &str = "tree";
/// File extension of the serialized metadata and items
pub const META_EXTENSION: &str = "meta";
/// File extension of synthesized collages
pub const OUTPUT_EXTENSION: &str = "png";

// Bumped whenever an on-disk layout changes
/// Version tag written into profile metadata
pub const PROFILE_FORMAT_VERSION: u32 = 2;
/// Version tag written into serialized indexes
pub const INDEX_FORMAT_VERSION: u32 = 2;

// Progress bar display settings
/// Threshold above which versions share a single progress bar
pub const MAX_INDIVIDUAL_PROGRESS_BARS: usize = 5;
/// Width of progress bars in characters
pub const PROGRESS_BAR_WIDTH: u16 = 40;

/// Runtime configuration shared by the builder, synthesizer and registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollageConfig {
    /// Root directory holding profiles
    pub profiles_dir: PathBuf,
    /// Directory receiving synthesized collages
    pub output_dir: PathBuf,
    /// Width of the resampled tile
    pub sample_width: u32,
    /// Height of the resampled tile
    pub sample_height: u32,
    /// Number of graph layers built per profile
    pub layer_count: usize,
    /// Maximum number of links per graph node
    pub max_connections: usize,
    /// Candidate list size while building
    pub ef_construction: usize,
    /// Candidate list size while querying
    pub ef_search: usize,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from(PROFILES_DIRECTORY),
            output_dir: PathBuf::from(OUTPUT_DIRECTORY),
            sample_width: SAMPLE_WIDTH,
            sample_height: SAMPLE_HEIGHT,
            layer_count: LAYER_COUNT,
            max_connections: MAX_CONNECTIONS,
            ef_construction: EF_CONSTRUCTION,
            ef_search: EF_SEARCH,
        }
    }
}

impl CollageConfig {
    /// Default configuration rooted at the given profiles and output directories
    pub fn with_directories(profiles_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Check the numeric settings
    ///
    /// # Errors
    ///
    /// Returns an error if a sample dimension or any graph parameter is zero
    pub fn validate(&self) -> Result<()> {
        let graph = [
            ("layer_count", self.layer_count),
            ("max_connections", self.max_connections),
            ("ef_construction", self.ef_construction),
            ("ef_search", self.ef_search),
        ];
        if let Some((parameter, value)) = graph.into_iter().find(|&(_, value)| value == 0) {
            return Err(invalid_parameter(parameter, &value, &"must be positive"));
        }
        self.feature_extractor().map(|_| ())
    }

    /// Feature extractor for the configured sample dimensions
    ///
    /// # Errors
    ///
    /// Returns an error if either sample dimension is zero
    pub fn feature_extractor(&self) -> Result<FeatureExtractor> {
        FeatureExtractor::new(self.sample_width, self.sample_height)
    }

    /// Directory of the named profile
    pub fn profile_dir(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(name)
    }

    /// Output path of a collage version
    pub fn output_path(&self, version: usize) -> PathBuf {
        self.output_dir
            .join(format!("{version}.{OUTPUT_EXTENSION}"))
    }

    /// Path of a profile artifact with the given extension
    pub fn artifact_path(profile_dir: &Path, name: &str, extension: &str) -> PathBuf {
        profile_dir.join(format!("{name}.{extension}"))
    }
}
