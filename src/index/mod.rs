//! Nearest-neighbor index over feature vectors
//!
//! The rest of the crate talks to the index only through [`NeighborIndex`],
//! so the graph implementation can be swapped without touching profile
//! building or collage synthesis.

/// Navigable small world graph backed by `hnsw_rs`
pub mod hnsw;

use std::path::Path;

use crate::analysis::features::FeatureVector;
use crate::io::configuration::CollageConfig;
use crate::io::error::Result;

pub use hnsw::HnswIndex;

/// Ranked neighbor ids returned by a query, nearest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Neighbors {
    /// Exactly the requested number of ids
    Full(Vec<usize>),
    /// Fewer ids than requested because the index holds fewer vectors
    Partial {
        /// Every id the index could return, nearest first
        ids: Vec<usize>,
        /// Number of ids asked for
        requested: usize,
    },
    /// The index holds no vectors at all
    Empty,
}

impl Neighbors {
    /// Classify a ranked id list against the requested count
    pub fn from_ranked(ids: Vec<usize>, requested: usize) -> Self {
        if ids.len() >= requested {
            Self::Full(ids)
        } else if ids.is_empty() {
            Self::Empty
        } else {
            Self::Partial { ids, requested }
        }
    }

    /// Ranked ids, nearest first
    pub fn ids(&self) -> &[usize] {
        match self {
            Self::Full(ids) | Self::Partial { ids, .. } => ids,
            Self::Empty => &[],
        }
    }

    /// Id at `rank` (0 is the nearest)
    pub fn rank(&self, rank: usize) -> Option<usize> {
        self.ids().get(rank).copied()
    }

    /// Number of ids returned
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// Check whether no ids were returned
    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    /// Check whether the query was fully satisfied
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

/// Vector index consumed by profile building and collage synthesis
///
/// Ids are assigned by the caller starting at zero without gaps. Once
/// [`NeighborIndex::build`] has run the index is read-only.
pub trait NeighborIndex: Sized {
    /// Create an empty index for vectors of `dimension` components
    ///
    /// # Errors
    ///
    /// Returns an error if the dimension or configuration is unusable
    fn empty(dimension: usize, config: &CollageConfig) -> Result<Self>;

    /// Number of components per vector
    fn dimension(&self) -> usize;

    /// Number of stored vectors
    fn len(&self) -> usize;

    /// Check whether no vectors are stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether the index has been built and accepts queries
    fn is_built(&self) -> bool;

    /// Store `vector` under `id`
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not the next id in sequence, the vector has
    /// the wrong dimension, or the index was already built
    fn insert(&mut self, id: usize, vector: &FeatureVector) -> Result<()>;

    /// Finalize the index for querying
    ///
    /// `layer_count` sets the depth of the search structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the index was already built or `layer_count` is zero
    fn build(&mut self, layer_count: usize) -> Result<()>;

    /// Persist the built index
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not built or the file cannot be written
    fn save(&self, path: &Path) -> Result<()>;

    /// Load an index persisted by [`NeighborIndex::save`]
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed, or was built for
    /// a different dimension or metric
    fn load(path: &Path, dimension: usize) -> Result<Self>;

    /// Find up to `k` nearest ids to `vector`, nearest first
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not built or the vector has the wrong
    /// dimension
    fn query(&self, vector: &FeatureVector, k: usize) -> Result<Neighbors>;
}
