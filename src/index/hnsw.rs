//! Graph index for approximate Euclidean nearest-neighbor search
//!
//! Inserted vectors are buffered in insertion order and linked into a
//! hierarchical navigable small world graph from `hnsw_rs` when the index is
//! built. The graph answers queries nearest first; hits at equal distance are
//! ordered by id.
//!
//! A saved index is a directory: a bincode header recording the format,
//! metric, dimension and size, next to the graph dump written by `hnsw_rs`.

use hnsw_rs::prelude::{AnnT, DistL2, Hnsw, HnswIo};
use log::debug;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::analysis::features::FeatureVector;
use crate::index::{NeighborIndex, Neighbors};
use crate::io::configuration::{
    CollageConfig, GRAPH_BASENAME, INDEX_FORMAT_VERSION, INDEX_HEADER_FILE,
};
use crate::io::error::{Result, WithPath, index_error, invalid_parameter};

// hnsw_rs caps the layer count at this value
const MAX_GRAPH_LAYERS: usize = 16;

type Graph = Hnsw<'static, u8, DistL2>;

/// Distance metric recorded with a persisted index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Straight-line distance between vectors
    Euclidean,
}

/// Construction and search settings of the neighbor graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphParameters {
    /// Maximum number of links per node
    pub max_connections: usize,
    /// Candidate list size while linking a new vector
    pub ef_construction: usize,
    /// Candidate list size while answering a query
    pub ef_search: usize,
}

impl GraphParameters {
    /// Graph settings taken from the runtime configuration
    pub const fn from_config(config: &CollageConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
        }
    }

    fn validate(self) -> Result<()> {
        let settings = [
            ("max_connections", self.max_connections),
            ("ef_construction", self.ef_construction),
            ("ef_search", self.ef_search),
        ];
        match settings.into_iter().find(|&(_, value)| value == 0) {
            Some((parameter, value)) => Err(invalid_parameter(parameter, &value, &"must be positive")),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexHeader {
    format_version: u32,
    metric: Metric,
    dimension: usize,
    len: usize,
    layer_count: usize,
    parameters: GraphParameters,
}

/// Navigable small world graph over 8-bit vectors
pub struct HnswIndex {
    dimension: usize,
    parameters: GraphParameters,
    pending: Array2<u8>,
    layer_count: usize,
    graph: Option<Graph>,
}

impl fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswIndex")
            .field("dimension", &self.dimension)
            .field("parameters", &self.parameters)
            .field("layer_count", &self.layer_count)
            .field("len", &self.len())
            .field("built", &self.is_built())
            .finish()
    }
}

impl HnswIndex {
    /// Create an empty index
    ///
    /// # Errors
    ///
    /// Returns an error if `dimension` or any graph setting is zero
    pub fn new(dimension: usize, parameters: GraphParameters) -> Result<Self> {
        if dimension == 0 {
            return Err(invalid_parameter(
                "dimension",
                &dimension,
                &"must be positive",
            ));
        }
        parameters.validate()?;

        Ok(Self {
            dimension,
            parameters,
            pending: Array2::zeros((0, dimension)),
            layer_count: 0,
            graph: None,
        })
    }

    /// Graph settings
    pub const fn parameters(&self) -> GraphParameters {
        self.parameters
    }

    /// Number of graph layers, zero before the index is built
    pub const fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Distance metric used for ranking
    pub const fn metric(&self) -> Metric {
        Metric::Euclidean
    }

    fn empty_graph(parameters: GraphParameters, capacity: usize, layer_count: usize) -> Graph {
        Hnsw::new(
            parameters.max_connections,
            capacity.max(1),
            layer_count,
            parameters.ef_construction,
            DistL2 {},
        )
    }

    fn check_dimension(&self, vector: &FeatureVector) -> Result<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(index_error(&format!(
                "vector has {} components, index expects {}",
                vector.len(),
                self.dimension
            )))
        }
    }
}

impl NeighborIndex for HnswIndex {
    fn empty(dimension: usize, config: &CollageConfig) -> Result<Self> {
        Self::new(dimension, GraphParameters::from_config(config))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.graph
            .as_ref()
            .map_or_else(|| self.pending.nrows(), Graph::get_nb_point)
    }

    fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    fn insert(&mut self, id: usize, vector: &FeatureVector) -> Result<()> {
        if self.is_built() {
            return Err(index_error(&"cannot insert into a built index"));
        }
        let expected = self.len();
        if id != expected {
            return Err(index_error(&format!(
                "id {id} is out of sequence, expected {expected}"
            )));
        }
        self.check_dimension(vector)?;

        self.pending
            .push_row(ArrayView1::from(vector.as_slice()))
            .map_err(|e| index_error(&e))
    }

    fn build(&mut self, layer_count: usize) -> Result<()> {
        if self.is_built() {
            return Err(index_error(&"index is already built"));
        }
        if layer_count == 0 {
            return Err(invalid_parameter(
                "layer_count",
                &layer_count,
                &"must be positive",
            ));
        }

        let layer_count = layer_count.min(MAX_GRAPH_LAYERS);
        let count = self.pending.nrows();
        let graph = Self::empty_graph(self.parameters, count, layer_count);
        let flat = self
            .pending
            .as_slice()
            .ok_or_else(|| index_error(&"vector buffer is not contiguous"))?;
        let rows: Vec<(&[u8], usize)> = flat.chunks_exact(self.dimension).zip(0..).collect();
        rows.par_iter().for_each(|&(row, id)| graph.insert((row, id)));

        self.graph = Some(graph);
        self.layer_count = layer_count;
        self.pending = Array2::zeros((0, self.dimension));

        debug!("linked {count} vectors into a {layer_count}-layer graph");
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let Some(graph) = &self.graph else {
            return Err(index_error(&"cannot save an index before it is built"));
        };

        fs::create_dir_all(path).with_path(path, "create index directory")?;
        let header = IndexHeader {
            format_version: INDEX_FORMAT_VERSION,
            metric: self.metric(),
            dimension: self.dimension,
            len: self.len(),
            layer_count: self.layer_count,
            parameters: self.parameters,
        };
        let header_path = path.join(INDEX_HEADER_FILE);
        let file = File::create(&header_path).with_path(&header_path, "create index header")?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &header).with_path(&header_path, "encode index header")?;
        writer.flush().with_path(&header_path, "write index header")?;

        // An empty graph has no entry point to dump
        if header.len > 0 {
            AnnT::file_dump(graph, path, GRAPH_BASENAME).map_err(|e| {
                index_error(&format!("cannot write graph into {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    fn load(path: &Path, dimension: usize) -> Result<Self> {
        let header_path = path.join(INDEX_HEADER_FILE);
        let file = File::open(&header_path).with_path(&header_path, "open index header")?;
        let header: IndexHeader = bincode::deserialize_from(BufReader::new(file))
            .with_path(&header_path, "decode index header")?;

        if header.format_version != INDEX_FORMAT_VERSION {
            return Err(index_error(&format!(
                "unsupported index format version {}",
                header.format_version
            )));
        }
        if header.metric != Metric::Euclidean {
            return Err(index_error(&"index was built with a different metric"));
        }
        if header.dimension != dimension {
            return Err(index_error(&format!(
                "index holds {}-dimensional vectors, expected {dimension}",
                header.dimension
            )));
        }
        if header.layer_count == 0 {
            return Err(index_error(&"index header records no graph layers"));
        }
        header.parameters.validate()?;

        let graph: Graph = if header.len == 0 {
            Self::empty_graph(header.parameters, 0, header.layer_count)
        } else {
            // The reloaded graph borrows its loader for as long as the process runs
            let loader = Box::leak(Box::new(HnswIo::new(path, GRAPH_BASENAME)));
            loader.load_hnsw_with_dist(DistL2 {}).map_err(|e| {
                index_error(&format!("cannot read graph from {}: {e}", path.display()))
            })?
        };
        if graph.get_nb_point() != header.len {
            return Err(index_error(&format!(
                "graph holds {} vectors but the header lists {}",
                graph.get_nb_point(),
                header.len
            )));
        }

        Ok(Self {
            dimension,
            parameters: header.parameters,
            pending: Array2::zeros((0, dimension)),
            layer_count: header.layer_count,
            graph: Some(graph),
        })
    }

    fn query(&self, vector: &FeatureVector, k: usize) -> Result<Neighbors> {
        let Some(graph) = &self.graph else {
            return Err(index_error(&"cannot query an index before it is built"));
        };
        self.check_dimension(vector)?;

        if k == 0 {
            return Ok(Neighbors::Full(Vec::new()));
        }
        if self.is_empty() {
            return Ok(Neighbors::Empty);
        }

        let ef = self.parameters.ef_search.max(k);
        let mut ranked: Vec<(f32, usize)> = graph
            .search(vector.as_slice(), k, ef)
            .into_iter()
            .map(|hit| (hit.distance, hit.d_id))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.truncate(k);

        Ok(Neighbors::from_ranked(
            ranked.into_iter().map(|(_, id)| id).collect(),
            k,
        ))
    }
}
