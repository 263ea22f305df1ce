//! Collage synthesis: replace every tile of a target image with its nearest
//! profile tiles
//!
//! Tile queries do not depend on the version being rendered, so they are
//! answered once into a [`CollagePlan`]. Version `i` then takes the `i`-th
//! ranked neighbor for every tile and pastes it onto its own copy of the
//! target.

use image::RgbaImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::analysis::features::FeatureExtractor;
use crate::index::{NeighborIndex, Neighbors};
use crate::io::configuration::CollageConfig;
use crate::io::error::{CollageError, Result, corrupt_profile, invalid_parameter};
use crate::io::image::{crop, export_png, open_rgba, paste};
use crate::io::progress::ProgressManager;
use crate::profile::store::Profile;
use crate::spatial::grid::{CropBox, GridTiler};

/// Ranked neighbors for one target tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileQuery {
    /// Tile position in the target
    pub crop: CropBox,
    /// Profile ids ranked by distance, nearest first
    pub neighbors: Neighbors,
}

/// Neighbor lists for every tile of a target, shared by all versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollagePlan {
    width: u32,
    height: u32,
    tiles: Vec<TileQuery>,
    requested: usize,
}

impl CollagePlan {
    /// Target dimensions (width, height)
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Planned tiles in tiling order
    pub fn tiles(&self) -> &[TileQuery] {
        &self.tiles
    }

    /// Number of planned tiles
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of versions the plan was queried for
    pub const fn requested(&self) -> usize {
        self.requested
    }

    /// One error per tile whose query came back short
    ///
    /// The version named in each error is the first one the tile cannot serve.
    pub fn tile_errors(&self) -> Vec<CollageError> {
        self.tiles
            .iter()
            .filter(|tile| tile.neighbors.len() < self.requested)
            .map(|tile| CollageError::InsufficientCandidates {
                version: tile.neighbors.len(),
                crop: tile.crop,
                available: tile.neighbors.len(),
                requested: self.requested,
                affected_tiles: 1,
            })
            .collect()
    }

    /// Error preventing `version` from being rendered, if any
    pub fn version_error(&self, version: usize) -> Option<CollageError> {
        let mut short = self
            .tiles
            .iter()
            .filter(|tile| tile.neighbors.rank(version).is_none());
        let first = short.next()?;
        Some(CollageError::InsufficientCandidates {
            version,
            crop: first.crop,
            available: first.neighbors.len(),
            requested: version + 1,
            affected_tiles: 1 + short.count(),
        })
    }
}

/// Written and failed versions of one create run
#[derive(Debug)]
pub struct CollageReport {
    /// Output files in version order
    pub written: Vec<(usize, PathBuf)>,
    /// Versions that could not be produced or saved
    pub failed: Vec<(usize, CollageError)>,
}

impl CollageReport {
    /// Number of versions attempted
    pub fn requested(&self) -> usize {
        self.written.len() + self.failed.len()
    }

    /// Turn failed versions into an error
    ///
    /// # Errors
    ///
    /// Returns [`CollageError::IncompleteCollage`] if any version failed
    pub fn into_result(self) -> Result<Self> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(CollageError::IncompleteCollage {
                failed: self.failed.len(),
                requested: self.requested(),
            })
        }
    }
}

// Decoded sources keyed by their profile-relative path; failures keep the reason
type SourceCache = HashMap<PathBuf, std::result::Result<RgbaImage, String>>;

/// Renders collage versions from a loaded profile
#[derive(Debug, Clone)]
pub struct CollageSynthesizer {
    config: CollageConfig,
}

impl CollageSynthesizer {
    /// Create a synthesizer writing into `config.output_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(config: CollageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Query the profile for every non-overlapping tile of `target`
    ///
    /// Tiles with fewer than `version_count` neighbors are logged but do not
    /// make planning fail.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `version_count` is zero
    /// - The target is smaller than one profile tile
    /// - The profile index rejects a query
    pub fn plan<I>(
        &self,
        target: &RgbaImage,
        profile: &Profile<I>,
        version_count: usize,
    ) -> Result<CollagePlan>
    where
        I: NeighborIndex + Sync,
    {
        if version_count == 0 {
            return Err(invalid_parameter(
                "count",
                &version_count,
                &"must be at least 1",
            ));
        }

        let (tile_width, tile_height) = profile.tile_size();
        let tiler =
            GridTiler::non_overlapping(target.width(), target.height(), tile_width, tile_height)?;
        if !tiler.fits() {
            return Err(invalid_parameter(
                "target",
                &format!("{}x{}", target.width(), target.height()),
                &format!("smaller than the {tile_width}x{tile_height} profile tile"),
            ));
        }

        // Vectors must be comparable with the ones the profile was built from
        let metadata = profile.metadata();
        let extractor = FeatureExtractor::new(metadata.sample_width, metadata.sample_height)?;

        let boxes: Vec<CropBox> = tiler.boxes().collect();
        let tiles = boxes
            .par_iter()
            .map(|&crop| {
                let vector = extractor.extract_region(target, crop)?;
                let neighbors = profile.index().query(&vector, version_count)?;
                Ok(TileQuery { crop, neighbors })
            })
            .collect::<Result<Vec<_>>>()?;

        let plan = CollagePlan {
            width: target.width(),
            height: target.height(),
            tiles,
            requested: version_count,
        };
        for error in plan.tile_errors() {
            warn!("{error}");
        }
        debug!(
            "planned {} tiles ({} columns x {} rows) against profile '{}'",
            plan.tile_count(),
            tiler.columns(),
            tiler.rows(),
            profile.name()
        );
        Ok(plan)
    }

    /// Render `version_count` collages of `target` from `profile`
    ///
    /// Returns one outcome per version, in version order. A version fails on
    /// its own without affecting the others.
    ///
    /// # Errors
    ///
    /// Returns an error only if planning fails; see [`Self::plan`]
    pub fn synthesize<I>(
        &self,
        target: &RgbaImage,
        profile: &Profile<I>,
        version_count: usize,
        progress: &mut ProgressManager,
    ) -> Result<Vec<Result<RgbaImage>>>
    where
        I: NeighborIndex + Sync,
    {
        let plan = self.plan(target, profile, version_count)?;
        let sources = load_sources(profile, &plan);

        progress.begin_versions(version_count, plan.tile_count());
        let progress = &*progress;
        let outcomes: Vec<Result<RgbaImage>> = (0..version_count)
            .into_par_iter()
            .map(|version| {
                let outcome = render_version(version, target, profile, &plan, &sources, progress);
                progress.complete_version(version, outcome.is_ok());
                outcome
            })
            .collect();
        progress.finish();

        let completed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        info!("{completed} of {version_count} version(s) rendered");
        Ok(outcomes)
    }

    /// Save rendered versions as `<output_dir>/<version>.png`
    ///
    /// Failed versions are carried into the report; an existing output file
    /// for a failed version is left as it was.
    pub fn write_outputs(&self, outcomes: Vec<Result<RgbaImage>>) -> CollageReport {
        let mut report = CollageReport {
            written: Vec::new(),
            failed: Vec::new(),
        };

        for (version, outcome) in outcomes.into_iter().enumerate() {
            let saved = outcome.and_then(|image| {
                let path = self.config.output_path(version);
                export_png(&image, &path)?;
                Ok(path)
            });
            match saved {
                Ok(path) => {
                    info!("version {version} saved to {}", path.display());
                    report.written.push((version, path));
                }
                Err(error) => {
                    warn!("version {version} failed: {error}");
                    report.failed.push((version, error));
                }
            }
        }
        report
    }
}

// Decode every source image some version will paste from, each exactly once
fn load_sources<I: NeighborIndex + Sync>(profile: &Profile<I>, plan: &CollagePlan) -> SourceCache {
    let needed: BTreeSet<&Path> = plan
        .tiles()
        .iter()
        .flat_map(|tile| tile.neighbors.ids())
        .filter_map(|&id| profile.item(id))
        .map(|item| item.source_path.as_path())
        .collect();

    needed
        .into_par_iter()
        .map(|relative| {
            let decoded = open_rgba(&profile.dir().join(relative)).map_err(|e| e.to_string());
            (relative.to_path_buf(), decoded)
        })
        .collect()
}

fn render_version<I: NeighborIndex>(
    version: usize,
    target: &RgbaImage,
    profile: &Profile<I>,
    plan: &CollagePlan,
    sources: &SourceCache,
    progress: &ProgressManager,
) -> Result<RgbaImage> {
    if let Some(error) = plan.version_error(version) {
        return Err(error);
    }

    let mut canvas = target.clone();
    for tile in plan.tiles() {
        let id = tile.neighbors.rank(version).ok_or_else(|| {
            corrupt_profile(profile.name(), &format!("no rank {version} for tile {}", tile.crop))
        })?;
        let item = profile
            .item(id)
            .ok_or_else(|| corrupt_profile(profile.name(), &format!("index returned unknown id {id}")))?;

        let source = match sources.get(&item.source_path) {
            Some(Ok(source)) => source,
            Some(Err(reason)) => return Err(corrupt_profile(profile.name(), reason)),
            None => {
                return Err(corrupt_profile(
                    profile.name(),
                    &format!("source {} was not loaded", item.source_path.display()),
                ));
            }
        };

        if (item.crop.width(), item.crop.height()) != (tile.crop.width(), tile.crop.height()) {
            return Err(corrupt_profile(
                profile.name(),
                &format!("item {id} crop {} does not match tile {}", item.crop, tile.crop),
            ));
        }
        let patch = crop(source, item.crop).map_err(|e| {
            corrupt_profile(
                profile.name(),
                &format!("item {id} in {}: {e}", item.source_path.display()),
            )
        })?;
        paste(&mut canvas, &patch, tile.crop)?;
        progress.advance_version(version, 1);
    }

    Ok(canvas)
}
