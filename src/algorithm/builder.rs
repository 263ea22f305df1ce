//! Builds a profile from a folder of source images
//!
//! Source images are decoded, tiled and reduced to feature vectors on the
//! rayon pool. Their results are collected in file-name order and only then
//! given ids, from a single thread, so the id of every tile is reproducible
//! and always matches the item stored for it.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::analysis::features::{FeatureExtractor, FeatureVector};
use crate::index::{HnswIndex, NeighborIndex};
use crate::io::configuration::{
    CollageConfig, DEFAULT_CROP_HEIGHT, DEFAULT_CROP_INCREMENT, DEFAULT_CROP_WIDTH,
    PROFILE_FORMAT_VERSION,
};
use crate::io::error::{CollageError, Result, WithPath, invalid_parameter};
use crate::io::image::open_rgba;
use crate::io::progress::ProgressManager;
use crate::profile::store::{Item, ProfileMetadata, ProfileStore, StagedProfile};
use crate::spatial::grid::{CropBox, GridTiler};

/// Parameters of one gather run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherRequest {
    /// Name of the profile to create
    pub name: String,
    /// Folder scanned for source images
    pub source_folder: PathBuf,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Distance between neighboring tile origins
    pub step: u32,
    /// Replace an existing profile of the same name
    pub overwrite: bool,
}

impl GatherRequest {
    /// Request with the default tile size and increment
    pub fn new(name: impl Into<String>, source_folder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_folder: source_folder.into(),
            tile_width: DEFAULT_CROP_WIDTH,
            tile_height: DEFAULT_CROP_HEIGHT,
            step: DEFAULT_CROP_INCREMENT,
            overwrite: false,
        }
    }

    fn validate(&self) -> Result<()> {
        ProfileStore::<HnswIndex>::validate_name(&self.name)?;
        for (parameter, value) in [
            ("width", self.tile_width),
            ("height", self.tile_height),
            ("increment", self.step),
        ] {
            if value == 0 {
                return Err(invalid_parameter(parameter, &value, &"must be positive"));
            }
        }
        Ok(())
    }
}

/// Tiles contributed by one source image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    /// Original source path
    pub path: PathBuf,
    /// Number of tiles indexed from it
    pub tiles: usize,
    /// First id assigned to its tiles
    pub first_id: usize,
}

/// A source image left out of the profile
#[derive(Debug)]
pub struct SourceFailure {
    /// Original source path
    pub path: PathBuf,
    /// Why it was skipped
    pub error: CollageError,
}

/// Outcome of a successful gather
#[derive(Debug)]
pub struct BuildReport {
    /// Profile name
    pub name: String,
    /// Published profile directory
    pub dir: PathBuf,
    /// Stored metadata record
    pub metadata: ProfileMetadata,
    /// Indexed source images in id order
    pub sources: Vec<SourceReport>,
    /// Source images that were skipped
    pub skipped: Vec<SourceFailure>,
}

impl BuildReport {
    /// Check whether every source image was indexed
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Turn skipped sources into an error while keeping the saved profile
    ///
    /// # Errors
    ///
    /// Returns [`CollageError::IncompleteGather`] if any source was skipped
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(CollageError::IncompleteGather {
                profile: self.name,
                skipped: self.skipped.len(),
            })
        }
    }
}

struct SourceTiles {
    path: PathBuf,
    relative: PathBuf,
    tiles: Vec<(CropBox, FeatureVector)>,
}

/// Constructs profiles with the configured sampling and index parameters
#[derive(Debug, Clone)]
pub struct ProfileBuilder<I = HnswIndex> {
    config: CollageConfig,
    store: ProfileStore<I>,
    extractor: FeatureExtractor,
    index: PhantomData<fn() -> I>,
}

impl<I: NeighborIndex> ProfileBuilder<I> {
    /// Create a builder storing profiles under `config.profiles_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(config: CollageConfig) -> Result<Self> {
        config.validate()?;
        let extractor = config.feature_extractor()?;
        Ok(Self {
            store: ProfileStore::from_config(&config),
            config,
            extractor,
            index: PhantomData,
        })
    }

    /// Gather source images into a new profile
    ///
    /// Undersized or undecodable images are skipped and listed in the report;
    /// the profile is still published from the remaining images. Anything
    /// that prevents writing the profile aborts the run and leaves no
    /// profile directory behind.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request parameters are invalid
    /// - A profile with the same name exists and overwrite was not requested
    /// - The source folder cannot be read or yields no usable tiles
    /// - The staged profile cannot be written or published
    pub fn build(
        &self,
        request: &GatherRequest,
        progress: &mut ProgressManager,
    ) -> Result<BuildReport> {
        request.validate()?;
        if self.store.exists(&request.name) && !request.overwrite {
            return Err(CollageError::ProfileAlreadyExists {
                name: request.name.clone(),
                path: self.store.profile_dir(&request.name),
            });
        }

        let files = collect_source_files(&request.source_folder)?;
        if files.is_empty() {
            return Err(CollageError::NoSourceImages {
                folder: request.source_folder.clone(),
            });
        }
        info!(
            "gathering {} source image(s) from {} into profile '{}'",
            files.len(),
            request.source_folder.display(),
            request.name
        );

        let staged = self.store.stage(&request.name)?;
        let bar = progress.begin_sources(files.len());
        let extracted: Vec<Result<std::result::Result<SourceTiles, CollageError>>> = files
            .par_iter()
            .map(|path| {
                let outcome = self.process_source(&staged, request, path);
                if let Some(name) = path.file_name() {
                    bar.set_message(name.to_string_lossy().into_owned());
                }
                bar.inc(1);
                outcome
            })
            .collect();
        bar.finish_with_message("done");

        let mut index = I::empty(self.extractor.dimension(), &self.config)?;
        let mut items = BTreeMap::new();
        let mut sources = Vec::new();
        let mut skipped = Vec::new();

        for (path, outcome) in files.iter().zip(extracted) {
            match outcome? {
                Ok(source) => {
                    let first_id = items.len();
                    let tiles = source.tiles.len();
                    for (crop, vector) in source.tiles {
                        let id = items.len();
                        index.insert(id, &vector)?;
                        items.insert(
                            id,
                            Item {
                                source_path: source.relative.clone(),
                                crop,
                            },
                        );
                    }
                    debug!(
                        "{}: {tiles} tiles (ids {first_id}..{})",
                        source.path.display(),
                        items.len()
                    );
                    sources.push(SourceReport {
                        path: source.path,
                        tiles,
                        first_id,
                    });
                }
                Err(error) => {
                    warn!("skipping {}: {error}", path.display());
                    skipped.push(SourceFailure {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }

        if items.is_empty() {
            return Err(CollageError::NoSourceImages {
                folder: request.source_folder.clone(),
            });
        }

        info!("{} total tiles to be indexed", items.len());
        let spinner = progress.begin_indexing(items.len());
        index.build(self.config.layer_count)?;
        spinner.finish_and_clear();

        let metadata = ProfileMetadata {
            format_version: PROFILE_FORMAT_VERSION,
            crop_width: request.tile_width,
            crop_height: request.tile_height,
            total_items: items.len(),
            sample_width: self.extractor.sample_size().0,
            sample_height: self.extractor.sample_size().1,
            layer_count: self.config.layer_count,
        };
        staged.write_artifacts(&metadata, &items, &index)?;
        let dir = self.store.publish(staged, request.overwrite)?;

        Ok(BuildReport {
            name: request.name.clone(),
            dir,
            metadata,
            sources,
            skipped,
        })
    }

    // Outer error aborts the gather, inner error skips this image
    fn process_source(
        &self,
        staged: &StagedProfile,
        request: &GatherRequest,
        path: &Path,
    ) -> Result<std::result::Result<SourceTiles, CollageError>> {
        let image = match open_rgba(path) {
            Ok(image) => image,
            Err(error) => return Ok(Err(error)),
        };

        let tiler = GridTiler::overlapping(
            image.width(),
            image.height(),
            request.tile_width,
            request.tile_height,
            request.step,
        )?;
        if !tiler.fits() {
            return Ok(Err(CollageError::TileTooLarge {
                path: path.to_path_buf(),
                image_size: image.dimensions(),
                tile_size: tiler.tile_size(),
            }));
        }

        let tiles = self.extractor.extract_tiles(&image, &tiler)?;
        let relative = staged.copy_source(path)?;

        Ok(Ok(SourceTiles {
            path: path.to_path_buf(),
            relative,
            tiles,
        }))
    }
}

/// Regular files directly inside `folder`, sorted by file name
///
/// # Errors
///
/// Returns an error if the folder cannot be read
pub fn collect_source_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder).with_path(folder, "read source folder")? {
        let path = entry.with_path(folder, "read source folder")?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
