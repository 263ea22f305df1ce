//! Durable profiles: a vector index and its id-keyed tile metadata
//!
//! A profile directory holds the serialized index (`<name>.tree`), the
//! serialized metadata and items (`<name>.meta`) and the copied source
//! images. The two artifacts are only valid together, so profiles are
//! assembled in a hidden staging directory under the profiles root and
//! published with a single rename.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

use crate::index::{HnswIndex, NeighborIndex};
use crate::io::configuration::{
    CollageConfig, META_EXTENSION, PROFILE_FORMAT_VERSION, PROFILE_IMAGES_DIRECTORY,
    TREE_EXTENSION,
};
use crate::io::error::{CollageError, Result, WithPath, corrupt_profile, invalid_parameter};
use crate::spatial::grid::CropBox;

/// Profile-level parameters, stored once ahead of the items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    /// On-disk layout version
    pub format_version: u32,
    /// Tile width in pixels
    pub crop_width: u32,
    /// Tile height in pixels
    pub crop_height: u32,
    /// Number of indexed tiles
    pub total_items: usize,
    /// Width of the resampled tile used for features
    pub sample_width: u32,
    /// Height of the resampled tile used for features
    pub sample_height: u32,
    /// Number of graph layers in the index
    pub layer_count: usize,
}

impl ProfileMetadata {
    /// Length of the feature vectors stored in the index
    pub const fn dimension(&self) -> usize {
        self.sample_width as usize * self.sample_height as usize
    }
}

/// Where one indexed tile came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Source image path relative to the profile directory
    pub source_path: PathBuf,
    /// Tile position inside the source image
    pub crop: CropBox,
}

/// A loaded profile ready for querying
#[derive(Debug)]
pub struct Profile<I = HnswIndex> {
    name: String,
    dir: PathBuf,
    metadata: ProfileMetadata,
    items: BTreeMap<usize, Item>,
    index: I,
}

impl<I: NeighborIndex> Profile<I> {
    /// Profile name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Profile directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Profile-level parameters
    pub const fn metadata(&self) -> &ProfileMetadata {
        &self.metadata
    }

    /// Tile dimensions (width, height)
    pub const fn tile_size(&self) -> (u32, u32) {
        (self.metadata.crop_width, self.metadata.crop_height)
    }

    /// Vector index
    pub const fn index(&self) -> &I {
        &self.index
    }

    /// Item stored under `id`
    pub fn item(&self, id: usize) -> Option<&Item> {
        self.items.get(&id)
    }

    /// All items in id order
    pub fn items(&self) -> impl Iterator<Item = (usize, &Item)> {
        self.items.iter().map(|(&id, item)| (id, item))
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check whether the profile holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Absolute location of an item's source image
    pub fn source_path(&self, item: &Item) -> PathBuf {
        self.dir.join(&item.source_path)
    }
}

/// Profiles stored under one root directory
#[derive(Debug)]
pub struct ProfileStore<I = HnswIndex> {
    root: PathBuf,
    index: PhantomData<fn() -> I>,
}

impl<I> Clone for ProfileStore<I> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            index: PhantomData,
        }
    }
}

impl<I: NeighborIndex> ProfileStore<I> {
    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: PhantomData,
        }
    }

    /// Store rooted at the configured profiles directory
    pub fn from_config(config: &CollageConfig) -> Self {
        Self::new(config.profiles_dir.clone())
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the named profile
    pub fn profile_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Check whether a profile directory with this name exists
    pub fn exists(&self, name: &str) -> bool {
        self.profile_dir(name).exists()
    }

    /// Reject names that are empty, hidden or not a single path component
    ///
    /// # Errors
    ///
    /// Returns an error if the name cannot be used as a profile directory
    pub fn validate_name(name: &str) -> Result<()> {
        let mut components = Path::new(name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(invalid_parameter(
                "name",
                &name,
                &"must be a plain directory name that does not start with '.'",
            ));
        }
        Ok(())
    }

    /// Open a hidden staging directory for a new profile
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the staging directory
    /// cannot be created
    pub fn stage(&self, name: &str) -> Result<StagedProfile> {
        Self::validate_name(name)?;
        fs::create_dir_all(&self.root).with_path(&self.root, "create profiles directory")?;

        let dir = tempfile::Builder::new()
            .prefix(&format!(".{name}.staging."))
            .tempdir_in(&self.root)
            .with_path(&self.root, "create staging directory")?;
        let images = dir.path().join(PROFILE_IMAGES_DIRECTORY);
        fs::create_dir(&images).with_path(&images, "create image directory")?;

        debug!("staging profile '{name}' in {}", dir.path().display());
        Ok(StagedProfile {
            name: name.to_string(),
            dir,
        })
    }

    /// Move a complete staged profile to its final location
    ///
    /// With `overwrite` an existing profile of the same name is swapped out
    /// and removed; otherwise it is left untouched and an error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile exists and `overwrite` is false, or a
    /// rename fails
    pub fn publish(&self, staged: StagedProfile, overwrite: bool) -> Result<PathBuf> {
        self.publish_with(staged, overwrite, rename_dir)
    }

    /// Publish using `relocate` to move directories within the profiles root
    ///
    /// When an overwrite fails after the previous profile was set aside, the
    /// previous profile is moved back. If that also fails it is left in its
    /// holding directory and the error names where it is.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile exists and `overwrite` is false, a move
    /// fails, or the previous profile could not be put back
    pub fn publish_with<F>(
        &self,
        staged: StagedProfile,
        overwrite: bool,
        mut relocate: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(&Path, &Path) -> std::io::Result<()>,
    {
        let target = self.profile_dir(&staged.name);

        let retired = if target.exists() {
            if !overwrite {
                return Err(CollageError::ProfileAlreadyExists {
                    name: staged.name,
                    path: target,
                });
            }
            let holder = tempfile::Builder::new()
                .prefix(&format!(".{}.retired.", staged.name))
                .tempdir_in(&self.root)
                .with_path(&self.root, "create retirement directory")?;
            let parked = holder.path().join(&staged.name);
            relocate(&target, &parked).with_path(&target, "retire existing profile")?;
            Some((holder, parked))
        } else {
            None
        };

        if let Err(e) = relocate(staged.dir.path(), &target) {
            if let Some((holder, parked)) = retired {
                if let Err(restore) = relocate(&parked, &target) {
                    // The parked copy is now the only one; keep its holder on disk
                    let kept = holder.keep();
                    error!(
                        "profile '{}' could not be restored, previous version left in {}",
                        staged.name,
                        kept.display()
                    );
                    return Err(CollageError::ProfileRestoreFailed {
                        name: staged.name.clone(),
                        parked,
                        source: restore,
                    });
                }
                warn!("publishing profile '{}' failed, previous version restored", staged.name);
            }
            return Err(e).with_path(&target, "publish profile");
        }

        info!("profile '{}' saved in {}", staged.name, target.display());
        Ok(target)
    }

    /// Read only the metadata record of a stored profile
    ///
    /// # Errors
    ///
    /// Returns an error if the profile does not exist or its metadata
    /// artifact is missing or unreadable
    pub fn read_metadata(&self, name: &str) -> Result<ProfileMetadata> {
        let dir = self.existing_dir(name)?;
        let meta_path = CollageConfig::artifact_path(&dir, name, META_EXTENSION);
        let file = File::open(&meta_path)
            .map_err(|e| corrupt_profile(name, &format!("cannot open {}: {e}", meta_path.display())))?;
        let metadata: ProfileMetadata = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| corrupt_profile(name, &format!("unreadable metadata: {e}")))?;
        check_format_version(name, &metadata)?;
        Ok(metadata)
    }

    /// Load a stored profile and verify its artifacts agree
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The profile does not exist
    /// - Either artifact is missing or unreadable
    /// - Item ids are not exactly `0..total_items`
    /// - The index size or dimension differs from the metadata
    pub fn load(&self, name: &str) -> Result<Profile<I>> {
        let dir = self.existing_dir(name)?;
        let meta_path = CollageConfig::artifact_path(&dir, name, META_EXTENSION);
        let tree_path = CollageConfig::artifact_path(&dir, name, TREE_EXTENSION);

        if !tree_path.exists() {
            return Err(corrupt_profile(
                name,
                &format!("index artifact {} is missing", tree_path.display()),
            ));
        }

        let file = File::open(&meta_path)
            .map_err(|e| corrupt_profile(name, &format!("cannot open {}: {e}", meta_path.display())))?;
        let mut reader = BufReader::new(file);
        let metadata: ProfileMetadata = bincode::deserialize_from(&mut reader)
            .map_err(|e| corrupt_profile(name, &format!("unreadable metadata: {e}")))?;
        check_format_version(name, &metadata)?;
        let stored: BTreeMap<u64, Item> = bincode::deserialize_from(&mut reader)
            .map_err(|e| corrupt_profile(name, &format!("unreadable items: {e}")))?;

        let items = check_item_ids(name, &metadata, stored)?;

        let index = I::load(&tree_path, metadata.dimension())
            .map_err(|e| corrupt_profile(name, &format!("unreadable index: {e}")))?;
        if index.len() != metadata.total_items {
            return Err(corrupt_profile(
                name,
                &format!(
                    "index holds {} vectors but metadata lists {} items",
                    index.len(),
                    metadata.total_items
                ),
            ));
        }

        debug!(
            "loaded profile '{name}' with {} items from {}",
            items.len(),
            dir.display()
        );
        Ok(Profile {
            name: name.to_string(),
            dir,
            metadata,
            items,
            index,
        })
    }

    fn existing_dir(&self, name: &str) -> Result<PathBuf> {
        Self::validate_name(name)?;
        let dir = self.profile_dir(name);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(CollageError::ProfileNotFound {
                name: name.to_string(),
                path: dir,
            })
        }
    }
}

fn rename_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::rename(from, to)
}

fn check_format_version(name: &str, metadata: &ProfileMetadata) -> Result<()> {
    if metadata.format_version == PROFILE_FORMAT_VERSION {
        Ok(())
    } else {
        Err(corrupt_profile(
            name,
            &format!("unsupported format version {}", metadata.format_version),
        ))
    }
}

// Keys must be exactly 0..total_items for ids to line up with index rows
fn check_item_ids(
    name: &str,
    metadata: &ProfileMetadata,
    stored: BTreeMap<u64, Item>,
) -> Result<BTreeMap<usize, Item>> {
    if stored.len() != metadata.total_items {
        return Err(corrupt_profile(
            name,
            &format!(
                "metadata lists {} items but {} are stored",
                metadata.total_items,
                stored.len()
            ),
        ));
    }

    let mut items = BTreeMap::new();
    for (expected, (id, item)) in stored.into_iter().enumerate() {
        if usize::try_from(id).ok() != Some(expected) {
            return Err(corrupt_profile(
                name,
                &format!("item ids have a gap: expected {expected}, found {id}"),
            ));
        }
        if (item.crop.width(), item.crop.height()) != (metadata.crop_width, metadata.crop_height) {
            return Err(corrupt_profile(
                name,
                &format!("item {id} has crop {} of the wrong size", item.crop),
            ));
        }
        items.insert(expected, item);
    }
    Ok(items)
}

/// A profile being assembled in a hidden staging directory
///
/// Dropping it without publishing removes everything written so far.
#[derive(Debug)]
pub struct StagedProfile {
    name: String,
    dir: TempDir,
}

impl StagedProfile {
    /// Profile name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Staging directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy a source image into the profile's private image store
    ///
    /// Returns the copy's path relative to the profile directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the source has no file name or the copy fails
    pub fn copy_source(&self, source: &Path) -> Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            invalid_parameter("source", &source.display(), &"has no file name")
        })?;
        let relative = Path::new(PROFILE_IMAGES_DIRECTORY).join(file_name);
        let destination = self.dir.path().join(&relative);
        fs::copy(source, &destination).with_path(&destination, "copy source image")?;
        Ok(relative)
    }

    /// Write the index and the metadata with its items
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Item ids are not exactly `0..metadata.total_items`
    /// - The index size differs from the item count
    /// - Either artifact cannot be written
    pub fn write_artifacts<I: NeighborIndex>(
        &self,
        metadata: &ProfileMetadata,
        items: &BTreeMap<usize, Item>,
        index: &I,
    ) -> Result<()> {
        let contiguous = items.keys().copied().eq(0..metadata.total_items);
        if !contiguous || index.len() != metadata.total_items {
            return Err(corrupt_profile(
                &self.name,
                &format!(
                    "refusing to write {} items and {} vectors for {} declared tiles",
                    items.len(),
                    index.len(),
                    metadata.total_items
                ),
            ));
        }

        let tree_path = CollageConfig::artifact_path(self.dir.path(), &self.name, TREE_EXTENSION);
        index.save(&tree_path)?;

        let meta_path = CollageConfig::artifact_path(self.dir.path(), &self.name, META_EXTENSION);
        let file = File::create(&meta_path).with_path(&meta_path, "create metadata file")?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, metadata).with_path(&meta_path, "encode metadata")?;
        let keyed: BTreeMap<u64, &Item> = items
            .iter()
            .map(|(&id, item)| (id as u64, item))
            .collect();
        bincode::serialize_into(&mut writer, &keyed).with_path(&meta_path, "encode items")?;
        writer.flush().with_path(&meta_path, "write metadata file")?;

        Ok(())
    }
}
