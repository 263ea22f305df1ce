//! Enumerates stored profiles and their summary metadata

use log::warn;
use std::fs;
use std::io::ErrorKind;

use crate::index::{HnswIndex, NeighborIndex};
use crate::io::configuration::CollageConfig;
use crate::io::error::{Result, WithPath};
use crate::profile::store::ProfileStore;

/// Summary line for one stored profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    /// Profile name
    pub name: String,
    /// Number of indexed tiles
    pub total_items: usize,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
}

/// A profile directory that could not be summarized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProfile {
    /// Directory name
    pub name: String,
    /// Why the metadata could not be read
    pub reason: String,
}

/// Result of scanning the profiles root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryListing {
    /// Readable profiles, sorted by name
    pub profiles: Vec<ProfileSummary>,
    /// Directories whose metadata was missing or unreadable
    pub skipped: Vec<SkippedProfile>,
}

/// Read-only view over the profiles root
#[derive(Debug, Clone)]
pub struct ProfileRegistry<I = HnswIndex> {
    store: ProfileStore<I>,
}

impl<I: NeighborIndex> ProfileRegistry<I> {
    /// Registry over the configured profiles directory
    pub fn new(config: &CollageConfig) -> Self {
        Self {
            store: ProfileStore::from_config(config),
        }
    }

    /// List every stored profile
    ///
    /// Hidden entries (staging directories) and plain files are ignored.
    /// Profiles with missing or unreadable metadata are reported in
    /// [`RegistryListing::skipped`] instead of failing the listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the profiles root exists but cannot be read
    pub fn list_profiles(&self) -> Result<RegistryListing> {
        let root = self.store.root();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RegistryListing::default()),
            Err(e) => return Err(e).with_path(root, "read profiles directory"),
        };

        let mut listing = RegistryListing::default();
        for entry in entries {
            let path = entry.with_path(root, "read profiles directory")?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            match self.store.read_metadata(&name) {
                Ok(metadata) => listing.profiles.push(ProfileSummary {
                    name,
                    total_items: metadata.total_items,
                    tile_width: metadata.crop_width,
                    tile_height: metadata.crop_height,
                }),
                Err(e) => {
                    warn!("skipping profile '{name}': {e}");
                    listing.skipped.push(SkippedProfile {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        listing.profiles.sort_by(|a, b| a.name.cmp(&b.name));
        listing.skipped.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }
}
