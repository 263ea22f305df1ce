//! Error types and context management for profile and collage operations

use crate::spatial::grid::CropBox;
use std::fmt;
use std::path::{Path, PathBuf};

/// Main error type for all profile and collage operations
#[derive(Debug)]
pub enum CollageError {
    /// Failed to decode an image from the filesystem
    ImageLoad {
        /// Path to the image file
        path: PathBuf,
        /// Underlying image loading error
        source: image::ImageError,
    },

    /// The file is not in an image format the decoder understands
    UnsupportedImageFormat {
        /// Path to the offending file
        path: PathBuf,
        /// Decoder message describing the rejected format
        detail: String,
    },

    /// Failed to encode or save a generated image
    ImageExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying image export error
        source: image::ImageError,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Binary encoding or decoding of a profile artifact failed
    Serialization {
        /// Artifact being read or written
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying codec error
        source: bincode::Error,
    },

    /// Parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// The nearest-neighbor index rejected an operation
    Index {
        /// Description of the rejected operation
        reason: String,
    },

    /// The source folder produced no usable images
    NoSourceImages {
        /// Folder that was scanned
        folder: PathBuf,
    },

    /// A source image is smaller than the requested tile
    TileTooLarge {
        /// Path to the undersized image
        path: PathBuf,
        /// Image dimensions (width, height)
        image_size: (u32, u32),
        /// Tile dimensions (width, height)
        tile_size: (u32, u32),
    },

    /// A profile with this name is already stored
    ProfileAlreadyExists {
        /// Profile name
        name: String,
        /// Existing profile directory
        path: PathBuf,
    },

    /// No profile with this name is stored
    ProfileNotFound {
        /// Profile name
        name: String,
        /// Directory that was expected to hold the profile
        path: PathBuf,
    },

    /// An overwrite failed and the previous profile could not be moved back
    ProfileRestoreFailed {
        /// Profile name
        name: String,
        /// Where the previous profile was left
        parked: PathBuf,
        /// Error raised while moving it back
        source: std::io::Error,
    },

    /// Profile artifacts are missing, unreadable or inconsistent with each other
    CorruptProfile {
        /// Profile name
        name: String,
        /// What is wrong with the stored artifacts
        reason: String,
    },

    /// A tile query returned fewer neighbors than the requested version needs
    InsufficientCandidates {
        /// Output version that could not be completed
        version: usize,
        /// First tile whose candidate pool was too small
        crop: CropBox,
        /// Neighbors available for that tile
        available: usize,
        /// Neighbors required
        requested: usize,
        /// Number of tiles with a pool too small for this version
        affected_tiles: usize,
    },

    /// The profile was persisted but some source images were skipped
    IncompleteGather {
        /// Profile name
        profile: String,
        /// Number of skipped source images
        skipped: usize,
    },

    /// Some requested collage versions could not be produced
    IncompleteCollage {
        /// Number of versions that failed
        failed: usize,
        /// Number of versions requested
        requested: usize,
    },
}

impl fmt::Display for CollageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageLoad { path, source } => {
                write!(f, "Failed to load image '{}': {source}", path.display())
            }
            Self::UnsupportedImageFormat { path, detail } => {
                write!(
                    f,
                    "Unsupported image format for '{}': {detail}",
                    path.display()
                )
            }
            Self::ImageExport { path, source } => {
                write!(
                    f,
                    "Failed to export image to '{}': {source}",
                    path.display()
                )
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
            Self::Serialization {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "Serialization error during {operation} of '{}': {source}",
                    path.display()
                )
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::Index { reason } => write!(f, "Index error: {reason}"),
            Self::NoSourceImages { folder } => {
                write!(f, "No usable source images in '{}'", folder.display())
            }
            Self::TileTooLarge {
                path,
                image_size,
                tile_size,
            } => {
                write!(
                    f,
                    "Image '{}' ({}x{}) is smaller than the {}x{} tile",
                    path.display(),
                    image_size.0,
                    image_size.1,
                    tile_size.0,
                    tile_size.1
                )
            }
            Self::ProfileAlreadyExists { name, path } => {
                write!(
                    f,
                    "Profile '{name}' already exists at '{}'",
                    path.display()
                )
            }
            Self::ProfileNotFound { name, path } => {
                write!(f, "Profile '{name}' not found at '{}'", path.display())
            }
            Self::ProfileRestoreFailed {
                name,
                parked,
                source,
            } => {
                write!(
                    f,
                    "Profile '{name}' could not be replaced or restored; the previous version \
                     is kept at '{}': {source}",
                    parked.display()
                )
            }
            Self::CorruptProfile { name, reason } => {
                write!(f, "Profile '{name}' is corrupt: {reason}")
            }
            Self::InsufficientCandidates {
                version,
                crop,
                available,
                requested,
                affected_tiles,
            } => {
                write!(
                    f,
                    "Version {version} needs {requested} candidates but tile {crop} has {available} \
                     ({affected_tiles} tile(s) affected)"
                )
            }
            Self::IncompleteGather { profile, skipped } => {
                write!(
                    f,
                    "Profile '{profile}' was saved but {skipped} source image(s) were skipped"
                )
            }
            Self::IncompleteCollage { failed, requested } => {
                write!(f, "{failed} of {requested} collage version(s) failed")
            }
        }
    }
}

impl std::error::Error for CollageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ImageLoad { source, .. } | Self::ImageExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } | Self::ProfileRestoreFailed { source, .. } => {
                Some(source)
            }
            Self::Serialization { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for collage results
pub type Result<T> = std::result::Result<T, CollageError>;

/// Attaches the path and operation to errors raised without one
pub trait WithPath<T> {
    /// Record the path and operation on path-carrying errors
    ///
    /// # Errors
    ///
    /// Propagates the original error with the path applied
    fn with_path(self, path: impl AsRef<Path>, operation: &'static str) -> Result<T>;
}

impl<T, E> WithPath<T> for std::result::Result<T, E>
where
    E: Into<CollageError>,
{
    fn with_path(self, path: impl AsRef<Path>, operation: &'static str) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();
            let target = path.as_ref().to_path_buf();
            // Only errors created through `From` lack a real location
            match &mut error {
                CollageError::FileSystem {
                    path, operation: op, ..
                }
                | CollageError::Serialization {
                    path, operation: op, ..
                } => {
                    *path = target;
                    *op = operation;
                }
                CollageError::ImageLoad { path, .. } | CollageError::ImageExport { path, .. } => {
                    *path = target;
                }
                _ => {}
            }
            error
        })
    }
}

impl From<image::ImageError> for CollageError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageLoad {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<std::io::Error> for CollageError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

impl From<bincode::Error> for CollageError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> CollageError {
    CollageError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a corrupt profile error
pub fn corrupt_profile(name: &str, reason: &impl ToString) -> CollageError {
    CollageError::CorruptProfile {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Create an index error
pub fn index_error(reason: &impl ToString) -> CollageError {
    CollageError::Index {
        reason: reason.to_string(),
    }
}
