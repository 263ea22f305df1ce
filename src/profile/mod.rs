//! Profile persistence and discovery

/// Listing of stored profiles
pub mod registry;
/// Durable pairing of the vector index with tile metadata
pub mod store;

pub use registry::{ProfileRegistry, ProfileSummary, RegistryListing, SkippedProfile};
pub use store::{Item, Profile, ProfileMetadata, ProfileStore, StagedProfile};
