/// Profile construction from a folder of source images
pub mod builder;
/// Collage rendering from a loaded profile
pub mod synthesizer;
