/// Command-line parsing and command dispatch
pub mod cli;
/// Pipeline constants and runtime configuration
pub mod configuration;
/// Error type shared by the whole crate
pub mod error;
/// Image decode, crop, paste and export
pub mod image;
/// Terminal progress bars
pub mod progress;
