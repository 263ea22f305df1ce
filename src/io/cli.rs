//! Command-line interface for gathering profiles, creating collages and
//! listing stored profiles

use crate::algorithm::builder::{BuildReport, GatherRequest, ProfileBuilder};
use crate::algorithm::synthesizer::{CollageReport, CollageSynthesizer};
use crate::io::configuration::{
    CollageConfig, DEFAULT_CROP_HEIGHT, DEFAULT_CROP_INCREMENT, DEFAULT_CROP_WIDTH,
    DEFAULT_VERSION_COUNT, INPUT_DIRECTORY, OUTPUT_DIRECTORY, PROFILES_DIRECTORY,
};
use crate::io::error::Result;
use crate::io::image::open_rgba;
use crate::io::progress::ProgressManager;
use crate::profile::registry::{ProfileRegistry, RegistryListing};
use crate::profile::store::{Profile, ProfileStore};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tilecollage")]
#[command(
    author,
    version,
    about = "Rebuild images as collages of similar tiles from a gathered profile"
)]
/// Command-line arguments for the collage tool
pub struct Cli {
    /// Directory holding one subdirectory per profile
    #[arg(long, global = true, value_name = "DIR", default_value = PROFILES_DIRECTORY)]
    pub profiles_dir: PathBuf,

    /// Directory receiving collage versions
    #[arg(long, global = true, value_name = "DIR", default_value = OUTPUT_DIRECTORY)]
    pub output_dir: PathBuf,

    /// Suppress progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level operations
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Tile a folder of images into a new profile
    Gather(GatherArgs),
    /// Rebuild a target image from a profile's tiles
    Create(CreateArgs),
    /// Show stored profiles
    List,
}

/// Arguments of the `gather` command
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct GatherArgs {
    /// Name of the profile to create
    #[arg(short, long)]
    pub name: String,

    /// Folder of source images
    #[arg(short, long, default_value = INPUT_DIRECTORY)]
    pub folder: PathBuf,

    /// Tile width in pixels
    #[arg(short, long, default_value_t = DEFAULT_CROP_WIDTH)]
    pub width: u32,

    /// Tile height in pixels
    #[arg(short = 'H', long, default_value_t = DEFAULT_CROP_HEIGHT)]
    pub height: u32,

    /// Distance between neighboring tile origins
    #[arg(short, long, default_value_t = DEFAULT_CROP_INCREMENT)]
    pub increment: u32,

    /// Replace an existing profile with the same name
    #[arg(long)]
    pub overwrite: bool,
}

impl GatherArgs {
    /// Builder request described by these arguments
    pub fn request(&self) -> GatherRequest {
        GatherRequest {
            name: self.name.clone(),
            source_folder: self.folder.clone(),
            tile_width: self.width,
            tile_height: self.height,
            step: self.increment,
            overwrite: self.overwrite,
        }
    }
}

/// Arguments of the `create` command
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CreateArgs {
    /// Target image to rebuild
    #[arg(short, long)]
    pub image: PathBuf,

    /// Profile supplying the tiles
    #[arg(short, long)]
    pub profile: String,

    /// Number of versions to produce
    #[arg(short, long, default_value_t = DEFAULT_VERSION_COUNT)]
    pub count: usize,
}

impl Cli {
    /// Check if progress should be displayed
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Runtime configuration assembled from the global options
    pub fn config(&self) -> CollageConfig {
        CollageConfig::with_directories(&self.profiles_dir, &self.output_dir)
    }
}

/// Runs one parsed command against the configured directories
pub struct CommandRunner {
    cli: Cli,
    config: CollageConfig,
}

impl CommandRunner {
    /// Create a runner for the given CLI arguments
    pub fn new(cli: Cli) -> Self {
        let config = cli.config();
        Self { cli, config }
    }

    /// Configuration used by every command
    pub const fn config(&self) -> &CollageConfig {
        &self.config
    }

    /// Run the parsed command and print its summary
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails, if a gather skipped source
    /// images, or if any collage version could not be produced
    pub fn run(&self) -> Result<()> {
        match &self.cli.command {
            Command::Gather(args) => {
                let report = self.gather(args)?;
                Self::print_gather(&report);
                report.into_result().map(|_| ())
            }
            Command::Create(args) => {
                let report = self.create(args)?;
                Self::print_create(&report);
                report.into_result().map(|_| ())
            }
            Command::List => {
                let listing = self.list()?;
                Self::print_listing(&listing);
                Ok(())
            }
        }
    }

    /// Build and publish a profile
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be built or saved
    pub fn gather(&self, args: &GatherArgs) -> Result<BuildReport> {
        let builder: ProfileBuilder = ProfileBuilder::new(self.config.clone())?;
        let mut progress = self.progress();
        builder.build(&args.request(), &mut progress)
    }

    /// Render and save every requested collage version
    ///
    /// # Errors
    ///
    /// Returns an error if the profile or target cannot be loaded, or the
    /// target cannot be planned against the profile
    pub fn create(&self, args: &CreateArgs) -> Result<CollageReport> {
        let store: ProfileStore = ProfileStore::from_config(&self.config);
        let profile: Profile = store.load(&args.profile)?;
        let target = open_rgba(&args.image)?;
        info!(
            "creating {} version(s) of {} from profile '{}'",
            args.count,
            args.image.display(),
            profile.name()
        );

        let synthesizer = CollageSynthesizer::new(self.config.clone())?;
        let mut progress = self.progress();
        let outcomes = synthesizer.synthesize(&target, &profile, args.count, &mut progress)?;
        Ok(synthesizer.write_outputs(outcomes))
    }

    /// Read the summary of every stored profile
    ///
    /// # Errors
    ///
    /// Returns an error if the profiles directory exists but cannot be read
    pub fn list(&self) -> Result<RegistryListing> {
        let registry: ProfileRegistry = ProfileRegistry::new(&self.config);
        registry.list_profiles()
    }

    fn progress(&self) -> ProgressManager {
        if self.cli.should_show_progress() {
            ProgressManager::new()
        } else {
            ProgressManager::hidden()
        }
    }

    // Allow print for command summaries on stdout
    #[allow(clippy::print_stdout)]
    fn print_gather(report: &BuildReport) {
        println!(
            "Profile '{}': {} tiles from {} image(s), {} skipped",
            report.name,
            report.metadata.total_items,
            report.sources.len(),
            report.skipped.len()
        );
    }

    #[allow(clippy::print_stdout)]
    fn print_create(report: &CollageReport) {
        for (version, path) in &report.written {
            println!("Version {version}: {}", path.display());
        }
        for (version, error) in &report.failed {
            println!("Version {version} failed: {error}");
        }
    }

    #[allow(clippy::print_stdout)]
    fn print_listing(listing: &RegistryListing) {
        println!("{:<15} {:<15} {:<8}", "Profile", "Items", "Crop");
        for profile in &listing.profiles {
            println!(
                "{:<15} {:<15} {:<8}",
                profile.name,
                profile.total_items,
                format!("{}x{}", profile.tile_width, profile.tile_height)
            );
        }
    }
}
