//! CLI entry point for gathering tile profiles and creating collages

use clap::Parser;
use log::error;
use std::process::ExitCode;
use tilecollage::io::cli::{Cli, CommandRunner};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let runner = CommandRunner::new(cli);
    match runner.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
