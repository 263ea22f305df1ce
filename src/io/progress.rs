//! Progress display for gathering profiles and synthesizing collages

use crate::io::configuration::{MAX_INDIVIDUAL_PROGRESS_BARS, PROGRESS_BAR_WIDTH};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::LazyLock;
use std::time::Duration;

static SOURCE_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template(&format!(
            "[{{elapsed_precise}}] Sources: [{{bar:{PROGRESS_BAR_WIDTH}.cyan/blue}}] {{pos}}/{{len}} {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
});

static VERSION_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:30.cyan/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
});

static BATCH_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] Versions: [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
});

static SPINNER_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_spinner()
        .template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
});

/// Coordinates progress display for gather and create runs
///
/// Collage runs get one bar per version for small version counts and a
/// single batch bar otherwise.
pub struct ProgressManager {
    multi_progress: MultiProgress,
    batch_bar: Option<ProgressBar>,
    version_bars: Vec<ProgressBar>,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    /// Create a progress manager drawing to the terminal
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            batch_bar: None,
            version_bars: Vec::new(),
        }
    }

    /// Create a progress manager that draws nothing
    pub fn hidden() -> Self {
        Self {
            multi_progress: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            batch_bar: None,
            version_bars: Vec::new(),
        }
    }

    /// Add a bar counting processed source images
    ///
    /// The returned handle is cheap to clone and safe to advance from worker
    /// threads.
    pub fn begin_sources(&mut self, source_count: usize) -> ProgressBar {
        let bar = ProgressBar::new(source_count as u64);
        bar.set_style(SOURCE_STYLE.clone());
        self.multi_progress.add(bar)
    }

    /// Add a spinner shown while the neighbor graph is built
    pub fn begin_indexing(&mut self, item_count: usize) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(SPINNER_STYLE.clone());
        spinner.set_message(format!("linking {item_count} tiles into the index"));
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.multi_progress.add(spinner)
    }

    /// Prepare bars for `version_count` collage versions of `tile_count` tiles each
    pub fn begin_versions(&mut self, version_count: usize, tile_count: usize) {
        // Switch to batch mode for large version sets to avoid terminal spam
        if version_count > MAX_INDIVIDUAL_PROGRESS_BARS {
            let batch_bar = ProgressBar::new(version_count as u64);
            batch_bar.set_style(BATCH_STYLE.clone());
            self.batch_bar = Some(self.multi_progress.add(batch_bar));
            return;
        }

        for version in 0..version_count {
            let bar = ProgressBar::new(tile_count as u64);
            bar.set_style(VERSION_STYLE.clone());
            bar.set_prefix(format!("version {version}"));
            self.version_bars.push(self.multi_progress.add(bar));
        }
    }

    /// Report tiles pasted into a version
    pub fn advance_version(&self, version: usize, tiles: u64) {
        if let Some(bar) = self.version_bars.get(version) {
            bar.inc(tiles);
            if let Some(total) = bar.length() {
                bar.set_message(format!("{}/{total}", bar.position()));
            }
        }
    }

    /// Mark a version as finished
    pub fn complete_version(&self, version: usize, succeeded: bool) {
        if let Some(ref batch_bar) = self.batch_bar {
            batch_bar.inc(1);
        }

        if let Some(bar) = self.version_bars.get(version) {
            let mark = if succeeded { "✓" } else { "✗" };
            bar.set_prefix(format!("{mark} version {version}"));
            bar.finish();
        }
    }

    /// Clean up all progress displays
    pub fn finish(&self) {
        if let Some(ref batch_bar) = self.batch_bar {
            batch_bar.finish_with_message("All versions processed");
        }
        let _ = self.multi_progress.clear();
    }
}
