//! Tests for listing stored profiles

#[cfg(test)]
mod tests {
    use crate::{gradient_image, write_png};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use tilecollage::algorithm::builder::{GatherRequest, ProfileBuilder};
    use tilecollage::io::configuration::CollageConfig;
    use tilecollage::io::progress::ProgressManager;
    use tilecollage::profile::registry::{ProfileRegistry, ProfileSummary};

    fn config(root: &Path) -> CollageConfig {
        CollageConfig::with_directories(root.join("profiles"), root.join("output"))
    }

    fn gather(root: &Path, name: &str, tile: u32) {
        let sources = root.join(format!("src-{name}"));
        fs::create_dir_all(&sources).expect("create sources");
        write_png(&sources, "a.png", &gradient_image(100, 100, 0));

        let builder: ProfileBuilder = ProfileBuilder::new(config(root)).expect("builder");
        let mut request = GatherRequest::new(name, &sources);
        request.tile_width = tile;
        request.tile_height = tile;
        builder
            .build(&request, &mut ProgressManager::hidden())
            .expect("gather succeeds");
    }

    // Tests a missing profiles root lists nothing
    // Verified by propagating the NotFound error
    #[test]
    fn test_missing_root_is_empty() {
        let root = TempDir::new().expect("temp dir");
        let registry: ProfileRegistry = ProfileRegistry::new(&config(root.path()));

        let listing = registry.list_profiles().expect("listing");
        assert!(listing.profiles.is_empty());
        assert!(listing.skipped.is_empty());
    }

    // Tests profiles are summarized from metadata and sorted by name
    // Verified by listing in directory order
    #[test]
    fn test_lists_sorted_summaries() {
        let root = TempDir::new().expect("temp dir");
        gather(root.path(), "zebra", 40);
        gather(root.path(), "apple", 50);

        let registry: ProfileRegistry = ProfileRegistry::new(&config(root.path()));
        let listing = registry.list_profiles().expect("listing");

        assert_eq!(
            listing.profiles,
            vec![
                ProfileSummary {
                    name: "apple".to_string(),
                    total_items: 9,
                    tile_width: 50,
                    tile_height: 50,
                },
                ProfileSummary {
                    name: "zebra".to_string(),
                    total_items: 16,
                    tile_width: 40,
                    tile_height: 40,
                },
            ]
        );
    }

    // Tests unreadable entries are skipped and hidden entries and files ignored
    // Verified by aborting the listing on the first unreadable profile
    #[test]
    fn test_skips_broken_and_hidden_entries() {
        let root = TempDir::new().expect("temp dir");
        gather(root.path(), "good", 40);
        let profiles = root.path().join("profiles");
        fs::create_dir(profiles.join("empty")).expect("empty profile dir");
        fs::create_dir(profiles.join("garbled")).expect("garbled profile dir");
        fs::write(profiles.join("garbled/garbled.meta"), b"\x01\x02").expect("garbled meta");
        fs::create_dir(profiles.join(".good.staging.abcd")).expect("staging dir");
        fs::write(profiles.join("notes.txt"), "not a profile").expect("stray file");

        let registry: ProfileRegistry = ProfileRegistry::new(&config(root.path()));
        let listing = registry.list_profiles().expect("listing");

        let names: Vec<&str> = listing.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
        let skipped: Vec<&str> = listing.skipped.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["empty", "garbled"]);
    }
}
