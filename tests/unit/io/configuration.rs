//! Tests for configuration defaults and derived paths

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use tilecollage::io::configuration::{
        CollageConfig, DEFAULT_CROP_HEIGHT, DEFAULT_CROP_INCREMENT, DEFAULT_CROP_WIDTH, EF_SEARCH,
        LAYER_COUNT, MAX_CONNECTIONS, SAMPLE_HEIGHT, SAMPLE_WIDTH,
    };

    // Tests the documented defaults used by gather
    // Verified by changing the default increment
    #[test]
    fn test_default_constants() {
        assert_eq!((DEFAULT_CROP_WIDTH, DEFAULT_CROP_HEIGHT), (40, 40));
        assert_eq!(DEFAULT_CROP_INCREMENT, 20);
        assert_eq!((SAMPLE_WIDTH, SAMPLE_HEIGHT), (10, 10));
        assert_eq!(LAYER_COUNT, 16);
        assert_eq!(MAX_CONNECTIONS, 32);
        assert!(EF_SEARCH >= MAX_CONNECTIONS);
    }

    // Tests the default configuration validates and uses the default directories
    // Verified by swapping profiles and output directories
    #[test]
    fn test_default_config() {
        let config = CollageConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.profiles_dir, PathBuf::from("profiles"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.feature_extractor().map(|e| e.dimension()).ok(), Some(100));
    }

    // Tests zero counts are rejected
    // Verified by skipping the search breadth check
    #[test]
    fn test_validate_rejects_zero_values() {
        let no_layers = CollageConfig {
            layer_count: 0,
            ..CollageConfig::default()
        };
        let no_breadth = CollageConfig {
            ef_search: 0,
            ..CollageConfig::default()
        };
        let no_samples = CollageConfig {
            sample_width: 0,
            ..CollageConfig::default()
        };

        assert!(no_layers.validate().is_err());
        assert!(no_breadth.validate().is_err());
        assert!(no_samples.validate().is_err());
    }

    // Tests derived profile, artifact and output paths
    // Verified by using the version index offset by one
    #[test]
    fn test_derived_paths() {
        let config = CollageConfig::with_directories("/data/profiles", "/data/out");

        assert_eq!(config.profile_dir("sea"), PathBuf::from("/data/profiles/sea"));
        assert_eq!(config.output_path(0), PathBuf::from("/data/out/0.png"));
        assert_eq!(config.output_path(12), PathBuf::from("/data/out/12.png"));
        assert_eq!(
            CollageConfig::artifact_path(Path::new("/data/profiles/sea"), "sea", "tree"),
            PathBuf::from("/data/profiles/sea/sea.tree")
        );
    }
}
