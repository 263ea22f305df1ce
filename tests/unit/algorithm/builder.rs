//! Tests for gathering source images into profiles

#[cfg(test)]
mod tests {
    use crate::{gradient_image, solid_image, write_png};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tilecollage::CollageError;
    use tilecollage::algorithm::builder::{
        BuildReport, GatherRequest, ProfileBuilder, collect_source_files,
    };
    use tilecollage::analysis::features::FeatureVector;
    use tilecollage::index::{HnswIndex, NeighborIndex, Neighbors};
    use tilecollage::io::configuration::CollageConfig;
    use tilecollage::io::error::index_error;
    use tilecollage::io::progress::ProgressManager;
    use tilecollage::profile::store::{Profile, ProfileStore};

    fn config(root: &Path) -> CollageConfig {
        CollageConfig::with_directories(root.join("profiles"), root.join("output"))
    }

    fn source_folder(root: &Path, images: &[(&str, u32, u8)]) -> PathBuf {
        let folder = root.join("sources");
        fs::create_dir_all(&folder).expect("create sources");
        for &(name, size, shift) in images {
            write_png(&folder, name, &gradient_image(size, size, shift));
        }
        folder
    }

    fn build(root: &Path, request: &GatherRequest) -> tilecollage::Result<BuildReport> {
        let builder: ProfileBuilder = ProfileBuilder::new(config(root))?;
        builder.build(request, &mut ProgressManager::hidden())
    }

    // Tests three 100x100 sources yield 48 items in one metadata record
    // Verified by resetting ids per source image
    #[test]
    fn test_gather_three_sources() {
        let root = TempDir::new().expect("temp dir");
        let folder = source_folder(
            root.path(),
            &[("a.png", 100, 0), ("b.png", 100, 80), ("c.png", 100, 160)],
        );

        let report = build(root.path(), &GatherRequest::new("trio", &folder)).expect("gather");

        assert!(report.is_complete());
        assert_eq!(report.metadata.total_items, 48);
        assert_eq!(report.sources.len(), 3);
        assert!(report.sources.iter().all(|s| s.tiles == 16));
        assert_eq!(
            report.sources.iter().map(|s| s.first_id).collect::<Vec<_>>(),
            vec![0, 16, 32]
        );

        let store: ProfileStore = ProfileStore::new(root.path().join("profiles"));
        let profile: Profile = store.load("trio").expect("load");
        assert_eq!(profile.len(), 48);
        assert_eq!(profile.index().len(), 48);
        for name in ["a.png", "b.png", "c.png"] {
            assert!(profile.dir().join("images").join(name).is_file());
        }
    }

    // Tests the item at each id is the tile that produced vector id
    // Verified by inserting vectors in reverse tile order
    #[test]
    fn test_item_ids_match_vectors() {
        let root = TempDir::new().expect("temp dir");
        let folder = source_folder(root.path(), &[("a.png", 100, 0), ("b.png", 80, 90)]);
        build(root.path(), &GatherRequest::new("match", &folder)).expect("gather");

        let store: ProfileStore = ProfileStore::new(root.path().join("profiles"));
        let profile: Profile = store.load("match").expect("load");
        let extractor = CollageConfig::default().feature_extractor().expect("extractor");

        let vector_of = |id: usize| {
            let item = profile.item(id).expect("item for id");
            let source =
                tilecollage::io::image::open_rgba(&profile.source_path(item)).expect("source");
            extractor.extract_region(&source, item.crop).expect("region")
        };
        for (id, _) in profile.items() {
            let vector = vector_of(id);
            let hit = profile
                .index()
                .query(&vector, 1)
                .expect("query")
                .rank(0)
                .expect("nearest id");
            assert_eq!(vector_of(hit), vector, "item {id} answered by item {hit}");
        }
    }

    // Tests undersized and undecodable images are skipped while the rest is kept
    // Verified by aborting the gather on the first bad image
    #[test]
    fn test_bad_sources_are_skipped() {
        let root = TempDir::new().expect("temp dir");
        let folder = source_folder(root.path(), &[("good.png", 100, 0), ("small.png", 30, 0)]);
        fs::write(folder.join("readme.txt"), "not an image").expect("write text");

        let report = build(root.path(), &GatherRequest::new("partial", &folder)).expect("gather");

        assert_eq!(report.metadata.total_items, 16);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().any(|s| matches!(s.error, CollageError::TileTooLarge { .. })));
        assert!(report.skipped.iter().any(|s| matches!(s.error, CollageError::UnsupportedImageFormat { .. })));
        assert!(!report.dir.join("images/small.png").exists());
        assert!(matches!(
            report.into_result(),
            Err(CollageError::IncompleteGather { skipped: 2, .. })
        ));
    }

    // Tests a folder without usable images fails and publishes nothing
    // Verified by publishing an empty profile
    #[test]
    fn test_no_usable_sources() {
        let root = TempDir::new().expect("temp dir");
        let empty = root.path().join("empty");
        fs::create_dir(&empty).expect("create empty");
        let folder = source_folder(root.path(), &[("tiny.png", 20, 0)]);

        assert!(matches!(
            build(root.path(), &GatherRequest::new("none", &empty)),
            Err(CollageError::NoSourceImages { .. })
        ));
        assert!(matches!(
            build(root.path(), &GatherRequest::new("none", &folder)),
            Err(CollageError::NoSourceImages { .. })
        ));
        assert!(!root.path().join("profiles/none").exists());
    }

    // Tests an existing profile is kept unless overwrite is requested
    // Verified by checking for existence only at publish time
    #[test]
    fn test_existing_profile_requires_overwrite() {
        let root = TempDir::new().expect("temp dir");
        let folder = source_folder(root.path(), &[("a.png", 100, 0)]);
        build(root.path(), &GatherRequest::new("dup", &folder)).expect("first gather");

        assert!(matches!(
            build(root.path(), &GatherRequest::new("dup", &folder)),
            Err(CollageError::ProfileAlreadyExists { .. })
        ));

        let mut request = GatherRequest::new("dup", &folder);
        request.overwrite = true;
        request.step = 40;
        let report = build(root.path(), &request).expect("overwrite");
        assert_eq!(report.metadata.total_items, 4);
    }

    // Tests invalid tiling parameters and names are rejected before any work
    // Verified by defaulting a zero increment to the tile width
    #[test]
    fn test_invalid_request() {
        let root = TempDir::new().expect("temp dir");
        let folder = source_folder(root.path(), &[("a.png", 100, 0)]);

        let mut request = GatherRequest::new("bad", &folder);
        request.step = 0;
        assert!(matches!(
            build(root.path(), &request),
            Err(CollageError::InvalidParameter { parameter: "increment", .. })
        ));
        assert!(build(root.path(), &GatherRequest::new("../escape", &folder)).is_err());
        assert!(build(root.path(), &GatherRequest::new("x", root.path().join("missing"))).is_err());
    }

    // Tests identical sources gathered twice produce identical items
    // Verified by assigning ids in completion order of the parallel workers
    #[test]
    fn test_gather_items_are_reproducible() {
        let first = TempDir::new().expect("temp dir");
        let second = TempDir::new().expect("temp dir");
        for root in [&first, &second] {
            let folder = source_folder(root.path(), &[("a.png", 100, 0), ("b.png", 100, 99)]);
            build(root.path(), &GatherRequest::new("same", &folder)).expect("gather");
        }

        let load = |root: &TempDir| -> Profile {
            ProfileStore::new(root.path().join("profiles"))
                .load("same")
                .expect("load")
        };
        let (a, b) = (load(&first), load(&second));
        assert_eq!(a.metadata(), b.metadata());
        assert!(a.items().eq(b.items()));
    }

    #[derive(Debug)]
    struct UnsavableIndex(HnswIndex);

    impl NeighborIndex for UnsavableIndex {
        fn empty(dimension: usize, config: &CollageConfig) -> tilecollage::Result<Self> {
            HnswIndex::empty(dimension, config).map(Self)
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn is_built(&self) -> bool {
            self.0.is_built()
        }

        fn insert(&mut self, id: usize, vector: &FeatureVector) -> tilecollage::Result<()> {
            self.0.insert(id, vector)
        }

        fn build(&mut self, layer_count: usize) -> tilecollage::Result<()> {
            self.0.build(layer_count)
        }

        fn save(&self, _path: &Path) -> tilecollage::Result<()> {
            Err(index_error(&"volume is read-only"))
        }

        fn load(path: &Path, dimension: usize) -> tilecollage::Result<Self> {
            HnswIndex::load(path, dimension).map(Self)
        }

        fn query(&self, vector: &FeatureVector, k: usize) -> tilecollage::Result<Neighbors> {
            self.0.query(vector, k)
        }
    }

    fn build_unsavable(root: &Path, request: &GatherRequest) -> tilecollage::Result<BuildReport> {
        let builder: ProfileBuilder<UnsavableIndex> = ProfileBuilder::new(config(root))?;
        builder.build(request, &mut ProgressManager::hidden())
    }

    fn staging_entries(root: &Path) -> Vec<String> {
        fs::read_dir(root.join("profiles"))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|name| name.contains(".staging."))
                    .collect()
            })
            .unwrap_or_default()
    }

    // Tests a write failure after sources were copied leaves no profile and no staging directory
    // Verified by publishing before writing the index
    #[test]
    fn test_failed_write_leaves_nothing() {
        let root = TempDir::new().expect("temp dir");
        let folder = source_folder(root.path(), &[("a.png", 100, 0), ("b.png", 100, 50)]);

        let result = build_unsavable(root.path(), &GatherRequest::new("lost", &folder));

        assert!(matches!(result, Err(CollageError::Index { .. })));
        assert!(!root.path().join("profiles/lost").exists());
        assert!(staging_entries(root.path()).is_empty());
    }

    // Tests a failed overwrite leaves the previous profile loadable
    // Verified by removing the old profile before staging the new one
    #[test]
    fn test_failed_overwrite_keeps_previous_profile() {
        let root = TempDir::new().expect("temp dir");
        let folder = source_folder(root.path(), &[("a.png", 100, 0)]);
        build(root.path(), &GatherRequest::new("keep", &folder)).expect("first gather");

        let mut request = GatherRequest::new("keep", &folder);
        request.overwrite = true;
        request.step = 40;
        assert!(build_unsavable(root.path(), &request).is_err());

        let store: ProfileStore = ProfileStore::new(root.path().join("profiles"));
        let profile: Profile = store.load("keep").expect("previous profile");
        assert_eq!(profile.len(), 16);
        assert!(staging_entries(root.path()).is_empty());
    }

    // Tests source discovery lists only regular files in name order
    // Verified by returning files in directory order
    #[test]
    fn test_collect_source_files_sorted() {
        let root = TempDir::new().expect("temp dir");
        write_png(root.path(), "b.png", &solid_image(4, 4, 0));
        write_png(root.path(), "a.png", &solid_image(4, 4, 0));
        fs::create_dir(root.path().join("nested")).expect("nested dir");

        let files = collect_source_files(root.path()).expect("list");
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }
}
