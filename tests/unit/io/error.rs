//! Tests for error types including source chaining and message formatting

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::PathBuf;
    use tilecollage::CollageError;
    use tilecollage::io::error::{WithPath, corrupt_profile, invalid_parameter};
    use tilecollage::spatial::grid::CropBox;

    // Tests error source chaining works correctly
    // Verified by breaking source chain
    #[test]
    fn test_error_source_chain() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = CollageError::FileSystem {
            path: "/tmp/profile.meta".into(),
            operation: "read",
            source: io_error,
        };

        assert!(error.source().is_some());
        assert!(corrupt_profile("p", &"bad").source().is_none());
    }

    // Tests a failed restore names where the previous profile was left
    // Verified by dropping the io error from the source chain
    #[test]
    fn test_profile_restore_failed_message() {
        let error = CollageError::ProfileRestoreFailed {
            name: "beach".to_string(),
            parked: PathBuf::from("profiles/.beach.retired.x1/beach"),
            source: std::io::Error::other("device removed"),
        };

        let message = error.to_string();
        assert!(message.contains("'beach'"));
        assert!(message.contains("profiles/.beach.retired.x1/beach"));
        assert!(message.contains("device removed"));
        assert!(error.source().is_some());
    }

    // Tests InsufficientCandidates names the version, tile and counts
    // Verified by omitting the crop from the message
    #[test]
    fn test_insufficient_candidates_message() {
        let error = CollageError::InsufficientCandidates {
            version: 3,
            crop: CropBox::from_origin(40, 80, 40, 40),
            available: 2,
            requested: 4,
            affected_tiles: 25,
        };

        let message = error.to_string();
        assert!(message.contains("Version 3"));
        assert!(message.contains("(40, 80, 80, 120)"));
        assert!(message.contains("has 2"));
        assert!(message.contains("25 tile(s)"));
    }

    // Tests InvalidParameter error contains all fields
    // Verified by omitting value from message
    #[test]
    fn test_invalid_parameter_error() {
        let error = invalid_parameter("increment", &0, &"must be positive");

        let message = error.to_string();
        assert!(message.contains("increment"));
        assert!(message.contains('0'));
        assert!(message.contains("must be positive"));
    }

    // Tests profile errors carry the profile name and location
    // Verified by dropping the path from ProfileNotFound
    #[test]
    fn test_profile_error_context() {
        let missing = CollageError::ProfileNotFound {
            name: "forest".to_string(),
            path: PathBuf::from("profiles/forest"),
        };
        let exists = CollageError::ProfileAlreadyExists {
            name: "forest".to_string(),
            path: PathBuf::from("profiles/forest"),
        };

        assert!(missing.to_string().contains("'forest'"));
        assert!(missing.to_string().contains("profiles/forest"));
        assert!(exists.to_string().contains("already exists"));
    }

    // Tests with_path replaces the placeholder location of converted errors
    // Verified by leaving the operation unchanged
    #[test]
    fn test_with_path_fills_location() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let error = result
            .with_path("profiles/a/a.tree", "open index file")
            .expect_err("error is kept");

        match error {
            CollageError::FileSystem {
                path, operation, ..
            } => {
                assert_eq!(path, PathBuf::from("profiles/a/a.tree"));
                assert_eq!(operation, "open index file");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    // Tests the summary errors report their counts
    // Verified by swapping failed and requested in the message
    #[test]
    fn test_incomplete_run_messages() {
        let gather = CollageError::IncompleteGather {
            profile: "beach".to_string(),
            skipped: 2,
        };
        let collage = CollageError::IncompleteCollage {
            failed: 1,
            requested: 3,
        };

        assert!(gather.to_string().contains("2 source image(s)"));
        assert_eq!(collage.to_string(), "1 of 3 collage version(s) failed");
    }

    // Tests TileTooLarge reports both sizes
    // Verified by printing the tile size twice
    #[test]
    fn test_tile_too_large_message() {
        let error = CollageError::TileTooLarge {
            path: PathBuf::from("input_images/small.png"),
            image_size: (30, 20),
            tile_size: (40, 40),
        };

        let message = error.to_string();
        assert!(message.contains("30x20"));
        assert!(message.contains("40x40"));
        assert!(message.contains("small.png"));
    }
}
