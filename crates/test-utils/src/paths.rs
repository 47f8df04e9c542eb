//! Locating optional test data.

use std::path::PathBuf;

/// Environment variable pointing at a directory of real model files.
pub const TEST_DATA_ENV: &str = "SYNSAT_TEST_DATA_DIR";

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Search `SYNSAT_TEST_DATA_DIR`, then the workspace `testdata/`.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(dir) = std::env::var(TEST_DATA_ENV) {
        candidates.push(PathBuf::from(dir).join(name));
    }
    candidates.push(workspace_root().join("testdata").join(name));

    candidates.into_iter().find(|p| p.exists())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("synsat_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(root.join("Cargo.toml").exists(), "no Cargo.toml in {:?}", root);
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(find_test_file("definitely-not-here-7f3a.nc").is_none());
    }

    #[test]
    fn test_temp_test_dir() {
        let dir = temp_test_dir();
        assert!(dir.path().exists());
    }
}
