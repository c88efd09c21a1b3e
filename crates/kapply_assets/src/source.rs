//! Asset sources backing template resolution.
//!
//! An [`AssetSource`] resolves a named template to its raw content. Two
//! implementations are provided: [`MemorySource`] for assets held in an
//! in-memory map (useful for embedding manifests in a binary and for
//! tests) and [`DirSource`] for assets stored as files under a root
//! directory. Callers select one by dependency injection; nothing in the
//! pipeline cares which backs the trait.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{AssetError, AssetResult};

/// Resolves named template assets to raw bytes.
pub trait AssetSource: Send + Sync {
    /// Read the content of a named asset.
    fn read(&self, name: &str) -> AssetResult<Vec<u8>>;

    /// List all asset names, sorted.
    fn names(&self) -> Vec<String>;

    /// List all asset names except those in `excluded`, sorted.
    fn names_excluding(&self, excluded: &[&str]) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|n| !excluded.contains(&n.as_str()))
            .collect()
    }
}

/// Asset source backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    assets: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty in-memory source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset, replacing any previous content under the same name.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.assets.insert(name.into(), content.into());
    }

    /// Consuming variant of [`insert`](Self::insert) for map-literal style setup.
    pub fn with_asset(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }
}

impl AssetSource for MemorySource {
    fn read(&self, name: &str) -> AssetResult<Vec<u8>> {
        self.assets
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }
}

/// Asset source backed by a directory tree.
///
/// Asset names are slash-separated paths relative to the root.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirSource {
    fn read(&self, name: &str) -> AssetResult<Vec<u8>> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(AssetError::NotFound(name.to_string()));
        }
        debug!("Reading asset {:?}", path);
        Ok(std::fs::read(path)?)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reads_content() {
        let source = MemorySource::new().with_asset("file1", "file1content");
        assert_eq!(source.read("file1").unwrap(), b"file1content");
    }

    #[test]
    fn memory_source_missing_asset_errors() {
        let source = MemorySource::new();
        let err = source.read("absent").unwrap_err();
        assert!(matches!(err, AssetError::NotFound(name) if name == "absent"));
    }

    #[test]
    fn memory_source_names_are_sorted() {
        let source = MemorySource::new()
            .with_asset("file2", "b")
            .with_asset("file1", "a");
        assert_eq!(source.names(), vec!["file1", "file2"]);
    }

    #[test]
    fn names_excluding_filters_exact_matches() {
        let source = MemorySource::new()
            .with_asset("file1", "a")
            .with_asset("file2", "b");
        assert_eq!(source.names_excluding(&["file2"]), vec!["file1"]);
    }

    #[test]
    fn dir_source_lists_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("top.yaml"), "a: 1").unwrap();
        std::fs::write(dir.path().join("sub/nested.yaml"), "b: 2").unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(source.names(), vec!["sub/nested.yaml", "top.yaml"]);
        assert_eq!(source.read("sub/nested.yaml").unwrap(), b"b: 2");
    }

    #[test]
    fn dir_source_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirSource::new(dir.path());
        assert!(matches!(
            source.read("nope.yaml"),
            Err(AssetError::NotFound(_))
        ));
    }
}
