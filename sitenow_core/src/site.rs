//! A served root and everything that belongs to it.

use crate::cache::ResponseCache;
use crate::config::SiteConfig;
use crate::content::ContentStore;
use crate::error::Result;
use crate::path::{absolute_path, request_pathname};
use crate::response::CachedResponse;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One served directory: its root, settings, response cache and content store.
///
/// Every engine operation (preprocess, resolve, change handling) is a method
/// on `Site`, so several roots can be served side by side without sharing
/// state.
pub struct Site {
    root: PathBuf,
    config: SiteConfig,
    cache: ResponseCache,
    store: Arc<dyn ContentStore>,
}

impl Site {
    /// Create a site for `root`. Relative roots and excluded paths are made
    /// absolute against the current directory; nothing is read yet.
    pub fn new(
        root: impl AsRef<Path>,
        mut config: SiteConfig,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self> {
        let root = absolute_path(&std::path::absolute(root.as_ref())?, "");
        config.excluded = config
            .excluded
            .iter()
            .map(|path| -> Result<PathBuf> { Ok(absolute_path(&std::path::absolute(path)?, "")) })
            .collect::<Result<_>>()?;
        Ok(Self {
            root,
            config,
            cache: ResponseCache::new(),
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub(crate) fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    /// Whether `path` is, or lies below, an excluded path.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.config.excluded.iter().any(|excluded| path.starts_with(excluded))
    }

    /// Answer a request URI the way a transport binding would.
    pub async fn handle(&self, uri: &str) -> CachedResponse {
        let pathname = request_pathname(&self.config.base_url, uri);
        self.resolve(&pathname).await
    }

    /// Names of the immediate children of `dir`, sorted, minus excluded paths.
    pub(crate) async fn read_children(&self, dir: &Path) -> Result<Vec<String>> {
        let dir = dir.to_path_buf();
        let respect_ignore = self.config.respect_ignore;
        let excluded = self.config.excluded.clone();
        tokio::task::spawn_blocking(move || list_children(&dir, respect_ignore, &excluded)).await?
    }
}

fn list_children(dir: &Path, respect_ignore: bool, excluded: &[PathBuf]) -> Result<Vec<String>> {
    let walker = ignore::WalkBuilder::new(dir)
        .max_depth(Some(1)) // Only immediate children
        .standard_filters(respect_ignore)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut names = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.depth() == 0 || excluded.iter().any(|path| entry.path() == path) {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::testing::RecordingStore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_children_sorted_and_unfiltered() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.txt"), b"b").unwrap();
        fs::write(temp_dir.path().join(".hidden"), b"h").unwrap();
        fs::create_dir(temp_dir.path().join("a")).unwrap();
        fs::write(temp_dir.path().join("a/nested.txt"), b"n").unwrap();

        let names = list_children(temp_dir.path(), false, &[]).unwrap();
        assert_eq!(names, vec![".hidden", "a", "b.txt"]);
    }

    #[test]
    fn test_list_children_respects_ignore_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".ignore"), b"secret.txt\n").unwrap();
        fs::write(temp_dir.path().join("secret.txt"), b"s").unwrap();
        fs::write(temp_dir.path().join("public.txt"), b"p").unwrap();

        let names = list_children(temp_dir.path(), true, &[]).unwrap();
        assert_eq!(names, vec!["public.txt"]);
    }

    #[test]
    fn test_list_children_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_children(&temp_dir.path().join("missing"), false, &[]).is_err());
    }

    #[test]
    fn test_new_normalizes_root() {
        let temp_dir = TempDir::new().unwrap();
        let dotted = temp_dir.path().join("x").join("..");
        let site = Site::new(
            &dotted,
            SiteConfig::default(),
            Arc::new(RecordingStore::default()),
        )
        .unwrap();
        assert_eq!(site.root(), temp_dir.path());
    }

    #[test]
    fn test_list_children_skips_excluded() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join(".sitenow-store")).unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"a").unwrap();

        let excluded = vec![temp_dir.path().join(".sitenow-store")];
        let names = list_children(temp_dir.path(), false, &excluded).unwrap();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[test]
    fn test_excluded_paths_are_normalized() {
        let temp_dir = TempDir::new().unwrap();
        let config = SiteConfig::default().with_excluded(temp_dir.path().join("x/../store"));
        let site = Site::new(temp_dir.path(), config, Arc::new(RecordingStore::default())).unwrap();

        let store = temp_dir.path().join("store");
        assert_eq!(site.config().excluded, vec![store.clone()]);
        assert!(site.is_excluded(&store));
        assert!(site.is_excluded(&store.join("objects/blake3-256/ab")));
        assert!(!site.is_excluded(&temp_dir.path().join("store.txt")));
        assert!(!site.is_excluded(site.root()));
    }
}
