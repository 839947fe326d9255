//! Path-keyed cache of precomputed responses.

use crate::path::{absolute_path, parent_path};
use crate::response::CachedResponse;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Name of the synthetic per-directory index entry.
pub const INDEX_NAME: &str = "index";

/// Responses keyed by absolute, lexically normalized filesystem path.
///
/// Every operation is a single map access; there is no lock spanning several
/// of them, so a reader may observe a subtree halfway through a rebuild.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<PathBuf, CachedResponse>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<CachedResponse> {
        self.entries.get(path).map(|entry| entry.value().clone())
    }

    pub fn set(&self, path: impl Into<PathBuf>, response: CachedResponse) {
        let path = path.into();
        tracing::trace!(path = %path.display(), %response, "cache set");
        self.entries.insert(path, response);
    }

    pub fn remove(&self, path: &Path) -> Option<CachedResponse> {
        self.entries.remove(path).map(|(_, response)| response)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge the entry for `rel` under `root` and every ancestor up to the
    /// filesystem root, along with each of their index pages.
    ///
    /// Returns how many entries were removed. Calling it again is a no-op.
    pub fn invalidate(&self, root: &Path, rel: &str) -> usize {
        let mut path = absolute_path(root, rel);
        let mut removed = 0;

        loop {
            removed += usize::from(self.remove(&path).is_some());
            removed += usize::from(self.remove(&path.join(INDEX_NAME)).is_some());

            let parent = parent_path(&path);
            if parent == path {
                break;
            }
            path = parent;
        }

        tracing::debug!(root = %root.display(), rel, removed, "invalidated");
        removed
    }

    /// All entries, sorted by path.
    pub fn snapshot(&self) -> Vec<(PathBuf, CachedResponse)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
