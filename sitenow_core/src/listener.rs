//! Cache invalidation driven by filesystem change events.

use crate::error::Result;
use crate::hash::Fingerprint;
use crate::path::relative_path;
use crate::site::Site;
use crate::watch::FileWatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

impl Site {
    /// React to a change of the file at absolute path `file`.
    ///
    /// Changes under an excluded path are ignored. Otherwise purges the
    /// file's entry and all its ancestors, then starts a rebuild of that
    /// subtree in the background. Changes outside the served root are only
    /// purged. The returned handle is for callers that want to wait on
    /// the rebuild; dropping it leaves the rebuild running.
    pub fn handle_change(self: &Arc<Self>, file: &Path) -> Option<JoinHandle<Option<Fingerprint>>> {
        if self.is_excluded(file) {
            tracing::trace!(path = %file.display(), "change in excluded path");
            return None;
        }

        let rel = relative_path(self.root(), file);
        self.cache().invalidate(self.root(), &rel);

        if escapes_root(&rel) {
            tracing::debug!(path = %file.display(), "change outside served root");
            return None;
        }

        let site = Arc::clone(self);
        Some(tokio::spawn(async move {
            let fingerprint = site.preprocess(&rel).await;
            tracing::debug!(rel, "rebuilt");
            fingerprint
        }))
    }
}

impl Site {
    /// Start watching the root, spawn the listener, then preprocess the whole
    /// tree.
    ///
    /// Events raised while preprocessing runs are buffered and handled after,
    /// so a file rewritten during boot does not keep its first fingerprint.
    /// Watching stops when the returned [`FileWatcher`] is dropped.
    pub async fn boot(self: &Arc<Self>) -> Result<(FileWatcher, JoinHandle<usize>)> {
        let (watcher, events) = FileWatcher::new(self.root())?;
        let listener = InvalidationListener::new(Arc::clone(self), events).spawn();
        self.preprocess_all().await;
        Ok((watcher, listener))
    }
}

fn escapes_root(rel: &str) -> bool {
    rel == ".." || rel.starts_with("../")
}

/// Consumes change events for one site until the sending side closes.
pub struct InvalidationListener {
    site: Arc<Site>,
    events: mpsc::UnboundedReceiver<PathBuf>,
}

impl InvalidationListener {
    pub fn new(site: Arc<Site>, events: mpsc::UnboundedReceiver<PathBuf>) -> Self {
        Self { site, events }
    }

    /// Handle events one after another without waiting for rebuilds.
    ///
    /// Returns the number of events handled.
    pub async fn run(mut self) -> usize {
        tracing::info!(root = %self.site.root().display(), "listening for changes");
        let mut handled = 0;
        while let Some(path) = self.events.recv().await {
            tracing::debug!(path = %path.display(), "change");
            self.site.handle_change(&path);
            handled += 1;
        }
        tracing::info!(handled, "change stream closed");
        handled
    }

    pub fn spawn(self) -> JoinHandle<usize> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::testing::RecordingStore;
    use crate::hash::{Algorithm, ContentHash};
    use crate::response::CachedResponse;
    use crate::store::Store;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn count_files(dir: &Path) -> usize {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        entries
            .map(|entry| entry.unwrap().path())
            .map(|path| if path.is_dir() { count_files(&path) } else { 1 })
            .sum()
    }

    async fn preprocessed() -> (TempDir, Arc<RecordingStore>, Arc<Site>) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"alpha").unwrap();
        fs::create_dir(temp_dir.path().join("dir")).unwrap();
        fs::write(temp_dir.path().join("dir/b.txt"), b"beta").unwrap();

        let store = Arc::new(RecordingStore::default());
        let site = Arc::new(
            Site::new(temp_dir.path(), SiteConfig::default(), store.clone()).unwrap(),
        );
        site.preprocess_all().await;
        (temp_dir, store, site)
    }

    #[test]
    fn test_escapes_root() {
        assert!(escapes_root(".."));
        assert!(escapes_root("../x"));
        assert!(!escapes_root("..hidden"));
        assert!(!escapes_root("dir/b.txt"));
        assert!(!escapes_root(""));
    }

    #[tokio::test]
    async fn test_change_rebuilds_with_new_fingerprint() {
        let (temp_dir, _store, site) = preprocessed().await;
        let root = site.root().to_path_buf();
        let file = temp_dir.path().join("dir/b.txt");

        fs::write(&file, b"beta v2").unwrap();
        let handle = site.handle_change(&root.join("dir/b.txt")).unwrap();

        assert_eq!(
            handle.await.unwrap(),
            Some(ContentHash::of_bytes(b"beta v2").fingerprint())
        );
        assert_eq!(
            site.cache().get(&root.join("dir/b.txt")),
            Some(CachedResponse::redirect(format!(
                "https://cdn.nodesite.eu/static/{}/b.txt",
                ContentHash::of_bytes(b"beta v2")
            )))
        );
        // Ancestors stay purged until something rebuilds them.
        assert!(!site.cache().contains(&root.join("dir")));
        assert!(!site.cache().contains(&root));
        assert!(site.cache().contains(&root.join("a.txt")));
    }

    #[tokio::test]
    async fn test_deleted_file_stays_uncached() {
        let (temp_dir, _store, site) = preprocessed().await;
        let root = site.root().to_path_buf();

        fs::remove_file(temp_dir.path().join("a.txt")).unwrap();
        let handle = site.handle_change(&root.join("a.txt")).unwrap();

        assert_eq!(handle.await.unwrap(), None);
        assert!(!site.cache().contains(&root.join("a.txt")));
        assert_eq!(site.resolve("/a.txt").await, CachedResponse::failure());
    }

    #[tokio::test]
    async fn test_change_outside_root_only_invalidates() {
        let (_temp_dir, store, site) = preprocessed().await;
        let root = site.root().to_path_buf();
        let calls = store.calls();

        assert!(site.handle_change(Path::new("/somewhere/else.txt")).is_none());

        // The sanitized path lands under the root, so the root's own entries
        // are purged while unrelated files survive and nothing is rehashed.
        assert!(!site.cache().contains(&root));
        assert!(site.cache().contains(&root.join("a.txt")));
        assert!(site.cache().contains(&root.join("dir/b.txt")));
        assert_eq!(store.calls(), calls);
    }

    #[tokio::test]
    async fn test_listener_drains_stream() {
        let (temp_dir, _store, site) = preprocessed().await;
        let root = site.root().to_path_buf();
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = InvalidationListener::new(Arc::clone(&site), rx).spawn();

        fs::write(temp_dir.path().join("c.txt"), b"gamma").unwrap();
        tx.send(root.join("c.txt")).unwrap();
        tx.send(PathBuf::from("/outside/root")).unwrap();
        drop(tx);

        assert_eq!(listener.await.unwrap(), 2);

        // The rebuild was fire-and-forget; give it a moment to land.
        let target = root.join("c.txt");
        for _ in 0..100 {
            if site.cache().contains(&target) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(site.cache().contains(&target));
        assert!(!site.cache().contains(&root.join("index")));
    }

    #[tokio::test]
    async fn test_root_change_rebuilds_everything() {
        let (_temp_dir, _store, site) = preprocessed().await;
        let before = site.cache().snapshot();

        let root = site.root().to_path_buf();
        site.handle_change(&root).unwrap().await.unwrap();

        assert_eq!(site.cache().snapshot(), before);
    }

    #[tokio::test]
    async fn test_change_in_excluded_path_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"alpha").unwrap();
        fs::create_dir(temp_dir.path().join("store")).unwrap();
        fs::write(temp_dir.path().join("store/blob"), b"internal").unwrap();

        let store = Arc::new(RecordingStore::default());
        let config = SiteConfig::default().with_excluded(temp_dir.path().join("store"));
        let site = Arc::new(Site::new(temp_dir.path(), config, store.clone()).unwrap());
        site.preprocess_all().await;
        let before = site.cache().snapshot();
        let calls = store.calls();

        let root = site.root().to_path_buf();
        assert!(site.handle_change(&root.join("store/blob")).is_none());
        assert!(site.handle_change(&root.join("store")).is_none());

        assert_eq!(site.cache().snapshot(), before);
        assert_eq!(store.calls(), calls);
        assert!(!site.cache().contains(&root.join("store")));
        assert_eq!(site.resolve("/store/blob").await, CachedResponse::failure());
    }

    #[tokio::test]
    async fn test_store_inside_root_stays_bounded() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"alpha").unwrap();
        let store_root = temp_dir.path().join(".sitenow-store");
        let store = Store::init(&store_root, Algorithm::Blake3).unwrap();

        let config = SiteConfig::default().with_excluded(&store_root);
        let site = Arc::new(Site::new(temp_dir.path(), config, Arc::new(store)).unwrap());
        let root = site.root().to_path_buf();

        let (_watcher, listener) = site.boot().await.unwrap();
        assert!(
            site.cache()
                .snapshot()
                .iter()
                .all(|(path, _)| !site.is_excluded(path))
        );

        fs::write(root.join("a.txt"), b"alpha v2").unwrap();
        let expected = CachedResponse::redirect(format!(
            "https://cdn.nodesite.eu/static/{}/a.txt",
            ContentHash::of_bytes(b"alpha v2")
        ));
        for _ in 0..500 {
            if site.cache().get(&root.join("a.txt")).as_ref() == Some(&expected) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(site.cache().get(&root.join("a.txt")), Some(expected));

        tokio::time::sleep(Duration::from_millis(300)).await;
        let settled = count_files(&store_root.join("objects"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count_files(&store_root.join("objects")), settled);
        // Both versions of a.txt, plus at most one for a truncated read.
        assert!((2..=3).contains(&settled), "objects: {}", settled);

        listener.abort();
    }

    #[tokio::test]
    async fn test_write_during_boot_is_picked_up() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"alpha").unwrap();
        let site = Arc::new(
            Site::new(
                temp_dir.path(),
                SiteConfig::default(),
                Arc::new(RecordingStore::default()),
            )
            .unwrap(),
        );
        let root = site.root().to_path_buf();

        // Rewrite a.txt while boot is preprocessing.
        let file = temp_dir.path().join("a.txt");
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            fs::write(&file, b"alpha v2").unwrap();
        });
        let (_watcher, listener) = site.boot().await.unwrap();
        writer.await.unwrap();

        let expected = CachedResponse::redirect(format!(
            "https://cdn.nodesite.eu/static/{}/a.txt",
            ContentHash::of_bytes(b"alpha v2")
        ));
        for _ in 0..500 {
            if site.cache().get(&root.join("a.txt")).as_ref() == Some(&expected) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(site.cache().get(&root.join("a.txt")), Some(expected));

        listener.abort();
    }
}
