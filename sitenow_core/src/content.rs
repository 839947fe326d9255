//! The "store file, get fingerprint" seam between the cache engine and blob storage.

use crate::hash::Fingerprint;
use crate::store::Store;
use async_trait::async_trait;
use std::path::Path;

/// Content-addressed storage for served files.
///
/// Implementations must be idempotent and content-addressed: the same bytes
/// always yield the same fingerprint. Failures are reported as `None`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn store_file(&self, path: &Path) -> Option<Fingerprint>;
}

#[async_trait]
impl ContentStore for Store {
    async fn store_file(&self, path: &Path) -> Option<Fingerprint> {
        let store = self.clone();
        let owned = path.to_path_buf();

        match tokio::task::spawn_blocking(move || store.put_file(&owned)).await {
            Ok(Ok(hash)) => Some(hash.fingerprint()),
            Ok(Err(err)) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to store file");
                None
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "store task failed");
                None
            }
        }
    }
}
