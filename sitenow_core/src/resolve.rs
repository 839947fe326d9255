//! Request resolution: cache first, then direct filesystem inspection.

use crate::cache::INDEX_NAME;
use crate::error::{Error, Result};
use crate::path::{absolute_path, basename, parent_path};
use crate::response::{CachedResponse, IndexEntry, cdn_location, index_page};
use crate::site::Site;
use std::io;
use std::path::Path;

impl Site {
    /// Produce the response for request path `rel`.
    ///
    /// Never fails: any error while inspecting the filesystem or storing the
    /// file resolves to [`CachedResponse::failure`].
    pub async fn resolve(&self, rel: &str) -> CachedResponse {
        match self.resolve_path(rel).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(rel, error = %err, "request failed");
                CachedResponse::failure()
            }
        }
    }

    async fn resolve_path(&self, rel: &str) -> Result<CachedResponse> {
        let mut rel = if rel == "/" {
            format!("/{}", INDEX_NAME)
        } else {
            rel.to_string()
        };
        let mut path = absolute_path(self.root(), &rel);
        let name = basename(&path);

        if let Some(hit) = self.cached(&path) {
            return Ok(hit);
        }

        // Fresh responses computed below are not written back; populating the
        // cache is the preprocessor's job.
        let is_index = rel == "/" || rel.ends_with(INDEX_NAME);
        if is_index {
            rel = parent_path(&Path::new("/").join(&rel))
                .to_string_lossy()
                .into_owned();
            path = absolute_path(self.root(), &rel);
        }

        if self.is_excluded(&path) {
            return Err(io::Error::from(io::ErrorKind::NotFound).into());
        }

        let metadata = tokio::fs::metadata(&path).await?;

        if metadata.is_file() {
            let fingerprint = self
                .store()
                .store_file(&path)
                .await
                .ok_or_else(|| Error::store_failed(&path))?;
            Ok(CachedResponse::redirect(cdn_location(
                &self.config().cdn_base,
                &fingerprint,
                &name,
            )))
        } else if metadata.is_dir() {
            if is_index {
                let children = self.read_children(&path).await?;
                let page = index_page(
                    &rel,
                    children.iter().map(|name| IndexEntry { name, href: None }),
                );
                Ok(CachedResponse::text(page))
            } else if path == self.root() {
                Ok(CachedResponse::redirect(INDEX_NAME))
            } else {
                Ok(CachedResponse::redirect(format!("{}/{}", name, INDEX_NAME)))
            }
        } else {
            Ok(CachedResponse::bytes(tokio::fs::read(&path).await?))
        }
    }

    /// Cache lookup that treats an empty inline body as not-yet-ready and
    /// looks once more before giving up.
    fn cached(&self, path: &Path) -> Option<CachedResponse> {
        for _ in 0..2 {
            match self.cache().get(path) {
                Some(response) if !response.is_empty() => return Some(response),
                Some(_) => continue,
                None => return None,
            }
        }
        None
    }
}
