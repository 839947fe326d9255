//! Eager population of the response cache for a directory tree.

use crate::cache::INDEX_NAME;
use crate::error::Result;
use crate::hash::Fingerprint;
use crate::path::{absolute_path, basename};
use crate::response::{CachedResponse, IndexEntry, cdn_location, index_page};
use crate::site::Site;
use futures::future::{BoxFuture, FutureExt, join_all};
use std::time::Instant;

impl Site {
    /// Preprocess the whole served tree.
    pub async fn preprocess_all(&self) {
        let started = Instant::now();
        self.preprocess("").await;
        tracing::info!(
            root = %self.root().display(),
            entries = self.cache().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "preprocessed site"
        );
    }

    /// Fingerprint `rel` and everything below it, caching a response per path.
    ///
    /// Files yield their fingerprint and a CDN redirect. Directories yield
    /// `None`; once all children are done they get a redirect to their index
    /// and a generated index page. Any failure is confined to its own subtree
    /// and reported as `None` with nothing cached for that path.
    pub fn preprocess<'a>(&'a self, rel: &'a str) -> BoxFuture<'a, Option<Fingerprint>> {
        async move {
            match self.preprocess_path(rel).await {
                Ok(fingerprint) => fingerprint,
                Err(err) => {
                    tracing::debug!(rel, error = %err, "skipping path");
                    None
                }
            }
        }
        .boxed()
    }

    async fn preprocess_path(&self, rel: &str) -> Result<Option<Fingerprint>> {
        let path = absolute_path(self.root(), rel);
        if self.is_excluded(&path) {
            return Ok(None);
        }
        let metadata = tokio::fs::metadata(&path).await?;

        if metadata.is_dir() {
            let children = self.read_children(&path).await?;
            let child_rels: Vec<String> = children.iter().map(|name| join_rel(rel, name)).collect();

            // Children run concurrently; this directory's entries are written
            // only after every one of them has finished.
            let fingerprints = join_all(child_rels.iter().map(|child| self.preprocess(child))).await;

            self.cache().set(
                path.clone(),
                CachedResponse::redirect(format!("{}/{}", basename(&path), INDEX_NAME)),
            );

            let cdn_base = &self.config().cdn_base;
            let page = index_page(
                rel,
                children
                    .iter()
                    .zip(&fingerprints)
                    .map(|(name, fingerprint)| IndexEntry {
                        name,
                        href: fingerprint
                            .as_ref()
                            .map(|fp| cdn_location(cdn_base, fp, name)),
                    }),
            );
            self.cache().set(path.join(INDEX_NAME), CachedResponse::text(page));

            Ok(None)
        } else if metadata.is_file() {
            let Some(fingerprint) = self.store().store_file(&path).await else {
                tracing::debug!(path = %path.display(), "no fingerprint, not cached");
                return Ok(None);
            };

            let location = cdn_location(&self.config().cdn_base, &fingerprint, &basename(&path));
            self.cache().set(path, CachedResponse::redirect(location));

            Ok(Some(fingerprint))
        } else {
            Ok(None)
        }
    }
}

/// `rel` and `name` joined with a single `/`; an empty `rel` is the root.
fn join_rel(rel: &str, name: &str) -> String {
    let rel = rel.trim_end_matches('/');
    if rel.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", rel, name)
    }
}
