//! Filesystem change events for a served root.
//!
//! Wraps a recursive `notify` watcher and turns every create, modify and
//! remove event into absolute paths on a channel that an
//! [`InvalidationListener`](crate::InvalidationListener) consumes.

use crate::error::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Keeps the underlying watcher alive; events stop when this is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `root` recursively.
    pub fn new(root: &Path) -> Result<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "watch error");
                    return;
                }
            };

            if !is_change(&event.kind) {
                return;
            }

            for path in event.paths {
                // Receiver gone means nobody is listening anymore.
                if tx.send(path).is_err() {
                    return;
                }
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching");

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
