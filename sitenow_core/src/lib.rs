//! # sitenow core
//!
//! Serves a local directory through a content-addressed CDN. Every file is
//! stored by the BLAKE3 hash of its bytes and answered with a redirect to
//! `https://cdn.nodesite.eu/static/<fingerprint>/<name>`; directories get
//! generated index pages.
//!
//! Responses are precomputed into a path-keyed cache by the preprocessor,
//! answered by the resolver (falling back to the filesystem on a miss), and
//! purged by the invalidation listener when files change.
//!
//! ## Example
//!
//! ```no_run
//! use sitenow_core::{Site, SiteConfig, Store};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open_or_init("./public/.sitenow-store")?;
//! let config = SiteConfig::default().with_excluded("./public/.sitenow-store");
//! let site = Arc::new(Site::new("./public", config, Arc::new(store))?);
//!
//! // Watches the root first so changes made during preprocessing are not lost.
//! let (_watcher, _listener) = site.boot().await?;
//!
//! let response = site.handle("/docs/readme.md").await;
//! println!("{}", response);
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
mod content;
mod error;
mod hash;
mod listener;
mod object;
pub mod path;
mod preprocess;
mod resolve;
mod response;
mod site;
mod store;
mod watch;

pub use cache::{INDEX_NAME, ResponseCache};
pub use config::{DEFAULT_CDN_BASE, DEFAULT_SITE_NAME, SiteConfig, is_valid_site_name};
pub use content::ContentStore;
pub use error::{Error, Result};
pub use hash::{Algorithm, ContentHash, Fingerprint};
pub use listener::InvalidationListener;
pub use response::{Body, CachedResponse, PROCESS_REQUEST_ERROR_LOCATION, REDIRECT_STATUS};
pub use site::Site;
pub use store::Store;
pub use watch::FileWatcher;
