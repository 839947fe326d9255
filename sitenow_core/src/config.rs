//! Per-site settings.

use std::path::PathBuf;
use url::Url;

/// Where the content store's serving side publishes blobs.
pub const DEFAULT_CDN_BASE: &str = "https://cdn.nodesite.eu/static";

/// Site name used when none is given.
pub const DEFAULT_SITE_NAME: &str = "nodesitenow";

/// Settings of one served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Prefix of every fingerprinted URL, without trailing slash.
    pub cdn_base: String,
    /// Base that request URIs are resolved against.
    pub base_url: Url,
    /// Skip entries hidden by `.gitignore`, `.ignore` and dotfile rules.
    pub respect_ignore: bool,
    /// Paths never served, listed or rebuilt, together with everything below them.
    pub excluded: Vec<PathBuf>,
}

impl SiteConfig {
    /// Settings for the site `https://<name>.nodesite.eu`.
    ///
    /// Returns `None` when `name` is not a valid site name.
    pub fn for_name(name: &str) -> Option<Self> {
        if !is_valid_site_name(name) {
            return None;
        }
        let base_url = Url::parse(&format!("https://{}.nodesite.eu", name)).ok()?;
        Some(Self {
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            base_url,
            respect_ignore: false,
            excluded: Vec::new(),
        })
    }

    pub fn with_cdn_base(mut self, cdn_base: impl Into<String>) -> Self {
        self.cdn_base = cdn_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_respect_ignore(mut self, respect_ignore: bool) -> Self {
        self.respect_ignore = respect_ignore;
        self
    }

    /// Exclude `path` and its subtree, e.g. a blob store kept inside the
    /// served root.
    pub fn with_excluded(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            base_url: Url::parse("https://nodesitenow.nodesite.eu").expect("constant URL"),
            respect_ignore: false,
            excluded: Vec::new(),
        }
    }
}

/// Site names are non-empty lowercase alphanumerics.
pub fn is_valid_site_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_default_name() {
        assert_eq!(SiteConfig::for_name(DEFAULT_SITE_NAME), Some(SiteConfig::default()));
        assert_eq!(SiteConfig::default().cdn_base, "https://cdn.nodesite.eu/static");
    }

    #[test]
    fn test_site_name_validation() {
        assert!(is_valid_site_name("blog42"));
        assert!(!is_valid_site_name(""));
        assert!(!is_valid_site_name("Blog"));
        assert!(!is_valid_site_name("my-site"));
        assert!(SiteConfig::for_name("a.b").is_none());
    }

    #[test]
    fn test_builders() {
        let config = SiteConfig::default()
            .with_cdn_base("http://localhost:9000/static/")
            .with_respect_ignore(true)
            .with_excluded("/srv/site/.sitenow-store");
        assert_eq!(config.cdn_base, "http://localhost:9000/static");
        assert!(config.respect_ignore);
        assert_eq!(config.excluded, vec![PathBuf::from("/srv/site/.sitenow-store")]);
        assert_eq!(
            SiteConfig::for_name("demo").unwrap().base_url.as_str(),
            "https://demo.nodesite.eu/"
        );
    }
}
