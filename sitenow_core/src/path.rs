//! Lexical path arithmetic for request paths and cache keys.
//!
//! Nothing here touches the filesystem. [`relative_part`] is the only place
//! untrusted request paths are sanitized; every cache key and every path the
//! engine stats goes through [`absolute_path`].

use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Resolve `rel` against `/` and drop the leading root.
///
/// The result never contains `..`, `.` or empty segments and never starts
/// with a separator, so joining it onto any base stays inside that base.
pub fn relative_part(rel: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// `base` joined with the sanitized form of `rel`.
///
/// `base` is normalized lexically but not made absolute; callers pass an
/// absolute root.
pub fn absolute_path(base: &Path, rel: &str) -> PathBuf {
    let mut path = normalize(base);
    for segment in relative_part(rel).split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Lexical parent of `p`. The parent of the root is the root itself.
pub fn parent_path(p: &Path) -> PathBuf {
    let normalized = normalize(p);
    match normalized.parent() {
        Some(parent) => parent.to_path_buf(),
        None => normalized,
    }
}

/// Relative path from `from` to `to`, `/`-separated.
///
/// Leading `..` segments appear when `to` is not inside `from`.
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from = normalize(from);
    let to = normalize(to);
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    segments.extend(std::iter::repeat_n("..".to_string(), from.len() - common));
    segments.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    segments.join("/")
}

/// Decoded pathname of a request URI resolved against the site's base URL.
///
/// Accepts origin-form (`/a/b?x=1`) and absolute URIs. Unparseable input
/// resolves to `/`.
pub fn request_pathname(base: &Url, uri: &str) -> String {
    match base.join(uri) {
        Ok(url) => percent_decode_str(url.path())
            .decode_utf8_lossy()
            .into_owned(),
        Err(_) => "/".to_string(),
    }
}

/// Final path segment as a string, empty for the root.
pub fn basename(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Remove `.` and resolve `..` without consulting the filesystem.
fn normalize(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in p.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
        }
    }
    out
}
