//! Responses handed to the transport, and the generated index pages.

use crate::hash::Fingerprint;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Serialize, Serializer};
use std::fmt;

/// Status code of every redirect the engine produces.
pub const REDIRECT_STATUS: u16 = 302;

/// Location of the failure redirect: one directory level up.
pub const PROCESS_REQUEST_ERROR_LOCATION: &str = "..";

/// Literal response content returned with an implicit 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Text(text) => text.len(),
            Body::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }
}

/// A precomputed or freshly computed response for one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedResponse {
    Redirect { status_code: u16, location: String },
    Inline(Body),
}

impl CachedResponse {
    pub fn redirect(location: impl Into<String>) -> Self {
        CachedResponse::Redirect {
            status_code: REDIRECT_STATUS,
            location: location.into(),
        }
    }

    /// The response returned whenever resolution fails.
    pub fn failure() -> Self {
        Self::redirect(PROCESS_REQUEST_ERROR_LOCATION)
    }

    pub fn text(text: impl Into<String>) -> Self {
        CachedResponse::Inline(Body::Text(text.into()))
    }

    pub fn bytes(bytes: Vec<u8>) -> Self {
        CachedResponse::Inline(Body::Bytes(bytes))
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            CachedResponse::Redirect { location, .. } => Some(location),
            CachedResponse::Inline(_) => None,
        }
    }

    /// True for an inline response with no content.
    ///
    /// Such a value carries nothing a client could use, so lookups treat it
    /// like a miss.
    pub fn is_empty(&self) -> bool {
        matches!(self, CachedResponse::Inline(body) if body.is_empty())
    }
}

impl fmt::Display for CachedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachedResponse::Redirect {
                status_code,
                location,
            } => write!(f, "{} {}", status_code, location),
            CachedResponse::Inline(Body::Text(text)) => write!(f, "200 text ({} bytes)", text.len()),
            CachedResponse::Inline(Body::Bytes(bytes)) => {
                write!(f, "200 bytes ({} bytes)", bytes.len())
            }
        }
    }
}

#[derive(Serialize)]
struct RedirectWire<'a> {
    #[serde(rename = "statusCode")]
    status_code: u16,
    head: HeadWire<'a>,
}

#[derive(Serialize)]
struct HeadWire<'a> {
    #[serde(rename = "Location")]
    location: &'a str,
}

/// Redirects serialize as `{"statusCode":302,"head":{"Location":..}}`, bodies
/// as their literal content.
impl Serialize for CachedResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CachedResponse::Redirect {
                status_code,
                location,
            } => RedirectWire {
                status_code: *status_code,
                head: HeadWire { location },
            }
            .serialize(serializer),
            CachedResponse::Inline(Body::Text(text)) => serializer.serialize_str(text),
            CachedResponse::Inline(Body::Bytes(bytes)) => serializer.serialize_bytes(bytes),
        }
    }
}

/// One child line of an index page.
pub struct IndexEntry<'a> {
    pub name: &'a str,
    /// CDN location when the child was fingerprinted.
    pub href: Option<String>,
}

/// Render the HTML index page for a directory.
///
/// `rel` is the directory's request-relative path as given by the caller;
/// children keep the order they are passed in.
pub fn index_page<'a>(rel: &str, entries: impl IntoIterator<Item = IndexEntry<'a>>) -> String {
    let title = encode_text(rel);
    let mut page = format!("<title>Index of {title}</title><h1>Index of {title}/</h1><ul>");
    for entry in entries {
        let text = encode_text(entry.name);
        let href = match &entry.href {
            Some(location) => encode_double_quoted_attribute(location).into_owned(),
            None => encode_double_quoted_attribute(entry.name).into_owned(),
        };
        page.push_str(&format!("<li><a href=\"{href}\">{text}</a></li>"));
    }
    page.push_str("</ul>");
    page
}

/// `<cdn_base>/<fingerprint>/<name>`
pub fn cdn_location(cdn_base: &str, fingerprint: &Fingerprint, name: &str) -> String {
    format!("{}/{}/{}", cdn_base.trim_end_matches('/'), fingerprint, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_is_parent_redirect() {
        assert_eq!(
            CachedResponse::failure(),
            CachedResponse::Redirect {
                status_code: 302,
                location: "..".to_string()
            }
        );
    }

    #[test]
    fn test_redirect_wire_shape() {
        let json = serde_json::to_value(CachedResponse::redirect("dir/index")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"statusCode": 302, "head": {"Location": "dir/index"}})
        );
        assert_eq!(
            serde_json::to_value(CachedResponse::text("<ul></ul>")).unwrap(),
            serde_json::json!("<ul></ul>")
        );
    }

    #[test]
    fn test_empty_only_for_empty_inline() {
        assert!(CachedResponse::text("").is_empty());
        assert!(CachedResponse::bytes(Vec::new()).is_empty());
        assert!(!CachedResponse::text("x").is_empty());
        assert!(!CachedResponse::redirect("").is_empty());
    }

    #[test]
    fn test_index_page_format() {
        let fp = Fingerprint::new("abc123");
        let page = index_page(
            "dir",
            vec![
                IndexEntry {
                    name: "b.txt",
                    href: Some(cdn_location("https://cdn.nodesite.eu/static", &fp, "b.txt")),
                },
                IndexEntry {
                    name: "sub",
                    href: None,
                },
            ],
        );
        assert_eq!(
            page,
            "<title>Index of dir</title><h1>Index of dir/</h1><ul>\
             <li><a href=\"https://cdn.nodesite.eu/static/abc123/b.txt\">b.txt</a></li>\
             <li><a href=\"sub\">sub</a></li></ul>"
        );
    }

    #[test]
    fn test_index_page_escapes_names() {
        let page = index_page(
            "",
            vec![IndexEntry {
                name: "<x>\".txt",
                href: None,
            }],
        );
        assert!(page.contains("&lt;x&gt;"));
        assert!(!page.contains("<x>"));
    }

    #[test]
    fn test_cdn_location_ignores_trailing_slash() {
        let fp = Fingerprint::new("f");
        assert_eq!(cdn_location("https://cdn/static/", &fp, "a"), "https://cdn/static/f/a");
    }
}
