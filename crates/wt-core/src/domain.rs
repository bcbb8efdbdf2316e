//! Domain extraction from page URLs.

use crate::types::Domain;

/// Extracts the trackable domain from a page URL.
///
/// Only `http` and `https` pages are tracked. Malformed URLs and internal
/// browser pages (`chrome://`, `about:`, `file://`, extension pages) yield
/// `None`, and time spent on them is not accounted.
pub fn domain_from_url(raw: &str) -> Option<Domain> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    Domain::new(host).ok()
}
