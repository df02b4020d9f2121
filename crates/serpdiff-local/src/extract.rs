//! Organic-result extraction from raw SERP HTML.
//!
//! The engine wraps every organic hit in a redirect URL; extraction walks
//! all redirect anchors, decodes the embedded destination, filters out the
//! engine's own properties and ads, and dedups within and across pages.

use crate::normalize::DedupNormalizer;
use std::collections::BTreeSet;

/// Host marker identifying the engine's redirect links.
const REDIRECT_HOST: &str = "r.search.yahoo.com";

/// Destination-URL parameter inside a redirect link, in its three observed
/// positions.
const REDIRECT_PARAM_PREFIXES: &[&str] = &["/RU=", "&RU=", "?RU="];

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Minimal percent-decoder. Invalid escapes pass through literally;
/// output is lossy UTF-8. Redirect targets are percent-encoded with
/// lowercase hex, so both cases are accepted.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Decode an engine redirect URL to its destination.
///
/// Looks for the `RU=` segment, percent-decodes up to the next `&` or `/`
/// delimiter, and returns the result. Non-redirect URLs (and redirect URLs
/// without a recognizable `RU=` segment) pass through unchanged.
pub fn decode_redirect(url: &str) -> String {
    if !url.contains(REDIRECT_HOST) {
        return url.to_string();
    }
    for prefix in REDIRECT_PARAM_PREFIXES {
        if let Some(i) = url.find(prefix) {
            let start = i + prefix.len();
            let rest = &url[start..];
            let end = rest
                .find(|c: char| c == '&' || c == '/')
                .unwrap_or(rest.len());
            return percent_decode(&rest[..end]);
        }
    }
    url.to_string()
}

/// Filter separating organic results from the engine's own properties,
/// ads, and non-http links.
///
/// The excluded-substring list is constructor state so engine policies can
/// be swapped without touching a module constant.
#[derive(Debug, Clone)]
pub struct OrganicFilter {
    excluded: Vec<String>,
}

impl Default for OrganicFilter {
    fn default() -> Self {
        Self::new(
            [
                // The engine's own domains and owned properties.
                "yahoo.com",
                "yahooapis.com",
                "yimg.com",
                "flickr.com",
                "tumblr.com",
                "aol.com",
                "engadget.com",
                "techcrunch.com",
                "uservoice.com",
                // Non-navigational schemes and fragment-only links.
                "javascript:",
                "mailto:",
                "tel:",
                "ftp:",
                "#",
            ]
            .map(String::from),
        )
    }
}

impl OrganicFilter {
    pub fn new(excluded: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded: excluded.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn is_organic(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return false;
        }
        if self.excluded.iter().any(|p| lower.contains(p.as_str())) {
            return false;
        }
        // Require a dotted host so bare or local names don't slip through.
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.contains('.')))
            .unwrap_or(false)
    }
}

/// Extract organic destination URLs from one SERP document, in document
/// order, deduplicated by dedup key. The ORIGINAL decoded URL is kept;
/// the dedup key is only used for duplicate detection.
pub fn extract_organic(
    html: &str,
    filter: &OrganicFilter,
    dedup: &DedupNormalizer,
) -> Vec<String> {
    let doc = html_scraper::Html::parse_document(html);
    let sel = match html_scraper::Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for el in doc.select(&sel) {
        let href = match el.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if !href.contains(REDIRECT_HOST) {
            continue;
        }
        let decoded = decode_redirect(href);
        if !filter.is_organic(&decoded) {
            continue;
        }
        if seen.insert(dedup.key(&decoded)) {
            out.push(decoded);
        }
    }
    out
}

/// Merge per-page extractions in page order with cross-page dedup,
/// stopping at `k` URLs. Pages short of results just contribute less.
pub fn top_k_across_pages<'a>(
    pages: impl IntoIterator<Item = &'a str>,
    k: usize,
    filter: &OrganicFilter,
    dedup: &DedupNormalizer,
) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for html in pages {
        for url in extract_organic(html, filter, dedup) {
            if out.len() >= k {
                return out;
            }
            if seen.insert(dedup.key(&url)) {
                out.push(url);
            }
        }
    }
    out
}
