//! The two URL normalization policies.
//!
//! `comparison_key` backs cross-engine rank matching: scheme-insensitive,
//! `www.`-insensitive, trailing-slash-insensitive, everything else (case
//! included) significant.
//!
//! [`DedupNormalizer`] backs intra-source deduplication during extraction:
//! lowercased, https-forced, tracking parameters stripped. Its keys are NOT
//! interchangeable with `comparison_key` output; the two are kept as
//! separate named operations on purpose.

use std::collections::BTreeSet;

/// Query parameters stripped by the default dedup policy.
const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "source",
    "campaign",
    "medium",
    "_ga",
    "_gid",
    "mc_cid",
    "mc_eid",
    "affiliate_id",
];

struct UrlParts<'a> {
    authority: &'a str,
    path: &'a str,
    query: &'a str,
    fragment: &'a str,
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Case-preserving split into (authority, path, query, fragment).
///
/// The `url` crate lowercases hosts when parsing, which would make host
/// case insignificant in comparison keys. Matching treats case as
/// significant everywhere except the `www.` label, so this path splits by
/// hand instead. Total function: malformed input just lands in `path`.
fn split_url(url: &str) -> UrlParts<'_> {
    let (rest, fragment) = match url.find('#') {
        Some(i) => (&url[..i], &url[i + 1..]),
        None => (url, ""),
    };
    let (rest, query) = match rest.find('?') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, ""),
    };
    let rest = match rest.find(':') {
        Some(i) if is_scheme(&rest[..i]) => &rest[i + 1..],
        _ => rest,
    };
    let (authority, path) = if let Some(r) = rest.strip_prefix("//") {
        match r.find('/') {
            Some(i) => (&r[..i], &r[i..]),
            None => (r, ""),
        }
    } else {
        ("", rest)
    };
    UrlParts {
        authority,
        path,
        query,
        fragment,
    }
}

/// Normalize a URL into its cross-engine comparison key.
///
/// http/https, a leading `www.` host label, and a single trailing path
/// slash collapse to the same key; all other characters, case included,
/// stay significant. Never fails: empty input yields an empty key and
/// unparseable input falls back to the trimmed original, so two
/// identically malformed strings can still match each other.
pub fn comparison_key(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    let parts = split_url(url);

    let mut authority = parts.authority;
    if authority
        .get(..4)
        .is_some_and(|label| label.eq_ignore_ascii_case("www."))
    {
        authority = &authority[4..];
    }

    let mut path = parts.path;
    if path.len() > 1 && path.ends_with('/') {
        path = &path[..path.len() - 1];
    }

    let mut out = String::with_capacity(url.len());
    out.push_str(authority);
    out.push_str(path);
    if !parts.query.is_empty() {
        out.push('?');
        out.push_str(parts.query);
    }
    if !parts.fragment.is_empty() {
        out.push('#');
        out.push_str(parts.fragment);
    }
    out
}

/// Aggressive normalizer for intra-source duplicate detection.
///
/// The tracking-parameter set is constructor state so extraction policies
/// can be swapped in tests; there is no module-global configuration.
#[derive(Debug, Clone)]
pub struct DedupNormalizer {
    tracking_params: BTreeSet<String>,
}

impl Default for DedupNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKING_PARAMS.iter().map(|s| s.to_string()))
    }
}

impl DedupNormalizer {
    pub fn new(tracking_params: impl IntoIterator<Item = String>) -> Self {
        Self {
            tracking_params: tracking_params
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Dedup key for a URL: lowercased, scheme forced to https, `www.`
    /// host label dropped, fragment dropped, tracking and empty-valued
    /// query parameters stripped, one trailing path slash removed (root
    /// kept). Unparseable input comes back unchanged.
    pub fn key(&self, url: &str) -> String {
        let lowered = url.trim().to_lowercase();
        let Ok(mut u) = url::Url::parse(&lowered) else {
            return url.to_string();
        };

        let _ = u.set_scheme("https");
        u.set_fragment(None);

        let www_stripped = u
            .host_str()
            .and_then(|h| h.strip_prefix("www."))
            .map(|h| h.to_string());
        if let Some(host) = www_stripped {
            let _ = u.set_host(Some(&host));
        }

        if u.query().is_some() {
            let kept: Vec<(String, String)> = u
                .query_pairs()
                .filter(|(k, v)| !v.is_empty() && !self.tracking_params.contains(k.as_ref()))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                u.set_query(None);
            } else {
                u.query_pairs_mut()
                    .clear()
                    .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            }
        }

        let path = u.path().to_string();
        if path.len() > 1 && path.ends_with('/') {
            u.set_path(&path[..path.len() - 1]);
        }

        u.to_string()
    }
}
