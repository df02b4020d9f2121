use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("extract failed: {0}")]
    Extract(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("report error: {0}")]
    Report(String),
    #[error("no common queries between reference and candidate result sets")]
    NoCommonQueries,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A matched pair of 1-based ranks: the same URL (after comparison
/// normalization) found in the reference list and the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub reference_rank: usize,
    pub candidate_rank: usize,
}

/// Which rank basis the correlation coefficient is computed on.
///
/// `Global` uses the original 1-based positions of matched URLs in their
/// full source lists. With few matches spread far apart this can leave the
/// conventional [-1, +1] range; that behavior is intentional and kept.
/// `Rerank` re-ranks the matched subset to 1..n on both sides first and is
/// always bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    Global,
    Rerank,
}

/// Per-query comparison outcome. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryComparison {
    pub query: String,
    /// Number of matched URL pairs.
    pub matches: usize,
    /// 100 * matches / reference length, rounded to 1 decimal.
    pub percent_overlap: f64,
    /// Rank correlation under the selected method, rounded to 3 decimals.
    pub correlation: f64,
    pub reference_len: usize,
    pub candidate_len: usize,
}

/// Ordered mapping from query text to its ranked URL list.
///
/// Comparison iterates reference queries in input order, so this must keep
/// the key order of the JSON document it was loaded from. serde_json's
/// default map representation sorts keys; hand-rolled (de)serialization
/// over a Vec keeps them as written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<(String, Vec<String>)>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, query: impl Into<String>, urls: Vec<String>) {
        self.entries.push((query.into(), urls));
    }

    /// Linear lookup; result sets hold tens of queries, not thousands.
    pub fn get(&self, query: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, urls)| urls.as_slice())
    }

    pub fn contains(&self, query: &str) -> bool {
        self.get(query).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(q, urls)| (q.as_str(), urls.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn url_count(&self) -> usize {
        self.entries.iter().map(|(_, urls)| urls.len()).sum()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &[String]) -> bool) {
        self.entries.retain(|(q, urls)| keep(q, urls));
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (query, urls) in &self.entries {
            map.serialize_entry(query, urls)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResultSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ResultSetVisitor;

        impl<'de> Visitor<'de> for ResultSetVisitor {
            type Value = ResultSet;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of query text to a list of URLs")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((query, urls)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((query, urls));
                }
                Ok(ResultSet { entries })
            }
        }

        deserializer.deserialize_map(ResultSetVisitor)
    }
}

/// Backend that can produce one raw SERP document per (query, page).
#[async_trait::async_trait]
pub trait SerpFetcher: Send + Sync {
    async fn fetch_page(&self, query: &str, page: usize) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_set_preserves_document_key_order() {
        let js = r#"{"zebra":["https://z.example"],"apple":["https://a.example"],"mango":[]}"#;
        let set: ResultSet = serde_json::from_str(js).unwrap();
        let keys: Vec<&str> = set.iter().map(|(q, _)| q).collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn result_set_round_trips_through_json() {
        let mut set = ResultSet::new();
        set.push("b query", vec!["https://b.example/1".to_string()]);
        set.push("a query", vec![]);
        let js = serde_json::to_string(&set).unwrap();
        assert!(js.starts_with(r#"{"b query""#));
        let back: ResultSet = serde_json::from_str(&js).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn result_set_lookup_and_counts() {
        let mut set = ResultSet::new();
        set.push("q", vec!["https://a".to_string(), "https://b".to_string()]);
        assert!(set.contains("q"));
        assert!(!set.contains("other"));
        assert_eq!(set.get("q").map(<[String]>::len), Some(2));
        assert_eq!(set.len(), 1);
        assert_eq!(set.url_count(), 2);
    }

    #[test]
    fn no_common_queries_error_names_both_sides() {
        let msg = Error::NoCommonQueries.to_string();
        assert!(msg.contains("no common queries"));
    }
}
