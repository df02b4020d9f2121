//! SERP fetch client.
//!
//! Engines throttle aggressively, so every request randomizes its browser
//! headers from configured pools, spaces itself out with jittered delays,
//! and retries throttling/server failures with growing backoff. All of
//! that policy lives in [`FetchConfig`] passed at construction; there are
//! no module-global pools.

use crate::store::PageStore;
use rand::seq::SliceRandom;
use rand::Rng;
use serpdiff_core::{Error, Result, SerpFetcher};
use std::time::Duration;

/// Statuses worth retrying: throttling and transient server failures.
const RETRYABLE_STATUS: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Engine search endpoint.
    pub endpoint: String,
    /// Results-per-page hint sent as the `n` parameter.
    pub results_hint: usize,
    /// Engine page size; drives the `b` offset parameter.
    pub page_size: usize,
    pub timeout: Duration,
    /// Extra attempts after the first failed one.
    pub max_retries: usize,
    /// Seconds (min, max) slept before each request attempt.
    pub pre_request_delay_s: (u64, u64),
    /// Base backoff seconds (min, max); multiplied by the attempt number.
    pub retry_delay_s: (u64, u64),
    pub user_agents: Vec<String>,
    pub accept_values: Vec<String>,
    pub accept_languages: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://search.yahoo.com/search".to_string(),
            results_hint: 30,
            page_size: 10,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            pre_request_delay_s: (1, 5),
            retry_delay_s: (30, 60),
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 11.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:122.0) Gecko/20100101 Firefox/122.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.0 Safari/605.1.15",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
                "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:123.0) Gecko/20100101 Firefox/123.0",
            ]
            .map(String::from)
            .to_vec(),
            accept_values: [
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ]
            .map(String::from)
            .to_vec(),
            accept_languages: [
                "en-US,en;q=0.9",
                "en-GB,en;q=0.9,en-US;q=0.8",
                "en-US,en;q=0.8,es;q=0.7,fr;q=0.6",
                "en-CA,en;q=0.9,fr;q=0.8",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// Uniform draw from an inclusive seconds range. Degenerate ranges
/// collapse to their lower bound, so (0, 0) disables the delay.
pub fn jitter_s(range: (u64, u64)) -> u64 {
    let (lo, hi) = range;
    if lo >= hi {
        return lo;
    }
    rand::thread_rng().gen_range(lo..=hi)
}

#[derive(Debug, Clone)]
pub struct SerpClient {
    client: reqwest::Client,
    config: FetchConfig,
}

impl SerpClient {
    pub fn new(client: reqwest::Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Randomized browser-looking headers for one attempt. Optional
    /// groups appear probabilistically so consecutive requests do not
    /// share an exact fingerprint. Accept-Encoding is left to the HTTP
    /// client so response decompression keeps working.
    fn request_headers(&self) -> Vec<(&'static str, String)> {
        let mut rng = rand::thread_rng();
        let pick = |pool: &[String], rng: &mut rand::rngs::ThreadRng| {
            pool.choose(rng).cloned().unwrap_or_default()
        };

        let mut headers = vec![
            ("User-Agent", pick(&self.config.user_agents, &mut rng)),
            ("Accept", pick(&self.config.accept_values, &mut rng)),
            (
                "Accept-Language",
                pick(&self.config.accept_languages, &mut rng),
            ),
            ("Upgrade-Insecure-Requests", "1".to_string()),
        ];

        if rng.gen_bool(0.7) {
            let cache_controls = ["no-cache", "max-age=0", "no-store", "private"];
            headers.push((
                "Cache-Control",
                cache_controls[rng.gen_range(0..cache_controls.len())].to_string(),
            ));
        }
        if rng.gen_bool(0.6) {
            headers.push(("DNT", "1".to_string()));
        }
        if rng.gen_bool(0.4) {
            headers.push(("Sec-GPC", "1".to_string()));
        }
        if rng.gen_bool(0.8) {
            let sites = ["none", "same-origin", "cross-site"];
            headers.push(("Sec-Fetch-Dest", "document".to_string()));
            headers.push(("Sec-Fetch-Mode", "navigate".to_string()));
            headers.push((
                "Sec-Fetch-Site",
                sites[rng.gen_range(0..sites.len())].to_string(),
            ));
            headers.push(("Sec-Fetch-User", "?1".to_string()));
        }
        if rng.gen_bool(0.3) {
            headers.push(("Pragma", "no-cache".to_string()));
        }

        headers
    }

    async fn backoff_sleep(&self, attempt_number: u64) {
        let base = jitter_s(self.config.retry_delay_s);
        let secs = base.saturating_mul(attempt_number);
        if secs > 0 {
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
    }
}

fn page_offset(page: usize, page_size: usize) -> usize {
    (page.max(1) - 1) * page_size
}

#[async_trait::async_trait]
impl SerpFetcher for SerpClient {
    async fn fetch_page(&self, query: &str, page: usize) -> Result<String> {
        let n = self.config.results_hint.to_string();
        let b = page_offset(page, self.config.page_size).to_string();

        for attempt in 0..=self.config.max_retries {
            let pre_delay = jitter_s(self.config.pre_request_delay_s);
            if pre_delay > 0 {
                tokio::time::sleep(Duration::from_secs(pre_delay)).await;
            }

            let mut req = self
                .client
                .get(&self.config.endpoint)
                .query(&[("p", query), ("n", n.as_str()), ("b", b.as_str())]);
            for (name, value) in self.request_headers() {
                req = req.header(name, value);
            }

            match req.timeout(self.config.timeout).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let html = resp.text().await.map_err(|e| Error::Fetch(e.to_string()))?;
                        tracing::debug!(page, bytes = html.len(), "serp page fetched");
                        return Ok(html);
                    }
                    if RETRYABLE_STATUS.contains(&status.as_u16())
                        && attempt < self.config.max_retries
                    {
                        tracing::warn!(%status, attempt, "retryable engine response, backing off");
                        self.backoff_sleep(attempt as u64 + 1).await;
                        continue;
                    }
                    return Err(Error::Fetch(format!("HTTP {status}")));
                }
                Err(e) if attempt < self.config.max_retries => {
                    tracing::warn!(error = %e, attempt, "request failed, backing off");
                    self.backoff_sleep(attempt as u64 + 1).await;
                }
                Err(e) => return Err(Error::Fetch(e.to_string())),
            }
        }

        Err(Error::Fetch("all retry attempts failed".to_string()))
    }
}

/// Fetch pages 1..=`pages` for one query, persisting each raw document
/// through the page store. Individual page failures are logged and
/// skipped; store failures abort. Returns the number of pages saved.
pub async fn collect_query_pages(
    fetcher: &dyn SerpFetcher,
    store: &PageStore,
    engine: &str,
    qid: usize,
    query: &str,
    pages: usize,
    page_delay_s: (u64, u64),
) -> Result<usize> {
    let pages = pages.max(1);
    let mut saved = 0;
    for page in 1..=pages {
        match fetcher.fetch_page(query, page).await {
            Ok(html) => {
                store.save_page(engine, qid, page, &html)?;
                saved += 1;
                tracing::info!(qid, page, "page saved");
            }
            Err(e) => tracing::warn!(qid, page, error = %e, "page fetch failed"),
        }
        if page < pages {
            let delay = jitter_s(page_delay_s);
            if delay > 0 {
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_respects_bounds_and_degenerate_ranges() {
        assert_eq!(jitter_s((0, 0)), 0);
        assert_eq!(jitter_s((7, 7)), 7);
        assert_eq!(jitter_s((5, 2)), 5);
        for _ in 0..50 {
            let v = jitter_s((1, 3));
            assert!((1..=3).contains(&v));
        }
    }

    #[test]
    fn page_offsets_step_by_page_size() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(2, 10), 10);
        assert_eq!(page_offset(3, 10), 20);
        // Page 0 is treated as page 1.
        assert_eq!(page_offset(0, 10), 0);
    }

    #[test]
    fn headers_always_carry_the_core_browser_set() {
        let client = SerpClient::new(reqwest::Client::new(), FetchConfig::default());
        for _ in 0..20 {
            let headers = client.request_headers();
            let names: Vec<&str> = headers.iter().map(|(n, _)| *n).collect();
            assert!(names.contains(&"User-Agent"));
            assert!(names.contains(&"Accept"));
            assert!(names.contains(&"Accept-Language"));
            assert!(!names.contains(&"Accept-Encoding"));
            let ua = &headers[0].1;
            assert!(client.config().user_agents.contains(ua));
        }
    }

    struct ScriptedFetcher;

    #[async_trait::async_trait]
    impl SerpFetcher for ScriptedFetcher {
        async fn fetch_page(&self, _query: &str, page: usize) -> Result<String> {
            if page == 2 {
                return Err(Error::Fetch("HTTP 500".to_string()));
            }
            Ok(format!("<html><body>page {page}</body></html>"))
        }
    }

    #[tokio::test]
    async fn collect_query_pages_skips_failed_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path());
        let saved = collect_query_pages(&ScriptedFetcher, &store, "yahoo", 3, "q", 3, (0, 0))
            .await
            .unwrap();
        assert_eq!(saved, 2);
        assert!(store.load_page("yahoo", 3, 1).unwrap().is_some());
        assert!(store.load_page("yahoo", 3, 2).unwrap().is_none());
        assert!(store.load_page("yahoo", 3, 3).unwrap().is_some());
    }
}
