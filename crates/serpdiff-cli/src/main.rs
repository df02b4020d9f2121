use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serpdiff_core::{CorrelationMethod, ResultSet};
use serpdiff_local::{compare, extract, fetch, normalize, report, store};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "serpdiff")]
#[command(
    about = "Fetch, extract, and compare ranked search-engine results",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch raw SERP pages for a list of queries.
    Fetch(FetchCmd),
    /// Extract ranked organic URLs from fetched SERP pages into a results JSON.
    Extract(ExtractCmd),
    /// Compare two ranked result sets and write CSV + summary reports.
    Compare(CompareCmd),
}

#[derive(clap::Args, Debug)]
struct FetchCmd {
    /// Queries file (one query per line; blank lines skipped).
    #[arg(long)]
    queries: PathBuf,
    /// Directory for raw SERP HTML pages.
    #[arg(long, default_value = "data/raw_html")]
    out_dir: PathBuf,
    /// Engine tag used in page file names.
    #[arg(long, default_value = "yahoo")]
    engine: String,
    /// Engine search endpoint.
    #[arg(
        long,
        env = "SERPDIFF_ENDPOINT",
        default_value = "https://search.yahoo.com/search"
    )]
    endpoint: String,
    /// Pages to fetch per query.
    #[arg(long, default_value_t = 3)]
    pages: usize,
    /// First 1-based query number to fetch (lets an interrupted run resume).
    #[arg(long, default_value_t = 1)]
    start: usize,
    /// Maximum number of queries to read from the file.
    #[arg(long, default_value_t = 100)]
    max_queries: usize,
    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
    /// Extra attempts after a failed request.
    #[arg(long, default_value_t = 2)]
    max_retries: usize,
    /// Minimum seconds slept between pages of one query.
    #[arg(long, default_value_t = 10)]
    page_delay_min_s: u64,
    /// Maximum seconds slept between pages of one query.
    #[arg(long, default_value_t = 30)]
    page_delay_max_s: u64,
    /// Minimum seconds slept between queries.
    #[arg(long, default_value_t = 60)]
    query_delay_min_s: u64,
    /// Maximum seconds slept between queries.
    #[arg(long, default_value_t = 120)]
    query_delay_max_s: u64,
    /// Minimum seconds slept before each request attempt.
    #[arg(long, default_value_t = 1)]
    pre_delay_min_s: u64,
    /// Maximum seconds slept before each request attempt.
    #[arg(long, default_value_t = 5)]
    pre_delay_max_s: u64,
    /// Minimum base seconds for retry backoff.
    #[arg(long, default_value_t = 30)]
    retry_delay_min_s: u64,
    /// Maximum base seconds for retry backoff.
    #[arg(long, default_value_t = 60)]
    retry_delay_max_s: u64,
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    /// Directory holding raw SERP HTML pages.
    #[arg(long, default_value = "data/raw_html")]
    pages_dir: PathBuf,
    /// Queries file; query text becomes the JSON key for each query id.
    #[arg(long)]
    queries: PathBuf,
    /// Engine tag used in page file names.
    #[arg(long, default_value = "yahoo")]
    engine: String,
    /// Pages probed per query (missing pages are skipped).
    #[arg(long, default_value_t = 3)]
    pages: usize,
    /// URLs kept per query.
    #[arg(long, default_value_t = 10)]
    k: usize,
    /// Highest query id probed in the pages directory.
    #[arg(long, default_value_t = 100)]
    max_queries: usize,
    /// Output results JSON.
    #[arg(long, default_value = "output/results.json")]
    out: PathBuf,
}

#[derive(clap::Args, Debug)]
struct CompareCmd {
    /// Reference (baseline) results JSON.
    #[arg(long)]
    reference: PathBuf,
    /// Candidate results JSON.
    #[arg(long)]
    candidate: PathBuf,
    /// Correlation method. Allowed: global, rerank
    #[arg(long, default_value = "rerank")]
    method: String,
    /// Output CSV path.
    #[arg(long, default_value = "comparison.csv")]
    csv: PathBuf,
    /// Output text summary path.
    #[arg(long, default_value = "comparison.txt")]
    summary: PathBuf,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch(cmd) => run_fetch(cmd).await,
        Commands::Extract(cmd) => run_extract(cmd),
        Commands::Compare(cmd) => run_compare(cmd),
    }
}

async fn run_fetch(cmd: FetchCmd) -> Result<()> {
    let queries = store::read_queries(&cmd.queries, cmd.max_queries)
        .with_context(|| format!("reading queries from {}", cmd.queries.display()))?;
    if queries.is_empty() {
        bail!("no queries found in {}", cmd.queries.display());
    }

    let config = fetch::FetchConfig {
        endpoint: cmd.endpoint.clone(),
        timeout: Duration::from_millis(cmd.timeout_ms),
        max_retries: cmd.max_retries,
        pre_request_delay_s: (cmd.pre_delay_min_s, cmd.pre_delay_max_s),
        retry_delay_s: (cmd.retry_delay_min_s, cmd.retry_delay_max_s),
        ..fetch::FetchConfig::default()
    };
    let client = fetch::SerpClient::new(reqwest::Client::new(), config);
    let pages = store::PageStore::new(&cmd.out_dir);

    let start = cmd.start.max(1);
    tracing::info!(total = queries.len(), start, "starting SERP collection");

    let mut successful = 0usize;
    let mut failed = 0usize;
    for (idx, query) in queries.iter().enumerate().skip(start - 1) {
        let qid = idx + 1;
        tracing::info!(qid, query = %query, "collecting query");
        let saved = fetch::collect_query_pages(
            &client,
            &pages,
            &cmd.engine,
            qid,
            query,
            cmd.pages,
            (cmd.page_delay_min_s, cmd.page_delay_max_s),
        )
        .await?;
        if saved > 0 {
            successful += 1;
        } else {
            failed += 1;
        }

        if qid < queries.len() {
            let delay = fetch::jitter_s((cmd.query_delay_min_s, cmd.query_delay_max_s));
            if delay > 0 {
                tracing::info!(qid, delay_s = delay, "sleeping before next query");
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }

    println!(
        "Collected pages for {successful} queries ({failed} with no successful page) under {}",
        cmd.out_dir.display()
    );
    Ok(())
}

fn run_extract(cmd: ExtractCmd) -> Result<()> {
    let queries = store::read_queries(&cmd.queries, cmd.max_queries)
        .with_context(|| format!("reading queries from {}", cmd.queries.display()))?;
    let pages = store::PageStore::new(&cmd.pages_dir);
    let filter = extract::OrganicFilter::default();
    let dedup = normalize::DedupNormalizer::default();

    let mut set = ResultSet::new();
    for qid in 1..=cmd.max_queries {
        let mut pages_html = Vec::new();
        for page in 1..=cmd.pages {
            if let Some(html) = pages.load_page(&cmd.engine, qid, page)? {
                pages_html.push(html);
            }
        }
        if pages_html.is_empty() {
            if qid <= queries.len() {
                tracing::warn!(qid, "no pages found for query");
            }
            continue;
        }

        let urls = extract::top_k_across_pages(
            pages_html.iter().map(String::as_str),
            cmd.k,
            &filter,
            &dedup,
        );
        if urls.is_empty() {
            tracing::warn!(qid, "no organic results extracted");
        }
        let query_text = queries
            .get(qid - 1)
            .cloned()
            .unwrap_or_else(|| format!("Query {qid}"));
        tracing::info!(qid, urls = urls.len(), "query extracted");
        set.push(query_text, urls);
    }
    if set.is_empty() {
        bail!("no queries extracted from {}", cmd.pages_dir.display());
    }

    store::save_result_set(&set, &cmd.out)?;
    println!(
        "Extracted {} queries ({} URLs) into {}",
        set.len(),
        set.url_count(),
        cmd.out.display()
    );
    Ok(())
}

fn run_compare(cmd: CompareCmd) -> Result<()> {
    let method = match cmd.method.as_str() {
        "global" => CorrelationMethod::Global,
        "rerank" => CorrelationMethod::Rerank,
        other => bail!("unknown correlation method: {other} (allowed: global, rerank)"),
    };

    let reference = store::load_result_set(&cmd.reference)
        .with_context(|| format!("loading reference results from {}", cmd.reference.display()))?;
    let candidate = store::load_result_set(&cmd.candidate)
        .with_context(|| format!("loading candidate results from {}", cmd.candidate.display()))?;

    let rows = compare::compare_all(&reference, &candidate, method)?;
    report::write_csv(&rows, &cmd.csv)?;
    report::write_summary(&rows, method, &cmd.summary)?;

    let n = rows.len() as f64;
    let avg_percent = rows.iter().map(|r| r.percent_overlap).sum::<f64>() / n;
    let avg_correlation = rows.iter().map(|r| r.correlation).sum::<f64>() / n;
    println!("Queries analyzed: {}", rows.len());
    println!("Average overlap: {avg_percent:.1}%");
    println!("Average correlation: {avg_correlation:.3}");
    println!(
        "Reports written to {} and {}",
        cmd.csv.display(),
        cmd.summary.display()
    );
    Ok(())
}
