use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

// Local stub SERP server: one query page with redirect-wrapped organic
// links, one engine-internal link, and one direct (non-redirect) link.
const SERP_HTML: &str = r#"<html><body>
  <a href="https://r.search.yahoo.com/_ylt=AwrT/RU=https%3a%2f%2falpha.example.com%2fdocs/RK=2/RS=a">Alpha docs</a>
  <a href="https://r.search.yahoo.com/_ylt=AwrU/RU=https%3a%2f%2fnews.yahoo.com%2finternal/RK=2/RS=b">Engine news</a>
  <a href="https://r.search.yahoo.com/_ylt=AwrV/RU=https%3a%2f%2fbeta.example.com%2fguide/RK=2/RS=c">Beta guide</a>
  <a href="https://direct.example.com/skipped">Direct link</a>
</body></html>"#;

fn zero_delay_args() -> Vec<&'static str> {
    vec![
        "--page-delay-min-s",
        "0",
        "--page-delay-max-s",
        "0",
        "--query-delay-min-s",
        "0",
        "--query-delay-max-s",
        "0",
        "--pre-delay-min-s",
        "0",
        "--pre-delay-max-s",
        "0",
        "--retry-delay-min-s",
        "0",
        "--retry-delay-max-s",
        "0",
    ]
}

#[test]
fn fetch_extract_compare_round_trip_against_stub_server() {
    use axum::{routing::get, Router};
    use std::net::SocketAddr;

    let rt = tokio::runtime::Runtime::new().expect("rt");
    let addr: SocketAddr = rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/search",
            get(|| async {
                (
                    [(axum::http::header::CONTENT_TYPE, "text/html")],
                    SERP_HTML,
                )
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("axum serve");
        });
        addr
    });

    let dir = tempfile::tempdir().unwrap();
    let queries_path = dir.path().join("queries.txt");
    fs::write(&queries_path, "rust async runtime\n").unwrap();
    let pages_dir = dir.path().join("raw_html");
    let results_path = dir.path().join("results.json");

    // Fetch one page for the one query from the stub endpoint.
    Command::cargo_bin("serpdiff")
        .unwrap()
        .args(["fetch", "--engine", "yahoo", "--pages", "1", "--max-queries", "1"])
        .arg("--queries")
        .arg(&queries_path)
        .arg("--out-dir")
        .arg(&pages_dir)
        .arg("--endpoint")
        .arg(format!("http://{addr}/search"))
        .args(zero_delay_args())
        .assert()
        .success()
        .stdout(predicate::str::contains("Collected pages for 1 queries"));

    let page_path = pages_dir.join("yahoo-0001-p1.html");
    let saved = fs::read_to_string(&page_path).unwrap();
    assert!(saved.contains("r.search.yahoo.com"));

    // Extract organic URLs from the saved page.
    Command::cargo_bin("serpdiff")
        .unwrap()
        .args(["extract", "--engine", "yahoo", "--pages", "1", "--k", "10", "--max-queries", "1"])
        .arg("--pages-dir")
        .arg(&pages_dir)
        .arg("--queries")
        .arg(&queries_path)
        .arg("--out")
        .arg(&results_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted 1 queries (2 URLs)"));

    let results: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&results_path).unwrap()).unwrap();
    assert_eq!(
        results["rust async runtime"],
        serde_json::json!([
            "https://alpha.example.com/docs",
            "https://beta.example.com/guide"
        ])
    );

    // A result set compared against itself agrees perfectly.
    Command::cargo_bin("serpdiff")
        .unwrap()
        .args(["compare", "--method", "rerank"])
        .arg("--reference")
        .arg(&results_path)
        .arg("--candidate")
        .arg(&results_path)
        .arg("--csv")
        .arg(dir.path().join("out.csv"))
        .arg("--summary")
        .arg(dir.path().join("out.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Average overlap: 100.0%"))
        .stdout(predicate::str::contains("Average correlation: 1.000"));
}
