//! Report writers: a fixed-shape CSV of per-query rows plus an Averages
//! row, and a free-text summary with distribution buckets and a
//! qualitative reading of the averages.

use serpdiff_core::{CorrelationMethod, Error, QueryComparison, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

struct Averages {
    matches: f64,
    percent: f64,
    correlation: f64,
}

fn averages(rows: &[QueryComparison]) -> Averages {
    if rows.is_empty() {
        return Averages {
            matches: 0.0,
            percent: 0.0,
            correlation: 0.0,
        };
    }
    let n = rows.len() as f64;
    Averages {
        matches: rows.iter().map(|r| r.matches as f64).sum::<f64>() / n,
        percent: rows.iter().map(|r| r.percent_overlap).sum::<f64>() / n,
        correlation: rows.iter().map(|r| r.correlation).sum::<f64>() / n,
    }
}

/// Per-query rows labeled `Query <i>` plus a trailing `Averages` row.
/// All fields are generated labels or numbers, so no CSV quoting is
/// needed.
pub fn render_csv(rows: &[QueryComparison]) -> String {
    let mut out = String::new();
    out.push_str("Queries,Number of Overlapping Results,Percent Overlap,Spearman Coefficient\n");
    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "Query {},{},{:.1},{:.3}",
            i + 1,
            row.matches,
            row.percent_overlap,
            row.correlation
        );
    }
    let avg = averages(rows);
    let _ = writeln!(
        out,
        "Averages,{:.1},{:.1},{:.3}",
        avg.matches, avg.percent, avg.correlation
    );
    out
}

pub fn write_csv(rows: &[QueryComparison], path: &Path) -> Result<()> {
    fs::write(path, render_csv(rows)).map_err(|e| Error::Report(e.to_string()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "csv report written");
    Ok(())
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

pub fn render_summary(rows: &[QueryComparison], method: CorrelationMethod) -> String {
    let n = rows.len();
    let avg = averages(rows);
    let pct = |count: usize| {
        if n == 0 {
            0.0
        } else {
            count as f64 * 100.0 / n as f64
        }
    };

    let high = rows.iter().filter(|r| r.percent_overlap >= 50.0).count();
    let medium = rows
        .iter()
        .filter(|r| (20.0..50.0).contains(&r.percent_overlap))
        .count();
    let low = rows.iter().filter(|r| r.percent_overlap < 20.0).count();

    let positive = rows.iter().filter(|r| r.correlation > 0.0).count();
    let negative = rows.iter().filter(|r| r.correlation < 0.0).count();
    let zero = rows.iter().filter(|r| r.correlation == 0.0).count();

    let mut out = String::new();
    let _ = writeln!(out, "SEARCH ENGINE RESULT COMPARISON");
    let _ = writeln!(out, "{}", "=".repeat(31));
    let _ = writeln!(out);

    section(&mut out, "OVERALL PERFORMANCE ANALYSIS");
    let _ = writeln!(out, "Total queries analyzed: {n}");
    let _ = writeln!(out, "Average overlapping results: {:.1}", avg.matches);
    let _ = writeln!(out, "Average percent overlap: {:.1}%", avg.percent);
    let _ = writeln!(out, "Average Spearman coefficient: {:.3}", avg.correlation);
    let _ = writeln!(out);

    section(&mut out, "OVERLAP DISTRIBUTION");
    let _ = writeln!(out, "High overlap (>=50%): {high} queries ({:.1}%)", pct(high));
    let _ = writeln!(
        out,
        "Medium overlap (20-49%): {medium} queries ({:.1}%)",
        pct(medium)
    );
    let _ = writeln!(out, "Low overlap (<20%): {low} queries ({:.1}%)", pct(low));
    let _ = writeln!(out);

    section(&mut out, "SPEARMAN CORRELATION ANALYSIS");
    let _ = writeln!(out, "Positive correlations: {positive} ({:.1}%)", pct(positive));
    let _ = writeln!(out, "Negative correlations: {negative} ({:.1}%)", pct(negative));
    let _ = writeln!(out, "Zero correlations: {zero} ({:.1}%)", pct(zero));
    let _ = writeln!(out);

    section(&mut out, "PERFORMANCE INTERPRETATION");
    let similarity = if avg.percent >= 40.0 {
        "STRONG"
    } else if avg.percent >= 25.0 {
        "MODERATE"
    } else {
        "LIMITED"
    };
    let _ = writeln!(
        out,
        "Candidate results show {similarity} similarity to the reference results."
    );
    let correlation_reading = if avg.correlation >= 0.3 {
        "POSITIVE and MODERATE to STRONG"
    } else if avg.correlation >= 0.0 {
        "POSITIVE but WEAK"
    } else if avg.correlation >= -0.3 {
        "NEGATIVE but WEAK"
    } else {
        "NEGATIVE and MODERATE to STRONG"
    };
    let _ = writeln!(out, "Ranking correlation is {correlation_reading}.");
    let _ = writeln!(out);

    section(&mut out, "METHODOLOGY NOTES");
    let _ = writeln!(
        out,
        "- URL matching treats http/https, a leading \"www.\", and one trailing slash as identical; everything else is case-sensitive."
    );
    let method_note = match method {
        CorrelationMethod::Global => {
            "original result positions (values can leave the [-1, +1] range)"
        }
        CorrelationMethod::Rerank => "matched results re-ranked 1..n (bounded to [-1, +1])",
    };
    let _ = writeln!(out, "- Correlation computed on {method_note}.");
    let _ = writeln!(
        out,
        "- Percent overlap is relative to the reference (baseline) list length."
    );
    let _ = writeln!(
        out,
        "- The rank formula applies from 2 matched URLs; 0 and 1 matches use fixed values."
    );
    let _ = writeln!(out);

    section(&mut out, "DETAILED QUERY ANALYSIS");
    for (i, row) in rows.iter().take(10).enumerate() {
        let _ = writeln!(
            out,
            "Q{:2}: {}/{} overlap ({:.1}%), rho={:.3}",
            i + 1,
            row.matches,
            row.reference_len,
            row.percent_overlap,
            row.correlation
        );
    }
    if n > 10 {
        let _ = writeln!(out, "... and {} more queries", n - 10);
    }

    out
}

pub fn write_summary(
    rows: &[QueryComparison],
    method: CorrelationMethod,
    path: &Path,
) -> Result<()> {
    fs::write(path, render_summary(rows, method)).map_err(|e| Error::Report(e.to_string()))?;
    tracing::info!(path = %path.display(), "summary report written");
    Ok(())
}
