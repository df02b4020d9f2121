//! Rank comparison between two ordered URL lists.
//!
//! The reference list is the baseline: overlap percentage is computed
//! against its length, and matching scans it in order. Matching is greedy
//! first-found per reference position, not a global bipartite matching.

use crate::normalize::comparison_key;
use serpdiff_core::{CorrelationMethod, Error, Match, QueryComparison, Result, ResultSet};

fn round_to(x: f64, decimals: i32) -> f64 {
    let k = 10f64.powi(decimals);
    (x * k).round() / k
}

/// Greedy first-found matching by comparison key.
///
/// For each reference position (in order), the candidate list is scanned
/// from the top and the first position with an equal non-empty key is
/// taken. Candidate positions are not marked as claimed, so duplicate
/// reference URLs can all match the same candidate position. That mirrors
/// the behavior the metrics were calibrated against and is pinned by a
/// test rather than deduplicated away.
pub fn find_matches(reference: &[String], candidate: &[String]) -> Vec<Match> {
    let reference_keys: Vec<String> = reference.iter().map(|u| comparison_key(u)).collect();
    let candidate_keys: Vec<String> = candidate.iter().map(|u| comparison_key(u)).collect();

    let mut matches = Vec::new();
    for (i, rk) in reference_keys.iter().enumerate() {
        if rk.is_empty() {
            continue;
        }
        for (j, ck) in candidate_keys.iter().enumerate() {
            if !ck.is_empty() && rk == ck {
                matches.push(Match {
                    reference_rank: i + 1,
                    candidate_rank: j + 1,
                });
                break;
            }
        }
    }
    matches
}

/// 100 * |matches| / |reference|, rounded to 1 decimal.
/// An empty reference list yields 0.0.
pub fn percent_overlap(reference: &[String], candidate: &[String]) -> f64 {
    if reference.is_empty() {
        return 0.0;
    }
    let matches = find_matches(reference, candidate);
    round_to(matches.len() as f64 * 100.0 / reference.len() as f64, 1)
}

fn spearman_rho(sum_d_squared: i64, n: usize) -> f64 {
    let n = n as f64;
    1.0 - (6.0 * sum_d_squared as f64) / (n * (n * n - 1.0))
}

/// Rank correlation on the ORIGINAL 1-based positions of matched URLs.
///
/// Degenerate cases: no matches is 0.0; a single match is 1.0 when the
/// ranks agree and 0.0 otherwise. With n >= 2 the value is
/// 1 - 6*sum(d^2) / (n*(n^2-1)) over original positions, rounded to 3
/// decimals. Because the positions are not dense ranks of the matched
/// subset, the result can leave [-1, +1] for small n with large spread.
/// That is deliberate and kept; `spearman_rerank` is the bounded variant.
pub fn spearman_global(reference: &[String], candidate: &[String]) -> f64 {
    let matches = find_matches(reference, candidate);
    match matches.as_slice() {
        [] => 0.0,
        [m] => {
            if m.reference_rank == m.candidate_rank {
                1.0
            } else {
                0.0
            }
        }
        _ => {
            let sum_d_squared: i64 = matches
                .iter()
                .map(|m| {
                    let d = m.reference_rank as i64 - m.candidate_rank as i64;
                    d * d
                })
                .sum();
            round_to(spearman_rho(sum_d_squared, matches.len()), 3)
        }
    }
}

/// Rank correlation on RE-RANKED matched positions, bounded to [-1, +1].
///
/// Matched pairs are ordered by reference rank and re-ranked 1..n on the
/// reference side; candidate ranks become each position's ordinal among
/// the matched candidate positions sorted ascending. Duplicate candidate
/// positions (possible via greedy candidate reuse) receive distinct
/// ordinals in encounter order. Both re-ranked sequences are permutations
/// of 1..n, so the textbook formula stays in bounds.
pub fn spearman_rerank(reference: &[String], candidate: &[String]) -> f64 {
    let matches = find_matches(reference, candidate);
    match matches.as_slice() {
        [] => 0.0,
        [m] => {
            if m.reference_rank == m.candidate_rank {
                1.0
            } else {
                0.0
            }
        }
        _ => {
            let n = matches.len();

            // find_matches already emits ascending reference ranks; re-sort
            // anyway so the re-rank basis does not depend on that detail.
            let mut by_reference = matches.clone();
            by_reference.sort_by_key(|m| m.reference_rank);

            // Ordinal of each candidate rank among the matched candidate
            // ranks, ties broken by encounter order.
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by_key(|&i| (by_reference[i].candidate_rank, i));
            let mut candidate_rerank = vec![0usize; n];
            for (ordinal, &i) in order.iter().enumerate() {
                candidate_rerank[i] = ordinal + 1;
            }

            let sum_d_squared: i64 = candidate_rerank
                .iter()
                .enumerate()
                .map(|(i, &cr)| {
                    let d = (i as i64 + 1) - cr as i64;
                    d * d
                })
                .sum();
            round_to(spearman_rho(sum_d_squared, n), 3)
        }
    }
}

/// Compare every reference query against the candidate result set.
///
/// Queries iterate in reference order; candidate-only queries are ignored.
/// Fails with [`Error::NoCommonQueries`] when the two sets share nothing,
/// which signals a misconfigured input pair rather than a transient
/// condition. Performs no IO.
pub fn compare_all(
    reference: &ResultSet,
    candidate: &ResultSet,
    method: CorrelationMethod,
) -> Result<Vec<QueryComparison>> {
    let mut out = Vec::new();
    for (query, reference_urls) in reference.iter() {
        let Some(candidate_urls) = candidate.get(query) else {
            continue;
        };
        let matches = find_matches(reference_urls, candidate_urls);
        let correlation = match method {
            CorrelationMethod::Global => spearman_global(reference_urls, candidate_urls),
            CorrelationMethod::Rerank => spearman_rerank(reference_urls, candidate_urls),
        };
        out.push(QueryComparison {
            query: query.to_string(),
            matches: matches.len(),
            percent_overlap: percent_overlap(reference_urls, candidate_urls),
            correlation,
            reference_len: reference_urls.len(),
            candidate_len: candidate_urls.len(),
        });
    }
    if out.is_empty() {
        return Err(Error::NoCommonQueries);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn urls(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|u| u.to_string()).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // The running example used below: matches at reference positions
    // [1, 5, 6, 7] and candidate positions [1, 9, 2, 6].
    fn spread_example() -> (Vec<String>, Vec<String>) {
        let reference = urls(&[
            "https://a.com/1",
            "https://ref-only.com/2",
            "https://ref-only.com/3",
            "https://ref-only.com/4",
            "https://b.com/5",
            "https://c.com/6",
            "https://d.com/7",
        ]);
        let candidate = urls(&[
            "https://a.com/1",
            "https://c.com/6",
            "https://cand-only.com/3",
            "https://cand-only.com/4",
            "https://cand-only.com/5",
            "https://d.com/7",
            "https://cand-only.com/7",
            "https://cand-only.com/8",
            "https://b.com/5",
        ]);
        (reference, candidate)
    }

    #[test]
    fn matching_is_normalization_aware() {
        let reference = urls(&["http://www.a.com/x/"]);
        let candidate = urls(&["https://other.com", "https://a.com/x"]);
        assert_eq!(
            find_matches(&reference, &candidate),
            vec![Match {
                reference_rank: 1,
                candidate_rank: 2
            }]
        );
    }

    #[test]
    fn empty_urls_never_match() {
        let reference = urls(&["", "https://a.com"]);
        let candidate = urls(&["", "https://a.com"]);
        assert_eq!(
            find_matches(&reference, &candidate),
            vec![Match {
                reference_rank: 2,
                candidate_rank: 2
            }]
        );
    }

    #[test]
    fn matching_allows_candidate_reuse_for_duplicate_references() {
        // Greedy per-reference scan with no claimed marking on the
        // candidate side: both duplicates land on candidate position 2.
        let reference = urls(&["https://x.com", "https://x.com"]);
        let candidate = urls(&["https://y.com", "https://x.com"]);
        assert_eq!(
            find_matches(&reference, &candidate),
            vec![
                Match {
                    reference_rank: 1,
                    candidate_rank: 2
                },
                Match {
                    reference_rank: 2,
                    candidate_rank: 2
                },
            ]
        );
    }

    #[test]
    fn percent_overlap_uses_reference_as_baseline() {
        let (reference, candidate) = spread_example();
        assert!(approx(percent_overlap(&reference, &candidate), 57.1));
        // Not symmetric: the candidate side is longer.
        assert!(approx(percent_overlap(&candidate, &reference), 44.4));
    }

    #[test]
    fn percent_overlap_of_empty_reference_is_zero() {
        assert_eq!(percent_overlap(&[], &urls(&["https://a.com"])), 0.0);
    }

    #[test]
    fn zero_matches_yield_zero_for_both_methods() {
        let reference = urls(&["https://a.com"]);
        let candidate = urls(&["https://b.com"]);
        assert_eq!(spearman_global(&reference, &candidate), 0.0);
        assert_eq!(spearman_rerank(&reference, &candidate), 0.0);
    }

    #[test]
    fn single_match_depends_on_rank_equality() {
        let reference = urls(&["https://a.com", "https://only-ref.com"]);
        let same_rank = urls(&["https://a.com", "https://only-cand.com"]);
        assert_eq!(spearman_global(&reference, &same_rank), 1.0);
        assert_eq!(spearman_rerank(&reference, &same_rank), 1.0);

        let different_rank = urls(&["https://only-cand.com", "https://a.com"]);
        assert_eq!(spearman_global(&reference, &different_rank), 0.0);
        assert_eq!(spearman_rerank(&reference, &different_rank), 0.0);
    }

    #[test]
    fn rerank_matches_the_worked_example() {
        // Reference re-ranks [1,2,3,4]; candidate positions [1,9,2,6]
        // sort to [1,2,6,9] so the re-ranks are [1,4,2,3]. sum(d^2) = 6,
        // n*(n^2-1) = 60, rho = 1 - 36/60 = 0.4.
        let (reference, candidate) = spread_example();
        assert!(approx(spearman_rerank(&reference, &candidate), 0.4));
    }

    #[test]
    fn global_correlation_may_exceed_unit_bound() {
        // Same matches on original positions: d = [0,-4,4,1],
        // sum(d^2) = 33, rho = 1 - 198/60 = -2.3.
        let (reference, candidate) = spread_example();
        assert!(approx(spearman_global(&reference, &candidate), -2.3));
    }

    #[test]
    fn identical_lists_correlate_perfectly_under_both_methods() {
        let list = urls(&["https://a.com/1", "https://b.com/2", "https://c.com/3"]);
        assert_eq!(spearman_global(&list, &list), 1.0);
        assert_eq!(spearman_rerank(&list, &list), 1.0);
    }

    #[test]
    fn rerank_assigns_stable_ordinals_on_duplicate_candidate_ranks() {
        // Duplicate reference URLs both claim candidate position 2; the
        // first encounter takes the lower ordinal. Re-ranks become
        // reference [1,2,3] vs candidate [1,2,3]: perfect agreement.
        let reference = urls(&["https://x.com", "https://x.com", "https://z.com"]);
        let candidate = urls(&["https://y.com", "https://x.com", "https://z.com"]);
        assert_eq!(spearman_rerank(&reference, &candidate), 1.0);
    }

    #[test]
    fn compare_all_keeps_reference_order_and_skips_candidate_only_queries() {
        let mut reference = ResultSet::new();
        reference.push("first", urls(&["https://a.com"]));
        reference.push("missing", urls(&["https://b.com"]));
        reference.push("second", urls(&["https://c.com"]));
        let mut candidate = ResultSet::new();
        candidate.push("second", urls(&["https://c.com"]));
        candidate.push("extra", urls(&["https://d.com"]));
        candidate.push("first", urls(&["https://a.com"]));

        let rows = compare_all(&reference, &candidate, CorrelationMethod::Rerank).unwrap();
        let queries: Vec<&str> = rows.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, vec!["first", "second"]);
    }

    #[test]
    fn compare_all_with_no_common_queries_fails() {
        let mut reference = ResultSet::new();
        reference.push("only-here", urls(&["https://a.com"]));
        let mut candidate = ResultSet::new();
        candidate.push("only-there", urls(&["https://b.com"]));
        assert!(matches!(
            compare_all(&reference, &candidate, CorrelationMethod::Global),
            Err(Error::NoCommonQueries)
        ));
    }

    #[test]
    fn compare_all_with_one_common_query_yields_one_row() {
        let mut reference = ResultSet::new();
        reference.push("shared", urls(&["https://a.com", "https://b.com"]));
        let mut candidate = ResultSet::new();
        candidate.push("shared", urls(&["https://b.com", "https://a.com"]));

        let rows = compare_all(&reference, &candidate, CorrelationMethod::Rerank).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].matches, 2);
        assert!(approx(rows[0].percent_overlap, 100.0));
        assert_eq!(rows[0].reference_len, 2);
        assert_eq!(rows[0].candidate_len, 2);
    }

    fn arb_url_list() -> impl Strategy<Value = Vec<String>> {
        // Small shared pool so overlapping and duplicate entries are common.
        let pool = prop::sample::select(vec![
            "https://a.com/1",
            "http://www.a.com/1/",
            "https://b.com/2",
            "https://c.com/3",
            "https://d.com/4",
            "https://e.com/5",
            "https://f.com/6",
            "",
        ]);
        prop::collection::vec(pool.prop_map(|u| u.to_string()), 0..12)
    }

    proptest! {
        #[test]
        fn rerank_correlation_stays_within_unit_bound(
            reference in arb_url_list(),
            candidate in arb_url_list(),
        ) {
            let rho = spearman_rerank(&reference, &candidate);
            prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&rho), "rho={rho}");
        }
    }
}
