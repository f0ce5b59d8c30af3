//! Result aggregation
//!
//! Orders path results for presentation and computes run totals.
//!
//! # Example
//!
//! ```
//! use dperf::stats::PathResult;
//! use dperf::stats::aggregator::ResultAggregator;
//!
//! let aggregator = ResultAggregator::new(vec![
//!     PathResult::success("/mnt/d1", 100, 10),
//!     PathResult::success("/mnt/d2", 100, 30),
//! ]);
//!
//! assert_eq!(aggregator.sorted()[0].path().to_str(), Some("/mnt/d2"));
//! assert_eq!(aggregator.totals().read, 40);
//! ```

use super::PathResult;
use serde::Serialize;

/// Sum of throughputs over all successful paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub write: u64,
    pub read: u64,
}

/// Sorted results plus totals
///
/// Results are ordered by read throughput, highest first. The sort is stable,
/// so paths with equal read throughput keep the order they were given in.
/// Errored paths count as zero and therefore sink to the bottom.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    results: Vec<PathResult>,
    totals: Totals,
}

impl ResultAggregator {
    pub fn new(mut results: Vec<PathResult>) -> Self {
        results.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));

        let totals = results
            .iter()
            .filter(|r| r.is_ok())
            .fold(Totals::default(), |acc, r| Totals {
                write: acc.write.saturating_add(r.write_throughput().unwrap_or(0)),
                read: acc.read.saturating_add(r.read_throughput().unwrap_or(0)),
            });

        Self { results, totals }
    }

    pub fn sorted(&self) -> &[PathResult] {
        &self.results
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn into_parts(self) -> (Vec<PathResult>, Totals) {
        (self.results, self.totals)
    }
}

fn sort_key(result: &PathResult) -> u64 {
    result.read_throughput().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PerfError;

    fn paths(agg: &ResultAggregator) -> Vec<String> {
        agg.sorted()
            .iter()
            .map(|r| r.path().display().to_string())
            .collect()
    }

    #[test]
    fn test_sorts_by_read_descending() {
        let agg = ResultAggregator::new(vec![
            PathResult::success("a", 0, 10),
            PathResult::success("b", 0, 30),
            PathResult::success("c", 0, 20),
        ]);
        assert_eq!(paths(&agg), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let agg = ResultAggregator::new(vec![
            PathResult::success("first", 0, 5),
            PathResult::success("second", 0, 5),
            PathResult::success("third", 0, 9),
        ]);
        assert_eq!(paths(&agg), vec!["third", "first", "second"]);
    }

    #[test]
    fn test_errored_path_sorts_last_despite_stale_throughput() {
        let agg = ResultAggregator::new(vec![
            PathResult::new("broken", 500, 500, Some(PerfError::Cancelled)),
            PathResult::success("ok", 10, 10),
        ]);
        assert_eq!(paths(&agg), vec!["ok", "broken"]);
    }

    #[test]
    fn test_totals_skip_errors() {
        let agg = ResultAggregator::new(vec![
            PathResult::success("a", 100, 200),
            PathResult::new("b", 999, 999, Some(PerfError::NotImplemented)),
            PathResult::success("c", 50, 25),
        ]);
        assert_eq!(agg.totals(), Totals { write: 150, read: 225 });
    }

    #[test]
    fn test_empty() {
        let (results, totals) = ResultAggregator::new(Vec::new()).into_parts();
        assert!(results.is_empty());
        assert_eq!(totals, Totals::default());
    }
}
