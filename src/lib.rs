//! # Crawl Rank Core
//!
//! PageRank scores and link-degree statistics for pages discovered by a
//! web crawl.
//!
//! The input is a stream of already-normalized `(source, target)` link
//! records. Only pages that were visited as a source carry rank; links to
//! anything else are kept as external links and ignored by the iteration.
//!
//! ## Features
//!
//! - **Link graph**: interned URLs, dense page ids, sparse outlink lists
//! - **Totals index**: inverted inlink index and per-page link counts
//! - **PageRank**: power iteration with teleportation and dangling-page
//!   redistribution, full per-iteration trace
//! - **Statistics**: degree rankings, distributions, mean/variance/std-dev
//!
//! ## Usage
//!
//! ```
//! use crawlrank_core::{analyze, LinkGraph, RankConfig};
//!
//! let graph = LinkGraph::from_links([
//!     ("http://a.example", "http://b.example"),
//!     ("http://b.example", "http://a.example"),
//! ]);
//! let analysis = analyze(&graph, RankConfig::default()).unwrap();
//!
//! assert!(analysis.outcome.converged);
//! assert_eq!(analysis.stats.pages, 2);
//! ```
//!
//! With the `python` feature the crate also builds a Python extension
//! module exposing `compute_pagerank` and `compute_link_stats`.

mod error;
mod link_graph;
mod pagerank;
mod rank_table;
mod stats;
mod totals;

#[cfg(feature = "python")]
mod python;

pub use error::{NonConvergenceWarning, RankError, Result};
pub use link_graph::{LinkGraph, LinkGraphBuilder, PageId};
pub use pagerank::{ConvergenceCriterion, PageRankComputer, RankConfig, RankOutcome};
pub use rank_table::{RankTable, INITIAL_RANK};
pub use stats::{DegreeSummary, LinkStats};
pub use totals::TotalsIndex;

/// Everything computed for one link graph.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub totals: TotalsIndex,
    pub outcome: RankOutcome,
    pub stats: LinkStats,
}

/// Build the totals index, then rank pages and compute statistics.
///
/// The rank engine and the statistics reporter only share the totals
/// index, so they run side by side.
pub fn analyze(graph: &LinkGraph, config: RankConfig) -> Result<Analysis> {
    let totals = TotalsIndex::build(graph);
    totals.check_invariants()?;

    let (outcome, stats) = rayon::join(
        || PageRankComputer::new(&totals, config).compute(),
        || LinkStats::compute(&totals),
    );

    Ok(Analysis {
        outcome: outcome?,
        stats: stats?,
        totals,
    })
}
