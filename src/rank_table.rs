//! Per-iteration rank history.

use serde::Serialize;

use crate::link_graph::PageId;

/// Rank value every page starts from.
pub const INITIAL_RANK: f64 = 1.0;

/// Rank history of every page, one row per iteration.
///
/// Row 0 holds the initial ranks. Rows are only ever appended, and each
/// row covers every page, so all page histories always have equal length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankTable {
    rounds: Vec<Vec<f64>>,
}

impl RankTable {
    /// Seed a table for `pages` pages at [`INITIAL_RANK`].
    pub fn new(pages: usize) -> Self {
        Self {
            rounds: vec![vec![INITIAL_RANK; pages]],
        }
    }

    pub fn page_count(&self) -> usize {
        self.rounds[0].len()
    }

    /// Number of completed iterations (rows after the initial one).
    pub fn iterations(&self) -> usize {
        self.rounds.len() - 1
    }

    /// Append the ranks of the next iteration.
    pub(crate) fn push_round(&mut self, ranks: Vec<f64>) {
        debug_assert_eq!(ranks.len(), self.page_count());
        self.rounds.push(ranks);
    }

    /// Ranks from the most recent iteration.
    pub fn latest(&self) -> &[f64] {
        self.rounds.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ranks of all pages after iteration `t`.
    pub fn round(&self, t: usize) -> Option<&[f64]> {
        self.rounds.get(t).map(Vec::as_slice)
    }

    /// Full rank history of one page, starting with its initial rank.
    pub fn history(&self, page: PageId) -> Vec<f64> {
        self.rounds
            .iter()
            .filter_map(|round| round.get(page.index()).copied())
            .collect()
    }

    /// Most recent rank of one page.
    pub fn rank(&self, page: PageId) -> Option<f64> {
        self.latest().get(page.index()).copied()
    }
}
