//! Inlink/outlink totals derived from a finalized link graph.
//!
//! This is the static input to both the rank engine and the statistics
//! reporter. The inverted inlink index is built in a single pass over all
//! edges.

use crate::error::{RankError, Result};
use crate::link_graph::{LinkGraph, PageId};

/// Per-page link counts plus the inverted inlink index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsIndex {
    /// One entry per incoming edge, ordered by source page then arrival
    pub(crate) inlinks: Vec<Vec<PageId>>,
    pub(crate) outlink_counts: Vec<usize>,
    pub(crate) non_dangling: usize,
    pub(crate) total_inlinks: usize,
    pub(crate) total_outlinks: usize,
}

impl TotalsIndex {
    /// Derive totals from a link graph.
    pub fn build(graph: &LinkGraph) -> Self {
        let n = graph.page_count();
        let mut inlinks: Vec<Vec<PageId>> = vec![Vec::new(); n];
        let mut outlink_counts = vec![0usize; n];

        for page in graph.pages() {
            let outlinks = graph.outlinks(page);
            outlink_counts[page.index()] = outlinks.len();
            for &target in outlinks {
                inlinks[target.index()].push(page);
            }
        }

        let non_dangling = outlink_counts.iter().filter(|&&count| count > 0).count();
        let total_outlinks = outlink_counts.iter().sum();
        let total_inlinks = inlinks.iter().map(Vec::len).sum();

        Self {
            inlinks,
            outlink_counts,
            non_dangling,
            total_inlinks,
            total_outlinks,
        }
    }

    pub fn page_count(&self) -> usize {
        self.outlink_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlink_counts.is_empty()
    }

    /// Pages linking to `page`, once per link.
    pub fn inlinks(&self, page: PageId) -> &[PageId] {
        self.inlinks
            .get(page.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pages linking to `page`, each listed once.
    pub fn distinct_inlinks(&self, page: PageId) -> Vec<PageId> {
        let mut sources = self.inlinks(page).to_vec();
        sources.dedup();
        sources
    }

    pub fn inlink_count(&self, page: PageId) -> usize {
        self.inlinks(page).len()
    }

    pub fn outlink_count(&self, page: PageId) -> usize {
        self.outlink_counts.get(page.index()).copied().unwrap_or(0)
    }

    /// Inlink counts indexed by page.
    pub fn inlink_counts(&self) -> Vec<usize> {
        self.inlinks.iter().map(Vec::len).collect()
    }

    /// Outlink counts indexed by page.
    pub fn outlink_counts(&self) -> &[usize] {
        &self.outlink_counts
    }

    /// Pages with no outlinks, in id order.
    pub fn dangling_pages(&self) -> Vec<PageId> {
        self.outlink_counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(i, _)| PageId::new(i as u32))
            .collect()
    }

    pub fn non_dangling_count(&self) -> usize {
        self.non_dangling
    }

    pub fn dangling_count(&self) -> usize {
        self.page_count() - self.non_dangling
    }

    pub fn total_inlinks(&self) -> usize {
        self.total_inlinks
    }

    pub fn total_outlinks(&self) -> usize {
        self.total_outlinks
    }

    /// Verify that every edge is counted once on each side and that every
    /// inlink source actually has outlinks.
    pub fn check_invariants(&self) -> Result<()> {
        if self.inlinks.len() != self.outlink_counts.len() {
            return Err(RankError::InvariantViolation(format!(
                "inlink index covers {} pages but outlink counts cover {}",
                self.inlinks.len(),
                self.outlink_counts.len()
            )));
        }

        if self.total_inlinks != self.total_outlinks {
            return Err(RankError::InvariantViolation(format!(
                "total inlinks {} != total outlinks {}",
                self.total_inlinks, self.total_outlinks
            )));
        }

        for (target, sources) in self.inlinks.iter().enumerate() {
            for source in sources {
                if self.outlink_count(*source) == 0 {
                    return Err(RankError::InvariantViolation(format!(
                        "page {} links to page {} but has no outlinks",
                        source.raw(),
                        target
                    )));
                }
            }
        }

        Ok(())
    }
}
