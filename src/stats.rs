//! Link-degree statistics for crawled pages.
//!
//! Reports how inlinks and outlinks are spread across pages: per-page
//! counts, degree distributions and their mean, variance and standard
//! deviation. Works from the totals index alone and never looks at ranks.

use hashbrown::HashMap;
use serde::Serialize;

use crate::error::{RankError, Result};
use crate::link_graph::{LinkGraph, PageId};
use crate::totals::TotalsIndex;

/// Mean, variance and standard deviation of one degree direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegreeSummary {
    pub total: usize,
    /// Integer mean (`total / pages`, truncated)
    pub mean: usize,
    /// Population variance around the truncated mean
    pub variance: f64,
    pub std_dev: f64,
}

impl DegreeSummary {
    fn from_counts(counts: &[usize]) -> Self {
        let total: usize = counts.iter().sum();
        let mean = total / counts.len();
        let variance = counts
            .iter()
            .map(|&count| {
                let deviation = count as f64 - mean as f64;
                deviation * deviation
            })
            .sum::<f64>()
            / counts.len() as f64;

        Self {
            total,
            mean,
            variance,
            std_dev: variance.sqrt(),
        }
    }
}

/// Degree statistics for a whole graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStats {
    pub pages: usize,
    pub dangling_pages: usize,
    /// `(page, inlink count)`, highest count first, then by page id.
    /// [`LinkStats::inlinks_by_url`] orders ties by URL instead, like
    /// [`RankOutcome::ranked`](crate::RankOutcome::ranked).
    pub inlinks_per_page: Vec<(PageId, usize)>,
    /// `(page, outlink count)`, highest count first, then by page id
    pub outlinks_per_page: Vec<(PageId, usize)>,
    /// `(in-degree, pages with that in-degree)`, highest degree first
    pub inlink_distribution: Vec<(usize, usize)>,
    /// `(out-degree, pages with that out-degree)`, highest degree first
    pub outlink_distribution: Vec<(usize, usize)>,
    pub inlinks: DegreeSummary,
    pub outlinks: DegreeSummary,
}

impl LinkStats {
    /// Compute statistics from a totals index.
    ///
    /// Fails with [`RankError::EmptyGraph`] when there are no pages to
    /// average over.
    pub fn compute(totals: &TotalsIndex) -> Result<Self> {
        if totals.is_empty() {
            return Err(RankError::EmptyGraph);
        }

        let inlink_counts = totals.inlink_counts();
        let outlink_counts = totals.outlink_counts();

        Ok(Self {
            pages: totals.page_count(),
            dangling_pages: totals.dangling_count(),
            inlinks_per_page: per_page(&inlink_counts),
            outlinks_per_page: per_page(outlink_counts),
            inlink_distribution: distribution(&inlink_counts),
            outlink_distribution: distribution(outlink_counts),
            inlinks: DegreeSummary::from_counts(&inlink_counts),
            outlinks: DegreeSummary::from_counts(outlink_counts),
        })
    }

    /// Inlink counts by URL, highest first, ties broken by URL.
    pub fn inlinks_by_url<'g>(&self, graph: &'g LinkGraph) -> Vec<(&'g str, usize)> {
        by_url(&self.inlinks_per_page, graph)
    }

    /// Outlink counts by URL, highest first, ties broken by URL.
    pub fn outlinks_by_url<'g>(&self, graph: &'g LinkGraph) -> Vec<(&'g str, usize)> {
        by_url(&self.outlinks_per_page, graph)
    }

    /// Pages with at least `threshold` inlinks, most linked first.
    pub fn most_linked(&self, threshold: usize) -> impl Iterator<Item = (PageId, usize)> + '_ {
        self.inlinks_per_page
            .iter()
            .copied()
            .take_while(move |&(_, count)| count >= threshold)
    }

    /// Pages nothing links to and that link nowhere.
    pub fn isolated_pages(&self) -> Vec<PageId> {
        let linked: HashMap<PageId, usize> = self.inlinks_per_page.iter().copied().collect();
        let mut isolated: Vec<PageId> = self
            .outlinks_per_page
            .iter()
            .filter(|&&(page, out)| out == 0 && linked.get(&page).copied().unwrap_or(0) == 0)
            .map(|&(page, _)| page)
            .collect();
        isolated.sort();
        isolated
    }
}

fn per_page(counts: &[usize]) -> Vec<(PageId, usize)> {
    let mut ranked: Vec<(PageId, usize)> = counts
        .iter()
        .enumerate()
        .map(|(i, &count)| (PageId::new(i as u32), count))
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn by_url<'g>(per_page: &[(PageId, usize)], graph: &'g LinkGraph) -> Vec<(&'g str, usize)> {
    let mut listed: Vec<(&str, usize)> = per_page
        .iter()
        .filter_map(|&(page, count)| Some((graph.url(page)?, count)))
        .collect();

    listed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    listed
}

fn distribution(counts: &[usize]) -> Vec<(usize, usize)> {
    let mut pages_by_degree: HashMap<usize, usize> = HashMap::new();
    for &count in counts {
        *pages_by_degree.entry(count).or_insert(0) += 1;
    }

    let mut distribution: Vec<(usize, usize)> = pages_by_degree.into_iter().collect();
    distribution.sort_by(|a, b| b.0.cmp(&a.0));
    distribution
}
