//! PageRank computation with parallel iteration.
//!
//! Random-surfer power iteration with teleportation and dangling-page
//! redistribution. Every page starts at rank 1 and each iteration computes
//!
//! ```text
//! rank(p, t) = d / N
//!            + (1 - d) * sum over inlinks q of rank(q, t-1) / outlinks(q)
//!            + (1 - d) * sum over dangling q of rank(q, t-1) / N
//! ```
//!
//! from the previous iteration only. Ranks are rounded to the configured
//! precision before they are stored and compared, and are never normalized.

use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NonConvergenceWarning, RankError, Result};
use crate::link_graph::{LinkGraph, PageId};
use crate::rank_table::RankTable;
use crate::totals::TotalsIndex;

/// Per-page test deciding whether a rank has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceCriterion {
    /// `current >= previous - tolerance`: any increase counts as converged,
    /// only decreases are bounded.
    #[default]
    OneSided,
    /// `|current - previous| < tolerance`
    Symmetric,
}

impl FromStr for ConvergenceCriterion {
    type Err = RankError;

    /// Parses the same names the serde representation uses.
    fn from_str(name: &str) -> Result<Self> {
        match name {
            "one_sided" => Ok(Self::OneSided),
            "symmetric" => Ok(Self::Symmetric),
            other => Err(RankError::InvalidConfig(format!(
                "unknown convergence criterion '{}', expected 'one_sided' or 'symmetric'",
                other
            ))),
        }
    }
}

impl ConvergenceCriterion {
    pub fn is_converged(self, previous: f64, current: f64, tolerance: f64) -> bool {
        match self {
            Self::OneSided => current >= previous - tolerance,
            Self::Symmetric => (current - previous).abs() < tolerance,
        }
    }
}

/// Tunables for one ranking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Probability mass reserved for random jumps (`d`)
    pub teleportation: f64,
    /// Convergence threshold (`ε`)
    pub tolerance: f64,
    /// Decimal places ranks are rounded to; `None` keeps full precision
    pub precision: Option<u32>,
    /// Hard stop for non-converging runs
    pub max_iterations: usize,
    pub criterion: ConvergenceCriterion,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            teleportation: 0.15,
            tolerance: 0.0001,
            precision: Some(4),
            max_iterations: 100,
            criterion: ConvergenceCriterion::OneSided,
        }
    }
}

impl RankConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_teleportation(mut self, teleportation: f64) -> Self {
        self.teleportation = teleportation;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_precision(mut self, precision: Option<u32>) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_criterion(mut self, criterion: ConvergenceCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Reject settings the iteration cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.teleportation) {
            return Err(RankError::InvalidConfig(format!(
                "teleportation must be within [0, 1], got {}",
                self.teleportation
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RankError::InvalidConfig(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if let Some(places) = self.precision {
            if places > MAX_PRECISION {
                return Err(RankError::InvalidConfig(format!(
                    "precision must be at most {} decimal places, got {}",
                    MAX_PRECISION, places
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(RankError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn quantize(&self, rank: f64) -> f64 {
        match self.precision {
            Some(places) => round_to(rank, places),
            None => rank,
        }
    }
}

/// Beyond this, `10^places` no longer leaves room for the integer part of a rank.
const MAX_PRECISION: u32 = 15;

/// Round the exact decimal value of `value` to `places` decimal places.
///
/// Scaling by `10^places` first would round twice and push values just
/// below a half onto the tie, so this goes through exact float formatting.
/// Exact ties round to even.
fn round_to(value: f64, places: u32) -> f64 {
    format!("{:.*}", places as usize, value)
        .parse()
        .unwrap_or(value)
}

/// Final state of a ranking run.
#[derive(Debug, Clone, Serialize)]
pub struct RankOutcome {
    pub table: RankTable,
    pub iterations: usize,
    /// Whether every page converged in the final iteration
    pub converged: bool,
    pub unconverged_pages: usize,
}

impl RankOutcome {
    /// Final rank of every page, indexed by page id.
    pub fn final_ranks(&self) -> &[f64] {
        self.table.latest()
    }

    pub fn rank(&self, page: PageId) -> Option<f64> {
        self.table.rank(page)
    }

    /// Sum of the final ranks. Not forced to 1.
    pub fn total_mass(&self) -> f64 {
        self.final_ranks().iter().sum()
    }

    /// Present when the run hit the iteration cap.
    pub fn warning(&self) -> Option<NonConvergenceWarning> {
        (!self.converged).then_some(NonConvergenceWarning {
            iterations: self.iterations,
            unconverged_pages: self.unconverged_pages,
        })
    }

    /// Pages by final rank, highest first, ties broken by URL.
    pub fn ranked<'g>(&self, graph: &'g LinkGraph) -> Vec<(&'g str, f64)> {
        let mut ranked: Vec<(&str, f64)> = graph
            .pages()
            .filter_map(|page| Some((graph.url(page)?, self.rank(page)?)))
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// PageRank computer over a fixed totals index.
pub struct PageRankComputer<'a> {
    totals: &'a TotalsIndex,
    dangling: Vec<PageId>,
    config: RankConfig,
}

impl<'a> PageRankComputer<'a> {
    /// Create a new PageRank computer.
    ///
    /// # Arguments
    ///
    /// * `totals` - Link totals of the graph to rank
    /// * `config` - Teleportation, tolerance, precision and iteration cap
    pub fn new(totals: &'a TotalsIndex, config: RankConfig) -> Self {
        Self {
            totals,
            dangling: totals.dangling_pages(),
            config,
        }
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    /// Compute PageRank scores using power iteration.
    ///
    /// Stops once every page passes the convergence test in the same
    /// iteration, or at `max_iterations`. Hitting the cap is reported
    /// through [`RankOutcome::converged`], not as an error.
    ///
    /// # Errors
    ///
    /// * [`RankError::InvalidConfig`] for unusable settings
    /// * [`RankError::EmptyGraph`] when there are no pages
    /// * [`RankError::InvariantViolation`] when a linking page has no outlinks
    pub fn compute(&self) -> Result<RankOutcome> {
        self.config.validate()?;

        let n = self.totals.page_count();
        if n == 0 {
            return Err(RankError::EmptyGraph);
        }

        let pages = n as f64;
        let d = self.config.teleportation;
        let teleport = d / pages;
        let follow = 1.0 - d;

        let mut table = RankTable::new(n);
        let mut unconverged;

        loop {
            let previous = table.latest();

            // Sequential so repeated runs agree bit-for-bit
            let dangling_share: f64 = self
                .dangling
                .iter()
                .map(|page| previous[page.index()] / pages)
                .sum();

            let next = (0..n as u32)
                .into_par_iter()
                .map(|i| {
                    let link_share = self.link_share(previous, PageId::new(i))?;
                    let rank = teleport + follow * link_share + follow * dangling_share;
                    Ok(self.config.quantize(rank))
                })
                .collect::<Result<Vec<f64>>>()?;

            unconverged = previous
                .iter()
                .zip(&next)
                .filter(|(&old, &new)| {
                    !self
                        .config
                        .criterion
                        .is_converged(old, new, self.config.tolerance)
                })
                .count();

            table.push_round(next);
            let iteration = table.iterations();

            debug!(
                iteration,
                unconverged,
                mass = table.latest().iter().sum::<f64>(),
                "pagerank iteration"
            );

            if unconverged == 0 || iteration >= self.config.max_iterations {
                break;
            }
        }

        let iterations = table.iterations();
        let converged = unconverged == 0;

        if converged {
            info!(iterations, pages = n, "pagerank converged");
        } else {
            warn!(
                iterations,
                unconverged,
                "pagerank stopped at iteration cap before converging"
            );
        }

        Ok(RankOutcome {
            table,
            iterations,
            converged,
            unconverged_pages: unconverged,
        })
    }

    /// Rank flowing into `page` along links during one iteration.
    fn link_share(&self, previous: &[f64], page: PageId) -> Result<f64> {
        let mut share = 0.0;
        for &source in self.totals.inlinks(page) {
            let outlinks = self.totals.outlink_count(source);
            if outlinks == 0 {
                return Err(RankError::InvariantViolation(format!(
                    "page {} is an inlink of page {} but has no outlinks",
                    source.raw(),
                    page.raw()
                )));
            }
            share += previous[source.index()] / outlinks as f64;
        }
        Ok(share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_graph::LinkGraphBuilder;
    use proptest::prelude::*;

    fn rank(graph: &LinkGraph, config: RankConfig) -> Result<RankOutcome> {
        let totals = TotalsIndex::build(graph);
        PageRankComputer::new(&totals, config).compute()
    }

    fn isolated_pages(count: usize) -> LinkGraph {
        let mut builder = LinkGraphBuilder::new();
        for i in 0..count {
            builder.add_page(&format!("page{}", i));
        }
        builder.finish()
    }

    #[test]
    fn test_self_loop_is_fixed_point() {
        let graph = LinkGraph::from_links([("a", "a")]);

        for d in [0.0, 0.15, 0.5, 0.85, 1.0] {
            let outcome = rank(&graph, RankConfig::new().with_teleportation(d)).unwrap();

            assert!(outcome.converged);
            assert_eq!(outcome.iterations, 1);
            assert_eq!(outcome.final_ranks(), &[1.0]);
        }
    }

    #[test]
    fn test_mutual_links_are_symmetric() {
        let graph = LinkGraph::from_links([("a", "b"), ("b", "a")]);

        for tolerance in [0.01, 0.0001, 0.000001] {
            let config = RankConfig::new().with_tolerance(tolerance);
            let outcome = rank(&graph, config).unwrap();
            let ranks = outcome.final_ranks();

            assert!(outcome.converged);
            assert_eq!(ranks[0].to_bits(), ranks[1].to_bits());
        }

        let outcome = rank(&graph, RankConfig::new()).unwrap();
        assert!((outcome.final_ranks()[0] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_isolated_pages_keep_their_rank_without_teleportation() {
        let graph = isolated_pages(4);
        let outcome = rank(&graph, RankConfig::new().with_teleportation(0.0)).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);
        for page in graph.pages() {
            assert_eq!(outcome.table.history(page), vec![1.0, 1.0]);
        }
    }

    #[test]
    fn test_isolated_pages_under_full_teleportation() {
        let graph = isolated_pages(4);
        let outcome = rank(&graph, RankConfig::new().with_teleportation(1.0)).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.final_ranks(), &[0.25, 0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_dangling_mass_is_redistributed() {
        // a -> b, b -> c, c dangling; without rounding total mass follows
        // 1 + (N - 1) * (1 - d)^t
        let mut builder = LinkGraphBuilder::new();
        builder.extend_links([("a", "b"), ("b", "c")]);
        builder.add_page("c");
        let graph = builder.finish();

        let config = RankConfig::new()
            .with_precision(None)
            .with_max_iterations(25)
            .with_criterion(ConvergenceCriterion::Symmetric)
            .with_tolerance(0.0);
        let outcome = rank(&graph, config).unwrap();

        let expected = 1.0 + 2.0 * 0.85f64.powi(outcome.iterations as i32);
        assert!((outcome.total_mass() - expected).abs() < 1e-9);
        assert_eq!(outcome.iterations, 25);
    }

    #[test]
    fn test_ranks_are_rounded_before_storing() {
        let graph = LinkGraph::from_links([("a", "b"), ("b", "c"), ("c", "a"), ("a", "c")]);
        let outcome = rank(&graph, RankConfig::new().with_precision(Some(2))).unwrap();

        for t in 0..=outcome.iterations {
            for &value in outcome.table.round(t).unwrap() {
                assert_eq!(value, round_to(value, 2));
            }
        }
    }

    #[test]
    fn test_hub_ranks_highest() {
        let graph = LinkGraph::from_links([
            ("a", "hub"),
            ("b", "hub"),
            ("c", "hub"),
            ("hub", "a"),
        ]);
        let outcome = rank(&graph, RankConfig::new()).unwrap();
        let ranked = outcome.ranked(&graph);

        assert_eq!(ranked[0].0, "hub");
        assert_eq!(ranked.len(), 4);
    }

    #[test]
    fn test_ranked_ties_break_on_url() {
        let graph = LinkGraph::from_links([("b", "a"), ("a", "b")]);
        let outcome = rank(&graph, RankConfig::new()).unwrap();
        let urls: Vec<&str> = outcome.ranked(&graph).into_iter().map(|(u, _)| u).collect();

        assert_eq!(urls, vec!["a", "b"]);
    }

    #[test]
    fn test_iteration_cap_reports_warning() {
        let graph = LinkGraph::from_links([("a", "b"), ("b", "a")]);
        let outcome = rank(&graph, RankConfig::new().with_max_iterations(1)).unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(
            outcome.warning(),
            Some(NonConvergenceWarning {
                iterations: 1,
                unconverged_pages: 2,
            })
        );
    }

    #[test]
    fn test_converged_run_has_no_warning() {
        let graph = LinkGraph::from_links([("a", "a")]);
        let outcome = rank(&graph, RankConfig::new()).unwrap();
        assert_eq!(outcome.warning(), None);
    }

    #[test]
    fn test_symmetric_criterion_never_stops_earlier() {
        let graph = LinkGraph::from_links([
            ("a", "b"),
            ("b", "c"),
            ("c", "a"),
            ("c", "b"),
            ("d", "a"),
        ]);

        let one_sided = rank(&graph, RankConfig::new()).unwrap();
        let symmetric = rank(
            &graph,
            RankConfig::new().with_criterion(ConvergenceCriterion::Symmetric),
        )
        .unwrap();

        assert!(symmetric.iterations >= one_sided.iterations);
    }

    #[test]
    fn test_convergence_criteria() {
        let tolerance = 0.0001;

        // Large increase
        assert!(ConvergenceCriterion::OneSided.is_converged(1.0, 5.0, tolerance));
        assert!(!ConvergenceCriterion::Symmetric.is_converged(1.0, 5.0, tolerance));

        // Large decrease
        assert!(!ConvergenceCriterion::OneSided.is_converged(1.0, 0.99, tolerance));
        assert!(!ConvergenceCriterion::Symmetric.is_converged(1.0, 0.99, tolerance));

        // Within tolerance
        assert!(ConvergenceCriterion::OneSided.is_converged(1.0, 0.99995, tolerance));
        assert!(ConvergenceCriterion::Symmetric.is_converged(1.0, 0.99995, tolerance));
    }

    #[test]
    fn test_criterion_from_str() {
        assert_eq!(
            "one_sided".parse::<ConvergenceCriterion>(),
            Ok(ConvergenceCriterion::OneSided)
        );
        assert_eq!(
            "symmetric".parse::<ConvergenceCriterion>(),
            Ok(ConvergenceCriterion::Symmetric)
        );
        assert!(matches!(
            "absolute".parse::<ConvergenceCriterion>(),
            Err(RankError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_graph_fails_fast() {
        let graph = LinkGraphBuilder::new().finish();
        assert_eq!(rank(&graph, RankConfig::new()).unwrap_err(), RankError::EmptyGraph);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let graph = LinkGraph::from_links([("a", "a")]);

        for config in [
            RankConfig::new().with_teleportation(1.5),
            RankConfig::new().with_teleportation(-0.1),
            RankConfig::new().with_tolerance(f64::NAN),
            RankConfig::new().with_precision(Some(16)),
            RankConfig::new().with_max_iterations(0),
        ] {
            assert!(matches!(
                rank(&graph, config),
                Err(RankError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_inlink_from_dangling_page_is_invariant_violation() {
        let totals = TotalsIndex {
            inlinks: vec![vec![PageId::new(1)], vec![]],
            outlink_counts: vec![1, 0],
            non_dangling: 1,
            total_inlinks: 1,
            total_outlinks: 1,
        };

        let result = PageRankComputer::new(&totals, RankConfig::new()).compute();
        assert!(matches!(result, Err(RankError::InvariantViolation(_))));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RankConfig =
            serde_json::from_str(r#"{"teleportation": 0.85, "criterion": "symmetric"}"#).unwrap();

        assert_eq!(config.teleportation, 0.85);
        assert_eq!(config.criterion, ConvergenceCriterion::Symmetric);
        assert_eq!(config.tolerance, 0.0001);
        assert_eq!(config.precision, Some(4));
        assert_eq!(config.max_iterations, 100);
    }

    #[test]
    fn test_round_to_near_ties() {
        // 0.075 + 0.85 * 0.925 is 0.86124999999999996..., just below the tie
        assert_eq!(round_to(0.075 + 0.85 * 0.925, 4), 0.8612);
        assert_eq!(round_to(0.86125, 4), 0.8612);
        assert_eq!(round_to(1.0005, 3), 1.0);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(0.12346, 4), 0.1235);
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);

        // Exact binary ties go to even
        assert_eq!(round_to(0.515625, 4), 0.5156);
        assert_eq!(round_to(0.53125, 4), 0.5312);
    }

    #[test]
    fn test_round_to_engine_values() {
        // (unrounded rank, correctly rounded at 4 places)
        let cases = [
            (0.075 + 0.85 * 1.0, 0.925),
            (0.075 + 0.85 * 0.8612, 0.807),
            (0.075 + 0.85 * 0.807, 0.761),
            (0.075 + 0.85 * 0.761, 0.7218),
            (0.25 + 0.5 * 0.5312, 0.5156),
            (0.25 + 0.5 * 0.5039, 0.502),
        ];
        for (raw, expected) in cases {
            assert_eq!(round_to(raw, 4), expected, "rounding {}", raw);
        }
    }

    #[test]
    fn test_mutual_links_trace() {
        let graph = LinkGraph::from_links([("a", "b"), ("b", "a")]);
        let outcome = rank(&graph, RankConfig::new()).unwrap();

        for page in graph.pages() {
            let history = outcome.table.history(page);
            assert_eq!(&history[..6], &[1.0, 0.925, 0.8612, 0.807, 0.761, 0.7218]);
        }
        assert_eq!(outcome.iterations, 39);
        assert_eq!(outcome.final_ranks(), &[0.5009, 0.5009]);
    }

    #[test]
    fn test_self_loops_settle_on_rounded_fixed_point() {
        let graph = LinkGraph::from_links([("a", "a"), ("b", "b")]);
        let outcome = rank(&graph, RankConfig::new().with_teleportation(0.5)).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 12);
        assert_eq!(outcome.final_ranks(), &[0.5001, 0.5001]);
    }

    #[test]
    fn test_converging_on_cap_iteration_is_converged() {
        let graph = LinkGraph::from_links([("a", "a")]);
        let outcome = rank(&graph, RankConfig::new().with_max_iterations(1)).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.warning(), None);
    }

    proptest! {
        #[test]
        fn prop_histories_match_iteration_count(
            page_count in 1usize..8,
            links in prop::collection::vec((0usize..8, 0usize..8), 0..24),
            teleportation in 0.0f64..=1.0,
        ) {
            let mut builder = LinkGraphBuilder::new();
            for i in 0..page_count {
                builder.add_page(&format!("p{}", i));
            }
            for (source, target) in links {
                builder.add_link(
                    &format!("p{}", source % page_count),
                    &format!("p{}", target % page_count),
                );
            }
            let graph = builder.finish();

            let config = RankConfig::new()
                .with_teleportation(teleportation)
                .with_max_iterations(30);
            let outcome = rank(&graph, config).unwrap();

            prop_assert!(outcome.iterations >= 1 && outcome.iterations <= 30);
            for page in graph.pages() {
                prop_assert_eq!(outcome.table.history(page).len(), outcome.iterations + 1);
            }
            if outcome.warning().is_some() {
                prop_assert_eq!(outcome.iterations, 30);
            }
        }
    }
}
