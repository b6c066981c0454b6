//! Python bindings.
//!
//! ```python
//! from crawlrank._rust_core import compute_pagerank, compute_link_stats
//!
//! result = compute_pagerank(
//!     links=[("http://a", "http://b"), ("http://b", "http://a")],
//!     teleportation=0.15,
//! )
//! print(result["ranks"], result["iterations"], result["converged"])
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::{
    analyze, ConvergenceCriterion, LinkGraph, LinkGraphBuilder, LinkStats, PageRankComputer, RankConfig, RankError,
    TotalsIndex,
};

impl From<RankError> for PyErr {
    fn from(err: RankError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

fn build_graph(links: &[(String, String)], pages: Option<&[String]>) -> LinkGraph {
    let mut builder = LinkGraphBuilder::new();
    for (source, target) in links {
        builder.add_link(source, target);
    }
    for page in pages.unwrap_or_default() {
        builder.add_page(page);
    }
    builder.finish()
}

/// Compute PageRank scores for crawled pages.
///
/// # Arguments
///
/// * `links` - List of (source, target) URL tuples, already normalized
/// * `pages` - Extra visited pages, e.g. pages without outlinks
/// * `teleportation` - Random-jump probability (default: 0.15)
/// * `tolerance` - Convergence threshold (default: 1e-4)
/// * `precision` - Decimal places ranks are rounded to, `None` for no rounding
/// * `max_iterations` - Iteration cap (default: 100)
/// * `criterion` - `"one_sided"` (default) or `"symmetric"` convergence test
///
/// # Returns
///
/// Dictionary with `ranks` (url -> rank), `iterations` and `converged`.
#[pyfunction]
#[pyo3(signature = (links, pages=None, teleportation=0.15, tolerance=1e-4, precision=Some(4), max_iterations=100, criterion="one_sided"))]
fn compute_pagerank(
    py: Python<'_>,
    links: Vec<(String, String)>,
    pages: Option<Vec<String>>,
    teleportation: f64,
    tolerance: f64,
    precision: Option<u32>,
    max_iterations: usize,
    criterion: String,
) -> PyResult<Py<PyDict>> {
    let criterion: ConvergenceCriterion = criterion.parse()?;
    let config = RankConfig::new()
        .with_teleportation(teleportation)
        .with_tolerance(tolerance)
        .with_precision(precision)
        .with_max_iterations(max_iterations)
        .with_criterion(criterion);

    // Release GIL during computation
    let (ranks, iterations, converged) = py.allow_threads(|| {
        let graph = build_graph(&links, pages.as_deref());
        let totals = TotalsIndex::build(&graph);
        totals.check_invariants()?;
        let outcome = PageRankComputer::new(&totals, config).compute()?;

        let ranks: Vec<(String, f64)> = outcome
            .ranked(&graph)
            .into_iter()
            .map(|(url, rank)| (url.to_string(), rank))
            .collect();
        Ok::<_, RankError>((ranks, outcome.iterations, outcome.converged))
    })?;

    let rank_dict = PyDict::new_bound(py);
    for (url, rank) in ranks {
        rank_dict.set_item(url, rank)?;
    }

    let dict = PyDict::new_bound(py);
    dict.set_item("ranks", rank_dict)?;
    dict.set_item("iterations", iterations)?;
    dict.set_item("converged", converged)?;

    Ok(dict.into())
}

/// Link-degree statistics for crawled pages.
///
/// Returns page counts, in/out-degree mean, variance and standard deviation,
/// and the degree distributions as lists of (degree, pages) tuples.
#[pyfunction]
#[pyo3(signature = (links, pages=None))]
fn compute_link_stats(
    py: Python<'_>,
    links: Vec<(String, String)>,
    pages: Option<Vec<String>>,
) -> PyResult<Py<PyDict>> {
    let stats = py.allow_threads(|| {
        let graph = build_graph(&links, pages.as_deref());
        LinkStats::compute(&TotalsIndex::build(&graph))
    })?;

    let dict = PyDict::new_bound(py);
    dict.set_item("pages", stats.pages)?;
    dict.set_item("dangling_pages", stats.dangling_pages)?;
    for (prefix, summary) in [("inlinks", &stats.inlinks), ("outlinks", &stats.outlinks)] {
        dict.set_item(format!("total_{}", prefix), summary.total)?;
        dict.set_item(format!("mean_{}", prefix), summary.mean)?;
        dict.set_item(format!("variance_{}", prefix), summary.variance)?;
        dict.set_item(format!("std_dev_{}", prefix), summary.std_dev)?;
    }
    dict.set_item(
        "inlink_distribution",
        PyList::new_bound(py, stats.inlink_distribution.iter().copied()),
    )?;
    dict.set_item(
        "outlink_distribution",
        PyList::new_bound(py, stats.outlink_distribution.iter().copied()),
    )?;

    Ok(dict.into())
}

/// Top pages by final rank, as (url, rank, inlink count) tuples.
#[pyfunction]
#[pyo3(signature = (links, pages=None, top_n=10))]
fn get_top_pages(
    py: Python<'_>,
    links: Vec<(String, String)>,
    pages: Option<Vec<String>>,
    top_n: usize,
) -> PyResult<Py<PyList>> {
    let top = py.allow_threads(|| {
        let graph = build_graph(&links, pages.as_deref());
        let analysis = analyze(&graph, RankConfig::default())?;

        let mut top: Vec<(String, f64, usize)> = analysis
            .outcome
            .ranked(&graph)
            .into_iter()
            .filter_map(|(url, rank)| {
                let page = graph.page(url)?;
                Some((url.to_string(), rank, analysis.totals.inlink_count(page)))
            })
            .collect();
        top.truncate(top_n);
        Ok::<_, RankError>(top)
    })?;

    Ok(PyList::new_bound(py, top).into())
}

/// Python module definition.
#[pymodule]
fn _rust_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compute_pagerank, m)?)?;
    m.add_function(wrap_pyfunction!(compute_link_stats, m)?)?;
    m.add_function(wrap_pyfunction!(get_top_pages, m)?)?;

    // Version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
