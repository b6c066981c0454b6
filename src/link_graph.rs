//! Directed link graph of crawled pages.
//!
//! Pages are identified by their (already normalized) URL. Each URL is
//! interned once and every visited page gets a dense [`PageId`] in the
//! order it was first seen, which is the index used everywhere else in
//! the crate.

use rustc_hash::FxHashMap;
use serde::Serialize;
use string_interner::{DefaultStringInterner, DefaultSymbol};
use tracing::debug;

/// Dense identifier of a visited page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(u32);

impl PageId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    /// Position of this page in per-page vectors.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Id for the page after `visited` pages. Page ids and the page count both
/// fit in a `u32`, so a graph holds at most `u32::MAX` pages.
fn next_page_id(visited: usize) -> PageId {
    let raw = u32::try_from(visited)
        .ok()
        .filter(|&raw| raw < u32::MAX)
        .expect("link graph is limited to u32::MAX pages");
    PageId(raw)
}

/// Incremental builder fed with crawl records in arrival order.
#[derive(Debug, Default)]
pub struct LinkGraphBuilder {
    urls: DefaultStringInterner,
    page_of: FxHashMap<DefaultSymbol, PageId>,
    pages: Vec<DefaultSymbol>,
    /// Outlink targets per page, resolved in `finish`
    raw_links: Vec<Vec<DefaultSymbol>>,
}

impl LinkGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a visited page, returning its id.
    ///
    /// Visiting the same URL again returns the existing id.
    pub fn add_page(&mut self, url: &str) -> PageId {
        let symbol = self.urls.get_or_intern(url);
        if let Some(&page) = self.page_of.get(&symbol) {
            return page;
        }

        let page = next_page_id(self.pages.len());
        self.page_of.insert(symbol, page);
        self.pages.push(symbol);
        self.raw_links.push(Vec::new());
        page
    }

    /// Append `target` to the outlinks of `source`, visiting `source` if needed.
    ///
    /// Duplicate links and self-loops are kept as given.
    pub fn add_link(&mut self, source: &str, target: &str) -> PageId {
        let page = self.add_page(source);
        let target = self.urls.get_or_intern(target);
        self.raw_links[page.index()].push(target);
        page
    }

    /// Add a batch of `(source, target)` records.
    pub fn extend_links<I, S>(&mut self, links: I)
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        for (source, target) in links {
            self.add_link(source.as_ref(), target.as_ref());
        }
    }

    /// Number of pages visited so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Freeze the graph.
    ///
    /// Targets that were visited anywhere in the stream become rank-bearing
    /// outlinks (arrival order kept); the rest are kept as external links.
    pub fn finish(self) -> LinkGraph {
        let LinkGraphBuilder {
            urls,
            page_of,
            pages,
            raw_links,
        } = self;

        let mut outlinks = Vec::with_capacity(raw_links.len());
        let mut external = Vec::with_capacity(raw_links.len());

        for targets in raw_links {
            let mut internal = Vec::with_capacity(targets.len());
            let mut unvisited = Vec::new();
            for target in targets {
                match page_of.get(&target) {
                    Some(&page) => internal.push(page),
                    None => unvisited.push(target),
                }
            }
            outlinks.push(internal);
            external.push(unvisited);
        }

        let graph = LinkGraph {
            urls,
            page_of,
            pages,
            outlinks,
            external,
        };

        debug!(
            pages = graph.page_count(),
            links = graph.link_count(),
            external_links = graph.external_link_count(),
            "link graph finalized"
        );

        graph
    }
}

/// Immutable link graph over visited pages.
#[derive(Debug, Clone)]
pub struct LinkGraph {
    urls: DefaultStringInterner,
    page_of: FxHashMap<DefaultSymbol, PageId>,
    pages: Vec<DefaultSymbol>,
    outlinks: Vec<Vec<PageId>>,
    external: Vec<Vec<DefaultSymbol>>,
}

impl LinkGraph {
    /// Build a graph from `(source, target)` records in one go.
    pub fn from_links<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut builder = LinkGraphBuilder::new();
        builder.extend_links(links);
        builder.finish()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All visited pages in visit order.
    pub fn pages(&self) -> impl Iterator<Item = PageId> + '_ {
        (0..self.pages.len() as u32).map(PageId)
    }

    /// URL of a visited page.
    pub fn url(&self, page: PageId) -> Option<&str> {
        self.pages
            .get(page.index())
            .and_then(|&symbol| self.urls.resolve(symbol))
    }

    /// Look up a visited page by URL.
    pub fn page(&self, url: &str) -> Option<PageId> {
        self.urls
            .get(url)
            .and_then(|symbol| self.page_of.get(&symbol).copied())
    }

    /// Rank-bearing outlinks of a page, in arrival order.
    pub fn outlinks(&self, page: PageId) -> &[PageId] {
        self.outlinks
            .get(page.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn outlink_count(&self, page: PageId) -> usize {
        self.outlinks(page).len()
    }

    pub fn is_dangling(&self, page: PageId) -> bool {
        self.outlinks(page).is_empty()
    }

    /// Whether `source` links to `target` at least once.
    pub fn has_link(&self, source: PageId, target: PageId) -> bool {
        self.outlinks(source).contains(&target)
    }

    /// Links from `page` to URLs that were never visited.
    pub fn external_links(&self, page: PageId) -> impl Iterator<Item = &str> + '_ {
        self.external
            .get(page.index())
            .into_iter()
            .flatten()
            .filter_map(move |&symbol| self.urls.resolve(symbol))
    }

    /// Total number of rank-bearing links.
    pub fn link_count(&self) -> usize {
        self.outlinks.iter().map(Vec::len).sum()
    }

    /// Total number of links to unvisited URLs.
    pub fn external_link_count(&self) -> usize {
        self.external.iter().map(Vec::len).sum()
    }
}
