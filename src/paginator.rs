/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::paginator
  ------------------------------------------------------------
  Purpose:
    Walk the search results for one term page by page until
    the result budget is spent or a page yields nothing
    usable.

  Security / Safety Notes:
    Pure state machine; the caller performs the requests.

  Dependencies:
    registry::PageQuery for request shape.

  Operational Scope:
    One paginator per search term, driven by the orchestrator.

  Revision History:
    2026-10-16 NMR  Authored search paginator.
  ------------------------------------------------------------
  Principles Observed:
    - Offsets strictly increase by the batch size
    - No offset is ever requested twice
============================================================*/

use crate::registry::PageQuery;

/// Paginator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Next request goes out at this offset.
    Fetching(usize),
    /// The page fetched at this offset is being filtered.
    Evaluating(usize),
    Done,
}

#[derive(Debug, Clone)]
pub struct SearchPaginator {
    term: String,
    batch_size: usize,
    budget: usize,
    include_prerelease: bool,
    state: PageState,
    accepted_total: usize,
    accepted_in_page: usize,
    pages_fetched: usize,
}

impl SearchPaginator {
    pub fn new(term: impl Into<String>, batch_size: usize, budget: usize, include_prerelease: bool) -> Self {
        let state = if budget == 0 || batch_size == 0 {
            PageState::Done
        } else {
            PageState::Fetching(0)
        };
        Self {
            term: term.into(),
            batch_size,
            budget,
            include_prerelease,
            state,
            accepted_total: 0,
            accepted_in_page: 0,
            pages_fetched: 0,
        }
    }

    /// Request for the next page, or `None` once pagination is over.
    pub fn next_query(&self) -> Option<PageQuery> {
        match self.state {
            PageState::Fetching(offset) => Some(PageQuery {
                term: self.term.clone(),
                batch_size: self.batch_size,
                offset,
                include_prerelease: self.include_prerelease,
            }),
            _ => None,
        }
    }

    /// Mark the pending request as answered; its page is now evaluated.
    pub fn begin_page(&mut self) {
        if let PageState::Fetching(offset) = self.state {
            self.state = PageState::Evaluating(offset);
            self.accepted_in_page = 0;
            self.pages_fetched += 1;
        }
    }

    /// Count a candidate that passed the filters. Returns `false` once the
    /// budget is spent and the rest of the page must be ignored.
    pub fn accept(&mut self) -> bool {
        self.accepted_total += 1;
        self.accepted_in_page += 1;
        !self.budget_spent()
    }

    /// Close the evaluated page and decide whether another is requested.
    pub fn finish_page(&mut self) {
        if let PageState::Evaluating(offset) = self.state {
            self.state = if self.budget_spent() || self.accepted_in_page == 0 {
                PageState::Done
            } else {
                PageState::Fetching(offset + self.batch_size)
            };
        }
    }

    /// Stop after a transport failure.
    pub fn abort(&mut self) {
        self.state = PageState::Done;
    }

    #[cfg(test)]
    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn accepted_total(&self) -> usize {
        self.accepted_total
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn budget_spent(&self) -> bool {
        self.accepted_total >= self.budget
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{MirrorError, Result};
    use crate::package_info::{PackageSummary, VersionEntry};
    use crate::registry::SearchSource;

    /// Serves scripted pages in order and records every query.
    #[derive(Default)]
    pub(crate) struct FakeSearch {
        pub(crate) pages: Mutex<Vec<Result<Vec<PackageSummary>>>>,
        pub(crate) queries: Mutex<Vec<PageQuery>>,
    }

    impl FakeSearch {
        pub(crate) fn with_pages(pages: Vec<Vec<PackageSummary>>) -> Self {
            let mut scripted: Vec<Result<Vec<PackageSummary>>> = pages.into_iter().map(Ok).collect();
            scripted.reverse();
            Self {
                pages: Mutex::new(scripted),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                pages: Mutex::new(vec![Err(MirrorError::Network("status 503".into()))]),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn offsets(&self) -> Vec<usize> {
            self.queries.lock().unwrap().iter().map(|q| q.offset).collect()
        }
    }

    #[async_trait]
    impl SearchSource for FakeSearch {
        async fn search_page(&self, query: &PageQuery) -> Result<Vec<PackageSummary>> {
            self.queries.lock().unwrap().push(query.clone());
            self.pages.lock().unwrap().pop().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// A page of `count` packages that all clear any download threshold.
    pub(crate) fn popular_page(prefix: &str, count: usize) -> Vec<PackageSummary> {
        (0..count)
            .map(|i| {
                PackageSummary::new(
                    format!("{prefix}.Package{i}"),
                    50_000_000,
                    vec![VersionEntry::new("1.0.0", None)],
                )
            })
            .collect()
    }

    async fn drain_accepting_all(search: &FakeSearch, paginator: &mut SearchPaginator) {
        while let Some(query) = paginator.next_query() {
            let page = search.search_page(&query).await.unwrap();
            paginator.begin_page();
            for _ in page {
                if !paginator.accept() {
                    break;
                }
            }
            paginator.finish_page();
        }
    }

    #[tokio::test]
    async fn stops_on_empty_page() {
        let search = FakeSearch::with_pages(vec![
            popular_page("a", 100),
            popular_page("b", 100),
            Vec::new(),
        ]);
        let mut paginator = SearchPaginator::new("microsoft", 100, 1000, true);
        drain_accepting_all(&search, &mut paginator).await;

        assert_eq!(search.offsets(), vec![0, 100, 200]);
        assert_eq!(paginator.state(), PageState::Done);
        assert_eq!(paginator.accepted_total(), 200);
        assert_eq!(paginator.pages_fetched(), 3);
    }

    #[tokio::test]
    async fn stops_when_budget_is_spent() {
        let search = FakeSearch::with_pages(vec![
            popular_page("a", 50),
            popular_page("b", 50),
            popular_page("c", 50),
            popular_page("d", 50),
        ]);
        let mut paginator = SearchPaginator::new("microsoft", 50, 120, true);
        drain_accepting_all(&search, &mut paginator).await;

        assert_eq!(search.offsets(), vec![0, 50, 100]);
        assert_eq!(paginator.accepted_total(), 120);
    }

    #[test]
    fn page_with_no_accepted_candidates_ends_pagination() {
        let mut paginator = SearchPaginator::new("json", 20, 1000, false);
        let first = paginator.next_query().unwrap();
        assert_eq!(first.offset, 0);
        assert!(!first.include_prerelease);

        paginator.begin_page();
        assert!(paginator.accept());
        paginator.finish_page();
        assert_eq!(paginator.state(), PageState::Fetching(20));

        paginator.begin_page();
        paginator.finish_page();
        assert_eq!(paginator.state(), PageState::Done);
        assert!(paginator.next_query().is_none());
    }

    #[test]
    fn zero_budget_never_fetches() {
        let paginator = SearchPaginator::new("json", 20, 0, true);
        assert!(paginator.next_query().is_none());
    }

    #[test]
    fn abort_ends_pagination() {
        let mut paginator = SearchPaginator::new("json", 20, 100, true);
        paginator.abort();
        assert_eq!(paginator.state(), PageState::Done);
    }
}
