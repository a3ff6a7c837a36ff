//! Paginated (scroll) retrieval

use crate::errors::{HttpError, PaginationError};
use alertload_resilience::{RetryExecutor, RetryPolicy};
use async_trait::async_trait;
use tracing::{debug, warn};

/// One page of a paginated read
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` when the source is exhausted
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        Self { items, next }
    }

    /// A page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// A remote collection read page by page through continuation tokens
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn first_page(&self, page_size: usize) -> Result<Page<Self::Item>, HttpError>;

    async fn next_page(&self, token: &str) -> Result<Page<Self::Item>, HttpError>;

    /// Free server-side state held for `token`
    async fn release(&self, _token: &str) -> Result<(), HttpError> {
        Ok(())
    }

    /// Short description used in log lines
    fn describe(&self) -> String {
        "paginated source".to_string()
    }
}

/// Consecutive empty pages that end a read when empty pages do not stop it
pub const EMPTY_PAGE_LIMIT: usize = 3;

/// Reads every page of a [`PageSource`] into one vector
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    retry: RetryExecutor,
    stop_on_empty_page: bool,
    max_pages: Option<usize>,
}

impl Default for PaginatedFetcher {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl PaginatedFetcher {
    /// `retry_policy` applies to the first page only
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            retry: RetryExecutor::new(retry_policy),
            stop_on_empty_page: true,
            max_pages: None,
        }
    }

    /// Whether an empty page ends the read even when it carries a token.
    ///
    /// When off, the read still ends after [`EMPTY_PAGE_LIMIT`] empty pages
    /// in a row.
    pub fn stop_on_empty_page(mut self, stop: bool) -> Self {
        self.stop_on_empty_page = stop;
        self
    }

    /// Upper bound on pages read, the first page included
    pub fn max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Read all pages in order and concatenate their items.
    ///
    /// A failing continuation page aborts the whole read; partial results are
    /// discarded. The last token seen is released whether the read succeeded
    /// or not, and release failures are only logged.
    pub async fn fetch_all<S>(
        &self,
        source: &S,
        page_size: usize,
    ) -> Result<Vec<S::Item>, PaginationError>
    where
        S: PageSource + ?Sized,
    {
        let label = format!("reading first page of {}", source.describe());
        let first = self
            .retry
            .execute(&label, || source.first_page(page_size))
            .await?;

        let mut pages = 1;
        let mut last_len = first.items.len();
        let mut items = first.items;
        let mut token = first.next;
        let mut last_token = token.clone();
        let mut empty_streak = usize::from(last_len == 0);

        debug!("{}: page 1 has {} item(s)", source.describe(), last_len);

        while let Some(current) = token.take() {
            if last_len == 0 && self.stop_on_empty_page {
                break;
            }
            if empty_streak >= EMPTY_PAGE_LIMIT {
                warn!(
                    "{}: stopping after {} empty page(s) in a row",
                    source.describe(),
                    empty_streak
                );
                break;
            }
            if self.max_pages.is_some_and(|max| pages >= max) {
                warn!(
                    "{}: stopping after {} page(s), more are available",
                    source.describe(),
                    pages
                );
                break;
            }

            let page = match source.next_page(&current).await {
                Ok(page) => page,
                Err(source_error) => {
                    self.release(source, &current).await;
                    return Err(PaginationError::Continuation {
                        page: pages + 1,
                        source: source_error,
                    });
                }
            };

            pages += 1;
            last_len = page.items.len();
            empty_streak = if last_len == 0 { empty_streak + 1 } else { 0 };
            debug!("{}: page {} has {} item(s)", source.describe(), pages, last_len);

            items.extend(page.items);
            if page.next.is_some() {
                last_token = page.next.clone();
            }
            token = page.next;
        }

        if let Some(ref token) = last_token {
            self.release(source, token).await;
        }

        debug!(
            "{}: read {} item(s) in {} page(s)",
            source.describe(),
            items.len(),
            pages
        );
        Ok(items)
    }

    async fn release<S>(&self, source: &S, token: &str)
    where
        S: PageSource + ?Sized,
    {
        if let Err(e) = source.release(token).await {
            warn!("{}: failed to release continuation: {}", source.describe(), e);
        }
    }
}
