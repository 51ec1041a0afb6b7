//! Offset pagination
//!
//! Page-number windowing over a filtered, ordered source. The total count is
//! taken over the filtered but unwindowed source, so changing the page size
//! never changes it.
//!
//! ```rust
//! use resource_pipeline::pagination::{OffsetWindow, PaginationMeta};
//!
//! let window = OffsetWindow::new(3, 10).unwrap();
//! assert_eq!(window.skip(), 20);
//!
//! let meta = PaginationMeta::new(3, 10, 25);
//! assert!(!meta.has_next_page);
//! assert!(meta.has_previous_page);
//! assert_eq!(meta.total_pages(), 3);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sorting::CompiledOrdering;
use crate::source::{FilterCondition, ResourceSource, SourceQuery};

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Default upper bound on the page size
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// A validated `(page, page_size)` window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetWindow {
    page: u32,
    page_size: u32,
}

impl OffsetWindow {
    /// Validate a window against the default maximum page size
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        Self::with_max(page, page_size, DEFAULT_MAX_PAGE_SIZE)
    }

    /// Validate a window against an explicit maximum page size
    ///
    /// Both values must be at least 1 and the page size may not exceed
    /// `max_page_size`.
    pub fn with_max(page: u32, page_size: u32, max_page_size: u32) -> Result<Self> {
        if page < 1 {
            return Err(Error::validation("page", "page must be at least 1"));
        }
        if page_size < 1 {
            return Err(Error::validation("pageSize", "pageSize must be at least 1"));
        }
        if page_size > max_page_size {
            return Err(Error::validation(
                "pageSize",
                format!("pageSize must not exceed {}", max_page_size),
            ));
        }
        Ok(Self { page, page_size })
    }

    /// 1-indexed page number
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Items per page
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Rows to skip: `(page - 1) * page_size`
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Rows to take
    pub fn take(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// Offset pagination metadata, as written on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub page_size: u32,
    /// Total number of items matching the filters
    pub total_count: u64,
    /// Whether there is a previous page
    pub has_previous_page: bool,
    /// Whether there is a next page
    pub has_next_page: bool,
}

impl PaginationMeta {
    /// Create pagination metadata
    ///
    /// `has_next_page` is `page * page_size < total_count` and
    /// `has_previous_page` is `page > 1`.
    #[must_use]
    pub fn new(page: u32, page_size: u32, total_count: u64) -> Self {
        Self {
            page,
            page_size,
            total_count,
            has_previous_page: page > 1,
            has_next_page: u64::from(page) * u64::from(page_size) < total_count,
        }
    }

    /// Total number of pages
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        calculate_total_pages(self.total_count, self.page_size)
    }
}

/// Calculate total pages from total items and page size
fn calculate_total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

/// A page of rows plus its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetPage<T> {
    /// Rows in this page
    pub items: Vec<T>,
    /// Pagination metadata
    pub meta: PaginationMeta,
}

impl<T> OffsetPage<T> {
    /// Transform every item, keeping the metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> OffsetPage<U> {
        OffsetPage {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Count and fetch one page from a source
///
/// Issues a `count` over the filtered source and a `fetch` windowed by
/// `skip`/`take`. Source errors propagate unchanged.
pub async fn paginate_offset<S: ResourceSource>(
    source: &S,
    filters: &[FilterCondition],
    ordering: &CompiledOrdering,
    window: OffsetWindow,
) -> Result<OffsetPage<S::Row>> {
    let query = SourceQuery::new()
        .filters(filters.iter().cloned())
        .ordering(ordering.clone());

    let total_count = source.count(&query).await?;
    let items = source
        .fetch(&query.window(window.skip(), window.take()))
        .await?;

    tracing::debug!(
        page = window.page(),
        page_size = window.page_size(),
        total_count,
        returned = items.len(),
        "Offset page fetched"
    );

    Ok(OffsetPage {
        items,
        meta: PaginationMeta::new(window.page(), window.page_size(), total_count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySource;
    use crate::source::SourceRow;
    use crate::value::FieldValue;

    #[derive(Debug, Clone)]
    struct Item(u32);

    impl SourceRow for Item {
        fn source_value(&self, expression: &str) -> Option<FieldValue> {
            (expression == "n").then(|| self.0.into())
        }
    }

    #[test]
    fn test_window_rejects_zero() {
        assert!(matches!(
            OffsetWindow::new(0, 10),
            Err(Error::Validation { ref parameter, .. }) if parameter == "page"
        ));
        assert!(matches!(
            OffsetWindow::new(1, 0),
            Err(Error::Validation { ref parameter, .. }) if parameter == "pageSize"
        ));
    }

    #[test]
    fn test_window_rejects_oversized_page() {
        assert!(OffsetWindow::new(1, 100).is_ok());
        assert!(OffsetWindow::new(1, 101).is_err());
        assert!(OffsetWindow::with_max(1, 500, 500).is_ok());
    }

    #[test]
    fn test_meta_flags() {
        let first = PaginationMeta::new(1, 10, 25);
        assert!(first.has_next_page);
        assert!(!first.has_previous_page);

        let exact = PaginationMeta::new(2, 10, 20);
        assert!(!exact.has_next_page);
        assert!(exact.has_previous_page);

        let empty = PaginationMeta::new(1, 10, 0);
        assert!(!empty.has_next_page);
        assert_eq!(empty.total_pages(), 0);
    }

    #[test]
    fn test_meta_wire_names() {
        let json = serde_json::to_value(PaginationMeta::new(2, 10, 25)).unwrap();
        assert_eq!(json["page"], 2);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["totalCount"], 25);
        assert_eq!(json["hasPreviousPage"], true);
        assert_eq!(json["hasNextPage"], true);
    }

    #[tokio::test]
    async fn test_total_count_ignores_window() {
        let source = InMemorySource::new((1..=25).map(Item).collect());
        let filters = vec![FilterCondition::gt("n", 5)];

        let small = paginate_offset(
            &source,
            &filters,
            &CompiledOrdering::default(),
            OffsetWindow::new(1, 3).unwrap(),
        )
        .await
        .unwrap();
        let large = paginate_offset(
            &source,
            &filters,
            &CompiledOrdering::default(),
            OffsetWindow::new(1, 50).unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(small.meta.total_count, 20);
        assert_eq!(large.meta.total_count, 20);
        assert_eq!(small.items.len(), 3);
        assert_eq!(large.items.len(), 20);
    }

    #[tokio::test]
    async fn test_source_error_propagates() {
        let source = InMemorySource::new(vec![Item(1)]).failing("boom");
        let err = paginate_offset(
            &source,
            &[],
            &CompiledOrdering::default(),
            OffsetWindow::new(1, 10).unwrap(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::DataSource(_)));
    }
}
