//! Query parameters for collection and detail requests
//!
//! These types deserialize straight from a query string (`?sort=...&page=2`)
//! and carry the raw, unvalidated values. Validation happens in the
//! pipeline, before any data access.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::query::CollectionQuery;
//!
//! let query = CollectionQuery::new()
//!     .with_page(2)
//!     .with_page_size(25)
//!     .with_sort("date desc")
//!     .with_fields("id,value");
//!
//! assert_eq!(query.page, Some(2));
//! assert!(query.has_sort());
//! assert_eq!(query.fields(), Some("id,value"));
//! ```

use serde::{Deserialize, Serialize};

/// Offset-paginated list parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionQuery {
    /// Sort expression, `field[ asc|desc],...`
    #[serde(default)]
    pub sort: Option<String>,

    /// Comma-separated field selection
    #[serde(default)]
    pub fields: Option<String>,

    /// Page number (1-indexed)
    #[serde(default)]
    pub page: Option<u32>,

    /// Items per page
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl CollectionQuery {
    /// Create an empty query
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page number
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the sort expression
    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Set the field selection
    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Sort expression, if non-blank
    pub fn sort(&self) -> Option<&str> {
        non_blank(self.sort.as_deref())
    }

    /// Field selection, if non-blank
    pub fn fields(&self) -> Option<&str> {
        non_blank(self.fields.as_deref())
    }

    /// Whether a sort was requested
    pub fn has_sort(&self) -> bool {
        self.sort().is_some()
    }
}

/// Cursor-paginated list parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorQuery {
    /// Opaque continuation token
    #[serde(default)]
    pub cursor: Option<String>,

    /// Maximum items per page
    #[serde(default)]
    pub limit: Option<u32>,

    /// Comma-separated field selection
    #[serde(default)]
    pub fields: Option<String>,
}

impl CursorQuery {
    /// Create an empty query
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after a token
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Set the limit
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the field selection
    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Continuation token, if non-blank
    pub fn cursor(&self) -> Option<&str> {
        non_blank(self.cursor.as_deref())
    }

    /// Field selection, if non-blank
    pub fn fields(&self) -> Option<&str> {
        non_blank(self.fields.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
