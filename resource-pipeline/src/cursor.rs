//! Cursor (keyset) pagination
//!
//! Cursor pagination walks a source in one fixed ordering: the primary key
//! descending, then the id descending as tie-break. The token is the
//! standard, padded base64 encoding of `YYYY-MM-DD|id`. Dynamic sorting is
//! only offered with offset pagination.
//!
//! Decoding never fails outward. A malformed or foreign token is logged at
//! `debug` and treated as "no cursor", so the walk restarts from the top.
//!
//! ```rust
//! use chrono::NaiveDate;
//! use resource_pipeline::cursor::Cursor;
//!
//! let cursor = Cursor::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "e_42");
//! let token = cursor.encode();
//! assert_eq!(Cursor::decode(&token), Some(cursor));
//! assert_eq!(Cursor::decode("not a cursor"), None);
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::registry::SourceExpression;
use crate::sorting::{CompiledOrdering, OrderDirection, OrderTerm};
use crate::source::{FilterCondition, Keyset, ResourceSource, SourceQuery};

/// Default number of items per cursor page
pub const DEFAULT_CURSOR_LIMIT: u32 = 10;

/// Default upper bound on the cursor page size
pub const DEFAULT_MAX_CURSOR_LIMIT: u32 = 100;

const DELIMITER: char = '|';
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reasons a token failed to decode; always recovered locally
#[derive(Debug, Error)]
enum MalformedCursor {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("missing delimiter")]
    MissingDelimiter,
    #[error("invalid date: {0}")]
    Date(#[from] chrono::ParseError),
    #[error("empty id")]
    EmptyId,
}

/// Last-seen position of a cursor walk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor {
    /// Primary ordering key of the last retained row
    pub date: NaiveDate,
    /// Id of the last retained row
    pub id: String,
}

impl Cursor {
    /// Create a cursor position
    pub fn new(date: NaiveDate, id: impl Into<String>) -> Self {
        Self {
            date,
            id: id.into(),
        }
    }

    /// Encode as an opaque token
    pub fn encode(&self) -> String {
        let raw = format!("{}{}{}", self.date.format(DATE_FORMAT), DELIMITER, self.id);
        STANDARD.encode(raw)
    }

    /// Decode a token, degrading to `None` when it is malformed
    pub fn decode(token: &str) -> Option<Self> {
        match Self::try_decode(token) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed cursor");
                None
            }
        }
    }

    fn try_decode(token: &str) -> std::result::Result<Self, MalformedCursor> {
        let bytes = STANDARD.decode(token.trim())?;
        let raw = String::from_utf8(bytes)?;
        let (date, id) = raw
            .split_once(DELIMITER)
            .ok_or(MalformedCursor::MissingDelimiter)?;
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)?;
        if id.is_empty() {
            return Err(MalformedCursor::EmptyId);
        }
        Ok(Self::new(date, id))
    }
}

/// Rows that can report their cursor position
pub trait CursorRow {
    /// Position of this row under the fixed cursor ordering
    fn cursor(&self) -> Cursor;
}

/// The fixed ordering a cursor walk follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorOrdering {
    /// Source expression of the primary key (a date)
    pub key: SourceExpression,
    /// Source expression of the tie-breaking id
    pub id: SourceExpression,
}

impl CursorOrdering {
    /// Create the ordering from its two source expressions
    pub fn new(key: impl Into<SourceExpression>, id: impl Into<SourceExpression>) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
        }
    }

    /// Key descending, then id descending
    pub fn ordering(&self) -> CompiledOrdering {
        CompiledOrdering::new(vec![
            OrderTerm::new(self.key.clone(), OrderDirection::Descending),
            OrderTerm::new(self.id.clone(), OrderDirection::Descending),
        ])
    }

    /// Keyset predicate selecting rows strictly after the cursor
    pub fn keyset(&self, cursor: &Cursor) -> Keyset {
        Keyset {
            key: self.key.as_str().to_string(),
            key_value: cursor.date.into(),
            id: self.id.as_str().to_string(),
            id_value: cursor.id.as_str().into(),
        }
    }
}

/// A validated cursor request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorWindow {
    cursor: Option<Cursor>,
    limit: u32,
}

impl CursorWindow {
    /// Validate a request against the default maximum limit
    pub fn new(cursor: Option<&str>, limit: u32) -> Result<Self> {
        Self::with_max(cursor, limit, DEFAULT_MAX_CURSOR_LIMIT)
    }

    /// Validate a request against an explicit maximum limit
    ///
    /// The limit must be at least 1. The token is decoded here; a malformed
    /// token yields a window with no cursor.
    pub fn with_max(cursor: Option<&str>, limit: u32, max_limit: u32) -> Result<Self> {
        if limit < 1 {
            return Err(Error::validation("limit", "limit must be at least 1"));
        }
        if limit > max_limit {
            return Err(Error::validation(
                "limit",
                format!("limit must not exceed {}", max_limit),
            ));
        }
        Ok(Self {
            cursor: cursor.filter(|t| !t.trim().is_empty()).and_then(Cursor::decode),
            limit,
        })
    }

    /// Decoded cursor, if any
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Maximum number of rows per page
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// One page of a cursor walk
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<T> {
    /// Rows in this page, at most `limit`
    pub items: Vec<T>,
    /// Token for the next page, present iff `has_next_page`
    pub next_cursor: Option<String>,
    /// Whether more rows follow
    pub has_next_page: bool,
}

impl<T> CursorPage<T> {
    /// Transform every item, keeping the cursor
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_next_page: self.has_next_page,
        }
    }
}

/// Fetch one cursor page from a source
///
/// Fetches `limit + 1` rows strictly after the cursor. When the extra row
/// exists it is dropped and the next cursor is encoded from the last row
/// that was kept.
pub async fn paginate_cursor<S>(
    source: &S,
    filters: &[FilterCondition],
    ordering: &CursorOrdering,
    window: &CursorWindow,
) -> Result<CursorPage<S::Row>>
where
    S: ResourceSource,
    S::Row: CursorRow,
{
    let mut query = SourceQuery::new()
        .filters(filters.iter().cloned())
        .ordering(ordering.ordering())
        .take(u64::from(window.limit()) + 1);
    if let Some(cursor) = window.cursor() {
        query = query.after(ordering.keyset(cursor));
    }

    let mut items = source.fetch(&query).await?;
    let limit = window.limit() as usize;
    let has_next_page = items.len() > limit;
    if has_next_page {
        items.truncate(limit);
    }

    let next_cursor = if has_next_page {
        items.last().map(|row| row.cursor().encode())
    } else {
        None
    };

    tracing::debug!(
        limit = window.limit(),
        resumed = window.cursor().is_some(),
        returned = items.len(),
        has_next_page,
        "Cursor page fetched"
    );

    Ok(CursorPage {
        items,
        next_cursor,
        has_next_page,
    })
}
