//! Queryable data source seam
//!
//! The pipeline never executes queries itself. It describes what it needs as
//! a [`SourceQuery`] (filters, a compiled ordering, an optional keyset
//! position and a skip/take window) and hands it to a [`ResourceSource`].
//! Implementations translate the query to their storage; [`InMemorySource`]
//! evaluates it directly against rows exposing [`SourceRow`].
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::source::{FilterCondition, SourceQuery};
//!
//! let query = SourceQuery::new()
//!     .filter(FilterCondition::eq("user_id", "u_1"))
//!     .filter(FilterCondition::eq("is_archived", false))
//!     .window(20, 10);
//!
//! assert_eq!(query.filters.len(), 2);
//! assert_eq!(query.skip, Some(20));
//! assert_eq!(query.take, Some(10));
//! ```
//!
//! [`InMemorySource`]: crate::memory::InMemorySource

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::sorting::CompiledOrdering;
use crate::value::FieldValue;

/// Result type for data source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A row that can be inspected by source expression
///
/// Expressions are the storage-side names the field registry maps output
/// fields to (`date`, `created_at_utc`, `milestone_current`, ...). Returning
/// `None` means the row has no such expression; filters treat it as null.
pub trait SourceRow {
    /// Read the value behind a source expression
    fn source_value(&self, expression: &str) -> Option<FieldValue>;
}

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Value is in a list (IN)
    In,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
    /// Text contains the operand, ignoring case
    Contains,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::In => write!(f, "IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
            Self::Contains => write!(f, "CONTAINS"),
        }
    }
}

/// Operand of a filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A single value
    Value(FieldValue),
    /// A list of values (for IN operator)
    List(Vec<FieldValue>),
    /// No operand (for IS NULL / IS NOT NULL)
    None,
}

/// A single filter condition over a source expression
///
/// ```rust
/// use resource_pipeline::source::FilterCondition;
///
/// let owner = FilterCondition::eq("user_id", "u_1");
/// let recent = FilterCondition::gte("value", 10);
/// let sources = FilterCondition::in_values("source", ["manual", "automation"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The source expression to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    fn compare_with(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self::new(field, operator, FilterValue::Value(value.into()))
    }

    /// Create an equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare_with(field, FilterOperator::Equal, value)
    }

    /// Create a not-equal filter (field != value)
    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare_with(field, FilterOperator::NotEqual, value)
    }

    /// Create a greater-than filter (field > value)
    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare_with(field, FilterOperator::GreaterThan, value)
    }

    /// Create a greater-than-or-equal filter (field >= value)
    pub fn gte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare_with(field, FilterOperator::GreaterThanOrEqual, value)
    }

    /// Create a less-than filter (field < value)
    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare_with(field, FilterOperator::LessThan, value)
    }

    /// Create a less-than-or-equal filter (field <= value)
    pub fn lte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare_with(field, FilterOperator::LessThanOrEqual, value)
    }

    /// Create an IN filter (field IN (values))
    pub fn in_values<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        Self::new(
            field,
            FilterOperator::In,
            FilterValue::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Create an IS NULL filter
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::None)
    }

    /// Create an IS NOT NULL filter
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::None)
    }

    /// Create a case-insensitive substring condition
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::new(
            field,
            FilterOperator::Contains,
            FilterValue::Value(FieldValue::String(needle.into())),
        )
    }

    /// Evaluate the condition against a row
    pub fn matches<R: SourceRow + ?Sized>(&self, row: &R) -> bool {
        let actual = row.source_value(&self.field).unwrap_or(FieldValue::Null);
        match (&self.operator, &self.value) {
            (FilterOperator::IsNull, _) => actual.is_null(),
            (FilterOperator::IsNotNull, _) => !actual.is_null(),
            (FilterOperator::In, FilterValue::List(values)) => values
                .iter()
                .any(|v| actual.compare(v) == Ordering::Equal),
            (FilterOperator::Contains, FilterValue::Value(needle)) => {
                match (actual.as_str(), needle.as_str()) {
                    (Some(text), Some(needle)) => {
                        text.to_lowercase().contains(&needle.to_lowercase())
                    }
                    _ => false,
                }
            }
            (op, FilterValue::Value(expected)) => {
                let ord = actual.compare(expected);
                match op {
                    FilterOperator::Equal => ord == Ordering::Equal,
                    FilterOperator::NotEqual => ord != Ordering::Equal,
                    FilterOperator::GreaterThan => ord == Ordering::Greater,
                    FilterOperator::GreaterThanOrEqual => ord != Ordering::Less,
                    FilterOperator::LessThan => ord == Ordering::Less,
                    FilterOperator::LessThanOrEqual => ord != Ordering::Greater,
                    FilterOperator::In
                    | FilterOperator::IsNull
                    | FilterOperator::IsNotNull
                    | FilterOperator::Contains => false,
                }
            }
            _ => false,
        }
    }
}

impl fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            FilterValue::None => write!(f, "{} {}", self.field, self.operator),
            FilterValue::Value(v) => write!(f, "{} {} {:?}", self.field, self.operator, v),
            FilterValue::List(vs) => write!(f, "{} {} {:?}", self.field, self.operator, vs),
        }
    }
}

/// Keyset position for descending `(key, id)` traversal
///
/// A row lies strictly after the position when
/// `key < key_value OR (key == key_value AND id < id_value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyset {
    /// Source expression of the primary ordering key
    pub key: String,
    /// Last seen primary key value
    pub key_value: FieldValue,
    /// Source expression of the tie-breaking id
    pub id: String,
    /// Last seen id value
    pub id_value: FieldValue,
}

impl Keyset {
    /// Whether the row lies strictly after this position
    pub fn matches<R: SourceRow + ?Sized>(&self, row: &R) -> bool {
        let key = row.source_value(&self.key).unwrap_or(FieldValue::Null);
        match key.compare(&self.key_value) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                let id = row.source_value(&self.id).unwrap_or(FieldValue::Null);
                id.compare(&self.id_value) == Ordering::Less
            }
        }
    }
}

/// Query description handed to a [`ResourceSource`]
#[derive(Debug, Clone, Default)]
pub struct SourceQuery {
    /// Conditions every row must satisfy
    pub filters: Vec<FilterCondition>,
    /// Ordering to apply; empty keeps the source's natural order
    pub ordering: CompiledOrdering,
    /// Keyset position rows must lie strictly after
    pub keyset: Option<Keyset>,
    /// Rows to skip after filtering and ordering
    pub skip: Option<u64>,
    /// Maximum number of rows to return
    pub take: Option<u64>,
}

impl SourceQuery {
    /// Create an unfiltered, unordered, unwindowed query
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter condition
    #[must_use]
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Add several filter conditions
    #[must_use]
    pub fn filters(mut self, conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        self.filters.extend(conditions);
        self
    }

    /// Set the ordering
    #[must_use]
    pub fn ordering(mut self, ordering: CompiledOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Restrict rows to those strictly after a keyset position
    #[must_use]
    pub fn after(mut self, keyset: Keyset) -> Self {
        self.keyset = Some(keyset);
        self
    }

    /// Apply a skip/take window
    #[must_use]
    pub fn window(mut self, skip: u64, take: u64) -> Self {
        self.skip = Some(skip);
        self.take = Some(take);
        self
    }

    /// Limit the number of rows without skipping
    #[must_use]
    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    /// Whether a row satisfies every filter and the keyset position
    pub fn matches<R: SourceRow + ?Sized>(&self, row: &R) -> bool {
        self.filters.iter().all(|f| f.matches(row))
            && self.keyset.as_ref().map_or(true, |k| k.matches(row))
    }
}

/// Abstract queryable data source
///
/// Same shape as a repository: async methods via RPITIT, no `async_trait`.
/// `count` honours filters and the keyset position but ignores ordering and
/// the window. `fetch` honours everything.
pub trait ResourceSource: Send + Sync {
    /// Row type yielded by the source
    type Row: Send;

    /// Count rows matching the query's filters
    fn count(&self, query: &SourceQuery) -> impl Future<Output = SourceResult<u64>> + Send;

    /// Fetch the rows selected by the query, in order
    fn fetch(
        &self,
        query: &SourceQuery,
    ) -> impl Future<Output = SourceResult<Vec<Self::Row>>> + Send;
}

/// Operation being performed when the source failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceOperation {
    /// Counting rows
    Count,
    /// Fetching rows
    Fetch,
}

impl fmt::Display for SourceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => write!(f, "count"),
            Self::Fetch => write!(f, "fetch"),
        }
    }
}

/// Error raised by a data source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Data source {operation} failed: {message}")]
pub struct SourceError {
    /// The operation that failed
    pub operation: SourceOperation,
    /// Source-specific description
    pub message: String,
}

impl SourceError {
    /// Create a new source error
    pub fn new(operation: SourceOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Row {
        date: NaiveDate,
        id: &'static str,
        source: Option<&'static str>,
        value: i64,
    }

    impl SourceRow for Row {
        fn source_value(&self, expression: &str) -> Option<FieldValue> {
            match expression {
                "date" => Some(self.date.into()),
                "id" => Some(self.id.into()),
                "source" => Some(self.source.into()),
                "value" => Some(self.value.into()),
                _ => None,
            }
        }
    }

    fn row(day: u32, id: &'static str) -> Row {
        Row {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            id,
            source: Some("manual"),
            value: i64::from(day),
        }
    }

    #[test]
    fn test_comparison_filters() {
        let r = row(5, "e_1");
        assert!(FilterCondition::eq("value", 5).matches(&r));
        assert!(FilterCondition::ne("value", 4).matches(&r));
        assert!(FilterCondition::gt("value", 4).matches(&r));
        assert!(FilterCondition::gte("value", 5).matches(&r));
        assert!(FilterCondition::lt("value", 6).matches(&r));
        assert!(!FilterCondition::lte("value", 4).matches(&r));
    }

    #[test]
    fn test_in_and_null_filters() {
        let mut r = row(1, "e_1");
        assert!(FilterCondition::in_values("source", ["manual", "automation"]).matches(&r));
        assert!(FilterCondition::is_not_null("source").matches(&r));

        r.source = None;
        assert!(FilterCondition::is_null("source").matches(&r));
        assert!(!FilterCondition::in_values("source", ["manual"]).matches(&r));
    }

    #[test]
    fn test_unknown_expression_is_null() {
        let r = row(1, "e_1");
        assert!(FilterCondition::is_null("missing").matches(&r));
        assert!(!FilterCondition::eq("missing", "x").matches(&r));
    }

    #[test]
    fn test_contains_ignores_case() {
        let r = row(1, "e_1");
        assert!(FilterCondition::contains("source", "MAN").matches(&r));
        assert!(!FilterCondition::contains("source", "auto").matches(&r));
        assert!(!FilterCondition::contains("value", "1").matches(&r));
    }

    #[test]
    fn test_keyset_strictly_after() {
        let keyset = Keyset {
            key: "date".to_string(),
            key_value: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().into(),
            id: "id".to_string(),
            id_value: "e_5".into(),
        };
        assert!(keyset.matches(&row(1, "e_9")));
        assert!(keyset.matches(&row(2, "e_4")));
        assert!(!keyset.matches(&row(2, "e_5")));
        assert!(!keyset.matches(&row(2, "e_6")));
        assert!(!keyset.matches(&row(3, "e_1")));
    }

    #[test]
    fn test_query_matches_all_conditions() {
        let query = SourceQuery::new()
            .filter(FilterCondition::gte("value", 2))
            .filter(FilterCondition::lte("value", 3));
        assert!(!query.matches(&row(1, "a")));
        assert!(query.matches(&row(2, "b")));
        assert!(query.matches(&row(3, "c")));
        assert!(!query.matches(&row(4, "d")));
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(FilterCondition::is_null("notes").to_string(), "notes IS NULL");
        assert_eq!(FilterOperator::GreaterThanOrEqual.to_string(), ">=");
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::new(SourceOperation::Fetch, "connection reset");
        assert_eq!(err.to_string(), "Data source fetch failed: connection reset");
    }
}
