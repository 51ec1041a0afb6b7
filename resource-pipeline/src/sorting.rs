//! Sort validation and compilation
//!
//! A sort expression is a comma-separated list of `field[ asc|desc]` tokens.
//! Field names are matched case-insensitively against the registry's
//! [`FieldMapping`]s; direction defaults to ascending.
//!
//! Compiling expands every field to its source expressions. The effective
//! direction of each expression is `descending XOR reverse_by_default`, and
//! ties are broken by the mapping's declared expression order.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::registry::FieldMapping;
//! use resource_pipeline::sorting::{compile_sort, validate_sort};
//!
//! let mappings = vec![
//!     FieldMapping::new("date", "date"),
//!     FieldMapping::new("progress", "milestone_current").then("milestone_target"),
//! ];
//!
//! assert!(validate_sort(Some("Date desc, progress"), &mappings));
//! assert!(!validate_sort(Some("bogus"), &mappings));
//!
//! let ordering = compile_sort(Some("progress desc"), &mappings).unwrap();
//! assert_eq!(ordering.to_string(), "milestone_current desc, milestone_target desc");
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::{FieldMapping, SourceExpression};
use crate::source::SourceRow;
use crate::value::FieldValue;

/// Default cap on the number of sort tokens per request
pub const DEFAULT_MAX_SORT_FIELDS: usize = 5;

/// Direction for ordering results
///
/// ```rust
/// use resource_pipeline::sorting::OrderDirection;
///
/// assert_eq!(OrderDirection::Ascending.to_string(), "asc");
/// assert_eq!(OrderDirection::Ascending.reverse(), OrderDirection::Descending);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[serde(rename = "desc")]
    Descending,
}

impl OrderDirection {
    /// The opposite direction
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Parse an `asc`/`desc` token, case-insensitively
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("asc") {
            Some(Self::Ascending)
        } else if token.eq_ignore_ascii_case("desc") {
            Some(Self::Descending)
        } else {
            None
        }
    }

    /// Whether this is descending
    pub fn is_descending(self) -> bool {
        self == Self::Descending
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Self::Ascending => ord,
            Self::Descending => ord.reverse(),
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// One parsed sort token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Canonical output field name, as registered
    pub field: String,
    /// Requested direction
    pub direction: OrderDirection,
}

/// A parsed sort expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Parsed keys, in request order
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Whether no sort was requested
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Expand into a compiled ordering against the given mappings
    pub fn compile(&self, mappings: &[FieldMapping]) -> Result<CompiledOrdering> {
        let mut terms = Vec::new();
        for key in &self.keys {
            let mapping = mappings
                .iter()
                .find(|m| m.matches(&key.field))
                .ok_or_else(|| unknown_field(&key.field))?;
            let direction = if mapping.reverse_by_default {
                key.direction.reverse()
            } else {
                key.direction
            };
            terms.extend(
                mapping
                    .source_expressions
                    .iter()
                    .map(|expression| OrderTerm::new(expression.clone(), direction)),
            );
        }
        Ok(CompiledOrdering { terms })
    }
}

fn unknown_field(field: &str) -> Error {
    Error::validation("sort", format!("unknown field '{}'", field))
}

/// Parse a sort expression with the default token cap
pub fn parse_sort(sort: Option<&str>, mappings: &[FieldMapping]) -> Result<SortSpec> {
    parse_sort_with_limit(sort, mappings, DEFAULT_MAX_SORT_FIELDS)
}

/// Parse a sort expression, rejecting more than `max_fields` tokens
///
/// Empty tokens (`"date,,value"`) are skipped. Each token is a field name
/// optionally followed by a direction; `desc` sorts descending and any other
/// suffix ascending. Unknown fields fail with a validation error.
pub fn parse_sort_with_limit(
    sort: Option<&str>,
    mappings: &[FieldMapping],
    max_fields: usize,
) -> Result<SortSpec> {
    let Some(sort) = sort else {
        return Ok(SortSpec::default());
    };

    let mut keys = Vec::new();
    for token in sort.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let mut words = token.split_whitespace();
        let field = words.next().unwrap_or_default();
        // only `desc` flips the order; any other suffix sorts ascending
        let direction = words
            .next()
            .and_then(OrderDirection::parse)
            .unwrap_or(OrderDirection::Ascending);

        let mapping = mappings
            .iter()
            .find(|m| m.matches(field))
            .ok_or_else(|| unknown_field(field))?;

        keys.push(SortKey {
            field: mapping.output_field.clone(),
            direction,
        });
    }

    if keys.len() > max_fields {
        return Err(Error::validation(
            "sort",
            format!("at most {} sort fields are allowed, got {}", max_fields, keys.len()),
        ));
    }

    Ok(SortSpec { keys })
}

/// Whether every field in the sort expression is registered
///
/// Absent or empty expressions are valid. Only the field token of each
/// entry is checked; the per-request cap is applied when parsing.
pub fn validate_sort(sort: Option<&str>, mappings: &[FieldMapping]) -> bool {
    parse_sort_with_limit(sort, mappings, usize::MAX).is_ok()
}

/// Parse and compile a sort expression in one step
pub fn compile_sort(sort: Option<&str>, mappings: &[FieldMapping]) -> Result<CompiledOrdering> {
    parse_sort(sort, mappings)?.compile(mappings)
}

/// One compiled ordering term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    /// Source expression to order by
    pub expression: SourceExpression,
    /// Effective direction
    pub direction: OrderDirection,
}

impl OrderTerm {
    /// Create an ordering term
    pub fn new(expression: impl Into<SourceExpression>, direction: OrderDirection) -> Self {
        Self {
            expression: expression.into(),
            direction,
        }
    }
}

/// Ordering compiled against a data source
///
/// An empty ordering leaves the source's natural order untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledOrdering {
    terms: Vec<OrderTerm>,
}

impl CompiledOrdering {
    /// Create an ordering from explicit terms
    pub fn new(terms: Vec<OrderTerm>) -> Self {
        Self { terms }
    }

    /// Terms in priority order
    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }

    /// Whether the ordering has no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Append a tie-breaking term
    #[must_use]
    pub fn then(mut self, term: OrderTerm) -> Self {
        self.terms.push(term);
        self
    }

    /// The same ordering with every direction flipped
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            terms: self
                .terms
                .iter()
                .map(|t| OrderTerm::new(t.expression.clone(), t.direction.reverse()))
                .collect(),
        }
    }

    /// Compare two rows under this ordering
    pub fn compare<R: SourceRow + ?Sized>(&self, a: &R, b: &R) -> Ordering {
        for term in &self.terms {
            let expression = term.expression.as_str();
            let left = a.source_value(expression).unwrap_or(FieldValue::Null);
            let right = b.source_value(expression).unwrap_or(FieldValue::Null);
            let ord = term.direction.apply(left.compare(&right));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for CompiledOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", term.expression, term.direction)?;
        }
        Ok(())
    }
}
