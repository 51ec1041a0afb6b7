//! Field registry
//!
//! Per-resource whitelist of sortable output fields. Each [`FieldMapping`]
//! maps an output field name (as it appears in `?sort=`) to one or more
//! source expressions, in tie-break order, plus a flag that flips the
//! requested direction.
//!
//! The registry is an explicit table indexed by [`ResourceKind`], built once
//! at startup. [`FieldRegistryBuilder::build`] refuses to produce a registry
//! that misses a kind, so a missing mapping is a startup failure rather than
//! a per-request surprise.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::registry::{FieldMapping, FieldRegistry, ResourceKind};
//!
//! let registry = FieldRegistry::builder()
//!     .register(ResourceKind::Entry, vec![
//!         FieldMapping::new("date", "date"),
//!         FieldMapping::new("value", "value"),
//!     ])
//!     .build_for(&[ResourceKind::Entry])
//!     .unwrap();
//!
//! let mappings = registry.resolve(ResourceKind::Entry).unwrap();
//! assert_eq!(mappings.len(), 2);
//! assert!(registry.find(ResourceKind::Entry, "DATE").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Resource kinds known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Habit entries (`/entries`)
    Entry,
    /// Habits (`/habits`)
    Habit,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Entry, ResourceKind::Habit];

    /// Lowercase name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Habit => "habit",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A storage-side ordering expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceExpression(String);

impl SourceExpression {
    /// Create a source expression
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Borrow the expression text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceExpression {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Output field to source expressions mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Output field name as requested by callers
    pub output_field: String,
    /// Underlying expressions, in tie-break order
    pub source_expressions: Vec<SourceExpression>,
    /// Whether a requested direction is flipped for this field
    pub reverse_by_default: bool,
}

impl FieldMapping {
    /// Map an output field to a single source expression
    pub fn new(output_field: impl Into<String>, expression: impl Into<SourceExpression>) -> Self {
        Self {
            output_field: output_field.into(),
            source_expressions: vec![expression.into()],
            reverse_by_default: false,
        }
    }

    /// Append a tie-breaking source expression
    #[must_use]
    pub fn then(mut self, expression: impl Into<SourceExpression>) -> Self {
        self.source_expressions.push(expression.into());
        self
    }

    /// Flip the requested direction for this field
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.reverse_by_default = true;
        self
    }

    /// Case-insensitive match against an output field name
    pub fn matches(&self, field: &str) -> bool {
        self.output_field.eq_ignore_ascii_case(field)
    }
}

/// Immutable registry of sortable field mappings
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    mappings: HashMap<ResourceKind, Vec<FieldMapping>>,
}

impl FieldRegistry {
    /// Start building a registry
    pub fn builder() -> FieldRegistryBuilder {
        FieldRegistryBuilder::default()
    }

    /// Mappings registered for a kind
    ///
    /// A missing kind is a deployment bug and yields
    /// [`Error::Configuration`].
    pub fn resolve(&self, kind: ResourceKind) -> Result<&[FieldMapping]> {
        self.mappings.get(&kind).map(Vec::as_slice).ok_or_else(|| {
            tracing::error!(kind = %kind, "No field mappings registered");
            Error::configuration(format!("no field mappings registered for {}", kind))
        })
    }

    /// Find a mapping by output field name, case-insensitively
    pub fn find(&self, kind: ResourceKind, field: &str) -> Option<&FieldMapping> {
        self.mappings
            .get(&kind)
            .and_then(|mappings| mappings.iter().find(|m| m.matches(field)))
    }

    /// Kinds this registry holds mappings for
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.mappings.keys().copied()
    }
}

/// Builder for [`FieldRegistry`]
#[derive(Debug, Default)]
pub struct FieldRegistryBuilder {
    mappings: HashMap<ResourceKind, Vec<FieldMapping>>,
}

impl FieldRegistryBuilder {
    /// Register the mappings for a kind, replacing earlier ones
    #[must_use]
    pub fn register(mut self, kind: ResourceKind, mappings: Vec<FieldMapping>) -> Self {
        self.mappings.insert(kind, mappings);
        self
    }

    /// Build a registry covering every [`ResourceKind`]
    pub fn build(self) -> Result<FieldRegistry> {
        self.build_for(&ResourceKind::ALL)
    }

    /// Build a registry that must cover the given kinds
    pub fn build_for(self, required: &[ResourceKind]) -> Result<FieldRegistry> {
        for kind in required {
            if !self.mappings.contains_key(kind) {
                return Err(Error::configuration(format!(
                    "no field mappings registered for {}",
                    kind
                )));
            }
        }

        for (kind, mappings) in &self.mappings {
            for (i, mapping) in mappings.iter().enumerate() {
                if mapping.source_expressions.is_empty() {
                    return Err(Error::configuration(format!(
                        "{} field '{}' has no source expressions",
                        kind, mapping.output_field
                    )));
                }
                if mappings[..i].iter().any(|m| m.matches(&mapping.output_field)) {
                    return Err(Error::configuration(format!(
                        "{} field '{}' is registered twice",
                        kind, mapping.output_field
                    )));
                }
            }
        }

        tracing::debug!(kinds = self.mappings.len(), "Field registry built");
        Ok(FieldRegistry {
            mappings: self.mappings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_mappings() -> Vec<FieldMapping> {
        vec![
            FieldMapping::new("date", "date"),
            FieldMapping::new("progress", "milestone_current").then("milestone_target"),
            FieldMapping::new("age", "created_at_utc").reversed(),
        ]
    }

    #[test]
    fn test_build_requires_every_kind() {
        let err = FieldRegistry::builder()
            .register(ResourceKind::Entry, entry_mappings())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("habit"));
    }

    #[test]
    fn test_build_rejects_duplicate_fields() {
        let err = FieldRegistry::builder()
            .register(
                ResourceKind::Entry,
                vec![FieldMapping::new("date", "date"), FieldMapping::new("Date", "day")],
            )
            .build_for(&[ResourceKind::Entry])
            .unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }

    #[test]
    fn test_resolve_missing_kind() {
        let registry = FieldRegistry::builder()
            .register(ResourceKind::Entry, entry_mappings())
            .build_for(&[ResourceKind::Entry])
            .unwrap();
        assert!(registry.resolve(ResourceKind::Entry).is_ok());
        assert!(matches!(
            registry.resolve(ResourceKind::Habit),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let registry = FieldRegistry::builder()
            .register(ResourceKind::Entry, entry_mappings())
            .register(ResourceKind::Habit, vec![])
            .build()
            .unwrap();
        let mapping = registry.find(ResourceKind::Entry, "PROGRESS").unwrap();
        assert_eq!(mapping.source_expressions.len(), 2);
        assert_eq!(mapping.source_expressions[1].as_str(), "milestone_target");
        assert!(registry.find(ResourceKind::Entry, "bogus").is_none());
        assert!(registry.find(ResourceKind::Entry, "age").unwrap().reverse_by_default);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::Entry.to_string(), "entry");
        assert_eq!(ResourceKind::ALL.len(), 2);
    }
}
