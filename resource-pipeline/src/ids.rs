//! Prefixed resource identifiers
//!
//! Resource ids are a kind prefix followed by a UUIDv7 in its simple hex
//! form, so ids sort roughly by creation time and name their kind:
//!
//! ```rust
//! use resource_pipeline::ids::ResourceId;
//! use resource_pipeline::registry::ResourceKind;
//!
//! let id = ResourceId::new(ResourceKind::Entry);
//! assert!(id.as_str().starts_with("e_"));
//! assert_eq!(id.kind(), ResourceKind::Entry);
//!
//! let parsed: ResourceId = id.as_str().parse().unwrap();
//! assert_eq!(parsed, id);
//! ```

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::Error;
use crate::registry::ResourceKind;

impl ResourceKind {
    /// Prefix written before the UUID part of an id
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Entry => "e",
            Self::Habit => "h",
        }
    }
}

/// A kind-prefixed, time-sortable identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    kind: ResourceKind,
    value: String,
}

impl ResourceId {
    /// Generate a fresh id for `kind`
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            value: format!("{}_{}", kind.id_prefix(), Uuid::now_v7().simple()),
        }
    }

    /// Kind named by the prefix
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The full id
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consume into the full id
    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, uuid) = s
            .split_once('_')
            .ok_or_else(|| Error::validation("id", format!("'{}' has no kind prefix", s)))?;

        let kind = ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.id_prefix() == prefix)
            .ok_or_else(|| Error::validation("id", format!("unknown id prefix '{}'", prefix)))?;

        Uuid::parse_str(uuid)
            .map_err(|e| Error::validation("id", format!("'{}' is not a valid id: {}", s, e)))?;

        Ok(Self {
            kind,
            value: s.to_string(),
        })
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_carry_prefix() {
        assert!(ResourceId::new(ResourceKind::Entry).as_str().starts_with("e_"));
        assert!(ResourceId::new(ResourceKind::Habit).as_str().starts_with("h_"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ResourceId::new(ResourceKind::Entry);
        let b = ResourceId::new(ResourceKind::Entry);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert!("e_not-a-uuid".parse::<ResourceId>().is_err());
        assert!("x_0190b2c8a2f97c3e9b8a1d2e3f405162".parse::<ResourceId>().is_err());
        assert!("plain".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_parse_keeps_kind() {
        let id: ResourceId = "h_0190b2c8a2f97c3e9b8a1d2e3f405162".parse().unwrap();
        assert_eq!(id.kind(), ResourceKind::Habit);
        assert_eq!(id.to_string(), "h_0190b2c8a2f97c3e9b8a1d2e3f405162");
    }
}
