//! Caller identity seam
//!
//! Authentication happens upstream. The pipeline only needs the current
//! caller's id to scope user-owned collections.

use std::future::Future;

use crate::error::{Error, Result};

/// Resolves the current caller
pub trait IdentityResolver: Send + Sync {
    /// Caller id, or `None` when anonymous
    fn current_user_id(&self) -> impl Future<Output = Option<String>> + Send;
}

/// Resolver returning a fixed identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    /// An authenticated caller
    pub fn user(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    /// An anonymous caller
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityResolver for StaticIdentity {
    async fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Resolve the caller, failing with `Unauthorized` when anonymous
///
/// Blank or whitespace-only ids count as anonymous. The returned id is
/// trimmed.
pub async fn require_user<I: IdentityResolver>(identity: &I) -> Result<String> {
    identity
        .current_user_id()
        .await
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Unauthorized("caller is anonymous".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_require_user() {
        let user = require_user(&StaticIdentity::user("u_1")).await.unwrap();
        assert_eq!(user, "u_1");

        let err = require_user(&StaticIdentity::anonymous()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_blank_user_is_anonymous() {
        for blank in ["", "   ", "\t\n"] {
            let err = require_user(&StaticIdentity::user(blank)).await.unwrap_err();
            assert!(matches!(err, Error::Unauthorized(_)));
        }

        let user = require_user(&StaticIdentity::user("  u_1 ")).await.unwrap();
        assert_eq!(user, "u_1");
    }
}
