//! Content negotiation
//!
//! Picks one of four representation families from the `Accept` header and
//! the requested API version:
//!
//! | Family | Media type |
//! |---|---|
//! | plain | `application/json` |
//! | versioned | `application/json;v=N` |
//! | hypermedia | `application/vnd.<vendor>.hateoas+json` |
//! | versioned hypermedia | `application/vnd.<vendor>.hateoas.N+json` |
//!
//! The outcome tells callers whether to compute links at all
//! ([`Negotiated::include_links`]) and which media type to write.
//! [`NegotiatedJson`] serializes a body with that media type.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::NegotiationConfig;
use crate::error::{Error, Result};

/// API version identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApiVersion {
    /// API Version 1
    V1,
    /// API Version 2
    V2,
}

impl ApiVersion {
    /// Parse version from string (e.g., "v1", "V1", "1")
    pub fn parse(s: &str) -> Option<Self> {
        let lowercase = s.trim().to_lowercase();
        let normalized = lowercase.trim_start_matches('v');
        match normalized {
            "1" => Some(Self::V1),
            "2" => Some(Self::V2),
            _ => None,
        }
    }

    /// Version from its number
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }

    /// Get the version number as u8
    pub fn as_number(&self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_number())
    }
}

impl From<ApiVersion> for u8 {
    fn from(version: ApiVersion) -> Self {
        version.as_number()
    }
}

/// Representation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// `application/json`
    Plain,
    /// `application/json;v=N`
    Versioned,
    /// `application/vnd.<vendor>.hateoas+json`
    Hateoas,
    /// `application/vnd.<vendor>.hateoas.N+json`
    VersionedHateoas,
}

impl Representation {
    /// Whether this family carries hypermedia links
    pub fn includes_links(&self) -> bool {
        matches!(self, Self::Hateoas | Self::VersionedHateoas)
    }
}

/// Outcome of negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Selected family
    pub representation: Representation,
    /// Effective API version
    pub version: ApiVersion,
    /// Media type to write as `Content-Type`
    pub media_type: String,
    /// Whether links should be computed
    pub include_links: bool,
}

/// A media range the negotiator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    representation: Representation,
    version: Option<ApiVersion>,
}

/// Selects a representation per request
#[derive(Debug, Clone)]
pub struct ContentNegotiator {
    hateoas_prefix: String,
    supported: Vec<ApiVersion>,
    latest: ApiVersion,
}

impl ContentNegotiator {
    /// Create a negotiator from configuration
    ///
    /// Fails when no configured version is known to the crate.
    pub fn new(config: &NegotiationConfig) -> Result<Self> {
        let mut supported: Vec<ApiVersion> = config
            .supported_versions
            .iter()
            .filter_map(|n| ApiVersion::from_number(*n))
            .collect();
        supported.sort();
        supported.dedup();

        let latest = supported.last().copied().ok_or_else(|| {
            Error::configuration("negotiation.supported_versions names no known API version")
        })?;

        Ok(Self {
            hateoas_prefix: format!("application/vnd.{}.hateoas", config.vendor.to_lowercase()),
            supported,
            latest,
        })
    }

    /// Highest supported version
    pub fn latest(&self) -> ApiVersion {
        self.latest
    }

    /// Whether a version is supported
    pub fn supports(&self, version: ApiVersion) -> bool {
        self.supported.contains(&version)
    }

    /// Negotiate a representation
    ///
    /// The highest `q` wins and ties go to the earlier range. A version
    /// embedded in the media type beats `api_version`, which in turn only
    /// applies once some range was recognised. Absent or unrecognised
    /// headers yield plain JSON of the latest version.
    pub fn negotiate(&self, accept: Option<&str>, api_version: Option<ApiVersion>) -> Negotiated {
        let mut best: Option<(f32, Candidate)> = None;
        for range in accept.unwrap_or_default().split(',') {
            let Some((candidate, q)) = self.classify(range) else {
                continue;
            };
            if q <= 0.0 {
                continue;
            }
            if best.map_or(true, |(best_q, _)| q > best_q) {
                best = Some((q, candidate));
            }
        }

        let (candidate, version) = match best {
            Some((_, candidate)) => {
                let version = candidate
                    .version
                    .or(api_version.filter(|v| self.supports(*v)))
                    .unwrap_or(self.latest);
                (candidate, version)
            }
            None => (
                Candidate {
                    representation: Representation::Plain,
                    version: None,
                },
                self.latest,
            ),
        };

        let media_type = self.media_type(candidate.representation, version);
        tracing::debug!(
            media_type = %media_type,
            version = %version,
            "Negotiated representation"
        );

        Negotiated {
            representation: candidate.representation,
            version,
            media_type,
            include_links: candidate.representation.includes_links(),
        }
    }

    /// Media type string for a family and version
    pub fn media_type(&self, representation: Representation, version: ApiVersion) -> String {
        match representation {
            Representation::Plain => "application/json".to_string(),
            Representation::Versioned => format!("application/json;v={}", version.as_number()),
            Representation::Hateoas => format!("{}+json", self.hateoas_prefix),
            Representation::VersionedHateoas => {
                format!("{}.{}+json", self.hateoas_prefix, version.as_number())
            }
        }
    }

    fn classify(&self, range: &str) -> Option<(Candidate, f32)> {
        let mut parts = range.split(';').map(str::trim);
        let media = parts.next()?.to_ascii_lowercase();
        if media.is_empty() {
            return None;
        }

        let mut q = 1.0_f32;
        let mut v_param = None;
        for param in parts {
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match name.trim().to_ascii_lowercase().as_str() {
                "q" => q = parse_quality(value),
                "v" => v_param = Some(value.to_string()),
                _ => {}
            }
        }

        let candidate = match media.as_str() {
            "application/json" => match v_param {
                Some(v) => Candidate {
                    representation: Representation::Versioned,
                    version: Some(self.supported_version(&v)?),
                },
                None => Candidate {
                    representation: Representation::Plain,
                    version: None,
                },
            },
            "*/*" | "application/*" => Candidate {
                representation: Representation::Plain,
                version: None,
            },
            other => {
                let rest = other
                    .strip_prefix(self.hateoas_prefix.as_str())?
                    .strip_suffix("+json")?;
                if rest.is_empty() {
                    Candidate {
                        representation: Representation::Hateoas,
                        version: None,
                    }
                } else {
                    Candidate {
                        representation: Representation::VersionedHateoas,
                        version: Some(self.supported_version(rest.strip_prefix('.')?)?),
                    }
                }
            }
        };

        Some((candidate, q))
    }

    fn supported_version(&self, raw: &str) -> Option<ApiVersion> {
        ApiVersion::parse(raw).filter(|v| self.supports(*v))
    }
}

// Non-finite or unparsable weights count as 0; the rest clamp to [0, 1]
fn parse_quality(raw: &str) -> f32 {
    raw.parse::<f32>()
        .ok()
        .filter(|q| q.is_finite())
        .map_or(0.0, |q| q.clamp(0.0, 1.0))
}

/// JSON response written with a negotiated media type
///
/// Sets `Content-Type`, `Vary: Accept` and, when given, `ETag`.
#[derive(Debug, Clone)]
pub struct NegotiatedJson<T> {
    body: T,
    media_type: String,
    etag: Option<String>,
    status: StatusCode,
}

impl<T: Serialize> NegotiatedJson<T> {
    /// Wrap a body with the negotiated media type
    pub fn new(body: T, negotiated: &Negotiated) -> Self {
        Self {
            body,
            media_type: negotiated.media_type.clone(),
            etag: None,
            status: StatusCode::OK,
        }
    }

    /// Attach an ETag header
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Override the status code
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// The wrapped body
    pub fn body(&self) -> &T {
        &self.body
    }

    /// ETag that will be written, if any
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }
}

impl<T: Serialize> IntoResponse for NegotiatedJson<T> {
    fn into_response(self) -> Response {
        let bytes = match serde_json::to_vec(&self.body) {
            Ok(bytes) => bytes,
            Err(e) => return Error::Serialization(e).into_response(),
        };

        let mut response = (self.status, bytes).into_response();
        let headers = response.headers_mut();
        match HeaderValue::from_str(&self.media_type) {
            Ok(value) => {
                headers.insert(header::CONTENT_TYPE, value);
            }
            Err(_) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
        }
        headers.insert(header::VARY, HeaderValue::from_static("accept"));
        if let Some(etag) = self.etag.and_then(|e| HeaderValue::from_str(&e).ok()) {
            headers.insert(header::ETAG, etag);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiator() -> ContentNegotiator {
        ContentNegotiator::new(&NegotiationConfig::default()).unwrap()
    }

    #[test]
    fn test_api_version_parse() {
        assert_eq!(ApiVersion::parse("v1"), Some(ApiVersion::V1));
        assert_eq!(ApiVersion::parse("V2"), Some(ApiVersion::V2));
        assert_eq!(ApiVersion::parse("2"), Some(ApiVersion::V2));
        assert_eq!(ApiVersion::parse("v9"), None);
        assert_eq!(ApiVersion::V1.to_string(), "v1");
        assert!(ApiVersion::V1 < ApiVersion::V2);
    }

    #[test]
    fn test_absent_accept_is_plain_latest() {
        let n = negotiator().negotiate(None, None);
        assert_eq!(n.representation, Representation::Plain);
        assert_eq!(n.version, ApiVersion::V2);
        assert_eq!(n.media_type, "application/json");
        assert!(!n.include_links);
    }

    #[test]
    fn test_unrecognised_accept_is_plain_latest() {
        let n = negotiator().negotiate(Some("text/html, image/png"), Some(ApiVersion::V1));
        assert_eq!(n.representation, Representation::Plain);
        assert_eq!(n.version, ApiVersion::V2);

        let n = negotiator().negotiate(None, Some(ApiVersion::V1));
        assert_eq!(n.version, ApiVersion::V2);
    }

    #[test]
    fn test_api_version_applies_to_recognised_range() {
        let n = negotiator().negotiate(Some("application/json"), Some(ApiVersion::V1));
        assert_eq!(n.representation, Representation::Plain);
        assert_eq!(n.version, ApiVersion::V1);
    }

    #[test]
    fn test_malformed_q_values() {
        assert_eq!(parse_quality("NaN"), 0.0);
        assert_eq!(parse_quality("inf"), 0.0);
        assert_eq!(parse_quality("7"), 1.0);
        assert_eq!(parse_quality("-1"), 0.0);
        assert_eq!(parse_quality("0.5"), 0.5);

        // NaN ranges are skipped rather than winning by position
        let n = negotiator().negotiate(
            Some("application/vnd.dev-habit.hateoas+json;q=NaN, application/json;q=0.2"),
            None,
        );
        assert_eq!(n.representation, Representation::Plain);
        assert!(!n.include_links);

        // q above 1 does not outrank a plain q=1 range listed first
        let n = negotiator().negotiate(
            Some("application/json;v=1, application/vnd.dev-habit.hateoas+json;q=5"),
            None,
        );
        assert_eq!(n.representation, Representation::Versioned);
    }

    #[test]
    fn test_hateoas_families() {
        let n = negotiator().negotiate(Some("application/vnd.dev-habit.hateoas+json"), None);
        assert_eq!(n.representation, Representation::Hateoas);
        assert!(n.include_links);
        assert_eq!(n.media_type, "application/vnd.dev-habit.hateoas+json");

        let n = negotiator().negotiate(Some("application/vnd.dev-habit.hateoas.1+json"), None);
        assert_eq!(n.representation, Representation::VersionedHateoas);
        assert_eq!(n.version, ApiVersion::V1);
        assert_eq!(n.media_type, "application/vnd.dev-habit.hateoas.1+json");
    }

    #[test]
    fn test_versioned_json() {
        let n = negotiator().negotiate(Some("application/json;v=1"), None);
        assert_eq!(n.representation, Representation::Versioned);
        assert_eq!(n.media_type, "application/json;v=1");
        assert!(!n.include_links);
    }

    #[test]
    fn test_media_type_version_beats_argument() {
        let n = negotiator().negotiate(
            Some("application/vnd.dev-habit.hateoas.1+json"),
            Some(ApiVersion::V2),
        );
        assert_eq!(n.version, ApiVersion::V1);
    }

    #[test]
    fn test_q_values_and_ties() {
        let n = negotiator().negotiate(
            Some("application/json;q=0.5, application/vnd.dev-habit.hateoas+json;q=0.9"),
            None,
        );
        assert_eq!(n.representation, Representation::Hateoas);

        let n = negotiator().negotiate(
            Some("application/json, application/vnd.dev-habit.hateoas+json"),
            None,
        );
        assert_eq!(n.representation, Representation::Plain);

        let n = negotiator().negotiate(
            Some("application/vnd.dev-habit.hateoas+json;q=0, */*"),
            None,
        );
        assert_eq!(n.representation, Representation::Plain);
    }

    #[test]
    fn test_unsupported_version_is_ignored() {
        let n = negotiator().negotiate(
            Some("application/vnd.dev-habit.hateoas.7+json, application/json;v=1;q=0.1"),
            None,
        );
        assert_eq!(n.representation, Representation::Versioned);
        assert_eq!(n.version, ApiVersion::V1);
    }

    #[test]
    fn test_vendor_is_configurable() {
        let config = NegotiationConfig {
            vendor: "acme".to_string(),
            supported_versions: vec![1],
        };
        let negotiator = ContentNegotiator::new(&config).unwrap();
        assert_eq!(negotiator.latest(), ApiVersion::V1);
        let n = negotiator.negotiate(Some("application/vnd.acme.hateoas+json"), None);
        assert!(n.include_links);
        let n = negotiator.negotiate(Some("application/vnd.dev-habit.hateoas+json"), None);
        assert!(!n.include_links);
    }

    #[test]
    fn test_no_known_versions_is_configuration_error() {
        let config = NegotiationConfig {
            vendor: "acme".to_string(),
            supported_versions: vec![9],
        };
        assert!(matches!(
            ContentNegotiator::new(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_negotiated_json_headers() {
        let n = negotiator().negotiate(Some("application/vnd.dev-habit.hateoas+json"), None);
        let response = NegotiatedJson::new(serde_json::json!({"id": "e_1"}), &n)
            .with_etag("\"abc\"")
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.dev-habit.hateoas+json"
        );
        assert_eq!(response.headers()[header::ETAG], "\"abc\"");
    }
}
