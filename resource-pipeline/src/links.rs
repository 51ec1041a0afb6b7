//! Hypermedia links
//!
//! Links are generated from an explicit [`RouteTable`] that maps a
//! `(ResourceKind, Action)` pair to a route template such as
//! `/entries/{id}/archive`. The table is validated when built: a kind that
//! lacks a template for one of its actions fails startup.
//!
//! [`LinkBuilder::create`] is a pure function of its inputs. Path parameters
//! are substituted from the route values, and the remaining non-empty values
//! become the query string in insertion order.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use http::Method;
//! use resource_pipeline::links::{rel, Action, LinkBuilder, RouteTable, RouteValues};
//! use resource_pipeline::registry::ResourceKind;
//!
//! let routes = RouteTable::builder()
//!     .route(ResourceKind::Entry, Action::Get, "/entries/{id}")
//!     .build_for(&[])
//!     .unwrap();
//! let links = LinkBuilder::new(Arc::new(routes), "https://api.example.com").unwrap();
//!
//! let link = links
//!     .create(
//!         ResourceKind::Entry,
//!         Action::Get,
//!         rel::SELF,
//!         Method::GET,
//!         &RouteValues::new().with("id", "e_1").with("fields", "id,value"),
//!     )
//!     .unwrap();
//! assert_eq!(link.href, "https://api.example.com/entries/e_1?fields=id%2Cvalue");
//! assert_eq!(link.method, "GET");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::registry::ResourceKind;

/// Relation names
pub mod rel {
    /// The resource itself
    pub const SELF: &str = "self";
    /// Create a resource in the collection
    pub const CREATE: &str = "create";
    /// Create several resources at once
    pub const CREATE_BATCH: &str = "create-batch";
    /// Replace the resource
    pub const UPDATE: &str = "update";
    /// Patch the resource
    pub const PARTIAL_UPDATE: &str = "partial-update";
    /// Delete the resource
    pub const DELETE: &str = "delete";
    /// Next page of a collection
    pub const NEXT_PAGE: &str = "next-page";
    /// Previous page of a collection
    pub const PREVIOUS_PAGE: &str = "previous-page";
    /// Archive the resource
    pub const ARCHIVE: &str = "archive";
    /// Restore an archived resource
    pub const UN_ARCHIVE: &str = "un-archive";
    /// Aggregated statistics
    pub const STATS: &str = "stats";
    /// Replace the resource's tags
    pub const UPSERT_TAGS: &str = "upsert-tags";
}

/// Symbolic action a link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// Offset-paginated collection
    List,
    /// Cursor-paginated collection
    ListCursor,
    /// Single resource
    Get,
    /// Create one resource
    Create,
    /// Create several resources
    CreateBatch,
    /// Replace a resource
    Update,
    /// Patch a resource
    PartialUpdate,
    /// Delete a resource
    Delete,
    /// Archive a resource
    Archive,
    /// Un-archive a resource
    UnArchive,
    /// Collection statistics
    Stats,
    /// Replace a resource's tags
    UpsertTags,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::ListCursor => "list-cursor",
            Self::Get => "get",
            Self::Create => "create",
            Self::CreateBatch => "create-batch",
            Self::Update => "update",
            Self::PartialUpdate => "partial-update",
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::UnArchive => "un-archive",
            Self::Stats => "stats",
            Self::UpsertTags => "upsert-tags",
        };
        f.write_str(name)
    }
}

impl ResourceKind {
    /// Actions every route table must provide a template for
    pub fn actions(&self) -> &'static [Action] {
        match self {
            Self::Entry => &[
                Action::List,
                Action::ListCursor,
                Action::Get,
                Action::Create,
                Action::CreateBatch,
                Action::Update,
                Action::Archive,
                Action::UnArchive,
                Action::Delete,
                Action::Stats,
            ],
            Self::Habit => &[
                Action::List,
                Action::Get,
                Action::Create,
                Action::Update,
                Action::PartialUpdate,
                Action::Delete,
                Action::UpsertTags,
            ],
        }
    }
}

/// An action descriptor embedded in a representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Absolute target URL
    pub href: String,
    /// Relation name
    pub rel: String,
    /// HTTP method
    pub method: String,
}

impl Link {
    /// Create a link
    pub fn new(href: impl Into<String>, rel: impl Into<String>, method: &Method) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            method: method.as_str().to_string(),
        }
    }
}

/// Ordered route values for link generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues {
    values: IndexMap<String, String>,
}

impl RouteValues {
    /// Create an empty set of route values
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; empty values are skipped
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.values.insert(name.into(), value);
        }
        self
    }

    /// Add a value when present
    #[must_use]
    pub fn with_opt<V: fmt::Display>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Append every value of `other`, keeping its order
    #[must_use]
    pub fn merge(mut self, other: &RouteValues) -> Self {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
        self
    }

    /// Read a value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether no value is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    /// Parse a template like `/entries/{id}/archive`
    ///
    /// Parameters must occupy a whole path segment.
    pub fn parse(template: &str) -> Result<Self> {
        let rest = template.strip_prefix('/').ok_or_else(|| {
            Error::configuration(format!("route template '{}' must start with '/'", template))
        })?;

        let mut segments = Vec::new();
        for part in rest.split('/').filter(|p| !p.is_empty()) {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name)
                    if !name.is_empty()
                        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
                {
                    Segment::Param(name.to_string())
                }
                Some(_) => {
                    return Err(Error::configuration(format!(
                        "route template '{}' has an invalid parameter '{}'",
                        template, part
                    )))
                }
                None if part.contains(['{', '}']) => {
                    return Err(Error::configuration(format!(
                        "route template '{}' has a parameter that is not a whole segment",
                        template
                    )))
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    /// Names of the path parameters, in order
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Validated `(kind, action) -> template` table
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<(ResourceKind, Action), RouteTemplate>,
}

impl RouteTable {
    /// Start building a route table
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Template for an action
    pub fn get(&self, kind: ResourceKind, action: Action) -> Result<&RouteTemplate> {
        self.routes.get(&(kind, action)).ok_or_else(|| {
            tracing::error!(kind = %kind, action = %action, "No route template registered");
            Error::configuration(format!("no route registered for {} {}", kind, action))
        })
    }
}

/// Builder for [`RouteTable`]
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    routes: Vec<(ResourceKind, Action, String)>,
}

impl RouteTableBuilder {
    /// Register a route template
    #[must_use]
    pub fn route(
        mut self,
        kind: ResourceKind,
        action: Action,
        template: impl Into<String>,
    ) -> Self {
        self.routes.push((kind, action, template.into()));
        self
    }

    /// Build a table covering the actions of every [`ResourceKind`]
    pub fn build(self) -> Result<RouteTable> {
        self.build_for(&ResourceKind::ALL)
    }

    /// Build a table that must cover the actions of the given kinds
    pub fn build_for(self, required: &[ResourceKind]) -> Result<RouteTable> {
        let mut routes = HashMap::new();
        for (kind, action, template) in self.routes {
            let parsed = RouteTemplate::parse(&template)?;
            if routes.insert((kind, action), parsed).is_some() {
                return Err(Error::configuration(format!(
                    "route for {} {} registered twice",
                    kind, action
                )));
            }
        }

        for kind in required {
            for action in kind.actions() {
                if !routes.contains_key(&(*kind, *action)) {
                    return Err(Error::configuration(format!(
                        "no route registered for {} {}",
                        kind, action
                    )));
                }
            }
        }

        tracing::debug!(routes = routes.len(), "Route table built");
        Ok(RouteTable { routes })
    }
}

/// Generates links against a base URL
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    routes: Arc<RouteTable>,
    base_url: Url,
}

impl LinkBuilder {
    /// Create a builder; the base URL must be able to carry a path
    pub fn new(routes: Arc<RouteTable>, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::configuration(format!("invalid link base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "link base URL '{}' cannot carry a path",
                base_url
            )));
        }
        Ok(Self { routes, base_url })
    }

    /// The route table links are resolved against
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Build a link for an action
    ///
    /// Values named by the template's parameters fill the path. All other
    /// values form the query string, in insertion order. A missing path
    /// parameter is a configuration error.
    pub fn create(
        &self,
        kind: ResourceKind,
        action: Action,
        rel: &str,
        method: Method,
        values: &RouteValues,
    ) -> Result<Link> {
        let template = self.routes.get(kind, action)?;
        let mut url = self.base_url.clone();

        {
            let mut path = url.path_segments_mut().map_err(|_| {
                Error::configuration(format!(
                    "link base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?;
            path.pop_if_empty();
            for segment in &template.segments {
                match segment {
                    Segment::Literal(literal) => {
                        path.push(literal);
                    }
                    Segment::Param(name) => {
                        let value = values.get(name).ok_or_else(|| {
                            Error::configuration(format!(
                                "route {} is missing path parameter '{}'",
                                template, name
                            ))
                        })?;
                        path.push(value);
                    }
                }
            }
        }

        url.set_query(None);
        let mut query = values
            .values
            .iter()
            .filter(|(name, _)| !template.params().any(|p| p == name.as_str()))
            .peekable();
        if query.peek().is_some() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        Ok(Link::new(url.as_str(), rel, &method))
    }
}
