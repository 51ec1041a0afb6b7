//! # resource-pipeline
//!
//! Query and representation pipeline for REST collections and resources.
//! Given a request's `sort`, `fields`, paging parameters and `Accept`
//! header, it validates them against per-resource tables, pages through a
//! queryable data source, projects and shapes the results, and attaches
//! hypermedia links when the client negotiated a representation that
//! carries them.
//!
//! ## Features
//!
//! - **Sorting**: whitelisted sort fields mapped to source expressions, with
//!   tie-break expansion and reverse-by-default fields
//! - **Pagination**: offset (`page`/`pageSize`) and keyset cursors
//!   (`(date desc, id desc)`, opaque base64 tokens)
//! - **Field shaping**: `?fields=` projections that always keep `id`
//! - **Hypermedia**: links built from an explicit route table
//! - **Content negotiation**: plain, versioned and hypermedia JSON media types
//! - **Conditional requests**: blake3 ETag fingerprints per resource path
//!
//! ## Example
//!
//! ```rust,no_run
//! use resource_pipeline::prelude::*;
//! use resource_pipeline::resources::{default_pipeline, Entries, Entry, EntryFilters};
//!
//! # async fn run(rows: Vec<Entry>) -> Result<()> {
//! let config = Config::load()?;
//! init_tracing(&config)?;
//!
//! let pipeline = default_pipeline(&config)?;
//! let source = InMemorySource::new(rows);
//! let caller = StaticIdentity::user("u_1");
//!
//! let negotiated = pipeline.negotiate(Some("application/vnd.dev-habit.hateoas+json"), None);
//! let query = CollectionQuery::new().with_sort("date desc").with_fields("id,value");
//!
//! let page = pipeline
//!     .list_offset(&Entries, &source, &caller, &EntryFilters::default(), &query, &negotiated)
//!     .await?;
//! let response = pipeline.respond(page, &negotiated, Some("/entries"))?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod etag;
pub mod identity;
pub mod ids;
pub mod links;
pub mod memory;
pub mod negotiation;
pub mod observability;
pub mod pagination;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod resources;
pub mod shaping;
pub mod sorting;
pub mod source;
pub mod value;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        Config, LinksConfig, NegotiationConfig, PaginationConfig, ServiceConfig, SortingConfig,
    };
    pub use crate::cursor::{Cursor, CursorOrdering, CursorPage, CursorRow, CursorWindow};
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::etag::{ETagCheck, ETagStore, ReadCheck};
    pub use crate::identity::{require_user, IdentityResolver, StaticIdentity};
    pub use crate::ids::ResourceId;
    pub use crate::links::{rel, Action, Link, LinkBuilder, RouteTable, RouteValues};
    pub use crate::memory::InMemorySource;
    pub use crate::negotiation::{
        ApiVersion, ContentNegotiator, Negotiated, NegotiatedJson, Representation,
    };
    pub use crate::observability::init_tracing;
    pub use crate::pagination::{OffsetPage, OffsetWindow, PaginationMeta};
    pub use crate::pipeline::{
        CursorCollection, CursorResource, OffsetCollection, ResourceDefinition, ResourcePipeline,
    };
    pub use crate::query::{CollectionQuery, CursorQuery};
    pub use crate::registry::{FieldMapping, FieldRegistry, ResourceKind, SourceExpression};
    pub use crate::shaping::{ShapeSpec, Shapeable, ShapedRepresentation};
    pub use crate::sorting::{CompiledOrdering, OrderDirection, SortSpec};
    pub use crate::source::{
        FilterCondition, FilterOperator, ResourceSource, SourceError, SourceQuery, SourceRow,
    };
    pub use crate::value::FieldValue;
}
