//! Request pipeline
//!
//! [`ResourcePipeline`] owns the startup tables (field registry, route
//! table), the content negotiator and the ETag store, and runs the per
//! request control flow for list and detail endpoints:
//!
//! 1. resolve the caller
//! 2. validate `sort`, `fields` and the page window, before any data access
//! 3. compile the ordering
//! 4. count and fetch through the [`ResourceSource`]
//! 5. project rows to DTOs and shape them
//! 6. attach links, only when the negotiated representation carries them
//!
//! Resource-specific knowledge (DTO projection, filters, link sets) comes
//! from a [`ResourceDefinition`].

use std::sync::Arc;

use http::Method;
use serde::Serialize;

use crate::config::{Config, PaginationConfig, SortingConfig};
use crate::cursor::{paginate_cursor, CursorOrdering, CursorPage, CursorRow, CursorWindow};
use crate::error::{Error, Result};
use crate::etag::{ETagCheck, ETagStore, ReadCheck};
use crate::identity::{require_user, IdentityResolver};
use crate::links::{Action, Link, LinkBuilder, RouteTable, RouteValues};
use crate::negotiation::{ApiVersion, ContentNegotiator, Negotiated, NegotiatedJson};
use crate::pagination::{paginate_offset, OffsetPage, OffsetWindow, PaginationMeta};
use crate::query::{CollectionQuery, CursorQuery};
use crate::registry::{FieldRegistry, ResourceKind};
use crate::shaping::{
    shape, shape_collection, try_shape_collection, ShapeSpec, Shapeable, ShapedRepresentation,
};
use crate::sorting::{parse_sort_with_limit, CompiledOrdering};
use crate::source::{FilterCondition, ResourceSource, SourceQuery, SourceRow};

/// Resource-specific collaborator plugged into the pipeline
pub trait ResourceDefinition: Send + Sync {
    /// Stored entity type yielded by the data source
    type Entity: SourceRow + Send + Sync;
    /// Output DTO type
    type Dto: Shapeable;
    /// Resource-specific list filters
    type Filters: Send + Sync;

    /// Kind used for registry and route lookups
    fn kind(&self) -> ResourceKind;

    /// Source expression holding the resource id
    fn id_expression(&self) -> &'static str {
        "id"
    }

    /// Source expression holding the owning user's id
    fn owner_expression(&self) -> &'static str {
        "user_id"
    }

    /// Project an entity to its DTO
    fn to_dto(&self, entity: &Self::Entity) -> Self::Dto;

    /// Filter conditions for the resource-specific filters
    fn filter_conditions(&self, filters: &Self::Filters) -> Vec<FilterCondition>;

    /// Links for a single resource, reflecting its current state
    fn item_links(
        &self,
        links: &LinkBuilder,
        dto: &Self::Dto,
        fields: Option<&str>,
    ) -> Result<Vec<Link>>;

    /// Links for an offset-paginated collection
    fn collection_links(
        &self,
        links: &LinkBuilder,
        query: &CollectionQuery,
        filters: &Self::Filters,
        meta: &PaginationMeta,
    ) -> Result<Vec<Link>>;
}

/// A resource that also supports cursor pagination
pub trait CursorResource: ResourceDefinition {
    /// The fixed ordering cursor walks follow
    fn cursor_ordering(&self) -> CursorOrdering;

    /// Links for a cursor-paginated collection
    fn cursor_collection_links(
        &self,
        links: &LinkBuilder,
        query: &CursorQuery,
        filters: &Self::Filters,
        next_cursor: Option<&str>,
    ) -> Result<Vec<Link>>;
}

/// Offset-paginated collection response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetCollection {
    /// Shaped items
    pub items: Vec<ShapedRepresentation>,
    /// Pagination metadata, flattened into the body
    #[serde(flatten)]
    pub meta: PaginationMeta,
    /// Collection links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
}

/// Cursor-paginated collection response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorCollection {
    /// Shaped items
    pub items: Vec<ShapedRepresentation>,
    /// Token for the next page, `null` on the last page
    pub next_cursor: Option<String>,
    /// Collection links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
}

impl CursorCollection {
    /// Whether more items follow
    pub fn has_next_page(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// The composed query and representation pipeline
#[derive(Debug, Clone)]
pub struct ResourcePipeline {
    registry: Arc<FieldRegistry>,
    links: LinkBuilder,
    negotiator: ContentNegotiator,
    etags: ETagStore,
    pagination: PaginationConfig,
    sorting: SortingConfig,
}

impl ResourcePipeline {
    /// Assemble a pipeline from configuration and startup tables
    pub fn new(config: &Config, registry: FieldRegistry, routes: RouteTable) -> Result<Self> {
        let pagination = config.pagination.clone();
        if pagination.default_page_size < 1
            || pagination.default_page_size > pagination.max_page_size
        {
            return Err(Error::configuration(
                "pagination.default_page_size must be between 1 and pagination.max_page_size",
            ));
        }
        if pagination.default_cursor_limit < 1
            || pagination.default_cursor_limit > pagination.max_cursor_limit
        {
            return Err(Error::configuration(
                "pagination.default_cursor_limit must be between 1 and pagination.max_cursor_limit",
            ));
        }
        if config.sorting.max_sort_fields < 1 {
            return Err(Error::configuration("sorting.max_sort_fields must be at least 1"));
        }

        Ok(Self {
            registry: Arc::new(registry),
            links: LinkBuilder::new(Arc::new(routes), &config.links.base_url)?,
            negotiator: ContentNegotiator::new(&config.negotiation)?,
            etags: ETagStore::new(),
            pagination,
            sorting: config.sorting.clone(),
        })
    }

    /// Use a shared ETag store instead of a private one
    #[must_use]
    pub fn with_etag_store(mut self, etags: ETagStore) -> Self {
        self.etags = etags;
        self
    }

    /// Field registry
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Link builder
    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    /// ETag store
    pub fn etags(&self) -> &ETagStore {
        &self.etags
    }

    // Sorting

    /// Whether every field in the sort expression is sortable for `kind`
    pub fn validate_sort(&self, kind: ResourceKind, sort: Option<&str>) -> Result<bool> {
        let mappings = self.registry.resolve(kind)?;
        Ok(parse_sort_with_limit(sort, mappings, self.sorting.max_sort_fields).is_ok())
    }

    /// Compile a sort expression for `kind`
    pub fn compile_sort(&self, kind: ResourceKind, sort: Option<&str>) -> Result<CompiledOrdering> {
        let mappings = self.registry.resolve(kind)?;
        let ordering =
            parse_sort_with_limit(sort, mappings, self.sorting.max_sort_fields)?.compile(mappings)?;
        tracing::debug!(kind = %kind, ordering = %ordering, "Compiled sort");
        Ok(ordering)
    }

    // Shaping

    /// Whether every requested field is declared by `T`
    pub fn validate_shape<T: Shapeable>(&self, fields: Option<&str>) -> bool {
        ShapeSpec::<T>::parse(fields).is_ok()
    }

    /// Shape a single item
    pub fn shape<T: Shapeable>(
        &self,
        item: &T,
        fields: Option<&str>,
    ) -> Result<ShapedRepresentation> {
        Ok(shape(item, &ShapeSpec::parse(fields)?))
    }

    /// Shape a collection, attaching links when a selector is supplied
    pub fn shape_collection<T, F>(
        &self,
        items: &[T],
        fields: Option<&str>,
        link_selector: Option<F>,
    ) -> Result<Vec<ShapedRepresentation>>
    where
        T: Shapeable,
        F: Fn(&T) -> Result<Vec<Link>>,
    {
        try_shape_collection(items, &ShapeSpec::parse(fields)?, link_selector)
    }

    // Pagination

    /// Validate an offset window, applying configured defaults
    pub fn offset_window(&self, page: Option<u32>, page_size: Option<u32>) -> Result<OffsetWindow> {
        OffsetWindow::with_max(
            page.unwrap_or(1),
            page_size.unwrap_or(self.pagination.default_page_size),
            self.pagination.max_page_size,
        )
    }

    /// Validate a cursor window, applying configured defaults
    pub fn cursor_window(&self, cursor: Option<&str>, limit: Option<u32>) -> Result<CursorWindow> {
        CursorWindow::with_max(
            cursor,
            limit.unwrap_or(self.pagination.default_cursor_limit),
            self.pagination.max_cursor_limit,
        )
    }

    /// Count and fetch one offset page
    pub async fn paginate_offset<S: ResourceSource>(
        &self,
        source: &S,
        filters: &[FilterCondition],
        ordering: &CompiledOrdering,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<OffsetPage<S::Row>> {
        let window = self.offset_window(page, page_size)?;
        paginate_offset(source, filters, ordering, window).await
    }

    /// Fetch one cursor page
    pub async fn paginate_cursor<S>(
        &self,
        source: &S,
        filters: &[FilterCondition],
        ordering: &CursorOrdering,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<CursorPage<S::Row>>
    where
        S: ResourceSource,
        S::Row: CursorRow,
    {
        let window = self.cursor_window(cursor, limit)?;
        paginate_cursor(source, filters, ordering, &window).await
    }

    // Links, negotiation, ETags

    /// Build a link for an action
    pub fn create_link(
        &self,
        kind: ResourceKind,
        action: Action,
        rel: &str,
        method: Method,
        values: &RouteValues,
    ) -> Result<Link> {
        self.links.create(kind, action, rel, method, values)
    }

    /// Negotiate the representation for a request
    pub fn negotiate(&self, accept: Option<&str>, api_version: Option<ApiVersion>) -> Negotiated {
        self.negotiator.negotiate(accept, api_version)
    }

    /// Record the fingerprint of a representation written for `path`
    pub fn set_etag<T: Serialize + ?Sized>(
        &self,
        path: &str,
        representation: &T,
    ) -> Result<String> {
        self.etags.set(path, representation)
    }

    /// Check an `If-Match` header
    pub fn check_etag(&self, path: &str, if_match: Option<&str>) -> ETagCheck {
        self.etags.check(path, if_match)
    }

    /// Check an `If-None-Match` header
    pub fn check_etag_read(&self, path: &str, if_none_match: Option<&str>) -> ReadCheck {
        self.etags.check_if_none_match(path, if_none_match)
    }

    /// Fail with `PreconditionFailed` when `If-Match` names a stale fingerprint
    pub fn require_fresh(&self, path: &str, if_match: Option<&str>) -> Result<()> {
        match self.check_etag(path, if_match) {
            ETagCheck::Stale => Err(Error::PreconditionFailed(format!(
                "{} was modified since it was read",
                path
            ))),
            ETagCheck::Matches | ETagCheck::NoRecord => Ok(()),
        }
    }

    /// Wrap a body for the negotiated media type, recording its ETag
    pub fn respond<T: Serialize>(
        &self,
        body: T,
        negotiated: &Negotiated,
        etag_path: Option<&str>,
    ) -> Result<NegotiatedJson<T>> {
        let etag = etag_path
            .map(|path| self.etags.set(path, &body))
            .transpose()?;
        let response = NegotiatedJson::new(body, negotiated);
        Ok(match etag {
            Some(etag) => response.with_etag(etag),
            None => response,
        })
    }

    // Composed flows

    /// List a user-owned collection with offset pagination
    pub async fn list_offset<R, S, I>(
        &self,
        resource: &R,
        source: &S,
        identity: &I,
        filters: &R::Filters,
        query: &CollectionQuery,
        negotiated: &Negotiated,
    ) -> Result<OffsetCollection>
    where
        R: ResourceDefinition,
        S: ResourceSource<Row = R::Entity>,
        I: IdentityResolver,
    {
        let owner = require_user(identity).await?;
        let kind = resource.kind();

        let mappings = self.registry.resolve(kind)?;
        let sort = parse_sort_with_limit(query.sort(), mappings, self.sorting.max_sort_fields)?;
        let spec = ShapeSpec::<R::Dto>::parse(query.fields())?;
        let window = self.offset_window(query.page, query.page_size)?;
        let ordering = sort.compile(mappings)?;
        tracing::debug!(kind = %kind, ordering = %ordering, "Listing collection");

        let conditions = self.scoped_filters(resource, &owner, filters);
        let page = paginate_offset(source, &conditions, &ordering, window).await?;

        let dtos: Vec<R::Dto> = page.items.iter().map(|e| resource.to_dto(e)).collect();
        let items = self.shape_items(resource, &dtos, &spec, query.fields(), negotiated)?;
        let links = if negotiated.include_links {
            Some(resource.collection_links(&self.links, query, filters, &page.meta)?)
        } else {
            None
        };

        Ok(OffsetCollection {
            items,
            meta: page.meta,
            links,
        })
    }

    /// List a user-owned collection with cursor pagination
    pub async fn list_cursor<R, S, I>(
        &self,
        resource: &R,
        source: &S,
        identity: &I,
        filters: &R::Filters,
        query: &CursorQuery,
        negotiated: &Negotiated,
    ) -> Result<CursorCollection>
    where
        R: CursorResource,
        R::Entity: CursorRow,
        S: ResourceSource<Row = R::Entity>,
        I: IdentityResolver,
    {
        let owner = require_user(identity).await?;
        let spec = ShapeSpec::<R::Dto>::parse(query.fields())?;
        let window = self.cursor_window(query.cursor(), query.limit)?;

        let conditions = self.scoped_filters(resource, &owner, filters);
        let page =
            paginate_cursor(source, &conditions, &resource.cursor_ordering(), &window).await?;

        let dtos: Vec<R::Dto> = page.items.iter().map(|e| resource.to_dto(e)).collect();
        let items = self.shape_items(resource, &dtos, &spec, query.fields(), negotiated)?;
        let links = if negotiated.include_links {
            Some(resource.cursor_collection_links(
                &self.links,
                query,
                filters,
                page.next_cursor.as_deref(),
            )?)
        } else {
            None
        };

        Ok(CursorCollection {
            items,
            next_cursor: page.next_cursor,
            links,
        })
    }

    /// Fetch and shape a single user-owned resource
    ///
    /// Yields `NotFound` when the source has no matching row for the caller.
    pub async fn get_one<R, S, I>(
        &self,
        resource: &R,
        source: &S,
        identity: &I,
        id: &str,
        fields: Option<&str>,
        negotiated: &Negotiated,
    ) -> Result<ShapedRepresentation>
    where
        R: ResourceDefinition,
        S: ResourceSource<Row = R::Entity>,
        I: IdentityResolver,
    {
        let owner = require_user(identity).await?;
        let spec = ShapeSpec::<R::Dto>::parse(fields)?;

        let query = SourceQuery::new()
            .filter(FilterCondition::eq(resource.id_expression(), id))
            .filter(FilterCondition::eq(resource.owner_expression(), owner))
            .take(1);
        let entity = source
            .fetch(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("{} '{}' was not found", resource.kind(), id)))?;

        let dto = resource.to_dto(&entity);
        let shaped = shape(&dto, &spec);
        if negotiated.include_links {
            Ok(shaped.with_links(resource.item_links(&self.links, &dto, fields)?))
        } else {
            Ok(shaped)
        }
    }

    fn scoped_filters<R: ResourceDefinition>(
        &self,
        resource: &R,
        owner: &str,
        filters: &R::Filters,
    ) -> Vec<FilterCondition> {
        let mut conditions = vec![FilterCondition::eq(resource.owner_expression(), owner)];
        conditions.extend(resource.filter_conditions(filters));
        conditions
    }

    fn shape_items<R: ResourceDefinition>(
        &self,
        resource: &R,
        dtos: &[R::Dto],
        spec: &ShapeSpec<R::Dto>,
        fields: Option<&str>,
        negotiated: &Negotiated,
    ) -> Result<Vec<ShapedRepresentation>> {
        if negotiated.include_links {
            try_shape_collection(
                dtos,
                spec,
                Some(|dto: &R::Dto| resource.item_links(&self.links, dto, fields)),
            )
        } else {
            Ok(shape_collection::<_, fn(&R::Dto) -> Vec<Link>>(dtos, spec, None))
        }
    }
}
