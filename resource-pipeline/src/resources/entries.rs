//! Habit entries
//!
//! Entries are user-owned records of progress against a habit on a given
//! date. They support both offset and cursor pagination. Cursor walks
//! follow `(date desc, id desc)`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, CursorOrdering, CursorRow};
use crate::error::Result;
use crate::ids::ResourceId;
use crate::links::{rel, Action, Link, LinkBuilder, RouteTableBuilder, RouteValues};
use crate::pagination::PaginationMeta;
use crate::pipeline::{CursorResource, ResourceDefinition};
use crate::query::{CollectionQuery, CursorQuery};
use crate::registry::{FieldMapping, ResourceKind};
use crate::shaping::Shapeable;
use crate::source::{FilterCondition, SourceRow};
use crate::value::FieldValue;

/// How an entry was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntrySource {
    /// Entered by hand
    #[default]
    Manual,
    /// Written by an automation
    Automation,
    /// Imported from a file
    FileImport,
}

impl EntrySource {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automation => "automation",
            Self::FileImport => "fileImport",
        }
    }
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EntrySource> for FieldValue {
    fn from(source: EntrySource) -> Self {
        FieldValue::String(source.as_str().to_string())
    }
}

/// A stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Prefixed entry id
    pub id: String,
    /// Owning habit
    pub habit_id: String,
    /// Owning user
    pub user_id: String,
    /// Recorded amount
    pub value: i32,
    /// Free-form notes
    pub notes: Option<String>,
    /// How the entry was recorded
    pub source: EntrySource,
    /// Id in the importing system, if any
    pub external_id: Option<String>,
    /// Hidden from active views
    pub is_archived: bool,
    /// Day the entry counts towards
    pub date: NaiveDate,
    /// Creation time
    pub created_at_utc: DateTime<Utc>,
    /// Last update time
    pub updated_at_utc: Option<DateTime<Utc>>,
}

impl Entry {
    /// A new manual entry with a fresh `e_` id
    pub fn new(
        user_id: impl Into<String>,
        habit_id: impl Into<String>,
        value: i32,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: ResourceId::new(ResourceKind::Entry).into_string(),
            habit_id: habit_id.into(),
            user_id: user_id.into(),
            value,
            notes: None,
            source: EntrySource::Manual,
            external_id: None,
            is_archived: false,
            date,
            created_at_utc: Utc::now(),
            updated_at_utc: None,
        }
    }

    /// Set the notes
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Set the recording source
    #[must_use]
    pub fn with_source(mut self, source: EntrySource) -> Self {
        self.source = source;
        self
    }

    /// Mark as archived
    #[must_use]
    pub fn archived(mut self) -> Self {
        self.is_archived = true;
        self
    }
}

impl SourceRow for Entry {
    fn source_value(&self, expression: &str) -> Option<FieldValue> {
        match expression {
            "id" => Some(self.id.as_str().into()),
            "habit_id" => Some(self.habit_id.as_str().into()),
            "user_id" => Some(self.user_id.as_str().into()),
            "value" => Some(self.value.into()),
            "notes" => Some(self.notes.as_deref().into()),
            "source" => Some(self.source.into()),
            "external_id" => Some(self.external_id.as_deref().into()),
            "is_archived" => Some(self.is_archived.into()),
            "date" => Some(self.date.into()),
            "created_at_utc" => Some(self.created_at_utc.into()),
            "updated_at_utc" => Some(self.updated_at_utc.into()),
            _ => None,
        }
    }
}

impl CursorRow for Entry {
    fn cursor(&self) -> Cursor {
        Cursor::new(self.date, self.id.clone())
    }
}

/// Entry output representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDto {
    /// Prefixed entry id
    pub id: String,
    /// Owning habit
    pub habit_id: String,
    /// Recorded amount
    pub value: i32,
    /// Free-form notes
    pub notes: Option<String>,
    /// How the entry was recorded
    pub source: EntrySource,
    /// Id in the importing system, if any
    pub external_id: Option<String>,
    /// Hidden from active views
    pub is_archived: bool,
    /// Day the entry counts towards
    pub date: NaiveDate,
    /// Creation time
    pub created_at_utc: DateTime<Utc>,
    /// Last update time
    pub updated_at_utc: Option<DateTime<Utc>>,
}

impl From<&Entry> for EntryDto {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id.clone(),
            habit_id: entry.habit_id.clone(),
            value: entry.value,
            notes: entry.notes.clone(),
            source: entry.source,
            external_id: entry.external_id.clone(),
            is_archived: entry.is_archived,
            date: entry.date,
            created_at_utc: entry.created_at_utc,
            updated_at_utc: entry.updated_at_utc,
        }
    }
}

impl Shapeable for EntryDto {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "habitId",
        "value",
        "notes",
        "source",
        "externalId",
        "isArchived",
        "date",
        "createdAtUtc",
        "updatedAtUtc",
    ];

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "habitId" => Some(self.habit_id.as_str().into()),
            "value" => Some(self.value.into()),
            "notes" => Some(self.notes.as_deref().into()),
            "source" => Some(self.source.into()),
            "externalId" => Some(self.external_id.as_deref().into()),
            "isArchived" => Some(self.is_archived.into()),
            "date" => Some(self.date.into()),
            "createdAtUtc" => Some(self.created_at_utc.into()),
            "updatedAtUtc" => Some(self.updated_at_utc.into()),
            _ => None,
        }
    }
}

/// Entry list filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFilters {
    /// Only entries of this habit
    #[serde(default)]
    pub habit_id: Option<String>,
    /// Inclusive lower date bound
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper date bound
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    /// Only entries recorded this way
    #[serde(default)]
    pub source: Option<EntrySource>,
    /// Only archived or only active entries
    #[serde(default)]
    pub is_archived: Option<bool>,
}

impl EntryFilters {
    /// Echo the filters as link query values
    pub fn route_values(&self) -> RouteValues {
        RouteValues::new()
            .with_opt("habitId", self.habit_id.as_deref())
            .with_opt("fromDate", self.from_date)
            .with_opt("toDate", self.to_date)
            .with_opt("source", self.source)
            .with_opt("isArchived", self.is_archived)
    }
}

/// Sortable entry fields
pub fn mappings() -> Vec<FieldMapping> {
    vec![
        FieldMapping::new("date", "date"),
        FieldMapping::new("value", "value"),
        FieldMapping::new("notes", "notes"),
        FieldMapping::new("source", "source"),
        FieldMapping::new("isArchived", "is_archived"),
        FieldMapping::new("createdAtUtc", "created_at_utc"),
        FieldMapping::new("updatedAtUtc", "updated_at_utc"),
    ]
}

/// Register entry routes
pub fn routes(builder: RouteTableBuilder) -> RouteTableBuilder {
    let kind = ResourceKind::Entry;
    builder
        .route(kind, Action::List, "/entries")
        .route(kind, Action::ListCursor, "/entries/cursor")
        .route(kind, Action::Get, "/entries/{id}")
        .route(kind, Action::Create, "/entries")
        .route(kind, Action::CreateBatch, "/entries/batch")
        .route(kind, Action::Update, "/entries/{id}")
        .route(kind, Action::Archive, "/entries/{id}/archive")
        .route(kind, Action::UnArchive, "/entries/{id}/un-archive")
        .route(kind, Action::Delete, "/entries/{id}")
        .route(kind, Action::Stats, "/entries/stats")
}

/// Entry resource collaborator
#[derive(Debug, Clone, Copy, Default)]
pub struct Entries;

impl Entries {
    fn shared_collection_links(&self, links: &LinkBuilder) -> Result<Vec<Link>> {
        let none = RouteValues::new();
        Ok(vec![
            links.create(ResourceKind::Entry, Action::Stats, rel::STATS, Method::GET, &none)?,
            links.create(ResourceKind::Entry, Action::Create, rel::CREATE, Method::POST, &none)?,
            links.create(
                ResourceKind::Entry,
                Action::CreateBatch,
                rel::CREATE_BATCH,
                Method::POST,
                &none,
            )?,
        ])
    }
}

impl ResourceDefinition for Entries {
    type Entity = Entry;
    type Dto = EntryDto;
    type Filters = EntryFilters;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Entry
    }

    fn to_dto(&self, entity: &Entry) -> EntryDto {
        EntryDto::from(entity)
    }

    fn filter_conditions(&self, filters: &EntryFilters) -> Vec<FilterCondition> {
        let mut conditions = Vec::new();
        if let Some(habit_id) = &filters.habit_id {
            conditions.push(FilterCondition::eq("habit_id", habit_id));
        }
        if let Some(from) = filters.from_date {
            conditions.push(FilterCondition::gte("date", from));
        }
        if let Some(to) = filters.to_date {
            conditions.push(FilterCondition::lte("date", to));
        }
        if let Some(source) = filters.source {
            conditions.push(FilterCondition::eq("source", source));
        }
        if let Some(is_archived) = filters.is_archived {
            conditions.push(FilterCondition::eq("is_archived", is_archived));
        }
        conditions
    }

    fn item_links(
        &self,
        links: &LinkBuilder,
        dto: &EntryDto,
        fields: Option<&str>,
    ) -> Result<Vec<Link>> {
        let kind = ResourceKind::Entry;
        let id = RouteValues::new().with("id", &dto.id);
        let archive = if dto.is_archived {
            links.create(kind, Action::UnArchive, rel::UN_ARCHIVE, Method::PUT, &id)?
        } else {
            links.create(kind, Action::Archive, rel::ARCHIVE, Method::PUT, &id)?
        };

        Ok(vec![
            links.create(
                kind,
                Action::Get,
                rel::SELF,
                Method::GET,
                &id.clone().with_opt("fields", fields),
            )?,
            links.create(kind, Action::Update, rel::UPDATE, Method::PUT, &id)?,
            archive,
            links.create(kind, Action::Delete, rel::DELETE, Method::DELETE, &id)?,
        ])
    }

    fn collection_links(
        &self,
        links: &LinkBuilder,
        query: &CollectionQuery,
        filters: &EntryFilters,
        meta: &PaginationMeta,
    ) -> Result<Vec<Link>> {
        let kind = ResourceKind::Entry;
        let filter_values = filters.route_values();
        let page_values = |page: u32| {
            RouteValues::new()
                .with("page", page)
                .with("pageSize", meta.page_size)
                .with_opt("fields", query.fields())
                .with_opt("sort", query.sort())
                .merge(&filter_values)
        };

        let mut result = vec![links.create(
            kind,
            Action::List,
            rel::SELF,
            Method::GET,
            &page_values(meta.page),
        )?];
        result.extend(self.shared_collection_links(links)?);

        if meta.has_next_page {
            result.push(links.create(
                kind,
                Action::List,
                rel::NEXT_PAGE,
                Method::GET,
                &page_values(meta.page + 1),
            )?);
        }
        if meta.has_previous_page {
            result.push(links.create(
                kind,
                Action::List,
                rel::PREVIOUS_PAGE,
                Method::GET,
                &page_values(meta.page - 1),
            )?);
        }

        Ok(result)
    }
}

impl CursorResource for Entries {
    fn cursor_ordering(&self) -> CursorOrdering {
        CursorOrdering::new("date", "id")
    }

    fn cursor_collection_links(
        &self,
        links: &LinkBuilder,
        query: &CursorQuery,
        filters: &EntryFilters,
        next_cursor: Option<&str>,
    ) -> Result<Vec<Link>> {
        let kind = ResourceKind::Entry;
        let filter_values = filters.route_values();
        let cursor_values = |cursor: Option<&str>| {
            RouteValues::new()
                .with_opt("cursor", cursor)
                .with_opt("limit", query.limit)
                .with_opt("fields", query.fields())
                .merge(&filter_values)
        };

        let mut result = vec![links.create(
            kind,
            Action::ListCursor,
            rel::SELF,
            Method::GET,
            &cursor_values(query.cursor()),
        )?];
        result.extend(self.shared_collection_links(links)?);

        if let Some(next) = next_cursor.filter(|c| !c.trim().is_empty()) {
            result.push(links.create(
                kind,
                Action::ListCursor,
                rel::NEXT_PAGE,
                Method::GET,
                &cursor_values(Some(next)),
            )?);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::RouteTable;
    use std::sync::Arc;

    fn link_builder() -> LinkBuilder {
        let routes = routes(RouteTable::builder())
            .build_for(&[ResourceKind::Entry])
            .unwrap();
        LinkBuilder::new(Arc::new(routes), "https://api.example.com").unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_new_entry_ids_are_prefixed() {
        let entry = Entry::new("u_1", "h_1", 3, day(1));
        assert!(entry.id.starts_with("e_"));
        assert_eq!(entry.source, EntrySource::Manual);
    }

    #[test]
    fn test_item_links_follow_archive_state() {
        let links = link_builder();
        let mut dto = EntryDto::from(&Entry::new("u_1", "h_1", 1, day(1)));
        dto.id = "e_1".to_string();

        let active = Entries.item_links(&links, &dto, Some("id,value")).unwrap();
        let rels: Vec<_> = active.iter().map(|l| l.rel.as_str()).collect();
        assert_eq!(rels, vec!["self", "update", "archive", "delete"]);
        assert_eq!(
            active[0].href,
            "https://api.example.com/entries/e_1?fields=id%2Cvalue"
        );
        assert_eq!(active[2].href, "https://api.example.com/entries/e_1/archive");
        assert_eq!(active[2].method, "PUT");

        dto.is_archived = true;
        let archived = Entries.item_links(&links, &dto, None).unwrap();
        assert_eq!(archived[2].rel, "un-archive");
        assert_eq!(
            archived[2].href,
            "https://api.example.com/entries/e_1/un-archive"
        );
    }

    #[test]
    fn test_collection_links_echo_query_and_filters() {
        let links = link_builder();
        let query = CollectionQuery::new().with_sort("date desc");
        let filters = EntryFilters {
            habit_id: Some("h_1".to_string()),
            is_archived: Some(false),
            ..Default::default()
        };
        let meta = PaginationMeta::new(2, 10, 25);

        let result = Entries
            .collection_links(&links, &query, &filters, &meta)
            .unwrap();
        let rels: Vec<_> = result.iter().map(|l| l.rel.as_str()).collect();
        assert_eq!(
            rels,
            vec!["self", "stats", "create", "create-batch", "next-page", "previous-page"]
        );
        assert_eq!(
            result[0].href,
            "https://api.example.com/entries?page=2&pageSize=10&sort=date+desc&habitId=h_1&isArchived=false"
        );
        assert!(result[4].href.contains("page=3"));
        assert!(result[5].href.contains("page=1"));
        assert_eq!(result[3].method, "POST");
    }

    #[test]
    fn test_cursor_links_include_next_only_when_present() {
        let links = link_builder();
        let query = CursorQuery::new().with_limit(2);
        let filters = EntryFilters::default();

        let last = Entries
            .cursor_collection_links(&links, &query, &filters, None)
            .unwrap();
        assert!(last.iter().all(|l| l.rel != "next-page"));
        assert_eq!(last[0].href, "https://api.example.com/entries/cursor?limit=2");

        let more = Entries
            .cursor_collection_links(&links, &query, &filters, Some("abc="))
            .unwrap();
        let next = more.iter().find(|l| l.rel == "next-page").unwrap();
        assert_eq!(
            next.href,
            "https://api.example.com/entries/cursor?cursor=abc%3D&limit=2"
        );
    }

    #[test]
    fn test_filter_conditions() {
        let filters = EntryFilters {
            from_date: Some(day(2)),
            to_date: Some(day(3)),
            source: Some(EntrySource::Automation),
            ..Default::default()
        };
        let conditions = Entries.filter_conditions(&filters);
        assert_eq!(conditions.len(), 3);

        let inside = Entry::new("u", "h", 1, day(2)).with_source(EntrySource::Automation);
        let outside = Entry::new("u", "h", 1, day(4)).with_source(EntrySource::Automation);
        let manual = Entry::new("u", "h", 1, day(3));
        assert!(conditions.iter().all(|c| c.matches(&inside)));
        assert!(!conditions.iter().all(|c| c.matches(&outside)));
        assert!(!conditions.iter().all(|c| c.matches(&manual)));
    }

    #[test]
    fn test_filters_deserialize_camel_case() {
        let filters: EntryFilters = serde_json::from_str(
            r#"{"habitId":"h_1","fromDate":"2024-01-02","source":"fileImport"}"#,
        )
        .unwrap();
        assert_eq!(filters.habit_id.as_deref(), Some("h_1"));
        assert_eq!(filters.from_date, Some(day(2)));
        assert_eq!(filters.source, Some(EntrySource::FileImport));
    }
}
