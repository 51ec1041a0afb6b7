//! Habits
//!
//! Habits are user-owned and offset-paginated. Their sort mappings show
//! the registry's two less common shapes: `progress` expands to two source
//! expressions, and `lastCompleted` sorts against its stored column so
//! that `lastCompleted asc` lists the most recently completed habit first.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::ResourceId;
use crate::links::{rel, Action, Link, LinkBuilder, RouteTableBuilder, RouteValues};
use crate::pagination::PaginationMeta;
use crate::pipeline::ResourceDefinition;
use crate::query::CollectionQuery;
use crate::registry::{FieldMapping, ResourceKind};
use crate::shaping::Shapeable;
use crate::source::{FilterCondition, SourceRow};
use crate::value::FieldValue;

/// Source expression combining name and description for `q` searches
const SEARCH_TEXT: &str = "search_text";

/// Habit kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitType {
    /// Not set
    #[default]
    None,
    /// Done or not done
    Binary,
    /// Counted against a target
    Measurable,
}

/// Habit lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitStatus {
    /// Not set
    #[default]
    None,
    /// Being tracked
    Ongoing,
    /// Finished
    Completed,
}

/// Period a frequency is counted over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyType {
    /// Not set
    #[default]
    None,
    /// Per day
    Daily,
    /// Per week
    Weekly,
    /// Per month
    Monthly,
}

macro_rules! wire_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Wire name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::String(value.as_str().to_string())
            }
        }
    };
}

wire_enum!(HabitType { None => "none", Binary => "binary", Measurable => "measurable" });
wire_enum!(HabitStatus { None => "none", Ongoing => "ongoing", Completed => "completed" });
wire_enum!(FrequencyType {
    None => "none",
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

/// A stored habit, flattened the way a table row would be
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    /// Prefixed habit id
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Habit kind
    pub habit_type: HabitType,
    /// Period the frequency is counted over
    pub frequency_type: FrequencyType,
    /// Completions expected per period
    pub frequency_times_per_period: i32,
    /// Target amount
    pub target_value: i32,
    /// Unit of the target amount
    pub target_unit: String,
    /// Lifecycle status
    pub status: HabitStatus,
    /// Hidden from active views
    pub is_archived: bool,
    /// Day tracking stops, if any
    pub end_date: Option<NaiveDate>,
    /// Milestone goal, if any
    pub milestone_target: Option<i32>,
    /// Progress towards the milestone
    pub milestone_current: Option<i32>,
    /// Creation time
    pub created_at_utc: DateTime<Utc>,
    /// Last update time
    pub updated_at_utc: Option<DateTime<Utc>>,
    /// Most recent completion
    pub last_completed_at_utc: Option<DateTime<Utc>>,
}

impl Habit {
    /// A new ongoing daily binary habit with a fresh `h_` id
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(ResourceKind::Habit).into_string(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            habit_type: HabitType::Binary,
            frequency_type: FrequencyType::Daily,
            frequency_times_per_period: 1,
            target_value: 1,
            target_unit: "times".to_string(),
            status: HabitStatus::Ongoing,
            is_archived: false,
            end_date: None,
            milestone_target: None,
            milestone_current: None,
            created_at_utc: Utc::now(),
            updated_at_utc: None,
            last_completed_at_utc: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the kind
    #[must_use]
    pub fn with_type(mut self, habit_type: HabitType) -> Self {
        self.habit_type = habit_type;
        self
    }

    /// Set the status
    #[must_use]
    pub fn with_status(mut self, status: HabitStatus) -> Self {
        self.status = status;
        self
    }

    /// Set milestone progress
    #[must_use]
    pub fn with_milestone(mut self, current: i32, target: i32) -> Self {
        self.milestone_current = Some(current);
        self.milestone_target = Some(target);
        self
    }

    /// Set the last completion time
    #[must_use]
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_completed_at_utc = Some(at);
        self
    }

    fn search_text(&self) -> String {
        match &self.description {
            Some(description) => format!("{}\n{}", self.name, description),
            None => self.name.clone(),
        }
    }
}

impl SourceRow for Habit {
    fn source_value(&self, expression: &str) -> Option<FieldValue> {
        match expression {
            "id" => Some(self.id.as_str().into()),
            "user_id" => Some(self.user_id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "description" => Some(self.description.as_deref().into()),
            "habit_type" => Some(self.habit_type.into()),
            "frequency_type" => Some(self.frequency_type.into()),
            "frequency_times_per_period" => Some(self.frequency_times_per_period.into()),
            "target_value" => Some(self.target_value.into()),
            "target_unit" => Some(self.target_unit.as_str().into()),
            "status" => Some(self.status.into()),
            "is_archived" => Some(self.is_archived.into()),
            "end_date" => Some(self.end_date.into()),
            "milestone_target" => Some(self.milestone_target.into()),
            "milestone_current" => Some(self.milestone_current.into()),
            "created_at_utc" => Some(self.created_at_utc.into()),
            "updated_at_utc" => Some(self.updated_at_utc.into()),
            "last_completed_at_utc" => Some(self.last_completed_at_utc.into()),
            SEARCH_TEXT => Some(self.search_text().into()),
            _ => None,
        }
    }
}

/// How often a habit is done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyDto {
    /// Period
    #[serde(rename = "type")]
    pub frequency_type: FrequencyType,
    /// Completions expected per period
    pub times_per_period: i32,
}

/// Amount a habit aims for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDto {
    /// Target amount
    pub value: i32,
    /// Unit of the amount
    pub unit: String,
}

/// Progress towards a milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDto {
    /// Milestone goal
    pub target: i32,
    /// Progress so far
    pub current: i32,
}

/// Habit output representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDto {
    /// Prefixed habit id
    pub id: String,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Habit kind
    #[serde(rename = "type")]
    pub habit_type: HabitType,
    /// How often the habit is done
    pub frequency: FrequencyDto,
    /// Amount aimed for
    pub target: TargetDto,
    /// Lifecycle status
    pub status: HabitStatus,
    /// Hidden from active views
    pub is_archived: bool,
    /// Day tracking stops, if any
    pub end_date: Option<NaiveDate>,
    /// Milestone progress, when a milestone is set
    pub milestone: Option<MilestoneDto>,
    /// Creation time
    pub created_at_utc: DateTime<Utc>,
    /// Last update time
    pub updated_at_utc: Option<DateTime<Utc>>,
    /// Most recent completion
    pub last_completed_at_utc: Option<DateTime<Utc>>,
}

impl From<&Habit> for HabitDto {
    fn from(habit: &Habit) -> Self {
        Self {
            id: habit.id.clone(),
            name: habit.name.clone(),
            description: habit.description.clone(),
            habit_type: habit.habit_type,
            frequency: FrequencyDto {
                frequency_type: habit.frequency_type,
                times_per_period: habit.frequency_times_per_period,
            },
            target: TargetDto {
                value: habit.target_value,
                unit: habit.target_unit.clone(),
            },
            status: habit.status,
            is_archived: habit.is_archived,
            end_date: habit.end_date,
            milestone: habit
                .milestone_target
                .zip(habit.milestone_current)
                .map(|(target, current)| MilestoneDto { target, current }),
            created_at_utc: habit.created_at_utc,
            updated_at_utc: habit.updated_at_utc,
            last_completed_at_utc: habit.last_completed_at_utc,
        }
    }
}

impl Shapeable for HabitDto {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "type",
        "frequency",
        "target",
        "status",
        "isArchived",
        "endDate",
        "milestone",
        "createdAtUtc",
        "updatedAtUtc",
        "lastCompletedAtUtc",
    ];

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "description" => Some(self.description.as_deref().into()),
            "type" => Some(self.habit_type.into()),
            "frequency" => Some(FieldValue::object([
                ("type", FieldValue::from(self.frequency.frequency_type)),
                ("timesPerPeriod", FieldValue::from(self.frequency.times_per_period)),
            ])),
            "target" => Some(FieldValue::object([
                ("value", FieldValue::from(self.target.value)),
                ("unit", FieldValue::from(self.target.unit.as_str())),
            ])),
            "status" => Some(self.status.into()),
            "isArchived" => Some(self.is_archived.into()),
            "endDate" => Some(self.end_date.into()),
            "milestone" => Some(match &self.milestone {
                Some(m) => FieldValue::object([
                    ("target", FieldValue::from(m.target)),
                    ("current", FieldValue::from(m.current)),
                ]),
                None => FieldValue::Null,
            }),
            "createdAtUtc" => Some(self.created_at_utc.into()),
            "updatedAtUtc" => Some(self.updated_at_utc.into()),
            "lastCompletedAtUtc" => Some(self.last_completed_at_utc.into()),
            _ => None,
        }
    }
}

/// Habit list filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitFilters {
    /// Case-insensitive search over name and description
    #[serde(default)]
    pub q: Option<String>,
    /// Only habits of this kind
    #[serde(default, rename = "type")]
    pub habit_type: Option<HabitType>,
    /// Only habits in this status
    #[serde(default)]
    pub status: Option<HabitStatus>,
}

impl HabitFilters {
    /// Trimmed search text, if any
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Sortable habit fields
pub fn mappings() -> Vec<FieldMapping> {
    vec![
        FieldMapping::new("name", "name"),
        FieldMapping::new("description", "description"),
        FieldMapping::new("type", "habit_type"),
        FieldMapping::new("status", "status"),
        FieldMapping::new("frequency", "frequency_type").then("frequency_times_per_period"),
        FieldMapping::new("target", "target_value").then("target_unit"),
        FieldMapping::new("progress", "milestone_current").then("milestone_target"),
        FieldMapping::new("endDate", "end_date"),
        FieldMapping::new("createdAtUtc", "created_at_utc"),
        FieldMapping::new("updatedAtUtc", "updated_at_utc"),
        FieldMapping::new("lastCompleted", "last_completed_at_utc").reversed(),
    ]
}

/// Register habit routes
pub fn routes(builder: RouteTableBuilder) -> RouteTableBuilder {
    let kind = ResourceKind::Habit;
    builder
        .route(kind, Action::List, "/habits")
        .route(kind, Action::Get, "/habits/{id}")
        .route(kind, Action::Create, "/habits")
        .route(kind, Action::Update, "/habits/{id}")
        .route(kind, Action::PartialUpdate, "/habits/{id}")
        .route(kind, Action::Delete, "/habits/{id}")
        .route(kind, Action::UpsertTags, "/habits/{habitId}/tags")
}

/// Habit resource collaborator
#[derive(Debug, Clone, Copy, Default)]
pub struct Habits;

impl ResourceDefinition for Habits {
    type Entity = Habit;
    type Dto = HabitDto;
    type Filters = HabitFilters;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Habit
    }

    fn to_dto(&self, entity: &Habit) -> HabitDto {
        HabitDto::from(entity)
    }

    fn filter_conditions(&self, filters: &HabitFilters) -> Vec<FilterCondition> {
        let mut conditions = Vec::new();
        if let Some(q) = filters.search() {
            conditions.push(FilterCondition::contains(SEARCH_TEXT, q));
        }
        if let Some(habit_type) = filters.habit_type {
            conditions.push(FilterCondition::eq("habit_type", habit_type));
        }
        if let Some(status) = filters.status {
            conditions.push(FilterCondition::eq("status", status));
        }
        conditions
    }

    fn item_links(
        &self,
        links: &LinkBuilder,
        dto: &HabitDto,
        fields: Option<&str>,
    ) -> Result<Vec<Link>> {
        let kind = ResourceKind::Habit;
        let id = RouteValues::new().with("id", &dto.id);

        Ok(vec![
            links.create(
                kind,
                Action::Get,
                rel::SELF,
                Method::GET,
                &id.clone().with_opt("fields", fields),
            )?,
            links.create(kind, Action::Update, rel::UPDATE, Method::PUT, &id)?,
            links.create(
                kind,
                Action::PartialUpdate,
                rel::PARTIAL_UPDATE,
                Method::PATCH,
                &id,
            )?,
            links.create(kind, Action::Delete, rel::DELETE, Method::DELETE, &id)?,
            links.create(
                kind,
                Action::UpsertTags,
                rel::UPSERT_TAGS,
                Method::PUT,
                &RouteValues::new().with("habitId", &dto.id),
            )?,
        ])
    }

    fn collection_links(
        &self,
        links: &LinkBuilder,
        query: &CollectionQuery,
        filters: &HabitFilters,
        meta: &PaginationMeta,
    ) -> Result<Vec<Link>> {
        let kind = ResourceKind::Habit;
        let page_values = |page: u32| {
            RouteValues::new()
                .with("page", page)
                .with("pageSize", meta.page_size)
                .with_opt("fields", query.fields())
                .with_opt("q", filters.search())
                .with_opt("sort", query.sort())
                .with_opt("type", filters.habit_type)
                .with_opt("status", filters.status)
        };

        let mut result = vec![
            links.create(kind, Action::List, rel::SELF, Method::GET, &page_values(meta.page))?,
            links.create(kind, Action::Create, rel::CREATE, Method::POST, &RouteValues::new())?,
        ];
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::RouteTable;
    use crate::shaping::{shape, ShapeSpec};
    use std::sync::Arc;

    fn link_builder() -> LinkBuilder {
        let routes = routes(RouteTable::builder())
            .build_for(&[ResourceKind::Habit])
            .unwrap();
        LinkBuilder::new(Arc::new(routes), "https://api.example.com").unwrap()
    }

    #[test]
    fn test_dto_nests_frequency_target_and_milestone() {
        let habit = Habit::new("u_1", "Read").with_milestone(3, 10);
        let dto = HabitDto::from(&habit);
        let spec = ShapeSpec::<HabitDto>::parse(Some("frequency,target,milestone")).unwrap();
        let json = serde_json::to_value(shape(&dto, &spec)).unwrap();

        assert_eq!(json["frequency"]["type"], "daily");
        assert_eq!(json["frequency"]["timesPerPeriod"], 1);
        assert_eq!(json["target"]["unit"], "times");
        assert_eq!(json["milestone"]["current"], 3);
    }

    #[test]
    fn test_missing_milestone_is_null() {
        let dto = HabitDto::from(&Habit::new("u_1", "Run"));
        assert_eq!(dto.field_value("milestone"), Some(FieldValue::Null));
    }

    #[test]
    fn test_search_matches_name_or_description() {
        let filters = HabitFilters {
            q: Some("  BOOK ".to_string()),
            ..Default::default()
        };
        let conditions = Habits.filter_conditions(&filters);
        assert_eq!(conditions.len(), 1);

        let by_name = Habit::new("u", "Bookkeeping");
        let by_description = Habit::new("u", "Read").with_description("one book a month");
        let neither = Habit::new("u", "Run").with_description("5k");
        assert!(conditions[0].matches(&by_name));
        assert!(conditions[0].matches(&by_description));
        assert!(!conditions[0].matches(&neither));
    }

    #[test]
    fn test_item_links() {
        let links = link_builder();
        let mut dto = HabitDto::from(&Habit::new("u_1", "Read"));
        dto.id = "h_1".to_string();

        let result = Habits.item_links(&links, &dto, None).unwrap();
        let rels: Vec<_> = result.iter().map(|l| l.rel.as_str()).collect();
        assert_eq!(
            rels,
            vec!["self", "update", "partial-update", "delete", "upsert-tags"]
        );
        assert_eq!(result[2].method, "PATCH");
        assert_eq!(result[4].href, "https://api.example.com/habits/h_1/tags");
    }

    #[test]
    fn test_collection_links_first_page() {
        let links = link_builder();
        let filters = HabitFilters {
            q: Some("read".to_string()),
            status: Some(HabitStatus::Ongoing),
            ..Default::default()
        };
        let meta = PaginationMeta::new(1, 10, 11);
        let result = Habits
            .collection_links(&links, &CollectionQuery::new(), &filters, &meta)
            .unwrap();

        let rels: Vec<_> = result.iter().map(|l| l.rel.as_str()).collect();
        assert_eq!(rels, vec!["self", "create", "next-page"]);
        assert_eq!(
            result[0].href,
            "https://api.example.com/habits?page=1&pageSize=10&q=read&status=ongoing"
        );
    }

    #[test]
    fn test_filters_deserialize() {
        let filters: HabitFilters =
            serde_json::from_str(r#"{"q":"run","type":"measurable"}"#).unwrap();
        assert_eq!(filters.habit_type, Some(HabitType::Measurable));
        assert_eq!(filters.search(), Some("run"));
    }
}
