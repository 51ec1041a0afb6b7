//! Habits API Example - In-Memory Data
//!
//! This example demonstrates:
//! - Offset and cursor pagination over user-owned entries
//! - `?sort=` and `?fields=` validation before data access
//! - Hypermedia links when the client asks for the hateoas media type
//! - ETags on single resources with `If-None-Match` support
//!
//! Run with: cargo run --example habits-api
//!
//! Test with:
//!   curl -H 'x-user-id: u_demo' 'http://localhost:8080/entries?sort=date%20desc&pageSize=5'
//!   curl -H 'x-user-id: u_demo' -H 'accept: application/vnd.dev-habit.hateoas+json' \
//!        'http://localhost:8080/entries/cursor?limit=3&fields=id,date'
//!   curl -H 'x-user-id: u_demo' 'http://localhost:8080/habits?q=read'

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{Days, NaiveDate};
use serde::Deserialize;

use resource_pipeline::prelude::*;
use resource_pipeline::resources::{
    default_pipeline, Entries, Entry, EntryFilters, EntrySource, Habit, HabitFilters, Habits,
};

const DEMO_USER: &str = "u_demo";

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ResourcePipeline>,
    entries: InMemorySource<Entry>,
    habits: InMemorySource<Habit>,
}

#[derive(Debug, Deserialize)]
struct FieldsQuery {
    fields: Option<String>,
}

// Identity comes from a header; a real service would read verified claims
fn caller(headers: &HeaderMap) -> StaticIdentity {
    match headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
        Some(id) if !id.trim().is_empty() => StaticIdentity::user(id.trim()),
        _ => StaticIdentity::anonymous(),
    }
}

fn negotiate(state: &AppState, headers: &HeaderMap) -> Negotiated {
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    let version = headers
        .get("x-api-version")
        .and_then(|v| v.to_str().ok())
        .and_then(ApiVersion::parse);
    state.pipeline.negotiate(accept, version)
}

async fn list_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CollectionQuery>,
    Query(filters): Query<EntryFilters>,
) -> Result<Response> {
    let negotiated = negotiate(&state, &headers);
    let page = state
        .pipeline
        .list_offset(&Entries, &state.entries, &caller(&headers), &filters, &query, &negotiated)
        .await?;
    Ok(state.pipeline.respond(page, &negotiated, None)?.into_response())
}

async fn list_entries_cursor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CursorQuery>,
    Query(filters): Query<EntryFilters>,
) -> Result<Response> {
    let negotiated = negotiate(&state, &headers);
    let page = state
        .pipeline
        .list_cursor(&Entries, &state.entries, &caller(&headers), &filters, &query, &negotiated)
        .await?;
    Ok(state.pipeline.respond(page, &negotiated, None)?.into_response())
}

async fn get_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> Result<Response> {
    let path = format!("/entries/{}", id);
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if state.pipeline.check_etag_read(&path, if_none_match) == ReadCheck::NotModified {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let negotiated = negotiate(&state, &headers);
    let entry = state
        .pipeline
        .get_one(
            &Entries,
            &state.entries,
            &caller(&headers),
            &id,
            query.fields.as_deref(),
            &negotiated,
        )
        .await?;
    Ok(state
        .pipeline
        .respond(entry, &negotiated, Some(&path))?
        .into_response())
}

async fn list_habits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CollectionQuery>,
    Query(filters): Query<HabitFilters>,
) -> Result<Response> {
    let negotiated = negotiate(&state, &headers);
    let page = state
        .pipeline
        .list_offset(&Habits, &state.habits, &caller(&headers), &filters, &query, &negotiated)
        .await?;
    Ok(state.pipeline.respond(page, &negotiated, None)?.into_response())
}

fn seed() -> (Vec<Habit>, Vec<Entry>) {
    let habits = vec![
        Habit::new(DEMO_USER, "Read").with_description("Twenty pages of a book"),
        Habit::new(DEMO_USER, "Run").with_milestone(12, 50),
        Habit::new(DEMO_USER, "Meditate"),
    ];

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let entries = (0..30u64)
        .map(|i| {
            let habit = &habits[(i % 3) as usize];
            let date = start.checked_add_days(Days::new(i)).unwrap_or(start);
            let entry = Entry::new(DEMO_USER, habit.id.clone(), (i % 5 + 1) as i32, date);
            if i % 7 == 0 {
                entry.with_source(EntrySource::Automation)
            } else {
                entry
            }
        })
        .collect();

    (habits, entries)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config)?;

    let (habits, entries) = seed();
    let state = AppState {
        pipeline: Arc::new(default_pipeline(&config)?),
        entries: InMemorySource::new(entries),
        habits: InMemorySource::new(habits),
    };

    let app = Router::new()
        .route("/entries", get(list_entries))
        .route("/entries/cursor", get(list_entries_cursor))
        .route("/entries/{id}", get(get_entry))
        .route("/habits", get(list_habits))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
