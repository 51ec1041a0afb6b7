//! Property-based tests for sorting, pagination, cursors and shaping.
//!
//! Each property runs against the in-memory source and the default
//! resource tables, so ordering and windowing are checked end to end
//! rather than per helper.

use chrono::NaiveDate;
use proptest::prelude::*;

use resource_pipeline::cursor::{paginate_cursor, Cursor, CursorOrdering, CursorWindow};
use resource_pipeline::links::Link;
use resource_pipeline::memory::InMemorySource;
use resource_pipeline::pagination::{paginate_offset, OffsetWindow};
use resource_pipeline::registry::ResourceKind;
use resource_pipeline::resources::{default_registry, entries, Entry, Habit, HabitDto};
use resource_pipeline::shaping::{shape_collection, ShapeSpec};
use resource_pipeline::sorting::{compile_sort, validate_sort, OrderDirection, OrderTerm};
use resource_pipeline::source::SourceQuery;

const ENTRY_FIELDS: &[&str] = &[
    "date",
    "value",
    "notes",
    "source",
    "isArchived",
    "createdAtUtc",
    "updatedAtUtc",
];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Rows with unique ids and the given `(day offset, value)` pairs
fn rows(specs: &[(u8, i32)]) -> Vec<Entry> {
    specs
        .iter()
        .enumerate()
        .map(|(i, (day, value))| {
            let date = base_date() + chrono::Days::new(u64::from(*day));
            let mut entry = Entry::new("u_1", "h_1", *value, date);
            entry.id = format!("e_{:03}", i);
            entry
        })
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn flip_case(s: &str, mask: u32) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask & (1 << (i % 32)) != 0 {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn valid_sort_subsets_are_accepted(
        picks in proptest::sample::subsequence(ENTRY_FIELDS.to_vec(), 0..=5),
        directions in proptest::collection::vec(0u8..3, 5),
        mask in any::<u32>(),
    ) {
        let sort = picks
            .iter()
            .zip(&directions)
            .map(|(field, dir)| {
                let field = flip_case(field, mask);
                match dir {
                    0 => field,
                    1 => format!("{} asc", field),
                    _ => format!("{} DESC", field),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mappings = entries::mappings();
        prop_assert!(validate_sort(Some(&sort), &mappings));
    }

    #[test]
    fn unknown_sort_fields_are_rejected(
        bogus in "zz[a-z]{1,8}",
        picks in proptest::sample::subsequence(ENTRY_FIELDS.to_vec(), 0..=3),
    ) {
        let mut tokens: Vec<String> = picks.iter().map(|f| f.to_string()).collect();
        tokens.push(bogus.to_uppercase());
        let mappings = entries::mappings();
        prop_assert!(!validate_sort(Some(&tokens.join(",")), &mappings));
    }

    #[test]
    fn reversed_ordering_yields_reverse_sequence(
        specs in proptest::collection::vec((0u8..5, 0i32..4), 0..40),
        sort in prop_oneof![
            Just("value"),
            Just("date desc"),
            Just("value desc, date"),
            Just("isArchived, value"),
        ],
    ) {
        let source = InMemorySource::new(rows(&specs));
        let registry = default_registry().unwrap();
        let mappings = registry.resolve(ResourceKind::Entry).unwrap();

        // a unique trailing key makes the order total
        let ordering = compile_sort(Some(sort), mappings)
            .unwrap()
            .then(OrderTerm::new("id", OrderDirection::Ascending));

        let forward: Vec<String> = source
            .evaluate(&SourceQuery::new().ordering(ordering.clone()))
            .into_iter()
            .map(|e| e.id)
            .collect();
        let mut backward: Vec<String> = source
            .evaluate(&SourceQuery::new().ordering(ordering.reversed()))
            .into_iter()
            .map(|e| e.id)
            .collect();
        backward.reverse();

        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn cursor_round_trips(days in 0u32..100_000, id in "[a-z0-9_|]{1,24}") {
        let date = base_date() + chrono::Days::new(u64::from(days));
        let cursor = Cursor::new(date, id);
        prop_assert_eq!(Cursor::decode(&cursor.encode()), Some(cursor));
    }

    #[test]
    fn cursor_walk_is_exhaustive(
        specs in proptest::collection::vec((0u8..6, 0i32..10), 0..40),
        limit in 1u32..8,
    ) {
        let source = InMemorySource::new(rows(&specs));
        let ordering = CursorOrdering::new("date", "id");

        let expected: Vec<String> = source
            .evaluate(&SourceQuery::new().ordering(ordering.ordering()))
            .into_iter()
            .map(|e| e.id)
            .collect();

        let walked = runtime().block_on(async {
            let mut walked = Vec::new();
            let mut token: Option<String> = None;
            loop {
                let window = CursorWindow::new(token.as_deref(), limit).unwrap();
                let page = paginate_cursor(&source, &[], &ordering, &window).await.unwrap();
                assert!(page.items.len() <= limit as usize);
                walked.extend(page.items.into_iter().map(|e| e.id));
                match page.next_cursor {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
            walked
        });

        prop_assert_eq!(walked, expected);
    }

    #[test]
    fn offset_pages_cover_every_row(total in 0usize..60, page_size in 1u32..15) {
        let specs: Vec<(u8, i32)> = (0..total).map(|i| ((i % 5) as u8, i as i32)).collect();
        let source = InMemorySource::new(rows(&specs));
        let registry = default_registry().unwrap();
        let mappings = registry.resolve(ResourceKind::Entry).unwrap();
        let ordering = compile_sort(Some("value"), mappings).unwrap();

        let pages = (total as u64).div_ceil(u64::from(page_size)) as u32;
        let seen = runtime().block_on(async {
            let mut seen = 0u64;
            for page in 1..=pages {
                let window = OffsetWindow::new(page, page_size).unwrap();
                let result = paginate_offset(&source, &[], &ordering, window).await.unwrap();
                let meta = &result.meta;
                assert_eq!(meta.total_count, total as u64);
                assert_eq!(
                    meta.has_next_page,
                    u64::from(page) * u64::from(page_size) < total as u64
                );
                assert_eq!(meta.has_previous_page, page > 1);
                seen += result.items.len() as u64;
            }
            seen
        });

        prop_assert_eq!(seen, total as u64);
    }

    #[test]
    fn shaping_id_name_yields_exactly_two_keys(
        names in proptest::collection::vec("[A-Za-z ]{1,16}", 1..6),
        with_links in any::<bool>(),
    ) {
        let dtos: Vec<HabitDto> = names
            .iter()
            .map(|name| HabitDto::from(&Habit::new("u_1", name.as_str())))
            .collect();
        let spec = ShapeSpec::<HabitDto>::parse(Some("id,name")).unwrap();
        let selector = |dto: &HabitDto| {
            let href = format!("http://localhost/habits/{}", dto.id);
            vec![Link::new(href, "self", &http::Method::GET)]
        };

        let shaped = shape_collection(&dtos, &spec, with_links.then_some(selector));
        for item in &shaped {
            prop_assert_eq!(item.keys().collect::<Vec<_>>(), vec!["id", "name"]);
            prop_assert_eq!(item.links().is_some(), with_links);

            let json = serde_json::to_string(item).unwrap();
            let id_at = json.find("\"id\":").unwrap();
            let name_at = json.find("\"name\":").unwrap();
            prop_assert!(id_at < name_at);
            match json.find("\"links\":") {
                Some(links_at) => prop_assert!(with_links && name_at < links_at),
                None => prop_assert!(!with_links),
            }
        }

        prop_assert!(ShapeSpec::<HabitDto>::parse(Some("bogus")).is_err());
    }
}
