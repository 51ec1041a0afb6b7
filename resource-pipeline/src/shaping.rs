//! Field shaping
//!
//! Projects a materialized DTO down to the fields a caller asked for with
//! `?fields=`. Shaping is closed: every DTO declares its output fields up
//! front through [`Shapeable::FIELDS`] and exposes them through
//! [`Shapeable::field_value`]. Unknown names are rejected before any data is
//! touched, never silently dropped.
//!
//! The `id` field is always part of a non-empty selection, since self links
//! and cursor continuation depend on it. Links are metadata: they are added
//! after shaping and cannot be excluded by a field list.
//!
//! # Example
//!
//! ```rust
//! use resource_pipeline::shaping::{shape, ShapeSpec, Shapeable};
//! use resource_pipeline::value::FieldValue;
//!
//! struct TagDto {
//!     id: String,
//!     name: String,
//!     description: Option<String>,
//! }
//!
//! impl Shapeable for TagDto {
//!     const FIELDS: &'static [&'static str] = &["id", "name", "description"];
//!
//!     fn field_value(&self, field: &str) -> Option<FieldValue> {
//!         match field {
//!             "id" => Some(self.id.as_str().into()),
//!             "name" => Some(self.name.as_str().into()),
//!             "description" => Some(self.description.clone().into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let tag = TagDto { id: "t_1".into(), name: "health".into(), description: None };
//! let spec = ShapeSpec::<TagDto>::parse(Some("Name")).unwrap();
//! let shaped = shape(&tag, &spec);
//!
//! let json = serde_json::to_string(&shaped).unwrap();
//! assert_eq!(json, r#"{"id":"t_1","name":"health"}"#);
//! ```

use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};
use crate::links::Link;
use crate::value::FieldValue;

/// Reserved key links are written under
pub const LINKS_KEY: &str = "links";

const ID_FIELD: &str = "id";

/// A DTO whose fields can be shaped
pub trait Shapeable {
    /// Declared output fields, in declaration order
    const FIELDS: &'static [&'static str];

    /// Read a declared field by its canonical name
    fn field_value(&self, field: &str) -> Option<FieldValue>;
}

/// Validated field selection for a DTO type
pub struct ShapeSpec<T> {
    fields: Vec<&'static str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ShapeSpec<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ShapeSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeSpec")
            .field("fields", &self.fields)
            .finish()
    }
}

impl<T> PartialEq for ShapeSpec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl<T: Shapeable> ShapeSpec<T> {
    /// Selection of every declared field
    pub fn all() -> Self {
        Self {
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Parse a comma-separated field list
    ///
    /// Names match case-insensitively and resolve to the canonical name.
    /// Duplicates collapse to their first occurrence. An absent or blank
    /// list selects every field.
    pub fn parse(fields: Option<&str>) -> Result<Self> {
        let mut selected: Vec<&'static str> = Vec::new();

        for requested in fields
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
        {
            let canonical = T::FIELDS
                .iter()
                .copied()
                .find(|declared| declared.eq_ignore_ascii_case(requested))
                .ok_or_else(|| {
                    Error::validation("fields", format!("unknown field '{}'", requested))
                })?;
            if !selected.contains(&canonical) {
                selected.push(canonical);
            }
        }

        if !selected.is_empty() && !selected.contains(&ID_FIELD) && T::FIELDS.contains(&ID_FIELD)
        {
            selected.insert(0, ID_FIELD);
        }

        Ok(Self {
            fields: selected,
            _marker: PhantomData,
        })
    }

    /// Whether every declared field is selected
    pub fn is_all(&self) -> bool {
        self.fields.is_empty()
    }

    /// Selected canonical field names, in output order
    pub fn fields(&self) -> &[&'static str] {
        if self.fields.is_empty() {
            T::FIELDS
        } else {
            &self.fields
        }
    }
}

/// Whether every name in the field list is declared by `T`
pub fn validate_shape<T: Shapeable>(fields: Option<&str>) -> bool {
    ShapeSpec::<T>::parse(fields).is_ok()
}

/// A shaped resource: ordered fields plus optional links
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapedRepresentation {
    fields: IndexMap<String, FieldValue>,
    links: Option<Vec<Link>>,
}

impl ShapedRepresentation {
    /// Create an empty representation
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Attach links, replacing any already present
    #[must_use]
    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = Some(links);
        self
    }

    /// Read a field value
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Field names, in output order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Attached links, if any
    pub fn links(&self) -> Option<&[Link]> {
        self.links.as_deref()
    }

    /// Number of data fields, not counting links
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no data field is present
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ShapedRepresentation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = self.fields.len() + usize::from(self.links.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        if let Some(links) = &self.links {
            map.serialize_entry(LINKS_KEY, links)?;
        }
        map.end()
    }
}

/// Shape a single item
pub fn shape<T: Shapeable>(item: &T, spec: &ShapeSpec<T>) -> ShapedRepresentation {
    let mut shaped = ShapedRepresentation::new();
    for field in spec.fields() {
        shaped.insert(*field, item.field_value(field).unwrap_or(FieldValue::Null));
    }
    shaped
}

/// Shape every item, attaching links when a selector is supplied
pub fn shape_collection<T, F>(
    items: &[T],
    spec: &ShapeSpec<T>,
    link_selector: Option<F>,
) -> Vec<ShapedRepresentation>
where
    T: Shapeable,
    F: Fn(&T) -> Vec<Link>,
{
    items
        .iter()
        .map(|item| {
            let shaped = shape(item, spec);
            match &link_selector {
                Some(select) => shaped.with_links(select(item)),
                None => shaped,
            }
        })
        .collect()
}

/// Like [`shape_collection`] with a selector that can fail
pub fn try_shape_collection<T, F>(
    items: &[T],
    spec: &ShapeSpec<T>,
    link_selector: Option<F>,
) -> Result<Vec<ShapedRepresentation>>
where
    T: Shapeable,
    F: Fn(&T) -> Result<Vec<Link>>,
{
    items
        .iter()
        .map(|item| {
            let shaped = shape(item, spec);
            match &link_selector {
                Some(select) => Ok(shaped.with_links(select(item)?)),
                None => Ok(shaped),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dto {
        id: &'static str,
        name: &'static str,
        notes: Option<&'static str>,
    }

    impl Shapeable for Dto {
        const FIELDS: &'static [&'static str] = &["id", "name", "notes", "createdAtUtc"];

        fn field_value(&self, field: &str) -> Option<FieldValue> {
            match field {
                "id" => Some(self.id.into()),
                "name" => Some(self.name.into()),
                "notes" => Some(self.notes.into()),
                "createdAtUtc" => Some(FieldValue::Null),
                _ => None,
            }
        }
    }

    fn dto() -> Dto {
        Dto {
            id: "h_1",
            name: "Read",
            notes: None,
        }
    }

    fn link(rel: &str) -> Link {
        Link {
            href: format!("http://localhost/{}", rel),
            rel: rel.to_string(),
            method: "GET".to_string(),
        }
    }

    #[test]
    fn test_empty_selects_all_in_declaration_order() {
        let spec = ShapeSpec::<Dto>::parse(None).unwrap();
        assert!(spec.is_all());
        let shaped = shape(&dto(), &spec);
        let keys: Vec<&str> = shaped.keys().collect();
        assert_eq!(keys, vec!["id", "name", "notes", "createdAtUtc"]);
        assert_eq!(ShapeSpec::<Dto>::parse(Some(" , ")).unwrap(), spec);
    }

    #[test]
    fn test_requested_order_and_exact_keys() {
        let spec = ShapeSpec::<Dto>::parse(Some("id,name")).unwrap();
        let shaped = shape(&dto(), &spec);
        let keys: Vec<&str> = shaped.keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert!(shaped.links().is_none());
    }

    #[test]
    fn test_id_is_prepended() {
        let spec = ShapeSpec::<Dto>::parse(Some("NOTES,name")).unwrap();
        assert_eq!(spec.fields(), &["id", "notes", "name"]);
    }

    #[test]
    fn test_canonical_names_and_dedup() {
        let spec = ShapeSpec::<Dto>::parse(Some("createdatutc,CreatedAtUtc,id")).unwrap();
        assert_eq!(spec.fields(), &["createdAtUtc", "id"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(!validate_shape::<Dto>(Some("name,bogus")));
        let err = ShapeSpec::<Dto>::parse(Some("bogus")).unwrap_err();
        assert!(err.to_string().contains("bogus"));
        assert!(validate_shape::<Dto>(None));
    }

    #[test]
    fn test_links_survive_field_selection() {
        let spec = ShapeSpec::<Dto>::parse(Some("name")).unwrap();
        let shaped = shape_collection(&[dto()], &spec, Some(|_: &Dto| vec![link("self")]));
        assert_eq!(shaped[0].keys().collect::<Vec<_>>(), vec!["id", "name"]);

        // serialized order: selected fields, then links
        let text = serde_json::to_string(&shaped[0]).unwrap();
        let id_at = text.find("\"id\":").unwrap();
        let name_at = text.find("\"name\":").unwrap();
        let links_at = text.find("\"links\":").unwrap();
        assert!(id_at < name_at && name_at < links_at);

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["links"][0]["rel"], "self");
    }

    #[test]
    fn test_no_selector_no_links() {
        let spec = ShapeSpec::<Dto>::all();
        let shaped = shape_collection::<_, fn(&Dto) -> Vec<Link>>(&[dto(), dto()], &spec, None);
        assert_eq!(shaped.len(), 2);
        assert!(shaped.iter().all(|s| s.links().is_none()));
    }

    #[test]
    fn test_try_shape_collection_propagates_errors() {
        let spec = ShapeSpec::<Dto>::all();
        let result = try_shape_collection(
            &[dto()],
            &spec,
            Some(|_: &Dto| -> Result<Vec<Link>> { Err(Error::configuration("no route")) }),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_null_values_are_kept() {
        let spec = ShapeSpec::<Dto>::parse(Some("notes")).unwrap();
        let json = serde_json::to_string(&shape(&dto(), &spec)).unwrap();
        assert_eq!(json, r#"{"id":"h_1","notes":null}"#);
    }
}
