//! Concrete resources
//!
//! Each resource module contributes its sort mappings, route templates and
//! a [`ResourceDefinition`](crate::pipeline::ResourceDefinition). The
//! functions here assemble them into the startup tables.

pub mod entries;
pub mod habits;

pub use entries::{Entries, Entry, EntryDto, EntryFilters, EntrySource};
pub use habits::{Habit, HabitDto, HabitFilters, HabitStatus, HabitType, Habits};

use crate::config::Config;
use crate::error::Result;
use crate::links::RouteTable;
use crate::pipeline::ResourcePipeline;
use crate::registry::{FieldRegistry, ResourceKind};

/// Field registry covering every resource kind
pub fn default_registry() -> Result<FieldRegistry> {
    FieldRegistry::builder()
        .register(ResourceKind::Entry, entries::mappings())
        .register(ResourceKind::Habit, habits::mappings())
        .build()
}

/// Route table covering every action of every resource kind
pub fn default_routes() -> Result<RouteTable> {
    let builder = entries::routes(RouteTable::builder());
    habits::routes(builder).build()
}

/// A pipeline over the default tables
pub fn default_pipeline(config: &Config) -> Result<ResourcePipeline> {
    ResourcePipeline::new(config, default_registry()?, default_routes()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_build() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.kinds().count(), ResourceKind::ALL.len());
        assert!(registry.find(ResourceKind::Habit, "progress").is_some());
        assert!(default_routes().is_ok());
    }

    #[test]
    fn test_default_pipeline_from_default_config() {
        assert!(default_pipeline(&Config::default()).is_ok());
    }

    #[test]
    fn test_bad_base_url_fails_startup() {
        let mut config = Config::default();
        config.links.base_url = "not a url".to_string();
        assert!(default_pipeline(&config).is_err());
    }
}
