//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: PIPELINE_, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/resource-pipeline/{service_name}/config.toml
//! 4. System directory: /etc/resource-pipeline/{service_name}/config.toml
//! 5. Default values
//!
//! For example `PIPELINE_PAGINATION__MAX_PAGE_SIZE=50` overrides
//! `pagination.max_page_size`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cursor::{DEFAULT_CURSOR_LIMIT, DEFAULT_MAX_CURSOR_LIMIT};
use crate::error::Result;
use crate::pagination::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE};
use crate::sorting::DEFAULT_MAX_SORT_FIELDS;

const CONFIG_PREFIX: &str = "resource-pipeline";
const ENV_PREFIX: &str = "PIPELINE_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Page window defaults and bounds
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Sort expression limits
    #[serde(default)]
    pub sorting: SortingConfig,

    /// Media types and API versions
    #[serde(default)]
    pub negotiation: NegotiationConfig,

    /// Hypermedia link generation
    #[serde(default)]
    pub links: LinksConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

/// Pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Page size when the request names none
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Largest accepted page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Cursor page size when the request names none
    #[serde(default = "default_cursor_limit")]
    pub default_cursor_limit: u32,

    /// Largest accepted cursor page size
    #[serde(default = "default_max_cursor_limit")]
    pub max_cursor_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            default_cursor_limit: default_cursor_limit(),
            max_cursor_limit: default_max_cursor_limit(),
        }
    }
}

/// Sorting configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortingConfig {
    /// Most sort tokens accepted in one request
    #[serde(default = "default_max_sort_fields")]
    pub max_sort_fields: usize,
}

impl Default for SortingConfig {
    fn default() -> Self {
        Self {
            max_sort_fields: default_max_sort_fields(),
        }
    }
}

/// Content negotiation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// Vendor segment of the hypermedia media types
    #[serde(default = "default_vendor")]
    pub vendor: String,

    /// API versions served, by number
    #[serde(default = "default_supported_versions")]
    pub supported_versions: Vec<u8>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            vendor: default_vendor(),
            supported_versions: default_supported_versions(),
        }
    }
}

/// Link generation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinksConfig {
    /// Absolute URL links are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_service_name() -> String {
    CONFIG_PREFIX.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_cursor_limit() -> u32 {
    DEFAULT_CURSOR_LIMIT
}

fn default_max_cursor_limit() -> u32 {
    DEFAULT_MAX_CURSOR_LIMIT
}

fn default_max_sort_fields() -> usize {
    DEFAULT_MAX_SORT_FIELDS
}

fn default_vendor() -> String {
    "dev-habit".to_string()
}

fn default_supported_versions() -> Vec<u8> {
    vec![1, 2]
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found is used):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/resource-pipeline/{service_name}/config.toml
    /// 3. System directory: /etc/resource-pipeline/{service_name}/config.toml
    ///
    /// Environment variables (PIPELINE_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        // Try to infer service name from binary name or use default
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Merge config files in reverse order (lowest priority first)
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths for a service
    ///
    /// Returns paths in priority order (highest first)
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }
}
