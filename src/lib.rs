//! Static-Mirror: a static mirror generator for dynamically rendered sites
//!
//! This crate fetches every page of a site from its content server, resolves
//! the stylesheets, scripts, images and fonts each page references, stores them
//! under content-addressed names and rewrites the markup so the output tree can
//! be served without the original backend.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod output;
pub mod resource;
pub mod rewrite;
pub mod site;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Static-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Route table error: {0}")]
    Routes(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid resource type rule: {0}")]
    InvalidRule(String),

    #[error("Output path not usable: {0}")]
    OutputPath(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Static-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use catalog::{DependencyLookup, ResourceTypeCatalog, ResourceTypeRule};
pub use config::{CrawlOrder, MirrorConfig, SiteConfig};
pub use crawler::{Coordinator, PageOutcome, StopSignal};
pub use resource::{CrawlResourceMap, Mapping};
