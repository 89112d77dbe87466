//! Configuration module for Static-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use static_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! for site in &config.sites {
//!     println!("{} -> {}", site.origin_url, site.output_path.display());
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlOrder, DisabledSite, MirrorConfig, PageConfig, SiteConfig, UserAgentConfig,
};

// Re-export parser and validation functions
pub use parser::{load_config, parse_config};
pub use validation::{validate_rule, validate_site, validate_user_agent};
