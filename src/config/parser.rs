use crate::catalog::{default_rules, ResourceTypeCatalog};
use crate::config::types::{Config, DisabledSite, MirrorConfig};
use crate::config::validation::{validate_rule, validate_site, validate_user_agent};
use crate::ConfigResult;
use std::path::Path;

/// Loads and validates a configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(MirrorConfig)` - Configuration with every valid site enabled
/// * `Err(ConfigError)` - The file could not be read or parsed, or a
///   resource type rule or the user agent is invalid
///
/// Invalid sites do not fail loading; they are listed in
/// [`MirrorConfig::disabled`] with the reason.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use static_mirror::config::load_config;
///
/// let config = load_config(Path::new("mirror.toml")).unwrap();
/// println!("Mirroring {} sites", config.sites.len());
/// ```
pub fn load_config(path: &Path) -> ConfigResult<MirrorConfig> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> ConfigResult<MirrorConfig> {
    let config: Config = toml::from_str(content)?;

    validate_user_agent(&config.user_agent)?;
    for rule in &config.resource_types {
        validate_rule(rule)?;
    }

    // Configured rules are matched before the built-ins
    let mut rules = config.resource_types.clone();
    if !config.clear_default_resource_types {
        rules.extend(default_rules());
    }
    let catalog = ResourceTypeCatalog::new(rules);

    let mut sites = Vec::new();
    let mut disabled = Vec::new();

    for site in config.sites {
        if !site.enabled {
            tracing::info!("Site '{}' is disabled in the configuration", site.name);
            disabled.push(DisabledSite {
                name: site.name,
                reason: "disabled in configuration".to_string(),
            });
            continue;
        }

        match validate_site(&site) {
            Ok(()) => sites.push(site),
            Err(e) => {
                tracing::warn!("Site '{}' disabled: {}", site.name, e);
                disabled.push(DisabledSite {
                    name: site.name,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(MirrorConfig {
        user_agent: config.user_agent,
        sites,
        disabled,
        catalog,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlOrder;
    use crate::ConfigError;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn toml_path(path: &Path) -> String {
        path.display().to_string().replace('\\', "/")
    }

    #[test]
    fn test_load_valid_config() {
        let output = TempDir::new().unwrap();
        let config_content = format!(
            r#"
[user-agent]
crawler-name = "TestMirror"
crawler-version = "1.0"
contact-url = "https://example.com/about"

[[site]]
name = "main"
origin-url = "http://localhost:8080/"
output-path = "{}"
resource-folder = "cache"
max-parallelism = 4
crawl-order = "url-breadth-first"
write-temporary-flag = false

[[site.page]]
path = "/"

[[site.page]]
path = "/about/"
simple-address = "/a/"
"#,
            toml_path(output.path())
        );

        let file = create_temp_config(&config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.user_agent.crawler_name, "TestMirror");
        assert_eq!(config.sites.len(), 1);
        assert!(config.disabled.is_empty());

        let site = &config.sites[0];
        assert_eq!(site.max_parallelism, 4);
        assert_eq!(site.crawl_order, CrawlOrder::UrlBreadthFirst);
        assert_eq!(site.write_temporary_flag, Some(false));
        assert_eq!(site.page.len(), 2);
        assert_eq!(site.page[1].simple_address.as_deref(), Some("/a/"));
        assert!(output.path().join("cache").is_dir());
    }

    #[test]
    fn test_invalid_site_is_disabled_not_fatal() {
        let output = TempDir::new().unwrap();
        let config_content = format!(
            r#"
[[site]]
name = "good"
origin-url = "http://localhost:8080"
output-path = "{}"

[[site]]
name = "bad"
origin-url = "http://localhost:8080"
output-path = "{}/does-not-exist"

[[site]]
name = "off"
enabled = false
origin-url = "http://localhost:8080"
output-path = "{}"
"#,
            toml_path(output.path()),
            toml_path(output.path()),
            toml_path(output.path())
        );

        let config = parse_config(&config_content).unwrap();

        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].name, "good");
        assert_eq!(config.disabled.len(), 2);
        assert_eq!(config.disabled[0].name, "bad");
    }

    #[test]
    fn test_configured_rules_take_precedence() {
        let config = parse_config(
            r#"
[[resource-type]]
extension = ".css"
mime-type = "text/css"
use-hash = false
use-original-path = true
"#,
        )
        .unwrap();

        let rule = config.catalog.match_by_extension(".css").unwrap();
        assert!(rule.use_original_path);
        assert!(config.catalog.match_by_extension(".png").is_some());
    }

    #[test]
    fn test_clear_default_resource_types() {
        let config = parse_config(
            r#"
clear-default-resource-types = true

[[resource-type]]
extension = ".avif"
mime-type = "image/avif"
"#,
        )
        .unwrap();

        assert_eq!(config.catalog.rules().len(), 1);
        assert!(config.catalog.match_by_extension(".png").is_none());
    }

    #[test]
    fn test_invalid_rule_fails_loading() {
        let result = parse_config(
            r#"
[[resource-type]]
extension = ".css"
mime-type = "text/css"
use-hash = false
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidRule(_))));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
