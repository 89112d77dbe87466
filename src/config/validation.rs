use crate::catalog::ResourceTypeRule;
use crate::config::types::{SiteConfig, UserAgentConfig};
use crate::url::parse_origin;
use crate::{ConfigError, ConfigResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

/// File used to probe write, modify and delete access
const ACCESS_PROBE_FILE: &str = ".static-mirror-access-test";

/// Validates a resource type rule
pub fn validate_rule(rule: &ResourceTypeRule) -> ConfigResult<()> {
    if !rule.use_hash && !rule.use_original_path {
        return Err(ConfigError::InvalidRule(format!(
            "Rule for '{}' ({}) must set use-hash or use-original-path",
            rule.extension, rule.mime_type
        )));
    }

    if !rule.extension.is_empty() && !rule.extension.starts_with('.') {
        return Err(ConfigError::InvalidRule(format!(
            "Extension '{}' must start with '.'",
            rule.extension
        )));
    }

    if rule.mime_type.trim().is_empty() {
        return Err(ConfigError::InvalidRule(format!(
            "Rule for '{}' has an empty mime-type",
            rule.extension
        )));
    }

    Ok(())
}

/// Validates user agent configuration
pub fn validate_user_agent(config: &UserAgentConfig) -> ConfigResult<()> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

/// Validates a site and prepares its resource folder
///
/// # Checks
///
/// 1. The origin URL is an absolute HTTP(S) URL
/// 2. `max-parallelism` is at least 1
/// 3. The output path is an existing directory that is not the process's
///    working or executable directory, and passes an access probe
/// 4. The resource folder is non-empty, lies strictly below the output
///    path, is created if missing and passes an access probe
///
/// An error disables the site; it never stops other sites from loading.
pub fn validate_site(site: &SiteConfig) -> ConfigResult<()> {
    if site.name.trim().is_empty() {
        return Err(ConfigError::Validation("site name cannot be empty".to_string()));
    }

    parse_origin(&site.origin_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", site.origin_url, e)))?;

    if site.max_parallelism < 1 {
        return Err(ConfigError::Validation(format!(
            "max-parallelism must be >= 1, got {}",
            site.max_parallelism
        )));
    }

    if !site.output_path.is_dir() {
        return Err(ConfigError::OutputPath(format!(
            "{} does not exist or is not a directory",
            site.output_path.display()
        )));
    }

    let output = canonical(&site.output_path);
    if application_directories().iter().any(|dir| *dir == output) {
        return Err(ConfigError::OutputPath(format!(
            "{} is the application directory",
            site.output_path.display()
        )));
    }

    probe_access(&site.output_path)?;

    let folder = site.resource_folder.replace('\\', "/");
    if folder.trim_matches('/').is_empty() {
        return Err(ConfigError::Validation(
            "resource-folder cannot be empty".to_string(),
        ));
    }

    if folder.split('/').any(|segment| segment == "..") {
        return Err(ConfigError::Validation(format!(
            "resource-folder '{}' must stay below the output path",
            site.resource_folder
        )));
    }

    let resource_path = site.resource_path();
    std::fs::create_dir_all(&resource_path).map_err(|e| {
        ConfigError::OutputPath(format!("{}: {}", resource_path.display(), e))
    })?;

    if canonical(&resource_path) == output {
        return Err(ConfigError::Validation(
            "resource-folder must differ from output-path".to_string(),
        ));
    }

    probe_access(&resource_path)?;

    Ok(())
}

/// Writes, modifies and deletes a probe file in `directory`
fn probe_access(directory: &Path) -> ConfigResult<()> {
    let probe = directory.join(ACCESS_PROBE_FILE);
    let fail = |e: std::io::Error| {
        ConfigError::OutputPath(format!(
            "{} failed the access check: {}",
            directory.display(),
            e
        ))
    };

    std::fs::write(&probe, b"static-mirror").map_err(fail)?;
    std::fs::OpenOptions::new()
        .append(true)
        .open(&probe)
        .and_then(|mut file| file.write_all(b" access test"))
        .map_err(fail)?;
    std::fs::remove_file(&probe).map_err(fail)?;

    Ok(())
}

fn application_directories() -> Vec<PathBuf> {
    let mut directories = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        directories.push(canonical(&cwd));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        directories.push(canonical(&exe_dir));
    }
    directories
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
