use serde::Deserialize;

/// MIME type marking the page-document fallback rule
pub const WILDCARD_MIME: &str = "*";

/// Default file stem for documents and directory-style resource URLs
pub const DEFAULT_NAME: &str = "index";

/// Which text rewriter must process a resource before it is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyLookup {
    /// `<script|link|img|a>` href/src attributes and `<source srcset>` lists
    Html,
    /// `url(...)` and `@import` references
    Css,
    /// `<use xlink:href>` references
    Svg,
}

/// One entry of the resource type catalog
///
/// Rules are matched by file extension first and by MIME type second.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceTypeRule {
    /// File extension including the leading dot (e.g. `.css`), or empty
    pub extension: String,

    /// MIME type, `*` for the page fallback or `*.ext` for sniffed types
    #[serde(rename = "mime-type")]
    pub mime_type: String,

    /// Append the content hash to the output name
    #[serde(rename = "use-hash", default = "default_true")]
    pub use_hash: bool,

    /// Keep the original path in the output name
    #[serde(rename = "use-original-path", default)]
    pub use_original_path: bool,

    /// Place the resource below the site's resource folder
    #[serde(rename = "use-resource-folder", default = "default_true")]
    pub use_resource_folder: bool,

    /// File stem used when the original path is a directory
    #[serde(rename = "default-name", default)]
    pub default_name: Option<String>,

    /// Rewriters to run over the content before naming it
    #[serde(rename = "dependency-lookup", default)]
    pub dependency_lookup: Vec<DependencyLookup>,
}

fn default_true() -> bool {
    true
}

/// Naming flags applied when computing an output URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    pub use_hash: bool,
    pub use_original_path: bool,
    pub use_resource_folder: bool,
    pub default_name: String,
}

impl NamingPolicy {
    /// Returns the policy with content hashing forced on
    ///
    /// Used for resources whose URL says nothing about their content
    /// (server-generated `.axd` handlers): without the hash, two different
    /// responses would overwrite the same file.
    pub fn hashed(mut self) -> Self {
        self.use_hash = true;
        self
    }
}

impl ResourceTypeRule {
    /// Creates a hash-named rule stored in the resource folder
    pub fn hashed(extension: &str, mime_type: &str) -> Self {
        Self {
            extension: extension.to_string(),
            mime_type: mime_type.to_string(),
            use_hash: true,
            use_original_path: false,
            use_resource_folder: true,
            default_name: None,
            dependency_lookup: Vec::new(),
        }
    }

    /// Creates a path-named rule stored relative to the site root
    pub fn path_named(extension: &str, mime_type: &str) -> Self {
        Self {
            extension: extension.to_string(),
            mime_type: mime_type.to_string(),
            use_hash: false,
            use_original_path: true,
            use_resource_folder: false,
            default_name: None,
            dependency_lookup: Vec::new(),
        }
    }

    /// Adds dependency lookups to the rule
    pub fn with_lookup(mut self, lookups: &[DependencyLookup]) -> Self {
        self.dependency_lookup = lookups.to_vec();
        self
    }

    /// Returns true if the concrete rule must be resolved from the response content type
    pub fn is_wildcard(&self) -> bool {
        self.mime_type.starts_with('*')
    }

    /// Returns true if this rule describes a page document rather than a resource
    ///
    /// Documents are produced by the page writer; a reference to one is a
    /// hyperlink and is never followed by the resolution engine.
    pub fn is_document(&self) -> bool {
        self.mime_type == WILDCARD_MIME || self.dependency_lookup.contains(&DependencyLookup::Html)
    }

    /// Returns the file stem for directory-style URLs
    pub fn default_name(&self) -> &str {
        self.default_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_NAME)
    }

    /// Returns the naming flags of this rule
    pub fn naming(&self) -> NamingPolicy {
        NamingPolicy {
            use_hash: self.use_hash,
            use_original_path: self.use_original_path,
            use_resource_folder: self.use_resource_folder,
            default_name: self.default_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_rule_defaults() {
        let rule: ResourceTypeRule = toml::from_str(
            r#"
extension = ".avif"
mime-type = "image/avif"
"#,
        )
        .unwrap();

        assert!(rule.use_hash);
        assert!(!rule.use_original_path);
        assert!(rule.use_resource_folder);
        assert!(rule.dependency_lookup.is_empty());
        assert_eq!(rule.default_name(), "index");
    }

    #[test]
    fn test_deserialize_dependency_lookup() {
        let rule: ResourceTypeRule = toml::from_str(
            r#"
extension = ".htm"
mime-type = "text/html"
use-hash = false
use-original-path = true
dependency-lookup = ["html", "svg"]
"#,
        )
        .unwrap();

        assert_eq!(
            rule.dependency_lookup,
            vec![DependencyLookup::Html, DependencyLookup::Svg]
        );
        assert!(rule.is_document());
    }

    #[test]
    fn test_wildcards() {
        assert!(ResourceTypeRule::hashed(".axd", "*.axd").is_wildcard());
        assert!(ResourceTypeRule::path_named("", "*").is_document());
        assert!(!ResourceTypeRule::hashed(".css", "text/css").is_wildcard());
    }

    #[test]
    fn test_hashed_policy_forces_hash() {
        let policy = ResourceTypeRule::path_named(".json", "application/json")
            .naming()
            .hashed();
        assert!(policy.use_hash);
        assert!(policy.use_original_path);
    }
}
