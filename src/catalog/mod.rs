//! Resource type catalog for Static-Mirror
//!
//! The catalog is an ordered rule set mapping file extensions and MIME types
//! onto naming and dependency-lookup policies. Lookups return the first
//! matching rule, so configured rules placed ahead of the built-ins win.

mod defaults;
mod rules;

pub use defaults::default_rules;
pub use rules::{DependencyLookup, NamingPolicy, ResourceTypeRule, DEFAULT_NAME, WILDCARD_MIME};

/// Ordered set of resource type rules
#[derive(Debug, Clone)]
pub struct ResourceTypeCatalog {
    rules: Vec<ResourceTypeRule>,
}

impl Default for ResourceTypeCatalog {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ResourceTypeCatalog {
    /// Creates a catalog from an ordered rule list
    pub fn new(rules: Vec<ResourceTypeRule>) -> Self {
        Self { rules }
    }

    /// Creates a catalog holding only the built-in rules
    pub fn defaults() -> Self {
        Self::new(default_rules())
    }

    /// Returns the rules in match order
    pub fn rules(&self) -> &[ResourceTypeRule] {
        &self.rules
    }

    /// Finds the first rule whose extension matches (case-insensitive)
    ///
    /// An empty extension never matches; resources without an extension are
    /// classified by their response content type instead.
    pub fn match_by_extension(&self, extension: &str) -> Option<&ResourceTypeRule> {
        if extension.is_empty() {
            return None;
        }

        self.rules
            .iter()
            .find(|rule| rule.extension.eq_ignore_ascii_case(extension))
    }

    /// Finds the first concrete rule whose MIME type matches a content-type header
    ///
    /// Parameters such as `; charset=utf-8` are ignored and wildcard rules
    /// never match.
    pub fn match_by_mime_type(&self, content_type: &str) -> Option<&ResourceTypeRule> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if mime.is_empty() {
            return None;
        }

        self.rules
            .iter()
            .filter(|rule| !rule.is_wildcard())
            .find(|rule| rule.mime_type.eq_ignore_ascii_case(&mime))
    }

    /// Returns the file names a generated page document may carry
    ///
    /// Used by the reconciler to recognize leaf documents in the output
    /// tree. Always contains `index.html`.
    pub fn leaf_document_names(&self) -> Vec<String> {
        let mut names = vec![format!("{}.html", DEFAULT_NAME)];

        for rule in &self.rules {
            if rule.extension.is_empty() || rule.use_resource_folder || !rule.use_original_path {
                continue;
            }

            let name = format!("{}{}", rule.default_name(), rule.extension.to_ascii_lowercase());
            if !names.contains(&name) {
                names.push(name);
            }
        }

        names
    }
}
