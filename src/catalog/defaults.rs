use super::rules::{DependencyLookup, ResourceTypeRule};

/// Returns the built-in resource type rules
///
/// Documents (`.html`, `.xml`, `.json`, `.txt`) keep their path and live at
/// the site root; everything else is hash-named in the resource folder.
pub fn default_rules() -> Vec<ResourceTypeRule> {
    use DependencyLookup::{Css, Html, Svg};

    vec![
        ResourceTypeRule::path_named(".html", "text/html").with_lookup(&[Html, Svg]),
        ResourceTypeRule::path_named(".xml", "application/xml"),
        ResourceTypeRule::path_named(".json", "application/json"),
        ResourceTypeRule::path_named(".txt", "text/plain"),
        ResourceTypeRule::hashed(".axd", "*.axd"),
        ResourceTypeRule::path_named("", "*"),
        ResourceTypeRule::hashed(".css", "text/css").with_lookup(&[Css]),
        ResourceTypeRule::hashed(".js", "text/javascript"),
        ResourceTypeRule::hashed(".js", "application/javascript"),
        ResourceTypeRule::hashed(".js", "application/x-javascript"),
        ResourceTypeRule::hashed(".png", "image/png"),
        ResourceTypeRule::hashed(".jpg", "image/jpg"),
        ResourceTypeRule::hashed(".jpe", "image/jpe"),
        ResourceTypeRule::hashed(".jpeg", "image/jpeg"),
        ResourceTypeRule::hashed(".gif", "image/gif"),
        ResourceTypeRule::hashed(".ico", "image/vnd.microsoft.icon"),
        ResourceTypeRule::hashed(".webp", "image/webp"),
        ResourceTypeRule::hashed(".svg", "image/svg+xml").with_lookup(&[Svg]),
        ResourceTypeRule::hashed(".pdf", "application/pdf"),
        ResourceTypeRule::hashed(".woff", "font/woff"),
        ResourceTypeRule::hashed(".woff2", "font/woff2"),
    ]
}
