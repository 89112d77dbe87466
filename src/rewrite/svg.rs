//! SVG sprite reference scanner

use super::{Reference, ReferenceScanner};
use crate::url::resolve_reference;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static USE_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<use\b[^>]*?\s(?:xlink:)?href\s*=\s*["'](?P<resource>[^"'#]*)"#).unwrap()
});

/// Scanner for `<use xlink:href>` sprite references
///
/// Runs over SVG documents and over HTML pages with inline SVG.
pub struct SvgScanner;

impl ReferenceScanner for SvgScanner {
    fn scan(&self, origin: &Url, referencing_url: &str, content: &str) -> Vec<Reference> {
        USE_HREF
            .captures_iter(content)
            .filter_map(|caps| {
                let token = caps.name("resource")?.as_str().trim();
                let target = resolve_reference(origin, referencing_url, token)?;
                Some(Reference {
                    token: token.to_string(),
                    target,
                })
            })
            .collect()
    }
}
