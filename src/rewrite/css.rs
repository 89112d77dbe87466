//! Stylesheet reference scanner
//!
//! `url(...)` and `@import` targets resolve against the stylesheet URL, so
//! `../` climbs from the stylesheet's folder rather than from the page.

use super::{Reference, ReferenceScanner};
use crate::url::resolve_reference;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static URL_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?(?P<resource>[^"')]+?)["']?\s*\)"#).unwrap()
});

static IMPORT_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@import\s+["'](?P<resource>[^"']+)["']"#).unwrap());

/// Scanner for stylesheets
///
/// Finds `url(...)` references (quoted or not) and `@import "..."` rules.
/// Relative references resolve against the stylesheet's own URL.
pub struct CssScanner;

impl ReferenceScanner for CssScanner {
    fn scan(&self, origin: &Url, referencing_url: &str, content: &str) -> Vec<Reference> {
        let mut found: Vec<(usize, &str)> = URL_FUNCTION
            .captures_iter(content)
            .chain(IMPORT_STRING.captures_iter(content))
            .filter_map(|caps| caps.name("resource"))
            .map(|m| (m.start(), m.as_str()))
            .collect();
        found.sort_by_key(|(start, _)| *start);

        found
            .into_iter()
            .filter_map(|(_, raw)| {
                let token = raw.split('#').next().unwrap_or("").trim();
                let target = resolve_reference(origin, referencing_url, token)?;
                Some(Reference {
                    token: token.to_string(),
                    target,
                })
            })
            .collect()
    }
}
