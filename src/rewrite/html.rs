//! HTML reference scanner
//!
//! Finds the resources a page embeds:
//! - `<script src>`, `<link href>`, `<img src>` and `<a href>`
//! - every candidate of `<source srcset>`
//!
//! `<a href>` targets are page hyperlinks most of the time; the resolution
//! engine drops those once they classify as documents.

use super::{Reference, ReferenceScanner};
use crate::url::resolve_reference;
use scraper::{Html, Selector};
use url::Url;

/// Scanner for HTML documents
pub struct HtmlScanner;

impl ReferenceScanner for HtmlScanner {
    fn scan(&self, origin: &Url, referencing_url: &str, content: &str) -> Vec<Reference> {
        let document = Html::parse_document(content);
        let mut references = Vec::new();

        if let Ok(selector) = Selector::parse("script[src], link[href], img[src], a[href], source[srcset]") {
            for element in document.select(&selector) {
                let element = element.value();

                if element.name() == "source" {
                    if let Some(srcset) = element.attr("srcset") {
                        for candidate in srcset_candidates(srcset) {
                            push_reference(&mut references, origin, referencing_url, candidate);
                        }
                    }
                    continue;
                }

                if let Some(value) = element.attr("src").or_else(|| element.attr("href")) {
                    push_reference(&mut references, origin, referencing_url, value);
                }
            }
        }

        references
    }
}

/// Splits a `srcset` attribute into candidate URLs
///
/// `logo-768.png 768w, logo-1.5x.png 1.5x` yields `logo-768.png` and
/// `logo-1.5x.png`.
fn srcset_candidates(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

/// Records a reference and, if it contains `&`, its entity-encoded spelling
///
/// The parser decodes attribute values while the raw markup keeps `&amp;`,
/// so both spellings are substituted.
fn push_reference(references: &mut Vec<Reference>, origin: &Url, referencing_url: &str, raw: &str) {
    let token = raw.split('#').next().unwrap_or("").trim();
    let Some(target) = resolve_reference(origin, referencing_url, token) else {
        return;
    };

    if token.contains('&') {
        references.push(Reference {
            token: token.replace('&', "&amp;"),
            target: target.clone(),
        });
    }

    references.push(Reference {
        token: token.to_string(),
        target,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    fn targets(content: &str) -> Vec<String> {
        HtmlScanner
            .scan(&origin(), "/about/", content)
            .into_iter()
            .map(|reference| reference.target)
            .collect()
    }

    #[test]
    fn test_scan_tags_in_document_order() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/style.css">
            <script src="app.js"></script>
            </head><body>
            <img src="/img/logo.png">
            <a href="/contact/">Contact</a>
            </body></html>"#;

        assert_eq!(
            targets(html),
            vec!["/style.css", "/about/app.js", "/img/logo.png", "/contact/"]
        );
    }

    #[test]
    fn test_scan_srcset_candidates() {
        let html = r#"<picture><source srcset="/a-768.png 768w, /a-1.5x.png 1.5x"></picture>"#;
        assert_eq!(targets(html), vec!["/a-768.png", "/a-1.5x.png"]);
    }

    #[test]
    fn test_scan_skips_external_and_special() {
        let html = r##"<a href="https://other.example/">x</a>
            <a href="mailto:a@b.c">m</a>
            <a href="#top">t</a>
            <script src="//cdn.example.com/lib.js"></script>
            <img src="data:image/png;base64,AAAA">"##;

        assert!(targets(html).is_empty());
    }

    #[test]
    fn test_token_excludes_fragment() {
        let references = HtmlScanner.scan(&origin(), "/", r#"<a href="/doc.pdf#page=2">d</a>"#);
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].token, "/doc.pdf");
        assert_eq!(references[0].target, "/doc.pdf");
    }

    #[test]
    fn test_entity_encoded_token() {
        let references = HtmlScanner.scan(
            &origin(),
            "/",
            r#"<img src="/image.axd?w=1&amp;h=2">"#,
        );
        let tokens: Vec<&str> = references.iter().map(|r| r.token.as_str()).collect();
        assert_eq!(tokens, vec!["/image.axd?w=1&amp;h=2", "/image.axd?w=1&h=2"]);
        assert!(references.iter().all(|r| r.target == "/image.axd?w=1&h=2"));
    }
}
