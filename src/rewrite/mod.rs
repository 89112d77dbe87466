//! Text dependency rewriters
//!
//! A rewriter scans a text resource (page markup, a stylesheet, an SVG
//! document) for embedded resource references, resolves each distinct
//! reference through the [`ResolutionEngine`], then substitutes the new
//! URLs back into the text in a single pass.
//!
//! Which scanners run is decided by the resource type's
//! [`DependencyLookup`] tags; every scanner implements [`ReferenceScanner`].

mod css;
mod html;
mod svg;

pub use css::CssScanner;
pub use html::HtmlScanner;
pub use svg::SvgScanner;

use crate::catalog::DependencyLookup;
use crate::resource::{Mapping, PageContext, ResolutionEngine};
use regex::RegexBuilder;
use std::collections::{HashMap, HashSet};
use url::Url;

/// A reference found in a text resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Exact text to replace, as written in the document (fragment excluded)
    pub token: String,

    /// Origin-relative URL the token resolves to
    pub target: String,
}

/// Discovers resource references in a text resource
pub trait ReferenceScanner: Send + Sync {
    /// Returns the references of `content` in document order
    ///
    /// # Arguments
    ///
    /// * `origin` - The site origin, used to reject external references
    /// * `referencing_url` - Origin-relative URL of the scanned document;
    ///   relative references are resolved against it
    /// * `content` - The document text
    fn scan(&self, origin: &Url, referencing_url: &str, content: &str) -> Vec<Reference>;
}

impl DependencyLookup {
    /// Returns the scanner implementing this lookup
    pub fn scanner(self) -> &'static dyn ReferenceScanner {
        match self {
            DependencyLookup::Html => &HtmlScanner,
            DependencyLookup::Css => &CssScanner,
            DependencyLookup::Svg => &SvgScanner,
        }
    }
}

/// Rewrites the resource references of a text resource
///
/// Runs every scanner named by `lookups`, resolves each distinct target at
/// `depth`, then replaces the tokens of resolved references with their new
/// URLs. References that resolve to a no-op stay as written. An empty
/// `lookups` returns `content` unchanged.
pub async fn rewrite_dependencies(
    engine: &ResolutionEngine,
    lookups: &[DependencyLookup],
    referencing_url: &str,
    content: String,
    depth: usize,
    ctx: &mut PageContext,
) -> String {
    if lookups.is_empty() {
        return content;
    }

    let mut references = Vec::new();
    for lookup in lookups {
        references.extend(lookup.scanner().scan(engine.origin(), referencing_url, &content));
    }

    let mut seen_tokens = HashSet::new();
    let mut replacements: Vec<(String, String)> = Vec::new();

    for reference in references {
        if !seen_tokens.insert(reference.token.clone()) {
            continue;
        }

        if let Mapping::Rewrite(new_url) = engine.resolve(&reference.target, depth, ctx).await {
            if new_url != reference.token {
                replacements.push((reference.token, new_url));
            }
        }
    }

    substitute(&content, &replacements)
}

/// Replaces every delimited occurrence of each token in one pass
///
/// Tokens are tried longest first, so `/img/a.png` wins over `a.png` at the
/// same position. A token only matches between delimiters (quotes,
/// parentheses, whitespace, `=`, `,` before it; quotes, parentheses,
/// whitespace, `,`, `#` or `>` after it), which keeps `a.png` from matching
/// inside `data.png`. Substituted text is never scanned again.
pub fn substitute(content: &str, replacements: &[(String, String)]) -> String {
    if replacements.is_empty() {
        return content.to_string();
    }

    let mut ordered: Vec<&(String, String)> = replacements.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let alternation = ordered
        .iter()
        .map(|(token, _)| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = format!(
        r#"(?P<pre>^|[\s"'(,=])(?P<token>{})(?P<post>$|[\s"'),#>])"#,
        alternation
    );

    let regex = match RegexBuilder::new(&pattern)
        .size_limit(64 * (1 << 20))
        .build()
    {
        Ok(regex) => regex,
        Err(e) => {
            tracing::warn!("Failed to build substitution pattern: {}", e);
            return content.to_string();
        }
    };

    let lookup: HashMap<&str, &str> = ordered
        .iter()
        .map(|(token, new_url)| (token.as_str(), new_url.as_str()))
        .collect();

    regex
        .replace_all(content, |caps: &regex::Captures| {
            let token = &caps["token"];
            let new_url = lookup.get(token).copied().unwrap_or(token);
            format!("{}{}{}", &caps["pre"], new_url, &caps["post"])
        })
        .into_owned()
}
