use crate::{UrlError, UrlResult};
use url::Url;

/// Schemes that never point at a mirrorable resource
const IGNORED_SCHEMES: &[&str] = &["data:", "javascript:", "mailto:", "tel:", "about:", "blob:"];

/// Parses and validates a site origin URL
///
/// The origin must be an absolute HTTP(S) URL with a host. A trailing slash
/// is tolerated; resource URLs are appended to the origin without it.
///
/// # Examples
///
/// ```
/// use static_mirror::url::parse_origin;
///
/// let origin = parse_origin("http://localhost:8080/").unwrap();
/// assert_eq!(origin.host_str(), Some("localhost"));
/// ```
pub fn parse_origin(origin: &str) -> UrlResult<Url> {
    let url = Url::parse(origin.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS origins are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Resolves a reference found in a document to an origin-relative URL
///
/// # Resolution Rules
///
/// 1. Empty references, fragment-only references and protocol-relative
///    references (`//cdn.example.com/...`) are rejected
/// 2. `data:`, `javascript:`, `mailto:` and similar schemes are rejected
/// 3. Absolute URLs are accepted only when they share the origin's scheme,
///    host and port; anything else is external and rejected
/// 4. Relative references are joined against the referencing document's URL,
///    so `../img/logo.png` referenced from `/assets/css/site.css` becomes
///    `/assets/img/logo.png`
/// 5. The fragment is dropped; the query string is kept
///
/// # Arguments
///
/// * `origin` - The site origin
/// * `referencing_url` - Origin-relative URL of the document holding the reference
/// * `reference` - The raw reference as written in the document
///
/// # Returns
///
/// * `Some(String)` - Origin-relative path and query of the referenced resource
/// * `None` - The reference is not mirrorable
///
/// # Examples
///
/// ```
/// use static_mirror::url::{parse_origin, resolve_reference};
///
/// let origin = parse_origin("http://localhost:8080").unwrap();
/// let resolved = resolve_reference(&origin, "/assets/css/site.css", "../img/logo.png");
/// assert_eq!(resolved.as_deref(), Some("/assets/img/logo.png"));
/// ```
pub fn resolve_reference(origin: &Url, referencing_url: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') || reference.starts_with("//") {
        return None;
    }

    let lowered = reference.to_ascii_lowercase();
    if IGNORED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }

    let resolved = match Url::parse(reference) {
        // Absolute URL: only same-origin references are mirrorable
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = origin.join(referencing_url).ok()?;
            base.join(reference).ok()?
        }
        Err(_) => return None,
    };

    if !same_origin(origin, &resolved) {
        return None;
    }

    let mut relative = resolved.path().to_string();
    if let Some(query) = resolved.query() {
        relative.push('?');
        relative.push_str(query);
    }

    Some(relative)
}

/// Converts a URL handed over by the content tree into a site-relative path
///
/// Protocol-relative URLs are rejected. Absolute URLs (as produced by
/// scheduled publishing) are reduced to their path.
pub fn to_site_relative(url: &str) -> Option<String> {
    let url = url.trim();

    if url.is_empty() || url.starts_with("//") {
        return None;
    }

    if url.starts_with('/') {
        return Some(url.to_string());
    }

    Url::parse(url).ok().map(|absolute| absolute.path().to_string())
}

/// Removes the query string and fragment from a URL
///
/// # Examples
///
/// ```
/// use static_mirror::url::strip_params;
///
/// assert_eq!(strip_params("/bundle.js?v=3#top"), "/bundle.js");
/// assert_eq!(strip_params("/icons.svg#home"), "/icons.svg");
/// ```
pub fn strip_params(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(index) => &url[..index],
        None => url,
    }
}

/// Returns the lowercase extension (with leading dot) of a URL's last path segment
///
/// Returns an empty string when the last segment has no extension, including
/// directory-style URLs ending in `/`.
///
/// # Examples
///
/// ```
/// use static_mirror::url::extension_of;
///
/// assert_eq!(extension_of("/Content/Site.CSS?v=1"), ".css");
/// assert_eq!(extension_of("/bundles/site"), "");
/// assert_eq!(extension_of("/about/"), "");
/// ```
pub fn extension_of(url: &str) -> String {
    let path = strip_params(url);
    let last_segment = path.rsplit('/').next().unwrap_or("");

    match last_segment.rfind('.') {
        Some(0) | None => String::new(),
        Some(index) => last_segment[index..].to_ascii_lowercase(),
    }
}

/// Checks whether two URLs share scheme, host and port
fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}
