use std::path::{Path, PathBuf};

use super::normalize::strip_params;

/// Splits a URL path into safe filesystem segments
///
/// Query and fragment are dropped, empty and `.` segments are skipped and
/// `..` pops the previous segment (never climbing above the root), so the
/// result can be joined onto an output directory without escaping it.
///
/// # Examples
///
/// ```
/// use static_mirror::url::page_segments;
///
/// assert_eq!(page_segments("/news//2024/./../items/?page=2"), vec!["news", "items"]);
/// assert!(page_segments("/").is_empty());
/// ```
pub fn page_segments(url: &str) -> Vec<&str> {
    let path = strip_params(url);
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    segments
}

/// Maps an origin-relative URL onto a path below `root`
pub fn url_to_path(root: &Path, url: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in page_segments(url) {
        path.push(segment);
    }
    path
}

/// Normalizes a page URL to the `/segment/segment/` form used for pages
///
/// # Examples
///
/// ```
/// use static_mirror::url::ensure_page_path;
///
/// assert_eq!(ensure_page_path("about"), "/about/");
/// assert_eq!(ensure_page_path("/news/item?x=1"), "/news/item/");
/// assert_eq!(ensure_page_path(""), "/");
/// ```
pub fn ensure_page_path(url: &str) -> String {
    let segments = page_segments(url);
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}/", segments.join("/"))
}

/// Normalizes a page path into the key used by the route table
///
/// Backslashes become slashes and surrounding slashes are trimmed, so
/// `\news\item\` and `/news/item/` share the key `news/item`.
pub fn route_key(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

/// Derives the logical page path of a leaf document inside the output tree
///
/// `<root>/news/item/index.html` maps to `/news/item/`. Returns `None` when
/// the document is not located below `root`.
pub fn logical_page_path(root: &Path, document: &Path) -> Option<String> {
    let directory = document.parent()?;
    let relative = directory.strip_prefix(root).ok()?;

    let segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    if segments.is_empty() {
        Some("/".to_string())
    } else {
        Some(format!("/{}/", segments.join("/")))
    }
}
