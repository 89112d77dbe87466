use crate::catalog::NamingPolicy;
use crate::resource::content_hash;
use crate::url::{page_segments, strip_params};

/// Computes the output URL of a resource
///
/// # Naming Rules
///
/// | use-original-path | use-hash | Output name                 |
/// |-------------------|----------|-----------------------------|
/// | true              | true     | `/<path-stem>-<hash><ext>`  |
/// | true              | false    | `/<path-stem><ext>`         |
/// | false             | any      | `/<hash><ext>`              |
///
/// The path stem is the URL path with the query removed and the extension
/// stripped from every segment, so `/a/plan.png` and `/a/plan.png/size.png`
/// cannot collide on disk. Directory-style paths use the policy's default
/// name as their last segment. With `use-resource-folder` the name is placed
/// below `resource_folder`.
///
/// # Returns
///
/// * `Some(String)` - Origin-relative output URL
/// * `None` - `data` is empty; empty responses are never stored
///
/// # Examples
///
/// ```
/// use static_mirror::catalog::ResourceTypeRule;
/// use static_mirror::resource::output_url;
///
/// let rule = ResourceTypeRule::path_named(".json", "application/json");
/// let url = output_url(&rule.naming(), "cache", "/api/data.json?v=2", ".json", b"{}");
/// assert_eq!(url.as_deref(), Some("/api/data.json"));
/// ```
pub fn output_url(
    policy: &NamingPolicy,
    resource_folder: &str,
    url: &str,
    extension: &str,
    data: &[u8],
) -> Option<String> {
    if data.is_empty() {
        return None;
    }

    let extension = extension.to_ascii_lowercase();

    let name = if policy.use_original_path {
        let stem = path_stem(url, &extension, &policy.default_name);
        if policy.use_hash {
            format!("{}-{}{}", stem, content_hash(data), extension)
        } else {
            format!("{}{}", stem, extension)
        }
    } else {
        format!("/{}{}", content_hash(data), extension)
    };

    let folder = resource_folder.replace('\\', "/");
    let folder = folder.trim_matches('/');

    let joined = if policy.use_resource_folder && !folder.is_empty() {
        format!("/{}{}", folder, name)
    } else {
        name
    };

    Some(collapse_slashes(&joined))
}

/// Builds `/seg/seg/name` with the extension removed from every segment
fn path_stem(url: &str, extension: &str, default_name: &str) -> String {
    let path = strip_params(url);
    let mut segments: Vec<String> = page_segments(path)
        .into_iter()
        .map(|segment| strip_extension(segment, extension).to_string())
        .filter(|segment| !segment.is_empty())
        .collect();

    if path.ends_with('/') || path.ends_with('\\') || segments.is_empty() {
        segments.push(default_name.to_string());
    }

    format!("/{}", segments.join("/"))
}

fn strip_extension<'a>(segment: &'a str, extension: &str) -> &'a str {
    if extension.is_empty() || segment.len() <= extension.len() {
        return segment;
    }

    let split = segment.len() - extension.len();
    match segment.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(extension) => &segment[..split],
        _ => segment,
    }
}

fn collapse_slashes(url: &str) -> String {
    let mut collapsed = String::with_capacity(url.len());
    let mut previous_slash = false;

    for c in url.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        collapsed.push(c);
    }

    collapsed
}
