//! Output tree reconciliation
//!
//! Runs after a full crawl (or on lifecycle events) and brings the output
//! tree back in line with the content tree:
//! - Leaf documents of pages that no longer exist are deleted
//! - Resources no page of the crawl referenced are deleted
//! - Moved pages leave redirect stubs behind
//!
//! A filesystem error only skips the file it happened on.

use crate::config::SiteConfig;
use crate::site::{ContentTree, RouteRegistrar};
use crate::url::{ensure_page_path, logical_page_path, url_to_path};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Deletes the leaf documents of pages the content tree no longer has
///
/// The resource folder is not visited. Directories emptied by a deletion
/// are removed up to (not including) the output root, and the page's route
/// is unregistered.
///
/// # Returns
///
/// The number of distinct pages removed
pub fn remove_obsolete_pages(
    site: &SiteConfig,
    leaf_names: &[String],
    tree: &dyn ContentTree,
    routes: &dyn RouteRegistrar,
) -> usize {
    let resource_path = site.resource_path();
    let mut removed: HashSet<String> = HashSet::new();

    for document in leaf_documents(&site.output_path, &resource_path, leaf_names) {
        let Some(page_path) = logical_page_path(&site.output_path, &document) else {
            continue;
        };

        if tree.page_exists(&page_path) {
            continue;
        }

        match std::fs::remove_file(&document) {
            Ok(()) => {
                tracing::debug!("Removed obsolete page document {}", document.display());
                routes.unregister(&page_path, false);
                prune_empty_parents(&document, &site.output_path);
                removed.insert(page_path);
            }
            Err(e) => tracing::warn!("Failed to remove {}: {}", document.display(), e),
        }
    }

    if !removed.is_empty() {
        tracing::info!("Removed {} obsolete pages of '{}'", removed.len(), site.name);
    }

    removed.len()
}

/// Deletes resources whose URL is not in `live_urls`
///
/// `live_urls` holds the output URLs the last crawl rewrote references to
/// (see [`crate::resource::CrawlResourceMap::rewritten_urls`]). Leaf
/// documents and unfinished staging files are left alone.
///
/// # Returns
///
/// The number of files removed
pub fn remove_obsolete_resources(
    site: &SiteConfig,
    leaf_names: &[String],
    live_urls: &HashSet<String>,
) -> usize {
    let resource_root = site.resource_path();
    if !resource_root.is_dir() {
        return 0;
    }

    let candidates: Vec<PathBuf> = walk_files(&resource_root, None)
        .into_iter()
        .filter(|file| !is_leaf_document(file, leaf_names) && !is_staging_file(file))
        .collect();

    let mut removed = 0;
    for file in candidates {
        let Some(url) = logical_url(&site.output_path, &file) else {
            continue;
        };

        if live_urls.contains(&url) {
            continue;
        }

        match std::fs::remove_file(&file) {
            Ok(()) => {
                tracing::debug!("Removed obsolete resource {}", url);
                prune_empty_parents(&file, &resource_root);
                removed += 1;
            }
            Err(e) => tracing::warn!("Failed to remove {}: {}", file.display(), e),
        }
    }

    if removed > 0 {
        tracing::info!("Removed {} obsolete resources of '{}'", removed, site.name);
    }

    removed
}

/// Removes the generated output of one page
///
/// Without `remove_subfolders` only the leaf documents directly at the
/// page path are deleted. With it, every leaf document below the path is
/// deleted as well. Emptied directories are removed and the matching
/// routes unregistered.
pub fn remove_generated_page(
    site: &SiteConfig,
    leaf_names: &[String],
    routes: &dyn RouteRegistrar,
    path: &str,
    remove_subfolders: bool,
) -> usize {
    let page_path = ensure_page_path(path);
    let directory = url_to_path(&site.output_path, &page_path);

    let documents: Vec<PathBuf> = if remove_subfolders {
        leaf_documents(&directory, &site.resource_path(), leaf_names)
    } else {
        leaf_names
            .iter()
            .map(|name| directory.join(name))
            .filter(|document| document.is_file())
            .collect()
    };

    let mut removed = 0;
    for document in documents {
        match std::fs::remove_file(&document) {
            Ok(()) => {
                prune_empty_parents(&document, &site.output_path);
                removed += 1;
            }
            Err(e) => tracing::warn!("Failed to remove {}: {}", document.display(), e),
        }
    }

    routes.unregister(&page_path, remove_subfolders);
    tracing::debug!("Removed {} documents of {}", removed, page_path);

    removed
}

/// Overwrites the HTML leaf documents below `old_path` with redirect stubs
///
/// `<old>/child/index.html` is replaced by a meta-refresh page pointing at
/// `<new>/child/`.
///
/// # Returns
///
/// The number of stubs written
pub fn create_redirect_pages(
    site: &SiteConfig,
    leaf_names: &[String],
    old_path: &str,
    new_path: &str,
) -> usize {
    let old_path = ensure_page_path(old_path);
    let new_path = ensure_page_path(new_path);
    let old_directory = url_to_path(&site.output_path, &old_path);

    let mut written = 0;
    for document in leaf_documents(&old_directory, &site.resource_path(), leaf_names) {
        let is_html = document
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
        if !is_html {
            continue;
        }

        let Some(relative) = logical_page_path(&old_directory, &document) else {
            continue;
        };
        let target = ensure_page_path(&format!("{}{}", new_path, relative));

        match std::fs::write(&document, redirect_document(&target)) {
            Ok(()) => written += 1,
            Err(e) => tracing::warn!("Failed to write redirect {}: {}", document.display(), e),
        }
    }

    tracing::info!("Wrote {} redirect pages from {} to {}", written, old_path, new_path);
    written
}

/// Builds the body of a redirect stub
fn redirect_document(target: &str) -> String {
    let target = target
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;");

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"0; url={0}\">\n\
         <link rel=\"canonical\" href=\"{0}\">\n<title>Moved</title>\n</head>\n\
         <body><a href=\"{0}\">{0}</a></body>\n</html>\n",
        target
    )
}

/// Lists leaf documents below `root`, skipping the `skip` subtree
fn leaf_documents(root: &Path, skip: &Path, leaf_names: &[String]) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    walk_files(root, Some(skip))
        .into_iter()
        .filter(|file| is_leaf_document(file, leaf_names))
        .collect()
}

fn walk_files(root: &Path, skip: Option<&Path>) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| skip.map_or(true, |skip| entry.path() != skip))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry below {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

fn is_leaf_document(path: &Path, leaf_names: &[String]) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|name| leaf_names.iter().any(|leaf| *leaf == name))
}

fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(".partial"))
}

/// Origin-relative URL of a file below the output root
fn logical_url(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("/{}", segments.join("/")))
}

/// Removes empty directories from the file's parent up to `stop_at`
fn prune_empty_parents(file: &Path, stop_at: &Path) {
    let mut directory = file.parent();

    while let Some(current) = directory {
        if current == stop_at || !current.starts_with(stop_at) {
            break;
        }

        let is_empty = std::fs::read_dir(current)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            break;
        }

        if let Err(e) = std::fs::remove_dir(current) {
            tracing::debug!("Could not remove {}: {}", current.display(), e);
            break;
        }
        directory = current.parent();
    }
}
