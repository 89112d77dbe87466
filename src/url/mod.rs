//! URL handling module for Static-Mirror
//!
//! This module turns the references found in markup into origin-relative
//! resource URLs, and maps those URLs onto output paths and route keys.

mod normalize;
mod paths;

pub use normalize::{
    extension_of, parse_origin, resolve_reference, strip_params,
    to_site_relative,
};
pub use paths::{ensure_page_path, logical_page_path, page_segments, route_key, url_to_path};
