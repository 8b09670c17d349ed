//! Request URL rewriting.
//!
//! # Responsibilities
//! - Point an inbound request URI at a stored endpoint
//! - Treat the endpoint path as a prefix of the request path
//! - Merge endpoint and request query strings
//!
//! # Design Decisions
//! - Scheme and authority always come from the endpoint
//! - Paths are joined in their percent-escaped form, so escapes in either
//!   side survive the join untouched
//! - Endpoint query parameters come first when both sides have one

use axum::http::Uri;

use crate::routing::endpoint::Endpoint;

/// Compute the upstream URI for `original` routed to `target`.
pub fn rewrite_uri(original: &Uri, target: &Endpoint) -> Result<Uri, axum::http::Error> {
    let path = single_joining_slash(target.path(), original.path());
    let query = merge_query(target.query(), original.query().unwrap_or(""));

    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query)
    };

    Uri::builder()
        .scheme(target.scheme())
        .authority(target.authority())
        .path_and_query(path_and_query)
        .build()
}

/// Join two path segments with exactly one slash at the boundary.
pub fn single_joining_slash(a: &str, b: &str) -> String {
    let a_slash = a.ends_with('/');
    let b_slash = b.starts_with('/');
    match (a_slash, b_slash) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}

/// Merge query strings, target first.
pub fn merge_query(target: &str, original: &str) -> String {
    if target.is_empty() || original.is_empty() {
        format!("{}{}", target, original)
    } else {
        format!("{}&{}", target, original)
    }
}
