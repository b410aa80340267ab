//! Capability URI matching.
//!
//! Capabilities are namespaced strings with wildcard suffixes:
//!   - `read:data` — read the data resource specifically
//!   - `read:*` — read anything
//!   - `execute:deploy:*` — execute any deploy
//!   - `*` — all capabilities (root authority)

/// Check whether a granted URI covers a requested URI.
///
/// Matching rules:
/// - `*` matches everything
/// - exact match
/// - `action:*` matches `action` and anything under `action:`
/// - `prefix/*` matches path-style resources under `prefix/`
pub fn capability_uri_covers(granted: &str, requested: &str) -> bool {
    if granted == "*" {
        return true;
    }

    if granted == requested {
        return true;
    }

    if let Some(prefix) = granted.strip_suffix(":*") {
        if requested == prefix {
            return true;
        }
        if requested.starts_with(prefix) && requested.as_bytes().get(prefix.len()) == Some(&b':') {
            return true;
        }
    }

    if let Some(prefix) = granted.strip_suffix("/*") {
        if requested == prefix {
            return true;
        }
        if requested.starts_with(prefix) && requested.as_bytes().get(prefix.len()) == Some(&b'/') {
            return true;
        }
    }

    false
}

/// Check whether any of a set of granted URIs covers the requested URI.
pub fn capabilities_cover<'a>(
    granted: impl IntoIterator<Item = &'a str>,
    requested: &str,
) -> bool {
    granted
        .into_iter()
        .any(|uri| capability_uri_covers(uri, requested))
}
