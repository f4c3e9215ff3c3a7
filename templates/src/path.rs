//! Helpers for `:` separated resource paths.

pub const SEPARATOR: char = ':';

/// Path of the containing folder.
///
/// `"org:root:ETB01"` gives `"org:root"`, a single segment gives the root
/// (`""`) and the root itself has no parent.
pub fn parent_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once(SEPARATOR).map_or("", |(head, _)| head))
}

/// Last segment of a path, the resource's extension
pub fn last_segment(path: &str) -> &str {
    path.rsplit_once(SEPARATOR).map_or(path, |(_, tail)| tail)
}

/// Whether `ancestor` is a strict ancestor of `path`
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}
