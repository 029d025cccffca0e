use std::path::{Component, Path, PathBuf};

/// Resolve a client-supplied file name to a path inside `dir`.
///
/// Screenshot URLs carry only a bare file name. Anything that is not a single
/// normal path component (separators, `..`, drive prefixes, empty names) is
/// refused so a request can never reach outside the served directory.
pub fn resolve_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.contains('\\') {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => Some(dir.join(part)),
        _ => None,
    }
}
