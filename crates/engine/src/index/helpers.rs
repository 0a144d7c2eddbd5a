/// Join a root path and a relative path deterministically.
/// - If `rel` is empty, return `root` (owned).
/// - Ensures exactly one separator between root and rel.
/// - Does not normalize `..`; callers should ensure `rel` uses `/`.
#[inline]
pub fn join_root_rel(root: &str, rel: &str) -> String {
    if rel.is_empty() {
        return root.to_owned();
    }

    if root.is_empty() {
        return rel.to_owned();
    }

    let root_has = root.as_bytes().last().copied() == Some(b'/');
    let rel_has = rel.as_bytes().first().copied() == Some(b'/');

    let mut out = String::with_capacity(root.len() + 1 + rel.len());
    out.push_str(root);

    match (root_has, rel_has) {
        (true, true) => out.push_str(&rel[1..]),
        (false, false) => {
            out.push('/');
            out.push_str(rel);
        }
        _ => out.push_str(rel),
    }

    out
}

/// Trim trailing separators, keeping a lone `/`.
#[inline]
pub fn trim_trailing_sep(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Strip `root` from `path` on a component boundary.
///
/// Returns `Some("")` when `path == root` and `None` when `path` is not
/// under `root`.
pub fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return Some(path);
    }
    if root == "/" {
        return path.strip_prefix('/');
    }

    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// Non-empty `/`-separated components, `.` segments skipped.
pub fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".")
}

#[cfg(test)]
#[path = "helpers_tests.rs"]
mod tests;
