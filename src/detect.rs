//! Repository detection.
//!
//! Maps a working directory to the configured repository that contains it.

use crate::config::{normalize_path, RepoConfig};

use std::collections::BTreeMap;
use std::path::Path;

/// Find the configured repository containing `cwd`.
///
/// A repository matches when its path equals `cwd` or is an ancestor of it
/// on a component boundary (`/a/b` never matches `/a/bc`). When several
/// match, the longest normalized path wins; equal lengths resolve to the
/// first id in map order.
///
/// `cwd` must be absolute; callers resolve relative paths first.
#[must_use]
pub fn detect_current_repo<'a>(
    cwd: &Path,
    repos: &'a BTreeMap<String, RepoConfig>,
) -> Option<&'a str> {
    debug_assert!(cwd.is_absolute(), "cwd must be absolute: {}", cwd.display());
    let cwd = normalize_path(cwd);

    let mut best: Option<(&'a str, usize)> = None;
    for (id, repo) in repos {
        let root = normalize_path(&repo.path);
        if root.as_os_str().is_empty() || !cwd.starts_with(&root) {
            continue;
        }
        let len = root.as_os_str().len();
        if best.is_none_or(|(_, best_len)| len > best_len) {
            best = Some((id.as_str(), len));
        }
    }

    best.map(|(id, _)| id)
}
