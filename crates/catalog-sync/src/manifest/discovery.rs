//! Manifest file discovery.

use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::SyncError;

/// File names recognised as component manifests.
pub const MANIFEST_FILE_NAMES: [&str; 2] = ["manifest.yaml", "manifest.yml"];

/// Finds every manifest under `root`, or under `root/base_path` when given.
///
/// Returned paths are relative to `root` (so they keep the `base_path`
/// prefix) and sorted by file name within each directory. `base_path` must
/// stay inside `root`; see [`crate::fetcher::normalize_base_path`].
pub fn discover_manifests(root: &Path, base_path: Option<&str>) -> Result<Vec<PathBuf>, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::SourceRootNotFound(root.to_path_buf()));
    }

    let search_root = match base_path.filter(|b| !b.is_empty()) {
        Some(base) if !is_contained_base_path(base) => {
            return Err(SyncError::InvalidBasePath(base.to_string()));
        }
        Some(base) => root.join(base),
        None => root.to_path_buf(),
    };
    if !search_root.exists() {
        return Err(SyncError::BasePathNotFound(search_root));
    }

    let mut manifests = Vec::new();

    for entry in WalkDir::new(&search_root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(SyncError::ScanFailed {
                    path: search_root,
                    source: e,
                });
            }
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", search_root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_manifest_file(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| SyncError::InvalidBasePath(entry.path().display().to_string()))?;
        manifests.push(relative.to_path_buf());
    }

    log::debug!(
        "Discovered {} manifest(s) under {}",
        manifests.len(),
        search_root.display()
    );
    Ok(manifests)
}

/// Returns true if the file name is exactly one of [`MANIFEST_FILE_NAMES`].
pub fn is_manifest_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| MANIFEST_FILE_NAMES.contains(&n))
        .unwrap_or(false)
}

/// True if `base` is a relative path with no `..` components.
pub fn is_contained_base_path(base: &str) -> bool {
    Path::new(base)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}
