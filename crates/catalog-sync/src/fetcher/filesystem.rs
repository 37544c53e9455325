use std::path::PathBuf;

use async_trait::async_trait;

use super::{collect_components_blocking, normalize_base_path, Fetcher};
use crate::component::Component;
use crate::config::source::{SourceConfig, SourceKind};
use crate::error::SyncError;
use crate::sanitize::expand_tilde;

/// Reads manifests straight from a local directory.
#[derive(Debug, Default, Clone)]
pub struct FilesystemFetcher;

impl FilesystemFetcher {
    pub fn new() -> Self {
        Self
    }

    /// Expands `~`, makes the path absolute and checks it is a directory.
    pub fn resolve_root(path: &str) -> Result<PathBuf, SyncError> {
        let expanded = expand_tilde(path);
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            let cwd = std::env::current_dir().map_err(|e| SyncError::Io {
                path: expanded.clone(),
                source: e,
            })?;
            cwd.join(expanded)
        };

        if !absolute.is_dir() {
            return Err(SyncError::SourceRootNotFound(absolute));
        }
        Ok(absolute)
    }
}

#[async_trait]
impl Fetcher for FilesystemFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Filesystem
    }

    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<Component>, SyncError> {
        let fs_source = match source {
            SourceConfig::Filesystem(fs_source) => fs_source,
            SourceConfig::Git(_) => {
                return Err(SyncError::KindMismatch {
                    expected: SourceKind::Filesystem,
                    actual: source.kind(),
                })
            }
        };

        let root = Self::resolve_root(&fs_source.path)?;
        let base_path = normalize_base_path(fs_source.base_path.as_deref())?;

        log::debug!(
            "Scanning {}{}",
            root.display(),
            base_path
                .as_deref()
                .map(|b| format!(" (base path {})", b))
                .unwrap_or_default()
        );

        collect_components_blocking(root, base_path).await
    }
}
