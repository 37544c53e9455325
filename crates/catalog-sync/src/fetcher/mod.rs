//! Source fetchers.
//!
//! A fetcher materialises a source on local disk and turns the manifests it
//! finds there into [`Component`]s. There is one implementation per
//! [`SourceKind`]; the sync service builds them through a [`FetcherFactory`]
//! and shares each instance across all sources of that kind.

pub mod filesystem;
pub mod git;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::component::Component;
use crate::config::source::{SourceConfig, SourceKind};
use crate::error::SyncError;
use crate::manifest::{discover_manifests, is_contained_base_path, load_manifest};

pub use filesystem::FilesystemFetcher;
pub use git::{GitFetcher, GitFetcherOptions};

/// Fetches the components declared by one source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The source kind this fetcher handles.
    fn kind(&self) -> SourceKind;

    /// Materialises `source` and returns its components.
    ///
    /// Manifests that fail to parse are logged and skipped; only problems with
    /// the source as a whole are returned as errors.
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<Component>, SyncError>;
}

/// Builds the fetcher for a source kind.
pub trait FetcherFactory: Send + Sync {
    fn create(&self, kind: SourceKind) -> Result<Arc<dyn Fetcher>, SyncError>;
}

/// Factory producing the built-in git and filesystem fetchers.
#[derive(Debug, Clone)]
pub struct DefaultFetcherFactory {
    work_dir: PathBuf,
    git_options: GitFetcherOptions,
}

impl DefaultFetcherFactory {
    /// `work_dir` is where git working copies are kept.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            git_options: GitFetcherOptions::default(),
        }
    }

    pub fn with_git_options(mut self, options: GitFetcherOptions) -> Self {
        self.git_options = options;
        self
    }
}

impl FetcherFactory for DefaultFetcherFactory {
    fn create(&self, kind: SourceKind) -> Result<Arc<dyn Fetcher>, SyncError> {
        match kind {
            SourceKind::Git => Ok(Arc::new(GitFetcher::new(
                &self.work_dir,
                self.git_options.clone(),
            )?)),
            SourceKind::Filesystem => Ok(Arc::new(FilesystemFetcher::new())),
        }
    }
}

/// Strips surrounding whitespace and slashes; `None` if nothing is left.
///
/// `"/services/"` becomes `"services"`, so it can be joined onto a root.
/// Paths that climb out of the root (`..`) are rejected.
pub fn normalize_base_path(base_path: Option<&str>) -> Result<Option<String>, SyncError> {
    let Some(base) = base_path
        .map(|b| b.trim().trim_matches('/'))
        .filter(|b| !b.is_empty())
    else {
        return Ok(None);
    };

    if !is_contained_base_path(base) {
        return Err(SyncError::InvalidBasePath(base.to_string()));
    }
    Ok(Some(base.to_string()))
}

/// Discovers manifests under `root` and converts them to components.
///
/// Unreadable or invalid manifests are skipped with a warning.
pub fn collect_components(root: &Path, base_path: Option<&str>) -> Result<Vec<Component>, SyncError> {
    let paths = discover_manifests(root, base_path)?;
    let mut components = Vec::with_capacity(paths.len());

    for relative in &paths {
        match load_manifest(root, relative) {
            Ok(loaded) => components.push(loaded.manifest.to_component()),
            Err(e) => log::warn!("Skipping manifest {}: {}", relative.display(), e),
        }
    }

    if components.len() < paths.len() {
        log::info!(
            "Loaded {} of {} manifest(s) from {}",
            components.len(),
            paths.len(),
            root.display()
        );
    }

    Ok(components)
}

/// Runs [`collect_components`] on the blocking pool.
pub(crate) async fn collect_components_blocking(
    root: PathBuf,
    base_path: Option<String>,
) -> Result<Vec<Component>, SyncError> {
    tokio::task::spawn_blocking(move || collect_components(&root, base_path.as_deref()))
        .await
        .map_err(|e| SyncError::TaskFailed(e.to_string()))?
}
