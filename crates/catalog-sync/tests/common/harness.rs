//! Test harness for isolated sync runs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use catalog_sync::config::{FilesystemSource, GitSource, ServiceConfig, SourceConfig};
use catalog_sync::fetcher::{DefaultFetcherFactory, GitFetcherOptions};
use catalog_sync::{InMemoryRepository, SyncService};

/// Isolated environment: a temp dir for catalogs and working copies plus an
/// empty in-memory repository.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Where git working copies are kept.
    pub work_dir: PathBuf,
    pub repo: Arc<InMemoryRepository>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let work_dir = temp_dir.path().join("repos");

        Self {
            temp_dir,
            work_dir,
            repo: Arc::new(InMemoryRepository::new()),
        }
    }

    /// A path inside the harness temp dir.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    /// Builds a service over `sources` sharing the harness repository.
    ///
    /// Git failures are not retried, so failing passes end quickly.
    pub fn service(&self, sources: Vec<SourceConfig>) -> SyncService {
        let config = ServiceConfig::new(sources).with_work_dir(&self.work_dir);
        let factory = DefaultFetcherFactory::new(config.work_dir()).with_git_options(git_options());
        SyncService::with_fetcher_factory(config, self.repo.clone(), Arc::new(factory))
    }

    /// Sorted names of every stored component.
    pub fn component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repo.list().into_iter().map(|c| c.name).collect();
        names.sort();
        names
    }
}

pub fn git_options() -> GitFetcherOptions {
    GitFetcherOptions {
        command_timeout: Duration::from_secs(60),
        max_retries: 0,
        ..GitFetcherOptions::default()
    }
}

pub fn fs_source(path: &Path, base_path: Option<&str>) -> SourceConfig {
    SourceConfig::Filesystem(FilesystemSource {
        path: path.to_string_lossy().to_string(),
        interval: Duration::from_secs(60),
        base_path: base_path.map(str::to_string),
    })
}

pub fn git_source(url: &str, base_path: Option<&str>) -> SourceConfig {
    SourceConfig::Git(GitSource {
        url: url.to_string(),
        branch: "main".to_string(),
        interval: Duration::from_secs(60),
        base_path: base_path.map(str::to_string),
    })
}
