//! Git-backed fetcher.
//!
//! Each remote URL gets a working copy under the fetcher's work directory.
//! The first fetch clones it shallowly; later fetches move it to the tip of
//! the configured branch. Manifests are then read from the working copy the
//! same way the filesystem fetcher reads a local tree.

mod parse;
mod working_copy;

pub use parse::format_git_error;
pub use working_copy::WorkingCopy;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{collect_components_blocking, normalize_base_path, Fetcher};
use crate::component::Component;
use crate::config::source::{GitSource, SourceConfig, SourceKind};
use crate::error::{GitError, SyncError};
use crate::sanitize::{redact_repo_url, repo_dir_name};

/// Default limit for a single git command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);
/// Maximum number of retries for transient errors.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Tuning for git operations.
#[derive(Debug, Clone)]
pub struct GitFetcherOptions {
    pub command_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GitFetcherOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

pub struct GitFetcher {
    work_dir: PathBuf,
    options: GitFetcherOptions,
    /// One lock per working copy, so two sources sharing a URL never run
    /// git in the same directory at once.
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl GitFetcher {
    /// Creates the fetcher, creating `work_dir` if needed.
    pub fn new(work_dir: impl AsRef<Path>, options: GitFetcherOptions) -> Result<Self, SyncError> {
        let work_dir = work_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&work_dir).map_err(|e| SyncError::Io {
            path: work_dir.clone(),
            source: e,
        })?;

        Ok(Self {
            work_dir,
            options,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Where the working copy for `url` lives.
    pub fn checkout_dir(&self, url: &str) -> PathBuf {
        self.work_dir.join(repo_dir_name(url))
    }

    fn lock_for(&self, dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Clones or updates the working copy, retrying transient failures with
    /// exponential backoff.
    async fn sync_working_copy(
        &self,
        copy: &WorkingCopy,
        source: &GitSource,
        base_path: Option<&str>,
    ) -> Result<(), GitError> {
        let url = redact_repo_url(&source.url);
        let max_retries = self.options.max_retries;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = self.options.retry_base_delay * (1 << (attempt - 1));
                log::info!(
                    "Retrying git sync of {} (attempt {}/{}) after {:?}...",
                    url,
                    attempt + 1,
                    max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            let result = if copy.is_git_repo() {
                log::debug!("Updating {} ({}) in {}", url, source.branch, copy.path().display());
                copy.update(&source.url, &source.branch, base_path).await
            } else {
                log::info!("Cloning {} ({}) into {}", url, source.branch, copy.path().display());
                copy.clone_shallow(&source.url, &source.branch, base_path)
                    .await
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    log::warn!("Git sync of {} failed with retryable error: {}", url, e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(GitError::Operation(format!(
            "Git sync of {} failed after all retries",
            url
        )))
    }
}

#[async_trait]
impl Fetcher for GitFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Git
    }

    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<Component>, SyncError> {
        let git_source = match source {
            SourceConfig::Git(git_source) => git_source,
            SourceConfig::Filesystem(_) => {
                return Err(SyncError::KindMismatch {
                    expected: SourceKind::Git,
                    actual: source.kind(),
                })
            }
        };

        let base_path = normalize_base_path(git_source.base_path.as_deref())?;
        let dir = self.checkout_dir(&git_source.url);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().await;

        let copy = WorkingCopy::new(&dir, self.options.command_timeout);
        self.sync_working_copy(&copy, git_source, base_path.as_deref())
            .await?;

        collect_components_blocking(dir, base_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::source::FilesystemSource;
    use tempfile::TempDir;

    #[test]
    fn test_new_creates_work_dir() {
        let dir = TempDir::new().unwrap();
        let work_dir = dir.path().join("cache").join("repos");
        let fetcher = GitFetcher::new(&work_dir, GitFetcherOptions::default()).unwrap();

        assert!(work_dir.is_dir());
        assert_eq!(fetcher.work_dir(), work_dir.as_path());
    }

    #[test]
    fn test_checkout_dir_is_stable_per_url() {
        let dir = TempDir::new().unwrap();
        let fetcher = GitFetcher::new(dir.path(), GitFetcherOptions::default()).unwrap();

        let a = fetcher.checkout_dir("https://github.com/acme/catalog.git");
        let b = fetcher.checkout_dir("https://github.com/acme/catalog.git");
        let c = fetcher.checkout_dir("https://github.com/acme/other.git");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(dir.path()));
    }

    #[test]
    fn test_lock_shared_per_dir() {
        let dir = TempDir::new().unwrap();
        let fetcher = GitFetcher::new(dir.path(), GitFetcherOptions::default()).unwrap();

        let first = fetcher.lock_for(Path::new("/a"));
        let second = fetcher.lock_for(Path::new("/a"));
        let other = fetcher.lock_for(Path::new("/b"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_fetch_rejects_filesystem_source() {
        let dir = TempDir::new().unwrap();
        let fetcher = GitFetcher::new(dir.path(), GitFetcherOptions::default()).unwrap();
        let source = SourceConfig::Filesystem(FilesystemSource {
            path: "/tmp".to_string(),
            interval: Duration::from_secs(60),
            base_path: None,
        });

        let result = fetcher.fetch(&source).await;
        assert!(matches!(
            result,
            Err(SyncError::KindMismatch {
                expected: SourceKind::Git,
                actual: SourceKind::Filesystem
            })
        ));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_repo_fails() {
        let dir = TempDir::new().unwrap();
        let options = GitFetcherOptions {
            max_retries: 0,
            ..GitFetcherOptions::default()
        };
        let fetcher = GitFetcher::new(dir.path().join("repos"), options).unwrap();
        let url = format!("file://{}", dir.path().join("missing").display());
        let source = SourceConfig::Git(GitSource {
            url: url.clone(),
            branch: "main".to_string(),
            interval: Duration::from_secs(60),
            base_path: None,
        });

        let result = fetcher.fetch(&source).await;
        assert!(matches!(result, Err(SyncError::Git(_))));
        assert!(!fetcher.checkout_dir(&url).exists());
    }
}
