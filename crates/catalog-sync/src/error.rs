use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::source::SourceKind;

/// Top-level error for running the service.
#[derive(Error, Debug)]
pub enum CatalogSyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Failed to wait for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Errors raised while validating a single source definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceConfigError {
    #[error("Unknown source kind '{0}', expected one of: git, filesystem")]
    UnknownKind(String),

    #[error("Missing required field '{field}' for {kind} source")]
    MissingField { kind: SourceKind, field: &'static str },

    #[error("Interval {interval:?} for {kind} source is below the minimum of {minimum:?}")]
    IntervalTooShort {
        kind: SourceKind,
        interval: Duration,
        minimum: Duration,
    },

    #[error("Invalid interval '{0}': expected seconds or a duration like 30s, 5m, 1h")]
    InvalidInterval(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Invalid source at index {index}: {source}")]
    InvalidSource {
        index: usize,
        #[source]
        source: SourceConfigError,
    },
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Manifest '{path}' has no name")]
    MissingName { path: PathBuf },
}

/// Errors from driving the git CLI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("Git operation failed: {0}")]
    Operation(String),

    #[error("Git network error: {0}")]
    Network(String),

    #[error("Git authentication failed: {0}")]
    AuthFailed(String),

    #[error("Git operation timed out after {0}s")]
    Timeout(u64),

    #[error("Not a git working copy: {0}")]
    NotARepository(PathBuf),

    #[error("Failed to run git: {0}")]
    Spawn(String),
}

impl GitError {
    /// Returns true if the error is likely transient and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitError::Network(_) | GitError::Timeout(_))
    }
}

/// Classifies a git stderr string into a more specific error variant.
pub fn classify_git_error(stderr: &str) -> GitError {
    let lower = stderr.to_lowercase();

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
        || lower.contains("failed to connect")
        || lower.contains("couldn't connect to server")
        || lower.contains("the remote end hung up unexpectedly")
    {
        return GitError::Network(stderr.trim().to_string());
    }

    if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("invalid credentials")
    {
        return GitError::AuthFailed(stderr.trim().to_string());
    }

    GitError::Operation(stderr.trim().to_string())
}

/// Errors surfaced by a [`crate::repository::ComponentRepository`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Component not found: {0}")]
    NotFound(String),

    #[error("Component already exists: {0}")]
    AlreadyExists(String),

    #[error("Repository backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source not found: {0}")]
    SourceNotFound(usize),

    #[error("Sync already running for source {0}")]
    AlreadyRunning(usize),

    #[error("Sync service already started")]
    AlreadyStarted,

    #[error("Fetcher for {expected} sources cannot fetch a {actual} source")]
    KindMismatch {
        expected: SourceKind,
        actual: SourceKind,
    },

    #[error("Source path does not exist: {0}")]
    SourceRootNotFound(PathBuf),

    #[error("Base path does not exist: {0}")]
    BasePathNotFound(PathBuf),

    #[error("Base path '{0}' must stay inside the source root")]
    InvalidBasePath(String),

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, CatalogSyncError>;
