pub mod component;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod manifest;
pub mod repository;
pub mod sanitize;
pub mod sync;

pub use component::Component;
pub use config::{load_config, ServiceConfig, SourceConfig, SourceKind};
pub use error::{
    CatalogSyncError, ConfigError, GitError, ManifestError, RepositoryError, Result, SourceConfigError,
    SyncError,
};
pub use fetcher::{DefaultFetcherFactory, Fetcher, FetcherFactory, FilesystemFetcher, GitFetcher};
pub use logging::init_logging;
pub use manifest::{discover_manifests, Manifest};
pub use repository::{ComponentRepository, InMemoryRepository};
pub use sync::{SourceStatus, SyncEvent, SyncService, SyncStatus};
