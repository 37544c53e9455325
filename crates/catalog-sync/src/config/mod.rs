pub mod loader;
pub mod source;

pub use loader::{config_path, load_config, load_config_from_str, ServiceConfig, CONFIG_PATH_ENV};
pub use source::{
    FilesystemSource, GitSource, IntervalValue, RawSourceConfig, SourceConfig, SourceKind,
    DEFAULT_BRANCH, DEFAULT_SYNC_INTERVAL,
};
