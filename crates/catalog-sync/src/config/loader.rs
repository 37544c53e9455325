use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::source::{RawSourceConfig, SourceConfig};
use crate::error::ConfigError;

/// Environment variable naming the service configuration file.
pub const CONFIG_PATH_ENV: &str = "CATALOG_SYNC_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "catalog-sync.yaml";

/// Validated service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Directory holding git working copies. `None` means the platform cache dir.
    pub work_dir: Option<PathBuf>,
    /// Configured sources, in file order. The position is the source's id.
    pub sources: Vec<SourceConfig>,
}

impl ServiceConfig {
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self {
            work_dir: None,
            sources,
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    /// Resolved directory for git working copies.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(default_work_dir)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServiceConfig {
    #[serde(default)]
    work_dir: Option<PathBuf>,
    #[serde(default)]
    sources: Vec<RawSourceConfig>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, path)
}

/// Parses and validates configuration. `path` is only used in error messages.
pub fn load_config_from_str(content: &str, path: &Path) -> Result<ServiceConfig, ConfigError> {
    let raw: RawServiceConfig =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let sources = raw
        .sources
        .into_iter()
        .enumerate()
        .map(|(index, source)| {
            SourceConfig::validate(source)
                .map_err(|source| ConfigError::InvalidSource { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "Loaded {} source(s) from {}",
        sources.len(),
        path.display()
    );

    Ok(ServiceConfig {
        work_dir: raw.work_dir,
        sources,
    })
}

/// Config file location: `$CATALOG_SYNC_CONFIG`, else `./catalog-sync.yaml`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Returns `<cache dir>/catalog-sync/repos`, or a temp-dir equivalent.
pub fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("catalog-sync")
        .join("repos")
}
