//! Component manifests: discovery, parsing and projection to catalog entries.

pub mod discovery;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::component::{component_id, Component};
use crate::error::ManifestError;

pub use discovery::{discover_manifests, is_contained_base_path, MANIFEST_FILE_NAMES};

/// Ownership block of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owners {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
}

/// A parsed `manifest.yaml` / `manifest.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Explicit component id. Derived from `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub owners: Owners,
}

impl Manifest {
    /// Checks the manifest has everything a component needs.
    pub fn validate(&self, path: &Path) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::MissingName {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// The component id: the explicit `id` if set, otherwise derived from the name.
    pub fn component_id(&self) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => component_id(&self.name),
        }
    }

    pub fn to_component(&self) -> Component {
        Component {
            id: self.component_id(),
            name: self.name.trim().to_string(),
            version: self.version.clone(),
            description: self.description.clone(),
            team: self.owners.team.clone(),
            maintainers: self.owners.maintainers.clone(),
        }
    }
}

/// A manifest along with its path relative to the source root.
#[derive(Debug, Clone)]
pub struct ManifestWithPath {
    pub manifest: Manifest,
    pub path: PathBuf,
}

impl ManifestWithPath {
    pub fn new(manifest: Manifest, path: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            path: path.into(),
        }
    }
}

/// Parses and validates manifest YAML. `path` is only used in error messages.
pub fn parse_manifest(content: &str, path: &Path) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = serde_yaml::from_str(content).map_err(|e| ManifestError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    manifest.validate(path)?;
    Ok(manifest)
}

/// Reads and parses `root/relative_path`.
pub fn load_manifest(root: &Path, relative_path: &Path) -> Result<ManifestWithPath, ManifestError> {
    let full_path = root.join(relative_path);
    let content = fs::read_to_string(&full_path).map_err(|e| ManifestError::ReadFile {
        path: full_path.clone(),
        source: e,
    })?;

    let manifest = parse_manifest(&content, relative_path)?;
    Ok(ManifestWithPath::new(manifest, relative_path))
}
