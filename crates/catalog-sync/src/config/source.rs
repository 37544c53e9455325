//! Sync source definitions.
//!
//! A source is either a git repository or a local directory. The wire form
//! ([`RawSourceConfig`]) is a flat map with a `kind` discriminator; it is
//! validated into the [`SourceConfig`] sum type, which is what the rest of
//! the crate consumes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SourceConfigError;
use crate::sanitize::redact_repo_url;

/// Interval used when a source does not set one (or sets it to zero).
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Branch used when a git source does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// The kind of a sync source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Git,
    Filesystem,
}

impl SourceKind {
    /// Returns all source kinds.
    pub fn all() -> &'static [SourceKind] {
        &[SourceKind::Git, SourceKind::Filesystem]
    }

    /// Shortest poll interval accepted for this kind.
    pub fn min_interval(&self) -> Duration {
        match self {
            SourceKind::Git => Duration::from_secs(10),
            SourceKind::Filesystem => Duration::from_secs(1),
        }
    }

    /// Interval applied when the source leaves it unset.
    pub fn default_interval(&self) -> Duration {
        match self {
            SourceKind::Git => DEFAULT_SYNC_INTERVAL,
            SourceKind::Filesystem => DEFAULT_SYNC_INTERVAL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Git => "git",
            SourceKind::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = SourceConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(SourceKind::Git),
            "filesystem" => Ok(SourceKind::Filesystem),
            _ => Err(SourceConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// An interval as written in configuration: plain seconds or a suffixed string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntervalValue {
    Seconds(u64),
    Text(String),
}

impl IntervalValue {
    pub fn to_duration(&self) -> Result<Duration, SourceConfigError> {
        match self {
            IntervalValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            IntervalValue::Text(text) => parse_interval(text),
        }
    }
}

impl From<Duration> for IntervalValue {
    fn from(duration: Duration) -> Self {
        IntervalValue::Text(format_interval(duration))
    }
}

/// Parses `"90"`, `"500ms"`, `"30s"`, `"5m"` or `"1h"` into a duration.
pub fn parse_interval(text: &str) -> Result<Duration, SourceConfigError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Duration::ZERO);
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: u64 = number
        .parse()
        .map_err(|_| SourceConfigError::InvalidInterval(text.to_string()))?;

    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        _ => return Err(SourceConfigError::InvalidInterval(text.to_string())),
    };

    Ok(duration)
}

/// Formats a duration in the largest unit that represents it exactly.
pub fn format_interval(duration: Duration) -> String {
    if duration.subsec_nanos() != 0 {
        return format!("{}ms", duration.as_millis());
    }

    let secs = duration.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Unvalidated source definition as it appears in configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceConfig {
    /// Source kind: `git` or `filesystem`.
    #[serde(default, alias = "type")]
    pub kind: String,

    /// Poll interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<IntervalValue>,

    /// Optional sub-path that restricts manifest discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    /// Git repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Git branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Local directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A git repository source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub branch: String,
    pub interval: Duration,
    pub base_path: Option<String>,
}

/// A local directory source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemSource {
    pub path: String,
    pub interval: Duration,
    pub base_path: Option<String>,
}

/// A validated sync source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSourceConfig", into = "RawSourceConfig")]
pub enum SourceConfig {
    Git(GitSource),
    Filesystem(FilesystemSource),
}

impl SourceConfig {
    /// Validates a raw definition, filling in defaults.
    pub fn validate(raw: RawSourceConfig) -> Result<Self, SourceConfigError> {
        let kind: SourceKind = raw.kind.parse()?;

        let interval = match &raw.interval {
            Some(value) => value.to_duration()?,
            None => Duration::ZERO,
        };
        let interval = if interval.is_zero() {
            kind.default_interval()
        } else if interval < kind.min_interval() {
            return Err(SourceConfigError::IntervalTooShort {
                kind,
                interval,
                minimum: kind.min_interval(),
            });
        } else {
            interval
        };

        match kind {
            SourceKind::Git => {
                let url = non_empty(raw.url).ok_or(SourceConfigError::MissingField {
                    kind,
                    field: "url",
                })?;
                let branch = non_empty(raw.branch).unwrap_or_else(|| DEFAULT_BRANCH.to_string());

                Ok(SourceConfig::Git(GitSource {
                    url,
                    branch,
                    interval,
                    base_path: raw.base_path,
                }))
            }
            SourceKind::Filesystem => {
                let path = non_empty(raw.path).ok_or(SourceConfigError::MissingField {
                    kind,
                    field: "path",
                })?;

                Ok(SourceConfig::Filesystem(FilesystemSource {
                    path,
                    interval,
                    base_path: raw.base_path,
                }))
            }
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Git(_) => SourceKind::Git,
            SourceConfig::Filesystem(_) => SourceKind::Filesystem,
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            SourceConfig::Git(git) => git.interval,
            SourceConfig::Filesystem(fs) => fs.interval,
        }
    }

    /// The interval the periodic loop runs at.
    ///
    /// Validated configs always carry a non-zero interval; the fallback only
    /// matters for values built by hand.
    pub fn effective_interval(&self) -> Duration {
        let interval = self.interval();
        if !interval.is_zero() {
            return interval;
        }
        let default = self.kind().default_interval();
        if default.is_zero() {
            DEFAULT_SYNC_INTERVAL
        } else {
            default
        }
    }

    pub fn base_path(&self) -> Option<&str> {
        match self {
            SourceConfig::Git(git) => git.base_path.as_deref(),
            SourceConfig::Filesystem(fs) => fs.base_path.as_deref(),
        }
    }

    /// Short human-readable description, safe for logs.
    pub fn describe(&self) -> String {
        match self {
            SourceConfig::Git(git) => {
                format!("git {}@{}", redact_repo_url(&git.url), git.branch)
            }
            SourceConfig::Filesystem(fs) => format!("filesystem {}", fs.path),
        }
    }

    /// Converts back to the wire form.
    pub fn to_raw(&self) -> RawSourceConfig {
        match self {
            SourceConfig::Git(git) => RawSourceConfig {
                kind: SourceKind::Git.to_string(),
                interval: Some(git.interval.into()),
                base_path: git.base_path.clone(),
                url: Some(git.url.clone()),
                branch: Some(git.branch.clone()),
                path: None,
            },
            SourceConfig::Filesystem(fs) => RawSourceConfig {
                kind: SourceKind::Filesystem.to_string(),
                interval: Some(fs.interval.into()),
                base_path: fs.base_path.clone(),
                url: None,
                branch: None,
                path: Some(fs.path.clone()),
            },
        }
    }
}

impl TryFrom<RawSourceConfig> for SourceConfig {
    type Error = SourceConfigError;

    fn try_from(raw: RawSourceConfig) -> Result<Self, Self::Error> {
        SourceConfig::validate(raw)
    }
}

impl From<SourceConfig> for RawSourceConfig {
    fn from(source: SourceConfig) -> Self {
        source.to_raw()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
