use serde::{Deserialize, Serialize};

/// A catalog entry derived from a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Stable identifier, unique across the catalog.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
}

impl Component {
    /// Creates a component whose id is derived from its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: component_id(&name),
            name,
            version: None,
            description: None,
            team: None,
            maintainers: Vec::new(),
        }
    }
}

/// Derives a component id from a name: lowercase, with every run of
/// characters other than letters, digits, `_` and `.` collapsed into `-`.
///
/// Letters and digits from any script are kept. A name with none of them
/// (such as `"---"`) is used trimmed as its own id.
pub fn component_id(name: &str) -> String {
    let trimmed = name.trim();
    let mut id = String::with_capacity(trimmed.len());
    let mut pending_dash = false;

    for c in trimmed.chars() {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            if pending_dash && !id.is_empty() {
                id.push('-');
            }
            pending_dash = false;
            id.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if id.is_empty() {
        return trimmed.to_string();
    }
    id
}
