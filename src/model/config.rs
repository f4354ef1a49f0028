use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::state::Theme;

/// Configuration from pinlist.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub view: ViewOptions,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Keep a local cache (`local.json`) in the data directory
    #[serde(default = "default_true")]
    pub local: bool,
    /// Path of the synchronized store file, if any. Relative paths resolve
    /// against the data directory.
    #[serde(default)]
    pub sync: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            local: true,
            sync: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// How tasks are grouped for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Category,
    None,
}

/// Presentation flags for the view model. The state and mutation contract
/// is the same for every combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptions {
    #[serde(default)]
    pub group_by: GroupBy,
    /// Rank high → medium → low after the done/not-done split
    #[serde(default)]
    pub sort_by_priority: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Overrides the detected system theme preference
    #[serde(default)]
    pub theme: Option<Theme>,
}
