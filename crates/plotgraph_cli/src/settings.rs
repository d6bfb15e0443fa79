// SPDX-License-Identifier: MIT OR Apache-2.0
//! Export settings, stored as RON next to the graphs.

use anyhow::{Context, Result};
use plotgraph_graph::graphs::plot::DEFAULT_TABLE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where and how exports are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Global Lua table the runtime reads
    pub lua_table: String,
    /// JSON export path, none to skip
    pub json_output: Option<PathBuf>,
    /// Lua export path, none to skip
    pub lua_output: Option<PathBuf>,
    /// Indent the JSON export
    pub pretty: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            lua_table: DEFAULT_TABLE.to_string(),
            json_output: Some(PathBuf::from("plot_export.json")),
            lua_output: Some(PathBuf::from("plot_export.lua")),
            pretty: true,
        }
    }
}

impl ExportSettings {
    /// Default settings file name
    pub const FILE_NAME: &'static str = "plotgraph.ron";

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let settings = ron::from_str(&content).with_context(|| format!("invalid settings in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Write settings as pretty RON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("failed to encode settings")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = ExportSettings::load(Path::new("/nonexistent/plotgraph.ron")).unwrap();
        assert_eq!(settings, ExportSettings::default());
        assert_eq!(settings.lua_table, "SysStoryData");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings: ExportSettings = ron::from_str("(lua_table: \"StoryData\", json_output: None)").unwrap();
        assert_eq!(settings.lua_table, "StoryData");
        assert_eq!(settings.json_output, None);
        assert_eq!(settings.lua_output, ExportSettings::default().lua_output);
        assert!(settings.pretty);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("plotgraph-settings-{}.ron", std::process::id()));
        let settings = ExportSettings {
            pretty: false,
            ..ExportSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(ExportSettings::load(&path).unwrap(), settings);
        std::fs::remove_file(&path).unwrap();
    }
}
