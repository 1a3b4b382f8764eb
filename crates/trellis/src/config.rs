//! View configuration loaded from TOML.
//!
//! ```
//! use trellis::config::ViewConfig;
//! use trellis::model::SelectionMode;
//!
//! let config = ViewConfig::from_toml_str(r#"
//! selection_mode = "multiple"
//! visible_cells = 40
//! "#).unwrap();
//!
//! assert_eq!(config.selection_mode, SelectionMode::Multiple);
//! assert_eq!(config.visible_cells, 40);
//! assert!(config.editable);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use trellis_core::logging::targets;
use trellis_core::{Result, TrellisError};

use crate::model::SelectionMode;

/// Settings of a table, list or tree view. Missing keys take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Single or multiple selection.
    pub selection_mode: SelectionMode,
    /// Track selection per (row, column) instead of per row.
    pub cell_selection_enabled: bool,
    /// Allow cells to enter edit mode.
    pub editable: bool,
    /// Number of cells a pool creates (see `CellPool::with_config`).
    pub visible_cells: usize,
    /// Defer value updates of bound cells to the next layout pass.
    pub lazy_item_updates: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::Single,
            cell_selection_enabled: false,
            editable: true,
            visible_cells: 32,
            lazy_item_updates: false,
        }
    }
}

impl ViewConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| TrellisError::Config(err.to_string()))
    }

    /// Reads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| TrellisError::Config(format!("{}: {err}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(target: targets::CONFIG, path = %path.display(), ?config, "loaded view config");
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| TrellisError::Config(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ViewConfig::from_toml_str("").unwrap(), ViewConfig::default());
    }

    #[test]
    fn test_roundtrip_through_text() {
        let config = ViewConfig {
            selection_mode: SelectionMode::Multiple,
            cell_selection_enabled: true,
            editable: false,
            visible_cells: 12,
            lazy_item_updates: true,
        };
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("selection_mode = \"multiple\""));
        assert_eq!(ViewConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_mode_is_config_error() {
        let err = ViewConfig::from_toml_str("selection_mode = \"some\"").unwrap_err();
        assert!(matches!(err, TrellisError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ViewConfig::load("/nonexistent/trellis.toml").unwrap_err();
        assert!(matches!(err, TrellisError::Config(msg) if msg.contains("trellis.toml")));
    }
}
