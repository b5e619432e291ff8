//! Generator Configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config
//! describing a WordprocessingML document.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default)]
    pub structure: StructureNames,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Element names that give a tree its loop structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureNames {
    /// Element that always wraps runs of text (a paragraph)
    #[serde(default = "default_block")]
    pub block: String,
    #[serde(default = "default_cell")]
    pub cell: String,
    #[serde(default = "default_row")]
    pub row: String,
    /// Only text directly inside this element is scanned. `None` scans all text.
    #[serde(default = "default_text_container")]
    pub text_container: Option<String>,
}

fn default_block() -> String { "w:p".to_string() }
fn default_cell() -> String { "w:tc".to_string() }
fn default_row() -> String { "w:tr".to_string() }
fn default_text_container() -> Option<String> { Some("w:t".to_string()) }

impl Default for StructureNames {
    fn default() -> Self {
        Self {
            block: default_block(),
            cell: default_cell(),
            row: default_row(),
            text_container: default_text_container(),
        }
    }
}

impl StructureNames {
    /// Structure for plain HTML-like trees: `p`, `td`, `tr`, any text node
    pub fn html() -> Self {
        Self {
            block: "p".to_string(),
            cell: "td".to_string(),
            row: "tr".to_string(),
            text_container: None,
        }
    }
}

/// What a batch does with an item that fails to render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the batch, no archive is written
    #[default]
    Abort,
    /// Leave the item out of the archive and continue
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_binary() -> String { "soffice".to_string() }
fn default_format() -> String { "pdf".to_string() }

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: default_binary(),
            format: default_format(),
        }
    }
}
