use crate::{KeyShortcut, Modifier};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

/// Editor settings supplied by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Skip registering any global shortcut
    pub disable_shortcuts: bool,

    /// Modifier of the built-in rich-text shortcut
    pub cell_shortcut_modifier: Modifier,

    /// Inserts a stem cell after the active one, independent of constructors
    pub stem_shortcut: KeyShortcut,

    pub log_level: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            disable_shortcuts: false,
            cell_shortcut_modifier: Modifier::Primary,
            stem_shortcut: KeyShortcut::new([Modifier::Primary], "Enter"),
            log_level: "info".to_string(),
        }
    }
}

impl EditorConfig {
    /// Parse config from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse editor config")
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config from: {}", path.display()))
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create config file: {}", path.display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write config to: {}", path.display()))?;
        Ok(())
    }

    /// Log level for the tracing subscriber
    pub fn tracing_level(&self) -> Result<tracing::Level> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| anyhow!("Invalid log level: {}", self.log_level))
    }
}
