/*!
# Configuration

`MutationSettings` controls how generated text is laid out and which generation id the reference
analyzer assigns. Settings, schema definitions and recipe files are read from TOML or YAML, chosen
by file extension.
*/

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::effects::GenerationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSettings {
    /// Indentation unit appended per nesting level of inserted nodes
    #[serde(default = "default_indent_unit")]
    pub indent_unit: String,

    /// Separate inserted multi-line top-level elements with a blank line
    #[serde(default = "default_true")]
    pub blank_line_around_top_level_blocks: bool,

    /// Generation assigned to every effect produced by the reference analyzer
    #[serde(default)]
    pub generation: u32,
}

fn default_indent_unit() -> String {
    "    ".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            indent_unit: default_indent_unit(),
            blank_line_around_top_level_blocks: true,
            generation: 0,
        }
    }
}

impl MutationSettings {
    pub fn generation_id(&self) -> GenerationId {
        GenerationId(self.generation)
    }

    /// Load settings from a `.toml`, `.yaml` or `.yml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Self = load_structured(path.as_ref(), "mutation settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize mutation settings to TOML")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write mutation settings to {}", path.as_ref().display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.indent_unit.is_empty() || !self.indent_unit.chars().all(|c| c == ' ' || c == '\t') {
            anyhow::bail!("indent_unit must be a non-empty run of spaces or tabs, got {:?}", self.indent_unit);
        }
        Ok(())
    }
}

/// Read a serde document from TOML or YAML depending on the file extension.
pub(crate) fn load_structured<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML {} from {}", what, path.display())),
        _ => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML {} from {}", what, path.display())),
    }
}
