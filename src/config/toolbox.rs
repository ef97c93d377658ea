use crate::error::ConfigError;
use crate::schema_loader::{SchemaKind, load_document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// File name marking a toolbox directory.
pub const TOOLBOX_DESCRIPTOR: &str = "toolbox.yml";

/// A validated `toolbox.yml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolboxConfig {
    pub toolbox: ToolboxMetadata,
    #[serde(default)]
    pub tools: Vec<ToolboxToolEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<ToolboxDocumentation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolboxMetadata {
    pub label: String,
    /// ArcGIS alias: starts with a letter, letters and digits only.
    pub alias: String,
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A tool listed inside a standalone toolbox descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolboxToolEntry {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path of the tool's YAML, relative to the toolbox directory.
    pub config: String,
}

fn default_enabled() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolboxDocumentation {
    pub summary: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub credits: String,
    #[serde(default)]
    pub use_limitations: String,
}

impl ToolboxConfig {
    pub fn from_value(value: Value) -> Result<Self, String> {
        let mut config: ToolboxConfig =
            serde_json::from_value(value).map_err(|err| err.to_string())?;
        for entry in &mut config.tools {
            entry.config = entry.config.replace('\\', "/");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_alias(&self.toolbox.alias)?;

        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for entry in &self.tools {
            if !entry.config.ends_with(".yml") {
                return Err(format!("Config path must end with .yml: {}", entry.config));
            }
            if !seen.insert(entry.name.as_str()) {
                duplicates.insert(entry.name.as_str());
            }
        }
        if !duplicates.is_empty() {
            return Err(format!("Duplicate tool names found: {duplicates:?}"));
        }
        Ok(())
    }

    pub fn enabled_tools(&self) -> impl Iterator<Item = &ToolboxToolEntry> {
        self.tools.iter().filter(|t| t.enabled)
    }
}

/// Check an ArcGIS toolbox alias.
pub fn validate_alias(alias: &str) -> Result<(), String> {
    let Some(first) = alias.chars().next() else {
        return Err("Alias cannot be empty".to_string());
    };
    if !first.is_ascii_alphabetic() {
        return Err(format!("Alias must start with a letter, got '{alias}'"));
    }
    if !alias.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!(
            "Alias can only contain letters and numbers, got '{alias}'"
        ));
    }
    Ok(())
}

/// Load and validate a toolbox descriptor file.
pub fn load_toolbox_config(path: &Path) -> Result<ToolboxConfig, ConfigError> {
    let value = load_document(path, SchemaKind::Toolbox)?;
    ToolboxConfig::from_value(value).map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })
}
