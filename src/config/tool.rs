use crate::error::ConfigError;
use crate::schema_loader::{SchemaKind, load_document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// File name marking a tool directory.
pub const TOOL_DESCRIPTOR: &str = "tool.yml";

/// A validated `tool.yml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub tool: ToolMetadata,
    pub implementation: ImplementationConfig,
    pub parameters: Vec<ParameterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<ToolDocumentation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    pub name: String,
    pub label: String,
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub can_run_in_background: bool,
}

fn default_category() -> String {
    "General".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationConfig {
    /// Dotted path of the function that runs the tool, e.g. `pkg.buffer.execute`.
    pub execute_function: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    Required,
    Optional,
    Derived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterConfig {
    pub name: String,
    pub display_name: String,
    pub datatype: String,
    pub parameter_type: ParameterType,
    pub direction: Direction,
    pub index: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    /// Column definitions for `GPValueTable` parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Vec<ValidationCheck>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    Range,
    ValueList,
    File,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_filters: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    GreaterThan,
    LessThan,
    MinValue,
    MaxValue,
    OneOf,
    NotEmpty,
    Regex,
}

/// A runtime check attached to a parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    #[serde(rename = "type")]
    pub kind: CheckKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSyntax {
    pub dialog_explanation: String,
    pub scripting_explanation: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSample {
    pub title: String,
    pub description: String,
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDocumentation {
    pub summary: String,
    pub usage: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub credits: String,
    #[serde(default)]
    pub use_limitations: String,
    #[serde(default)]
    pub parameter_syntax: BTreeMap<String, ParameterSyntax>,
    #[serde(default)]
    pub code_samples: Vec<CodeSample>,
}

impl ToolConfig {
    /// Build a config from an already schema-checked value and run the
    /// semantic checks.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let config: ToolConfig = serde_json::from_value(value).map_err(|err| err.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Parameter indices must be exactly `0..n` with no duplicates.
    pub fn validate(&self) -> Result<(), String> {
        check_parameter_indices(&self.parameters)
    }

    /// Parameters sorted by their declared index.
    pub fn ordered_parameters(&self) -> Vec<&ParameterConfig> {
        let mut params: Vec<&ParameterConfig> = self.parameters.iter().collect();
        params.sort_by_key(|p| p.index);
        params
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterConfig> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

fn check_parameter_indices(parameters: &[ParameterConfig]) -> Result<(), String> {
    if parameters.is_empty() {
        return Ok(());
    }

    let mut seen: BTreeSet<u32> = BTreeSet::new();
    let mut duplicates: BTreeSet<u32> = BTreeSet::new();
    for param in parameters {
        if !seen.insert(param.index) {
            duplicates.insert(param.index);
        }
    }
    if !duplicates.is_empty() {
        return Err(format!(
            "Duplicate parameter indices found: {:?}",
            duplicates.into_iter().collect::<Vec<_>>()
        ));
    }

    let count = parameters.len() as u32;
    let expected: BTreeSet<u32> = (0..count).collect();
    if seen == expected {
        return Ok(());
    }

    let missing: Vec<u32> = expected.difference(&seen).copied().collect();
    let extra: Vec<u32> = seen.difference(&expected).copied().collect();
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Missing indices: {missing:?}"));
    }
    if !extra.is_empty() {
        parts.push(format!(
            "Invalid indices (should be 0-{}): {extra:?}",
            count - 1
        ));
    }
    Err(parts.join("; "))
}

/// Parse and validate a tool descriptor without checking where it lives.
///
/// Discovery uses this: a tool may sit in a directory whose name differs from
/// its declared `tool.name`.
pub fn parse_tool_config(path: &Path) -> Result<ToolConfig, ConfigError> {
    let value = load_document(path, SchemaKind::Tool)?;
    ToolConfig::from_value(value).map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })
}

/// Load a tool descriptor and require its name to match its location.
///
/// `<dir>/tool.yml` must declare `tool.name == <dir>`; a flat `<name>.yml`
/// must declare `tool.name == <name>`.
pub fn load_tool_config(path: &Path) -> Result<ToolConfig, ConfigError> {
    let config = parse_tool_config(path)?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let expected = if stem == "tool" {
        path.parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    } else {
        stem
    };

    if config.tool.name != expected {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            message: format!(
                "Tool name '{}' doesn't match expected '{}'",
                config.tool.name, expected
            ),
        });
    }
    Ok(config)
}
