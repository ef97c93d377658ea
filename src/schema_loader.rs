//! Embedded JSON Schemas for the catalog file and the tool / toolbox
//! descriptors.
//!
//! YAML documents are parsed into `serde_json::Value` first so a single
//! JSON Schema validator covers every file format we read. Schemas are
//! compiled once per process and reused; semantic checks that JSON Schema
//! cannot express (unique ids, contiguous indices) live next to the typed
//! models.

use crate::error::ConfigError;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    Catalog,
    Tool,
    Toolbox,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Catalog => "catalog",
            SchemaKind::Tool => "tool",
            SchemaKind::Toolbox => "toolbox",
        }
    }

    fn raw(&self) -> &'static str {
        match self {
            SchemaKind::Catalog => include_str!("../schema/catalog.schema.json"),
            SchemaKind::Tool => include_str!("../schema/tool.schema.json"),
            SchemaKind::Toolbox => include_str!("../schema/toolbox.schema.json"),
        }
    }

    fn cell(&self) -> &'static OnceLock<Result<JSONSchema, String>> {
        static CATALOG: OnceLock<Result<JSONSchema, String>> = OnceLock::new();
        static TOOL: OnceLock<Result<JSONSchema, String>> = OnceLock::new();
        static TOOLBOX: OnceLock<Result<JSONSchema, String>> = OnceLock::new();
        match self {
            SchemaKind::Catalog => &CATALOG,
            SchemaKind::Tool => &TOOL,
            SchemaKind::Toolbox => &TOOLBOX,
        }
    }
}

fn compile(kind: SchemaKind) -> Result<JSONSchema, String> {
    let raw: Value = serde_json::from_str(kind.raw())
        .map_err(|err| format!("parsing embedded {} schema: {err}", kind.as_str()))?;
    JSONSchema::compile(&raw)
        .map_err(|err| format!("compiling embedded {} schema: {err}", kind.as_str()))
}

fn compiled(kind: SchemaKind) -> Result<&'static JSONSchema, String> {
    kind.cell()
        .get_or_init(|| compile(kind))
        .as_ref()
        .map_err(Clone::clone)
}

/// Validate `instance` against the embedded schema for `kind`.
///
/// Returns every violation, each prefixed with its JSON pointer when the
/// failure is below the document root.
pub fn validate_value(kind: SchemaKind, instance: &Value) -> Result<(), Vec<String>> {
    let schema = compiled(kind).map_err(|err| vec![err])?;
    match schema.validate(instance) {
        Ok(()) => Ok(()),
        Err(errors) => Err(errors
            .map(|err| {
                let pointer = err.instance_path.to_string();
                if pointer.is_empty() {
                    err.to_string()
                } else {
                    format!("{pointer}: {err}")
                }
            })
            .collect()),
    }
}

/// Parse YAML text into a JSON value.
pub fn parse_yaml(text: &str, path: &Path) -> Result<Value, ConfigError> {
    serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a YAML document from disk and check it against the schema for `kind`.
pub fn load_document(path: &Path, kind: SchemaKind) -> Result<Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = parse_yaml(&text, path)?;
    validate_value(kind, &value).map_err(|errors| ConfigError::Schema {
        path: path.to_path_buf(),
        details: errors.join("\n"),
    })?;
    Ok(value)
}
