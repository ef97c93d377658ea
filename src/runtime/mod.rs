//! Tool dispatch for generated toolboxes.
//!
//! A `ToolRegistry` maps tool names to their loaded config plus the function
//! that runs them. Functions are looked up by the descriptor's
//! `implementation.executeFunction` string in a `FunctionTable`. Running a
//! tool validates its parameters first, then calls the function with the
//! values, a message sink and the geoprocessing backend.

pub mod backend;
pub mod checks;

use crate::config::{
    TOOLBOX_DESCRIPTOR, ToolConfig, ToolboxConfig, load_tool_config, load_toolbox_config,
};
use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub use backend::{BufferRequest, DatasetDescription, GeoprocessingBackend, SpatialReference};
pub use checks::{validate_all_parameters, validate_parameter};

/// Stand-in for values the host did not send.
pub(crate) static NULL_VALUE: ParameterValue = ParameterValue::Null;

/// A parameter value as handed over by the host application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ParameterValue>),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Null, false, zero, blank text and empty lists are empty.
    pub fn is_empty(&self) -> bool {
        match self {
            ParameterValue::Null => true,
            ParameterValue::Bool(b) => !b,
            ParameterValue::Number(n) => *n == 0.0,
            ParameterValue::Text(s) => s.trim().is_empty(),
            ParameterValue::List(items) => items.is_empty(),
        }
    }

    /// Compare against a JSON value from a descriptor; numbers compare
    /// numerically.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (ParameterValue::Null, Value::Null) => true,
            (ParameterValue::Bool(a), Value::Bool(b)) => a == b,
            (ParameterValue::Number(a), Value::Number(b)) => b.as_f64() == Some(*a),
            (ParameterValue::Text(a), Value::String(b)) => a == b,
            (ParameterValue::List(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            _ => false,
        }
    }
}

impl From<&Value> for ParameterValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ParameterValue::Null,
            Value::Bool(b) => ParameterValue::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(ParameterValue::Null, ParameterValue::Number),
            Value::String(s) => ParameterValue::Text(s.clone()),
            Value::Array(items) => ParameterValue::List(items.iter().map(Self::from).collect()),
            Value::Object(_) => ParameterValue::Text(value.to_string()),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Null => write!(f, "None"),
            ParameterValue::Bool(b) => write!(f, "{b}"),
            ParameterValue::Number(n) => write!(f, "{n}"),
            ParameterValue::Text(s) => write!(f, "{s}"),
            ParameterValue::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Where tools report progress; the host's message window in production.
pub trait MessageSink {
    fn message(&mut self, text: &str);
    fn warning(&mut self, text: &str);
    fn error(&mut self, text: &str);
}

/// A sink that keeps everything, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Messages {
    pub entries: Vec<(MessageLevel, String)>,
}

impl Messages {
    pub fn texts(&self, level: MessageLevel) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(l, _)| *l == level)
            .map(|(_, text)| text.as_str())
    }
}

impl MessageSink for Messages {
    fn message(&mut self, text: &str) {
        self.entries.push((MessageLevel::Info, text.to_string()));
    }

    fn warning(&mut self, text: &str) {
        self.entries.push((MessageLevel::Warning, text.to_string()));
    }

    fn error(&mut self, text: &str) {
        self.entries.push((MessageLevel::Error, text.to_string()));
    }
}

/// Parameter values of one run, addressable by name through the config.
pub struct Invocation<'a> {
    config: &'a ToolConfig,
    values: &'a [ParameterValue],
}

impl<'a> Invocation<'a> {
    pub fn new(config: &'a ToolConfig, values: &'a [ParameterValue]) -> Self {
        Self { config, values }
    }

    pub fn config(&self) -> &'a ToolConfig {
        self.config
    }

    /// Value of the named parameter; null when the host sent fewer values.
    pub fn value(&self, name: &str) -> Result<&'a ParameterValue, RuntimeError> {
        let param = self
            .config
            .parameter(name)
            .ok_or_else(|| RuntimeError::UnknownParameter {
                tool: self.config.tool.name.clone(),
                name: name.to_string(),
            })?;
        Ok(self
            .values
            .get(param.index as usize)
            .unwrap_or(&NULL_VALUE))
    }

    pub fn text(&self, name: &str) -> Result<&'a str, RuntimeError> {
        self.value(name)?.as_str().ok_or_else(|| {
            RuntimeError::Validation(format!("parameter '{name}' must be text"))
        })
    }

    pub fn number(&self, name: &str) -> Result<f64, RuntimeError> {
        self.value(name)?.as_f64().ok_or_else(|| {
            RuntimeError::Validation(format!("parameter '{name}' must be a number"))
        })
    }
}

pub type ExecuteFn = Arc<
    dyn Fn(&Invocation<'_>, &mut dyn MessageSink, &dyn GeoprocessingBackend) -> Result<(), RuntimeError>
        + Send
        + Sync,
>;

/// `executeFunction` string to function.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: BTreeMap<String, ExecuteFn>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&Invocation<'_>, &mut dyn MessageSink, &dyn GeoprocessingBackend) -> Result<(), RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<ExecuteFn> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.functions.keys()).finish()
    }
}

/// A tool's config bound to the function that runs it.
#[derive(Clone)]
pub struct ToolRuntime {
    pub config: ToolConfig,
    pub execute: ExecuteFn,
}

impl ToolRuntime {
    /// Validate parameters, then execute. Failures are also reported to the
    /// sink as errors.
    pub fn run(
        &self,
        values: &[ParameterValue],
        messages: &mut dyn MessageSink,
        backend: &dyn GeoprocessingBackend,
    ) -> Result<(), RuntimeError> {
        let result = validate_all_parameters(&self.config, values)
            .and_then(|()| (self.execute)(&Invocation::new(&self.config, values), messages, backend));
        if let Err(err) = &result {
            messages.error(&format!("Error in {}: {err}", self.config.tool.label));
        }
        result
    }
}

impl fmt::Debug for ToolRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRuntime")
            .field("tool", &self.config.tool.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolRuntime>,
}

/// A standalone toolbox descriptor loaded into a registry.
#[derive(Debug)]
pub struct LoadedToolbox {
    pub config: ToolboxConfig,
    pub registry: ToolRegistry,
    /// One entry per tool that was skipped.
    pub warnings: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, config: ToolConfig, execute: ExecuteFn) -> Result<(), RuntimeError> {
        let name = config.tool.name.clone();
        if self.tools.contains_key(&name) {
            return Err(RuntimeError::DuplicateTool(name));
        }
        self.tools.insert(name, ToolRuntime { config, execute });
        Ok(())
    }

    /// Bind `config` to the function its `executeFunction` names.
    pub fn register_from_table(
        &mut self,
        config: ToolConfig,
        functions: &FunctionTable,
    ) -> Result<(), RuntimeError> {
        let function = &config.implementation.execute_function;
        let execute = functions
            .get(function)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                tool: config.tool.name.clone(),
                function: function.clone(),
            })?;
        self.register(config, execute)
    }

    pub fn get(&self, name: &str) -> Option<&ToolRuntime> {
        self.tools.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn run(
        &self,
        name: &str,
        values: &[ParameterValue],
        messages: &mut dyn MessageSink,
        backend: &dyn GeoprocessingBackend,
    ) -> Result<(), RuntimeError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownTool(name.to_string()))?;
        debug!(tool = name, "running tool");
        tool.run(values, messages, backend)
    }

    /// Load `<dir>/toolbox.yml` and register each enabled tool. Tools whose
    /// config fails to load or whose function is unknown are skipped with a
    /// warning; a broken toolbox descriptor is an error.
    pub fn from_toolbox_dir(
        dir: &Path,
        functions: &FunctionTable,
    ) -> Result<LoadedToolbox, RuntimeError> {
        let config = load_toolbox_config(&dir.join(TOOLBOX_DESCRIPTOR))?;
        let mut registry = ToolRegistry::new();
        let mut warnings = Vec::new();

        for entry in config.enabled_tools() {
            let path = dir.join(&entry.config);
            let registered = load_tool_config(&path)
                .map_err(RuntimeError::from)
                .and_then(|tool| registry.register_from_table(tool, functions));
            if let Err(err) = registered {
                warn!(tool = %entry.name, error = %err, "skipping tool");
                warnings.push(format!("{}: {err}", entry.name));
            }
        }

        Ok(LoadedToolbox {
            config,
            registry,
            warnings,
        })
    }
}
