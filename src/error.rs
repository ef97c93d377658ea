//! Error types for the catalog, discovery and generator layers.
//!
//! Each layer owns one enum so callers can match on the failure kind (not
//! found, validation, conflict, external process) without parsing messages.
//! Binaries convert everything into `anyhow::Error` at the edge.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Problems reading or validating a tool / toolbox descriptor.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{} failed schema validation:\n{details}", path.display())]
    Schema { path: PathBuf, details: String },

    #[error("{}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Schema { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

/// A catalog model value broke one of its invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ModelError(pub String);

impl ModelError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog not found: {}", .0.display())]
    CatalogNotFound(PathBuf),

    #[error("{0}")]
    NotFound(String),

    #[error("catalog validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("no catalog to save")]
    NothingToSave,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("locking {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CatalogError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::CatalogNotFound(_) | CatalogError::NotFound(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::Conflict(_))
    }
}

impl From<ModelError> for CatalogError {
    fn from(err: ModelError) -> Self {
        CatalogError::Validation(err.0)
    }
}

/// Failures of the external `git` process.
///
/// Kept apart from validation errors: these usually succeed on retry once
/// auth or network is fixed.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git not found; install git and make sure it is on PATH")]
    NotInstalled,

    #[error("failed to {action} {target}: {stderr}")]
    CommandFailed {
        action: &'static str,
        target: String,
        stderr: String,
    },

    #[error("failed to run git: {0}")]
    Spawn(#[source] io::Error),

    #[error("git source '{0}' is missing url or local_path")]
    Misconfigured(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("source is disabled: {0}")]
    SourceDisabled(String),

    #[error("source path does not exist: {}", .0.display())]
    PathMissing(PathBuf),

    #[error("source '{id}' is misconfigured: {message}")]
    Misconfigured { id: String, message: String },

    #[error("cannot import toolbox '{alias}': {message}")]
    Import { alias: String, message: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Toolbox '{0}' not found in catalog")]
    ToolboxNotFound(String),

    #[error("{0}")]
    ToolNotFound(String),

    #[error("Failed to load tool config from {}: {source}", path.display())]
    ToolLoad {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("Cannot generate toolbox '{toolbox_id}':\n{}", errors.join("\n"))]
    Invalid {
        toolbox_id: String,
        errors: Vec<String>,
    },

    #[error("Failed to generate toolbox '{toolbox_id}': {source}")]
    Batch {
        toolbox_id: String,
        #[source]
        source: Box<GeneratorError>,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Failures while registering or running a tool.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("no function registered for '{function}' (tool '{tool}')")]
    UnknownFunction { tool: String, function: String },

    #[error("tool '{tool}' has no parameter '{name}'")]
    UnknownParameter { tool: String, name: String },

    #[error("{0}")]
    Validation(String),

    #[error("geoprocessing failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GeneratorError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_toolbox_lists_every_error() {
        let err = GeneratorError::Invalid {
            toolbox_id: "tb1".to_string(),
            errors: vec!["first".to_string(), "second".to_string()],
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with("Cannot generate toolbox 'tb1'"));
        assert!(rendered.contains("first\nsecond"));
    }

    #[test]
    fn batch_error_names_the_failing_toolbox() {
        let err = GeneratorError::Batch {
            toolbox_id: "tb2".to_string(),
            source: Box::new(GeneratorError::ToolboxNotFound("tb2".to_string())),
        };
        assert!(err.to_string().contains("Failed to generate toolbox 'tb2'"));
    }
}
