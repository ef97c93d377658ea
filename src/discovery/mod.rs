//! Source scanning.
//!
//! A scan prepares the source (checks the directory, or clones / pulls the
//! git mirror), walks it for `tool.yml` and `toolbox.yml`, and writes the
//! tool count and sync time back to the catalog. Broken descriptors never
//! fail a scan; each one becomes a `ScanWarning`.

pub mod git;
pub mod walker;

use crate::catalog::identity::normalize_tool_path;
use crate::catalog::model::{Source, SourceLocation, SourceUpdate, ToolReference, Toolbox};
use crate::catalog::service::CatalogService;
use crate::config::{
    TOOL_DESCRIPTOR, ToolConfig, ToolboxConfig, load_toolbox_config, parse_tool_config,
};
use crate::error::{ConfigError, DiscoveryError, GitError};
use chrono::Utc;
use git::{CommandRunner, GitClient, SystemRunner};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walker::{DescriptorKind, DescriptorWalker};

pub use git::CommandOutput;
pub use walker::DescriptorCandidate;

/// A valid `tool.yml` found during a scan.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveredTool {
    /// `tool.name` from the descriptor.
    pub id: String,
    /// `tool.label` from the descriptor.
    pub name: String,
    /// Absolute directory holding the descriptor.
    pub path: PathBuf,
    /// Directory relative to the source root, slash separated; the value a
    /// `ToolReference` uses.
    pub tool_path: String,
    pub config: ToolConfig,
    pub source_id: String,
}

/// A valid `toolbox.yml` found during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredToolbox {
    /// The descriptor's alias.
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    /// Directory relative to the source root.
    pub toolbox_path: String,
    pub config: ToolboxConfig,
    pub source_id: String,
}

/// A descriptor skipped during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOutcome {
    pub tools: Vec<DiscoveredTool>,
    pub toolboxes: Vec<DiscoveredToolbox>,
    pub warnings: Vec<ScanWarning>,
}

pub struct DiscoveryService<'a> {
    catalog: &'a CatalogService,
    runner: Box<dyn CommandRunner + 'a>,
}

impl<'a> DiscoveryService<'a> {
    pub fn new(catalog: &'a CatalogService) -> Self {
        Self::with_runner(catalog, SystemRunner)
    }

    /// Use `runner` for git commands instead of spawning `git`.
    pub fn with_runner(catalog: &'a CatalogService, runner: impl CommandRunner + 'a) -> Self {
        Self {
            catalog,
            runner: Box::new(runner),
        }
    }

    pub fn scan_source(&self, source_id: &str) -> Result<ScanOutcome, DiscoveryError> {
        let catalog = self.catalog.load()?;
        let source = catalog
            .source(source_id)
            .ok_or_else(|| DiscoveryError::SourceNotFound(source_id.to_string()))?;
        if !source.enabled {
            return Err(DiscoveryError::SourceDisabled(source_id.to_string()));
        }

        let root = match self.prepare(source) {
            Ok(root) => root,
            Err(err) => {
                self.record_failure(source_id, &err);
                return Err(err);
            }
        };

        let outcome = scan_directory(&root, source_id);
        info!(
            source = source_id,
            tools = outcome.tools.len(),
            toolboxes = outcome.toolboxes.len(),
            skipped = outcome.warnings.len(),
            "scanned source"
        );

        self.catalog.update_source(
            source_id,
            SourceUpdate {
                discovered_tools: Some(outcome.tools.len() as u64),
                last_sync: Some(Some(Utc::now())),
                last_error: Some(None),
                ..SourceUpdate::default()
            },
        )?;
        Ok(outcome)
    }

    /// Scan every enabled source. A source that fails is logged and maps to
    /// an empty outcome.
    pub fn scan_all_sources(&self) -> Result<BTreeMap<String, ScanOutcome>, DiscoveryError> {
        let catalog = self.catalog.load()?;
        let mut results = BTreeMap::new();
        for source in catalog.enabled_sources() {
            let outcome = match self.scan_source(&source.id) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(source = %source.id, error = %err, "failed to scan source");
                    ScanOutcome::default()
                }
            };
            results.insert(source.id.clone(), outcome);
        }
        Ok(results)
    }

    fn prepare(&self, source: &Source) -> Result<PathBuf, DiscoveryError> {
        let location = source
            .location()
            .map_err(|err| DiscoveryError::Misconfigured {
                id: source.id.clone(),
                message: err.0,
            })?;
        match location {
            SourceLocation::Directory(path) => {
                if path.is_dir() {
                    Ok(path.to_path_buf())
                } else {
                    Err(DiscoveryError::PathMissing(path.to_path_buf()))
                }
            }
            SourceLocation::Git {
                url,
                branch,
                local_path,
            } => {
                let local_path =
                    local_path.ok_or_else(|| GitError::Misconfigured(source.id.clone()))?;
                GitClient::new(self.runner.as_ref()).sync(url, branch, local_path)?;
                Ok(local_path.to_path_buf())
            }
        }
    }

    fn record_failure(&self, source_id: &str, err: &DiscoveryError) {
        let update = SourceUpdate {
            last_error: Some(Some(err.to_string())),
            ..SourceUpdate::default()
        };
        if let Err(save_err) = self.catalog.update_source(source_id, update) {
            warn!(source = source_id, error = %save_err, "could not record scan failure");
        }
    }

    pub fn validate_tool_config(&self, path: &Path) -> (bool, Option<String>) {
        into_verdict(parse_tool_config(path))
    }

    pub fn validate_toolbox_config(&self, path: &Path) -> (bool, Option<String>) {
        into_verdict(load_toolbox_config(path))
    }

    /// Add a catalog toolbox built from a discovered `toolbox.yml`.
    ///
    /// Each `tools[].config` entry must point at a `tool.yml` inside the same
    /// source; it becomes a reference to that tool's directory, keeping the
    /// entry's enabled flag.
    pub fn import_toolbox(
        &self,
        discovered: &DiscoveredToolbox,
        output_path: impl Into<PathBuf>,
    ) -> Result<Toolbox, DiscoveryError> {
        let import_err = |message: String| DiscoveryError::Import {
            alias: discovered.id.clone(),
            message,
        };

        let meta = &discovered.config.toolbox;
        let mut toolbox = Toolbox::new(meta.alias.to_ascii_lowercase(), &meta.label, output_path);
        toolbox.description = Some(meta.description.clone()).filter(|d| !d.is_empty());
        let now = Utc::now();
        toolbox.created = Some(now);
        toolbox.modified = Some(now);

        for entry in &discovered.config.tools {
            let joined = format!("{}/{}", discovered.toolbox_path, entry.config);
            let config_path = resolve_relative(&joined).ok_or_else(|| {
                import_err(format!(
                    "tool '{}' points outside the source: {}",
                    entry.name, entry.config
                ))
            })?;
            let tool_dir = match config_path.rsplit_once('/') {
                Some((dir, TOOL_DESCRIPTOR)) => dir,
                _ => {
                    return Err(import_err(format!(
                        "tool '{}' must point at a {TOOL_DESCRIPTOR} below the source root, got {}",
                        entry.name, entry.config
                    )));
                }
            };
            let mut reference = ToolReference::new(&discovered.source_id, tool_dir);
            reference.enabled = entry.enabled;
            if toolbox
                .position_of(&reference.source_id, &reference.tool_path)
                .is_none()
            {
                toolbox.tools.push(reference);
            }
        }

        let toolbox = self.catalog.insert_toolbox(toolbox)?;
        info!(
            toolbox = %toolbox.id,
            tools = toolbox.tools.len(),
            "imported toolbox descriptor"
        );
        Ok(toolbox)
    }
}

/// Walk `root` and collect every valid descriptor.
pub fn scan_directory(root: &Path, source_id: &str) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    for candidate in DescriptorWalker::new(root).candidates() {
        let dir = candidate.directory().to_path_buf();
        let relative = relative_slash_path(root, &dir);
        match candidate.kind {
            DescriptorKind::Tool => match parse_tool_config(&candidate.path) {
                Ok(config) => outcome.tools.push(DiscoveredTool {
                    id: config.tool.name.clone(),
                    name: config.tool.label.clone(),
                    path: dir,
                    tool_path: relative,
                    config,
                    source_id: source_id.to_string(),
                }),
                Err(err) => skip(&mut outcome, &candidate, err),
            },
            DescriptorKind::Toolbox => match load_toolbox_config(&candidate.path) {
                Ok(config) => outcome.toolboxes.push(DiscoveredToolbox {
                    id: config.toolbox.alias.clone(),
                    name: config.toolbox.label.clone(),
                    path: dir,
                    toolbox_path: relative,
                    config,
                    source_id: source_id.to_string(),
                }),
                Err(err) => skip(&mut outcome, &candidate, err),
            },
        }
    }
    outcome
}

fn skip(outcome: &mut ScanOutcome, candidate: &DescriptorCandidate, err: ConfigError) {
    warn!(path = %candidate.path.display(), error = %err, "skipping invalid descriptor");
    outcome.warnings.push(ScanWarning {
        path: candidate.path.clone(),
        message: err.to_string(),
    });
}

fn into_verdict<T>(result: Result<T, ConfigError>) -> (bool, Option<String>) {
    match result {
        Ok(_) => (true, None),
        Err(err) => (false, Some(err.to_string())),
    }
}

fn relative_slash_path(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    normalize_tool_path(&parts.join("/"))
}

/// Resolve `..` in a slash path; `None` when it climbs above the start.
fn resolve_relative(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_parent_segments() {
        assert_eq!(
            resolve_relative("boxes/main/../../tools/buf/tool.yml").as_deref(),
            Some("tools/buf/tool.yml")
        );
        assert_eq!(resolve_relative("boxes/../../x").as_deref(), None);
        assert_eq!(resolve_relative("/tools/./buf").as_deref(), Some("tools/buf"));
    }

    #[test]
    fn relative_slash_path_of_root_is_empty() {
        let root = Path::new("/data/src");
        assert_eq!(relative_slash_path(root, root), "");
        assert_eq!(
            relative_slash_path(root, &root.join("tools").join("buf")),
            "tools/buf"
        );
    }
}
