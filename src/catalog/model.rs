//! Catalog file types.
//!
//! Field order here is the order written to disk; `None` values are omitted.

use crate::catalog::identity::{normalize_tool_path, validate_slug};
use crate::error::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BRANCH: &str = "main";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Git,
    Local,
    Network,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Git => "git",
            SourceType::Local => "local",
            SourceType::Network => "network",
        }
    }
}

impl TryFrom<&str> for SourceType {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, ModelError> {
        match value {
            "git" => Ok(SourceType::Git),
            "local" => Ok(SourceType::Local),
            "network" => Ok(SourceType::Network),
            other => Err(ModelError::new(format!("Unknown source type: {other}"))),
        }
    }
}

fn yes() -> bool {
    true
}

fn default_branch() -> Option<String> {
    Some(DEFAULT_BRANCH.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<PathBuf>,
    #[serde(default = "yes")]
    pub auto_create_workspace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arcgis_pro_path: Option<PathBuf>,
    /// Conda environment name, e.g. `arcgispro-py3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_env: Option<String>,
    #[serde(default = "yes")]
    pub auto_sync: bool,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            workspace_path: None,
            auto_create_workspace: true,
            arcgis_pro_path: None,
            python_env: None,
            auto_sync: true,
        }
    }
}

/// Where tools come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_branch", skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Mirror directory for git sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub discovered_tools: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Typed view of a source's location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceLocation<'a> {
    Directory(&'a Path),
    Git {
        url: &'a str,
        branch: &'a str,
        local_path: Option<&'a Path>,
    },
}

impl Source {
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_slug("source", &self.id)?;
        if self.name.trim().is_empty() {
            return Err(ModelError::new(format!("source '{}' has an empty name", self.id)));
        }
        self.location().map(|_| ())
    }

    /// Fails when the field required by the source type is missing.
    pub fn location(&self) -> Result<SourceLocation<'_>, ModelError> {
        match self.kind {
            SourceType::Git => match self.url.as_deref() {
                Some(url) if !url.is_empty() => Ok(SourceLocation::Git {
                    url,
                    branch: self.branch.as_deref().unwrap_or(DEFAULT_BRANCH),
                    local_path: self.local_path.as_deref(),
                }),
                _ => Err(ModelError::new("Git sources must have a 'url' field")),
            },
            SourceType::Local | SourceType::Network => match self.path.as_deref() {
                Some(path) if !path.as_os_str().is_empty() => Ok(SourceLocation::Directory(path)),
                _ => Err(ModelError::new(format!(
                    "{} sources must have a 'path' field",
                    self.kind.as_str()
                ))),
            },
        }
    }

    /// Directory that tool paths are relative to: `path` for local/network,
    /// `local_path` for git.
    pub fn base_path(&self) -> Option<&Path> {
        match self.kind {
            SourceType::Git => self.local_path.as_deref(),
            SourceType::Local | SourceType::Network => self.path.as_deref(),
        }
    }
}

/// Input for creating a source; `build` enforces the type invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSource {
    pub id: String,
    pub name: String,
    pub kind: SourceType,
    pub url: Option<String>,
    pub path: Option<PathBuf>,
    pub local_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub enabled: bool,
}

impl NewSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: SourceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            url: None,
            path: None,
            local_path: None,
            branch: default_branch(),
            enabled: true,
        }
    }

    pub fn local(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(id, name, SourceType::Local).with_path(path)
    }

    pub fn network(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(id, name, SourceType::Network).with_path(path)
    }

    pub fn git(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(id, name, SourceType::Git).with_url(url)
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_local_path(mut self, local_path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(local_path.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(self) -> Result<Source, ModelError> {
        let source = Source {
            id: self.id,
            name: self.name,
            kind: self.kind,
            url: self.url,
            branch: self.branch,
            path: self.path,
            local_path: self.local_path,
            enabled: self.enabled,
            last_sync: None,
            discovered_tools: 0,
            last_error: None,
        };
        source.validate()?;
        Ok(source)
    }
}

/// Field updates for an existing source. `None` leaves a field alone; the
/// nested options clear a field when set to `Some(None)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub url: Option<Option<String>>,
    pub branch: Option<Option<String>>,
    pub path: Option<Option<PathBuf>>,
    pub local_path: Option<Option<PathBuf>>,
    pub enabled: Option<bool>,
    pub last_sync: Option<Option<DateTime<Utc>>>,
    pub discovered_tools: Option<u64>,
    pub last_error: Option<Option<String>>,
}

impl SourceUpdate {
    pub(crate) fn apply(self, source: &mut Source) {
        if let Some(name) = self.name {
            source.name = name;
        }
        if let Some(url) = self.url {
            source.url = url;
        }
        if let Some(branch) = self.branch {
            source.branch = branch;
        }
        if let Some(path) = self.path {
            source.path = path;
        }
        if let Some(local_path) = self.local_path {
            source.local_path = local_path;
        }
        if let Some(enabled) = self.enabled {
            source.enabled = enabled;
        }
        if let Some(last_sync) = self.last_sync {
            source.last_sync = last_sync;
        }
        if let Some(count) = self.discovered_tools {
            source.discovered_tools = count;
        }
        if let Some(last_error) = self.last_error {
            source.last_error = last_error;
        }
    }
}

/// A tool assigned to a toolbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolReference {
    pub source_id: String,
    /// Source-relative, slash-separated directory of the tool.
    pub tool_path: String,
    #[serde(default = "yes")]
    pub enabled: bool,
    /// Display name override inside this toolbox.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ToolReference {
    pub fn new(source_id: impl Into<String>, tool_path: &str) -> Self {
        Self {
            source_id: source_id.into(),
            tool_path: normalize_tool_path(tool_path),
            enabled: true,
            alias: None,
        }
    }

    pub fn matches(&self, source_id: &str, tool_path: &str) -> bool {
        self.source_id == source_id && self.tool_path == normalize_tool_path(tool_path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolReferenceUpdate {
    pub enabled: Option<bool>,
    pub alias: Option<Option<String>>,
}

impl ToolReferenceUpdate {
    pub(crate) fn apply(self, reference: &mut ToolReference) {
        if let Some(enabled) = self.enabled {
            reference.enabled = enabled;
        }
        if let Some(alias) = self.alias {
            reference.alias = alias;
        }
    }
}

/// A `.pyt` generation target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Toolbox {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Generation order.
    #[serde(default)]
    pub tools: Vec<ToolReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default = "yes")]
    pub auto_regenerate: bool,
}

impl Toolbox {
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            description: None,
            tools: Vec::new(),
            created: None,
            modified: None,
            auto_regenerate: true,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        validate_slug("toolbox", &self.id)?;
        if self.name.trim().is_empty() {
            return Err(ModelError::new(format!("toolbox '{}' has an empty name", self.id)));
        }
        validate_pyt_path(&self.path)?;
        for (idx, tool) in self.tools.iter().enumerate() {
            if self.tools[..idx]
                .iter()
                .any(|earlier| earlier.matches(&tool.source_id, &tool.tool_path))
            {
                return Err(ModelError::new(format!(
                    "toolbox '{}' lists tool '{}' from source '{}' more than once",
                    self.id, tool.tool_path, tool.source_id
                )));
            }
        }
        Ok(())
    }

    pub fn position_of(&self, source_id: &str, tool_path: &str) -> Option<usize> {
        self.tools.iter().position(|t| t.matches(source_id, tool_path))
    }

    pub fn enabled_tools(&self) -> impl Iterator<Item = &ToolReference> {
        self.tools.iter().filter(|t| t.enabled)
    }

    pub fn references_source(&self, source_id: &str) -> bool {
        self.tools.iter().any(|t| t.source_id == source_id)
    }
}

pub fn validate_pyt_path(path: &Path) -> Result<(), ModelError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("pyt") => Ok(()),
        other => Err(ModelError::new(format!(
            "Toolbox path must end with .pyt, got: {}",
            other.map(|ext| format!(".{ext}")).unwrap_or_else(|| "no extension".to_string())
        ))),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolboxUpdate {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    pub description: Option<Option<String>>,
    pub auto_regenerate: Option<bool>,
}

impl ToolboxUpdate {
    pub(crate) fn apply(self, toolbox: &mut Toolbox) {
        if let Some(name) = self.name {
            toolbox.name = name;
        }
        if let Some(path) = self.path {
            toolbox.path = path;
        }
        if let Some(description) = self.description {
            toolbox.description = description;
        }
        if let Some(auto_regenerate) = self.auto_regenerate {
            toolbox.auto_regenerate = auto_regenerate;
        }
    }
}

/// Root of `catalog.yml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<CatalogSettings>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub toolboxes: Vec<Toolbox>,
}

impl Catalog {
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            settings: None,
            sources: Vec::new(),
            toolboxes: Vec::new(),
        }
    }

    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn source_mut(&mut self, id: &str) -> Option<&mut Source> {
        self.sources.iter_mut().find(|s| s.id == id)
    }

    pub fn toolbox(&self, id: &str) -> Option<&Toolbox> {
        self.toolboxes.iter().find(|t| t.id == id)
    }

    pub fn toolbox_mut(&mut self, id: &str) -> Option<&mut Toolbox> {
        self.toolboxes.iter_mut().find(|t| t.id == id)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Enabled tools of a toolbox; empty when the toolbox does not exist.
    pub fn tools_for_toolbox(&self, toolbox_id: &str) -> Vec<&ToolReference> {
        self.toolbox(toolbox_id)
            .map(|tb| tb.enabled_tools().collect())
            .unwrap_or_default()
    }

    /// One warning per tool reference whose source is not in the catalog.
    pub fn validate_tool_references(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for toolbox in &self.toolboxes {
            for tool in &toolbox.tools {
                if self.source(&tool.source_id).is_none() {
                    warnings.push(format!(
                        "Toolbox '{}' references non-existent source '{}' for tool '{}'",
                        toolbox.id, tool.source_id, tool.tool_path
                    ));
                }
            }
        }
        warnings
    }

    /// `settings.workspace_path`, or `<base>/workspace`.
    pub fn workspace_path(&self, base: &Path) -> PathBuf {
        self.settings
            .as_ref()
            .and_then(|s| s.workspace_path.clone())
            .unwrap_or_else(|| base.join("workspace"))
    }

    pub fn toolbox_output_path(&self, base: &Path) -> PathBuf {
        self.workspace_path(base).join("toolboxes")
    }

    pub fn sources_path(&self, base: &Path) -> PathBuf {
        self.workspace_path(base).join("sources")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_construction_requires_type_specific_field() {
        assert!(NewSource::local("s1", "S1", "/data/tools").build().is_ok());
        assert!(NewSource::network("s2", "S2", "//share/tools").build().is_ok());
        assert!(NewSource::git("s3", "S3", "https://x/y.git").build().is_ok());

        let err = NewSource::new("s4", "S4", SourceType::Git).build().unwrap_err();
        assert_eq!(err.0, "Git sources must have a 'url' field");
        let err = NewSource::new("s5", "S5", SourceType::Local)
            .with_url("https://x/y.git")
            .build()
            .unwrap_err();
        assert_eq!(err.0, "local sources must have a 'path' field");
        assert!(
            NewSource::new("s6", "S6", SourceType::Network)
                .build()
                .is_err()
        );
    }

    #[test]
    fn source_ids_must_be_slugs() {
        assert!(NewSource::local("Bad_Id", "x", "/p").build().is_err());
        assert!(NewSource::local("good-id-2", "x", "/p").build().is_ok());
    }

    #[test]
    fn base_path_follows_source_type() {
        let local = NewSource::local("s1", "S1", "/data").build().unwrap();
        assert_eq!(local.base_path(), Some(Path::new("/data")));
        let git = NewSource::git("s2", "S2", "https://x/y.git")
            .with_local_path("/mirror/s2")
            .build()
            .unwrap();
        assert_eq!(git.base_path(), Some(Path::new("/mirror/s2")));
        assert!(matches!(
            git.location().unwrap(),
            SourceLocation::Git { branch: "main", .. }
        ));
    }

    #[test]
    fn toolbox_path_must_be_pyt() {
        assert!(Toolbox::new("tb1", "TB", "out.pyt").validate().is_ok());
        let err = Toolbox::new("tb1", "TB", "out.py").validate().unwrap_err();
        assert!(err.0.contains("must end with .pyt"));
    }

    #[test]
    fn duplicate_references_in_one_toolbox_are_invalid() {
        let mut toolbox = Toolbox::new("tb1", "TB", "out.pyt");
        toolbox.tools.push(ToolReference::new("s1", "tools/buf"));
        toolbox.tools.push(ToolReference::new("s1", "tools\\buf"));
        assert!(toolbox.validate().is_err());
    }

    #[test]
    fn dangling_references_are_warnings() {
        let mut catalog = Catalog::empty("1.0");
        catalog
            .sources
            .push(NewSource::local("s1", "S1", "/data").build().unwrap());
        let mut toolbox = Toolbox::new("tb1", "TB", "out.pyt");
        toolbox.tools.push(ToolReference::new("s1", "tools/buf"));
        toolbox.tools.push(ToolReference::new("gone", "tools/clip"));
        catalog.toolboxes.push(toolbox);

        let warnings = catalog.validate_tool_references();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("non-existent source 'gone'"));
    }

    #[test]
    fn workspace_paths_fall_back_to_base() {
        let mut catalog = Catalog::empty("1.0");
        assert_eq!(
            catalog.toolbox_output_path(Path::new("/proj")),
            PathBuf::from("/proj/workspace/toolboxes")
        );
        catalog.settings = Some(CatalogSettings {
            workspace_path: Some(PathBuf::from("/ws")),
            ..CatalogSettings::default()
        });
        assert_eq!(
            catalog.sources_path(Path::new("/proj")),
            PathBuf::from("/ws/sources")
        );
    }

    #[test]
    fn disabled_references_are_not_listed_as_tools() {
        let mut catalog = Catalog::empty("1.0");
        let mut toolbox = Toolbox::new("tb1", "TB", "out.pyt");
        let mut hidden = ToolReference::new("s1", "tools/clip");
        hidden.enabled = false;
        toolbox.tools.push(ToolReference::new("s1", "tools/buf"));
        toolbox.tools.push(hidden);
        catalog.toolboxes.push(toolbox);
        let tools = catalog.tools_for_toolbox("tb1");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool_path, "tools/buf");
        assert!(catalog.tools_for_toolbox("missing").is_empty());
    }
}
