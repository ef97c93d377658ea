//! Catalog persistence: load, save, backup, and CRUD over sources, toolboxes
//! and tool assignments.
//!
//! Every mutating method runs one load / mutate / save cycle while holding
//! the catalog lock, so two processes going through `CatalogService` never
//! lose each other's writes. Callers that `load()`, edit the copy and
//! `save()` it later are not covered by that guarantee: anything written in
//! between is overwritten.

use crate::catalog::identity::validate_tool_path;
use crate::catalog::index::{CatalogIndex, validate_catalog};
use crate::catalog::lock::CatalogLock;
use crate::catalog::model::{
    Catalog, CatalogSettings, NewSource, Source, SourceType, SourceUpdate, ToolReference,
    ToolReferenceUpdate, Toolbox, ToolboxUpdate,
};
use crate::catalog::workspace::{Workspace, backup_path, write_atomic};
use crate::error::CatalogError;
use crate::schema_loader::{SchemaKind, parse_yaml, validate_value};
use chrono::Utc;
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CATALOG_VERSION: &str = "1.0";

#[derive(Debug)]
pub struct CatalogService {
    catalog_path: PathBuf,
    workspace: Workspace,
    current: RefCell<Option<Catalog>>,
}

impl CatalogService {
    pub fn new(catalog_path: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            workspace: Workspace::new(workspace_root),
            current: RefCell::new(None),
        }
    }

    /// Service over `<root>/catalogs/default.yml`.
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace = Workspace::new(workspace_root);
        Self {
            catalog_path: workspace.default_catalog_path(),
            workspace,
            current: RefCell::new(None),
        }
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn exists(&self) -> bool {
        self.catalog_path.is_file()
    }

    /// The catalog most recently loaded or saved through this service.
    pub fn loaded(&self) -> Option<Catalog> {
        self.current.borrow().clone()
    }

    pub fn load(&self) -> Result<Catalog, CatalogError> {
        let catalog = self.read()?;
        self.remember(&catalog);
        Ok(catalog)
    }

    fn read(&self) -> Result<Catalog, CatalogError> {
        let text = match fs::read_to_string(&self.catalog_path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CatalogError::CatalogNotFound(self.catalog_path.clone()));
            }
            Err(err) => {
                return Err(CatalogError::io(
                    format!("reading {}", self.catalog_path.display()),
                    err,
                ));
            }
        };
        let value = parse_yaml(&text, &self.catalog_path)
            .map_err(|err| CatalogError::Validation(err.to_string()))?;
        validate_value(SchemaKind::Catalog, &value)
            .map_err(|errors| CatalogError::Validation(errors.join("; ")))?;
        let catalog: Catalog = serde_json::from_value(value)
            .map_err(|err| CatalogError::Validation(err.to_string()))?;
        validate_catalog(&catalog)?;
        Ok(catalog)
    }

    /// Write `catalog`, copying any existing file to a timestamped backup
    /// first when `backup` is set.
    pub fn save(&self, catalog: &Catalog, backup: bool) -> Result<(), CatalogError> {
        let _lock = CatalogLock::acquire(&self.catalog_path)?;
        self.write(catalog, backup)
    }

    /// Save the catalog last loaded or saved through this service.
    pub fn save_loaded(&self, backup: bool) -> Result<(), CatalogError> {
        let catalog = self.loaded().ok_or(CatalogError::NothingToSave)?;
        self.save(&catalog, backup)
    }

    fn write(&self, catalog: &Catalog, backup: bool) -> Result<(), CatalogError> {
        validate_catalog(catalog)?;

        let mut catalog = catalog.clone();
        let settings = catalog.settings.get_or_insert_with(CatalogSettings::default);
        if settings.workspace_path.is_none() {
            settings.workspace_path = Some(self.workspace.root().to_path_buf());
        }

        if backup && self.catalog_path.exists() {
            let target = backup_path(&self.catalog_path);
            fs::copy(&self.catalog_path, &target).map_err(|err| {
                CatalogError::io(format!("backing up to {}", target.display()), err)
            })?;
            debug!(backup = %target.display(), "catalog backed up");
        }

        let yaml = serde_yaml::to_string(&catalog)
            .map_err(|err| CatalogError::Validation(format!("serializing catalog: {err}")))?;
        write_atomic(&self.catalog_path, yaml.as_bytes()).map_err(|err| {
            CatalogError::io(format!("writing {}", self.catalog_path.display()), err)
        })?;
        self.remember(&catalog);
        Ok(())
    }

    fn remember(&self, catalog: &Catalog) {
        *self.current.borrow_mut() = Some(catalog.clone());
    }

    /// Create an empty catalog; `Conflict` when one exists and `overwrite`
    /// is not set.
    pub fn create_new(
        &self,
        settings: Option<CatalogSettings>,
        overwrite: bool,
    ) -> Result<Catalog, CatalogError> {
        let _lock = CatalogLock::acquire(&self.catalog_path)?;
        if self.exists() && !overwrite {
            return Err(CatalogError::Conflict(format!(
                "Catalog already exists: {}. Use overwrite to replace.",
                self.catalog_path.display()
            )));
        }
        let auto_create = settings.as_ref().is_none_or(|s| s.auto_create_workspace);
        if auto_create {
            self.workspace.ensure_layout().map_err(|err| {
                CatalogError::io(
                    format!("creating workspace {}", self.workspace.root().display()),
                    err,
                )
            })?;
        }
        let mut catalog = Catalog::empty(DEFAULT_CATALOG_VERSION);
        catalog.settings = settings;
        self.write(&catalog, overwrite)?;
        info!(catalog = %self.catalog_path.display(), "created catalog");
        self.load_cached()
    }

    pub fn get_or_create(&self) -> Result<Catalog, CatalogError> {
        match self.load() {
            Err(CatalogError::CatalogNotFound(_)) => self.create_new(None, false),
            other => other,
        }
    }

    fn load_cached(&self) -> Result<Catalog, CatalogError> {
        self.loaded().ok_or(CatalogError::NothingToSave)
    }

    /// Locked load / mutate / save. A missing catalog starts out empty.
    /// Nothing is written when `f` fails.
    pub(crate) fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Catalog) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let _lock = CatalogLock::acquire(&self.catalog_path)?;
        let mut catalog = match self.read() {
            Ok(catalog) => catalog,
            Err(CatalogError::CatalogNotFound(_)) => Catalog::empty(DEFAULT_CATALOG_VERSION),
            Err(err) => return Err(err),
        };
        let value = f(&mut catalog)?;
        self.write(&catalog, true)?;
        Ok(value)
    }

    // Sources

    /// Add a source. Git sources without a `local_path` mirror into
    /// `<workspace>/sources/<id>`.
    pub fn add_source(&self, new: NewSource) -> Result<Source, CatalogError> {
        let mut new = new;
        if new.kind == SourceType::Git && new.local_path.is_none() {
            new.local_path = Some(self.workspace.mirror_path(&new.id));
        }
        let source = new.build()?;
        self.mutate(|catalog| {
            if catalog.source(&source.id).is_some() {
                return Err(CatalogError::Conflict(format!(
                    "Source with id '{}' already exists",
                    source.id
                )));
            }
            catalog.sources.push(source.clone());
            Ok(())
        })?;
        info!(source = %source.id, kind = source.kind.as_str(), "added source");
        Ok(source)
    }

    /// Remove a source. Referenced sources are refused unless `force`; forced
    /// removal leaves the references in place for `validate` to report.
    pub fn remove_source(&self, source_id: &str, force: bool) -> Result<(), CatalogError> {
        self.mutate(|catalog| {
            let index = CatalogIndex::build(catalog)?;
            if index.source(source_id).is_none() {
                return Err(not_found_source(source_id));
            }
            if !force {
                if let Some(toolbox) = index.toolboxes_using(source_id).first() {
                    return Err(CatalogError::Conflict(format!(
                        "Source '{source_id}' is referenced by toolbox '{toolbox}'. \
                         Remove tool assignments first or use force."
                    )));
                }
            }
            catalog.sources.retain(|s| s.id != source_id);
            Ok(())
        })?;
        info!(source = source_id, force, "removed source");
        Ok(())
    }

    pub fn update_source(
        &self,
        source_id: &str,
        update: SourceUpdate,
    ) -> Result<Source, CatalogError> {
        self.mutate(|catalog| {
            let source = catalog
                .source_mut(source_id)
                .ok_or_else(|| not_found_source(source_id))?;
            update.apply(source);
            source.validate()?;
            Ok(source.clone())
        })
    }

    pub fn get_source(&self, source_id: &str) -> Result<Option<Source>, CatalogError> {
        Ok(self.get_or_create()?.source(source_id).cloned())
    }

    pub fn list_sources(&self, enabled_only: bool) -> Result<Vec<Source>, CatalogError> {
        let catalog = self.get_or_create()?;
        Ok(catalog
            .sources
            .into_iter()
            .filter(|s| !enabled_only || s.enabled)
            .collect())
    }

    // Toolboxes

    pub fn add_toolbox(
        &self,
        id: &str,
        name: &str,
        path: impl Into<PathBuf>,
        description: Option<String>,
    ) -> Result<Toolbox, CatalogError> {
        let now = Utc::now();
        let mut toolbox = Toolbox::new(id, name, path);
        toolbox.description = description;
        toolbox.created = Some(now);
        toolbox.modified = Some(now);
        toolbox.validate()?;
        self.insert_toolbox(toolbox)
    }

    /// Add a fully built toolbox, keeping its tool list.
    pub fn insert_toolbox(&self, toolbox: Toolbox) -> Result<Toolbox, CatalogError> {
        toolbox.validate()?;
        self.mutate(|catalog| {
            if catalog.toolbox(&toolbox.id).is_some() {
                return Err(CatalogError::Conflict(format!(
                    "Toolbox with id '{}' already exists",
                    toolbox.id
                )));
            }
            catalog.toolboxes.push(toolbox.clone());
            Ok(())
        })?;
        info!(toolbox = %toolbox.id, "added toolbox");
        Ok(toolbox)
    }

    pub fn remove_toolbox(&self, toolbox_id: &str) -> Result<(), CatalogError> {
        self.mutate(|catalog| {
            if catalog.toolbox(toolbox_id).is_none() {
                return Err(not_found_toolbox(toolbox_id));
            }
            catalog.toolboxes.retain(|t| t.id != toolbox_id);
            Ok(())
        })
    }

    pub fn update_toolbox(
        &self,
        toolbox_id: &str,
        update: ToolboxUpdate,
    ) -> Result<Toolbox, CatalogError> {
        self.mutate(|catalog| {
            let toolbox = catalog
                .toolbox_mut(toolbox_id)
                .ok_or_else(|| not_found_toolbox(toolbox_id))?;
            update.apply(toolbox);
            toolbox.modified = Some(Utc::now());
            toolbox.validate()?;
            Ok(toolbox.clone())
        })
    }

    pub fn get_toolbox(&self, toolbox_id: &str) -> Result<Option<Toolbox>, CatalogError> {
        Ok(self.get_or_create()?.toolbox(toolbox_id).cloned())
    }

    pub fn list_toolboxes(&self) -> Result<Vec<Toolbox>, CatalogError> {
        Ok(self.get_or_create()?.toolboxes)
    }

    // Assignments

    pub fn add_tool_to_toolbox(
        &self,
        toolbox_id: &str,
        source_id: &str,
        tool_path: &str,
        enabled: bool,
        alias: Option<String>,
    ) -> Result<ToolReference, CatalogError> {
        validate_tool_path(tool_path)?;
        let mut reference = ToolReference::new(source_id, tool_path);
        reference.enabled = enabled;
        reference.alias = alias;

        self.mutate(|catalog| {
            if catalog.toolbox(toolbox_id).is_none() {
                return Err(not_found_toolbox(toolbox_id));
            }
            if catalog.source(source_id).is_none() {
                return Err(not_found_source(source_id));
            }
            let toolbox = catalog
                .toolbox_mut(toolbox_id)
                .ok_or_else(|| not_found_toolbox(toolbox_id))?;
            if toolbox
                .position_of(source_id, &reference.tool_path)
                .is_some()
            {
                return Err(CatalogError::Conflict(format!(
                    "Tool '{}' from source '{source_id}' already in toolbox '{toolbox_id}'",
                    reference.tool_path
                )));
            }
            toolbox.tools.push(reference.clone());
            toolbox.modified = Some(Utc::now());
            Ok(())
        })?;
        Ok(reference)
    }

    pub fn remove_tool_from_toolbox(
        &self,
        toolbox_id: &str,
        source_id: &str,
        tool_path: &str,
    ) -> Result<(), CatalogError> {
        self.mutate(|catalog| {
            let toolbox = catalog
                .toolbox_mut(toolbox_id)
                .ok_or_else(|| not_found_toolbox(toolbox_id))?;
            let position = toolbox
                .position_of(source_id, tool_path)
                .ok_or_else(|| not_found_reference(toolbox_id, source_id, tool_path))?;
            toolbox.tools.remove(position);
            toolbox.modified = Some(Utc::now());
            Ok(())
        })
    }

    pub fn update_tool_in_toolbox(
        &self,
        toolbox_id: &str,
        source_id: &str,
        tool_path: &str,
        update: ToolReferenceUpdate,
    ) -> Result<ToolReference, CatalogError> {
        self.mutate(|catalog| {
            let toolbox = catalog
                .toolbox_mut(toolbox_id)
                .ok_or_else(|| not_found_toolbox(toolbox_id))?;
            let position = toolbox
                .position_of(source_id, tool_path)
                .ok_or_else(|| not_found_reference(toolbox_id, source_id, tool_path))?;
            update.apply(&mut toolbox.tools[position]);
            toolbox.modified = Some(Utc::now());
            Ok(toolbox.tools[position].clone())
        })
    }

    pub fn list_tools_in_toolbox(
        &self,
        toolbox_id: &str,
        enabled_only: bool,
    ) -> Result<Vec<ToolReference>, CatalogError> {
        let catalog = self.get_or_create()?;
        let toolbox = catalog
            .toolbox(toolbox_id)
            .ok_or_else(|| not_found_toolbox(toolbox_id))?;
        Ok(toolbox
            .tools
            .iter()
            .filter(|t| !enabled_only || t.enabled)
            .cloned()
            .collect())
    }

    /// Referential warnings for the current catalog.
    pub fn validate(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.get_or_create()?.validate_tool_references())
    }
}

fn not_found_source(source_id: &str) -> CatalogError {
    CatalogError::NotFound(format!("Source '{source_id}' not found"))
}

fn not_found_toolbox(toolbox_id: &str) -> CatalogError {
    CatalogError::NotFound(format!("Toolbox '{toolbox_id}' not found"))
}

fn not_found_reference(toolbox_id: &str, source_id: &str, tool_path: &str) -> CatalogError {
    CatalogError::NotFound(format!(
        "Tool '{tool_path}' from source '{source_id}' not found in toolbox '{toolbox_id}'"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> CatalogService {
        CatalogService::for_workspace(temp.path().join("ws"))
    }

    #[test]
    fn load_reports_missing_catalog() {
        let temp = TempDir::new().unwrap();
        let err = service(&temp).load().unwrap_err();
        assert!(matches!(err, CatalogError::CatalogNotFound(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn save_loaded_needs_a_catalog() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            service(&temp).save_loaded(true),
            Err(CatalogError::NothingToSave)
        ));
    }

    #[test]
    fn create_new_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let catalog = svc.create_new(None, false).unwrap();
        assert_eq!(catalog.version, DEFAULT_CATALOG_VERSION);
        assert_eq!(
            catalog.settings.and_then(|s| s.workspace_path),
            Some(temp.path().join("ws"))
        );
        assert!(svc.workspace().layout_issues().is_empty());
        assert!(svc.create_new(None, false).unwrap_err().is_conflict());
        assert!(svc.create_new(None, true).is_ok());
    }

    #[test]
    fn invalid_yaml_is_a_validation_error() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        fs::create_dir_all(svc.catalog_path().parent().unwrap()).unwrap();
        fs::write(svc.catalog_path(), "version: [unclosed").unwrap();
        assert!(matches!(svc.load(), Err(CatalogError::Validation(_))));

        fs::write(svc.catalog_path(), "version: '1.0'\nextra: true\n").unwrap();
        assert!(matches!(svc.load(), Err(CatalogError::Validation(_))));
    }

    #[test]
    fn git_sources_get_a_default_mirror() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let source = svc
            .add_source(NewSource::git("remote", "Remote", "https://example.com/r.git"))
            .unwrap();
        assert_eq!(
            source.local_path,
            Some(temp.path().join("ws").join("sources").join("remote"))
        );
    }

    #[test]
    fn failed_mutation_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        svc.add_source(NewSource::local("s1", "S1", "/data")).unwrap();
        let before = fs::read_to_string(svc.catalog_path()).unwrap();
        assert!(
            svc.add_source(NewSource::local("s1", "Again", "/other"))
                .unwrap_err()
                .is_conflict()
        );
        assert_eq!(fs::read_to_string(svc.catalog_path()).unwrap(), before);
    }

    #[test]
    fn update_tool_requires_exact_pair() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        svc.add_source(NewSource::local("s1", "S1", "/data")).unwrap();
        svc.add_toolbox("tb1", "TB", "tb1.pyt", None).unwrap();
        svc.add_tool_to_toolbox("tb1", "s1", "tools/buf", true, None)
            .unwrap();

        let updated = svc
            .update_tool_in_toolbox(
                "tb1",
                "s1",
                "tools\\buf",
                ToolReferenceUpdate {
                    enabled: Some(false),
                    alias: Some(Some("Buffer It".to_string())),
                },
            )
            .unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.alias.as_deref(), Some("Buffer It"));

        let err = svc
            .update_tool_in_toolbox("tb1", "s1", "tools/clip", ToolReferenceUpdate::default())
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(svc.list_tools_in_toolbox("tb1", true).unwrap().len(), 0);
    }

    #[test]
    fn update_toolbox_refreshes_modified() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let created = svc.add_toolbox("tb1", "TB", "tb1.pyt", None).unwrap();
        let updated = svc
            .update_toolbox(
                "tb1",
                ToolboxUpdate {
                    description: Some(Some("desc".to_string())),
                    ..ToolboxUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("desc"));
        assert_eq!(updated.created, created.created);
        assert!(updated.modified >= created.modified);

        let err = svc
            .update_toolbox(
                "tb1",
                ToolboxUpdate {
                    path: Some(PathBuf::from("tb1.py")),
                    ..ToolboxUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }
}
