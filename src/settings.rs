//! Where the workspace and catalog live.
//!
//! Resolution order for each path: explicit override (CLI flag), then the
//! environment, then the default. The catalog defaults to the workspace's
//! `catalogs/default.yml`, so moving the workspace moves the catalog too.

use crate::catalog::workspace::Workspace;
use std::env;
use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "PYTCATALOG_WORKSPACE";
pub const CATALOG_ENV: &str = "PYTCATALOG_CATALOG";
pub const DEFAULT_WORKSPACE: &str = "workspace";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub workspace: PathBuf,
    pub catalog_path: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::resolve(None, None, |key| env::var_os(key).map(PathBuf::from))
    }

    /// Resolve with CLI overrides on top of the environment.
    pub fn with_overrides(workspace: Option<PathBuf>, catalog: Option<PathBuf>) -> Self {
        Self::resolve(workspace, catalog, |key| {
            env::var_os(key).map(PathBuf::from)
        })
    }

    pub fn resolve(
        workspace: Option<PathBuf>,
        catalog: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<PathBuf>,
    ) -> Self {
        let non_empty = |path: PathBuf| (!path.as_os_str().is_empty()).then_some(path);
        let workspace = workspace
            .or_else(|| lookup(WORKSPACE_ENV).and_then(non_empty))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE));
        let catalog_path = catalog
            .or_else(|| lookup(CATALOG_ENV).and_then(non_empty))
            .unwrap_or_else(|| Workspace::new(&workspace).default_catalog_path());
        Self {
            workspace,
            catalog_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<PathBuf> {
        let map: BTreeMap<String, PathBuf> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PathBuf::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let settings = Settings::resolve(None, None, env_of(&[]));
        assert_eq!(settings.workspace, PathBuf::from("workspace"));
        assert_eq!(
            settings.catalog_path,
            PathBuf::from("workspace/catalogs/default.yml")
        );
    }

    #[test]
    fn catalog_follows_workspace() {
        let settings = Settings::resolve(None, None, env_of(&[(WORKSPACE_ENV, "/srv/ws")]));
        assert_eq!(
            settings.catalog_path,
            PathBuf::from("/srv/ws/catalogs/default.yml")
        );
    }

    #[test]
    fn overrides_beat_env() {
        let lookup = env_of(&[(WORKSPACE_ENV, "/srv/ws"), (CATALOG_ENV, "/srv/cat.yml")]);
        let settings = Settings::resolve(Some(PathBuf::from("/tmp/ws")), None, &lookup);
        assert_eq!(settings.workspace, PathBuf::from("/tmp/ws"));
        assert_eq!(settings.catalog_path, PathBuf::from("/srv/cat.yml"));

        let settings = Settings::resolve(None, Some(PathBuf::from("/x.yml")), &lookup);
        assert_eq!(settings.catalog_path, PathBuf::from("/x.yml"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let settings = Settings::resolve(None, None, env_of(&[(WORKSPACE_ENV, "")]));
        assert_eq!(settings.workspace, PathBuf::from("workspace"));
    }
}
