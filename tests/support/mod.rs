#![allow(dead_code)]

// Shared fixtures for the integration tests: an isolated workspace with a
// local tool source, and descriptor writers.

use anyhow::{Context, Result};
use pytcatalog::{CatalogService, NewSource};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const SOURCE_ID: &str = "s1";

/// A minimal valid `tool.yml` declaring `name`.
pub fn tool_yaml(name: &str) -> String {
    format!(
        r#"tool:
  name: {name}
  label: {name} tool
  description: Buffers features.
implementation:
  executeFunction: tools.{name}.execute
parameters:
  - name: input
    displayName: Input Features
    datatype: GPFeatureLayer
    parameterType: Required
    direction: Input
    index: 0
  - name: distance
    displayName: Distance
    datatype: GPDouble
    parameterType: Required
    direction: Input
    index: 1
    validation:
      - type: greater_than
        value: 0
"#
    )
}

/// Write `<root>/<rel_dir>/tool.yml` for a tool named after the last path
/// segment.
pub fn write_tool(root: &Path, rel_dir: &str) -> Result<PathBuf> {
    let name = rel_dir.rsplit('/').next().unwrap_or(rel_dir);
    write_file(root, &format!("{rel_dir}/tool.yml"), &tool_yaml(name))
}

pub fn write_file(root: &Path, rel_path: &str, contents: &str) -> Result<PathBuf> {
    let path = root.join(rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// A temp directory holding a workspace (`ws/`) and a local source tree
/// (`src/`).
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("creating temp dir")?;
        fs::create_dir_all(dir.path().join("src"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    pub fn source_root(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.workspace().join("catalogs").join("default.yml")
    }

    pub fn service(&self) -> CatalogService {
        CatalogService::for_workspace(self.workspace())
    }

    /// A fresh catalog with `s1` pointing at the source tree.
    pub fn with_local_source(&self) -> Result<CatalogService> {
        let service = self.service();
        service.create_new(None, false)?;
        service.add_source(NewSource::local(SOURCE_ID, "Shared tools", self.source_root()))?;
        Ok(service)
    }

    /// Run the `pytcatalog` binary against this workspace.
    pub fn cli(&self, args: &[&str]) -> Result<Output> {
        Command::new(env!("CARGO_BIN_EXE_pytcatalog"))
            .arg("--workspace")
            .arg(self.workspace())
            .args(args)
            .env_remove("PYTCATALOG_CATALOG")
            .env_remove("RUST_LOG")
            .output()
            .context("running pytcatalog")
    }
}
