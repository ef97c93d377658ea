//! Workspace layout and file helpers shared by the services.
//!
//! ```text
//! <workspace>/
//!   catalogs/default.yml
//!   sources/<source-id>/      git mirrors
//!   toolboxes/<toolbox>.pyt   generated output
//! ```

use chrono::Local;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const CATALOGS_DIR: &str = "catalogs";
pub const SOURCES_DIR: &str = "sources";
pub const TOOLBOXES_DIR: &str = "toolboxes";
pub const DEFAULT_CATALOG_FILE: &str = "default.yml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_catalog_path(&self) -> PathBuf {
        self.root.join(CATALOGS_DIR).join(DEFAULT_CATALOG_FILE)
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join(SOURCES_DIR)
    }

    pub fn toolboxes_dir(&self) -> PathBuf {
        self.root.join(TOOLBOXES_DIR)
    }

    /// Default mirror directory for a git source.
    pub fn mirror_path(&self, source_id: &str) -> PathBuf {
        self.sources_dir().join(source_id)
    }

    /// Create the standard subdirectories when missing.
    pub fn ensure_layout(&self) -> io::Result<()> {
        for dir in [
            self.root.join(CATALOGS_DIR),
            self.sources_dir(),
            self.toolboxes_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Problems with the directory layout; empty when it is complete.
    pub fn layout_issues(&self) -> Vec<String> {
        if !self.root.is_dir() {
            return vec![format!(
                "Workspace directory does not exist: {}",
                self.root.display()
            )];
        }
        let mut issues = Vec::new();
        for dir in [CATALOGS_DIR, SOURCES_DIR, TOOLBOXES_DIR] {
            let path = self.root.join(dir);
            if !path.exists() {
                issues.push(format!("Missing required directory: {dir}"));
            } else if !path.is_dir() {
                issues.push(format!("Path exists but is not a directory: {dir}"));
            }
        }
        issues
    }
}

/// `<stem>.<YYYYMMDD_HHMMSS>.<ext>.bak` beside `path`, stamped with local time.
///
/// A backup already taken within the same second is never reused; the stamp
/// gets a `-<n>` counter instead.
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("catalog");
    let ext = path.extension().and_then(|e| e.to_str());
    let name_for = |stamp: &str| match ext {
        Some(ext) => format!("{stem}.{stamp}.{ext}.bak"),
        None => format!("{stem}.{stamp}.bak"),
    };

    let mut candidate = path.with_file_name(name_for(&stamp));
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = path.with_file_name(name_for(&format!("{stamp}-{counter}")));
        counter += 1;
    }
    candidate
}

/// Write `contents` to a temp file in the target directory and rename it
/// into place, creating parent directories first.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| err.error)?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}
