use crate::config::{TOOL_DESCRIPTOR, TOOLBOX_DESCRIPTOR};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorKind {
    Tool,
    Toolbox,
}

/// A descriptor file found under a source root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorCandidate {
    pub kind: DescriptorKind,
    pub path: PathBuf,
}

impl DescriptorCandidate {
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }
}

/// Walks a source tree for `tool.yml` / `toolbox.yml` in a stable order,
/// skipping hidden directories such as `.git`.
pub struct DescriptorWalker {
    root: PathBuf,
}

impl DescriptorWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn candidates(&self) -> impl Iterator<Item = DescriptorCandidate> + use<> {
        WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable path");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let kind = match entry.file_name().to_str()? {
                    TOOL_DESCRIPTOR => DescriptorKind::Tool,
                    TOOLBOX_DESCRIPTOR => DescriptorKind::Toolbox,
                    _ => return None,
                };
                Some(DescriptorCandidate {
                    kind,
                    path: entry.into_path(),
                })
            })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_descriptors_and_skips_hidden_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for dir in ["tools/b_tool", "tools/a_tool", ".git/hooks", "boxes/main"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("tools/b_tool/tool.yml"), "").unwrap();
        fs::write(root.join("tools/a_tool/tool.yml"), "").unwrap();
        fs::write(root.join("tools/a_tool/notes.yml"), "").unwrap();
        fs::write(root.join(".git/hooks/tool.yml"), "").unwrap();
        fs::write(root.join("boxes/main/toolbox.yml"), "").unwrap();

        let found: Vec<DescriptorCandidate> = DescriptorWalker::new(root).candidates().collect();
        let relative: Vec<(DescriptorKind, String)> = found
            .iter()
            .map(|c| {
                (
                    c.kind,
                    c.path
                        .strip_prefix(root)
                        .unwrap()
                        .to_string_lossy()
                        .replace('\\', "/"),
                )
            })
            .collect();
        assert_eq!(
            relative,
            vec![
                (DescriptorKind::Toolbox, "boxes/main/toolbox.yml".to_string()),
                (DescriptorKind::Tool, "tools/a_tool/tool.yml".to_string()),
                (DescriptorKind::Tool, "tools/b_tool/tool.yml".to_string()),
            ]
        );
        assert_eq!(found[1].directory(), root.join("tools/a_tool"));
    }
}
