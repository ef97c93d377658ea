use crate::catalog::identity::validate_tool_path;
use crate::catalog::model::{Catalog, SourceType, ToolReference};
use crate::config::{TOOL_DESCRIPTOR, ToolConfig, load_tool_config};
use crate::error::GeneratorError;
use std::path::PathBuf;

/// A tool reference bound to its descriptor on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTool {
    pub reference: ToolReference,
    /// Absolute tool directory.
    pub path: PathBuf,
    pub config: ToolConfig,
}

impl ResolvedTool {
    pub fn tool_name(&self) -> &str {
        &self.config.tool.name
    }

    /// The reference's alias, or the configured tool name.
    pub fn display_name(&self) -> &str {
        self.reference
            .alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(self.tool_name())
    }

    /// Dotted module path of the tool directory relative to its source root,
    /// e.g. `tools/buffer` becomes `tools.buffer`.
    pub fn module_path(&self) -> String {
        module_path(&self.reference.tool_path)
    }
}

pub fn module_path(tool_path: &str) -> String {
    tool_path
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Map a reference to its tool directory and load its `tool.yml`, requiring
/// the declared name to match the directory.
pub fn resolve_tool(
    catalog: &Catalog,
    reference: &ToolReference,
) -> Result<ResolvedTool, GeneratorError> {
    let source = catalog.source(&reference.source_id).ok_or_else(|| {
        GeneratorError::ToolNotFound(format!(
            "Source '{}' not found for tool '{}'",
            reference.source_id, reference.tool_path
        ))
    })?;

    let base = source.base_path().ok_or_else(|| {
        GeneratorError::ToolNotFound(match source.kind {
            SourceType::Git => format!(
                "Git source '{}' has no local_path configured. Scan the source to clone it first.",
                source.id
            ),
            SourceType::Local | SourceType::Network => {
                format!("Source '{}' has no path configured", source.id)
            }
        })
    })?;

    if let Err(err) = validate_tool_path(&reference.tool_path) {
        return Err(GeneratorError::ToolNotFound(format!(
            "{err} (source: {})",
            reference.source_id
        )));
    }
    let path = reference
        .tool_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part));
    if !path.is_dir() {
        return Err(GeneratorError::ToolNotFound(format!(
            "Tool path does not exist: {} (source: {})",
            path.display(),
            reference.source_id
        )));
    }

    let descriptor = path.join(TOOL_DESCRIPTOR);
    if !descriptor.is_file() {
        return Err(GeneratorError::ToolNotFound(format!(
            "{TOOL_DESCRIPTOR} not found at {} (source: {})",
            path.display(),
            reference.source_id
        )));
    }

    let config = load_tool_config(&descriptor).map_err(|source| GeneratorError::ToolLoad {
        path: descriptor.clone(),
        source,
    })?;

    Ok(ResolvedTool {
        reference: reference.clone(),
        path,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::NewSource;
    use std::fs;
    use tempfile::TempDir;

    const BUF: &str = "tool:\n  name: buf\n  label: Buffer\n  description: d\nimplementation:\n  executeFunction: tools.buf.execute\nparameters: []\n";

    fn catalog_for(root: &std::path::Path) -> Catalog {
        let mut catalog = Catalog::empty("1.0");
        catalog
            .sources
            .push(NewSource::local("s1", "S1", root).build().unwrap());
        catalog
    }

    #[test]
    fn resolves_and_prefers_alias() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tools").join("buf");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(TOOL_DESCRIPTOR), BUF).unwrap();
        let catalog = catalog_for(temp.path());

        let mut reference = ToolReference::new("s1", "tools/buf");
        let resolved = resolve_tool(&catalog, &reference).unwrap();
        assert_eq!(resolved.display_name(), "buf");
        assert_eq!(resolved.module_path(), "tools.buf");
        assert_eq!(resolved.path, dir);

        reference.alias = Some("BufferPlus".to_string());
        let resolved = resolve_tool(&catalog, &reference).unwrap();
        assert_eq!(resolved.display_name(), "BufferPlus");
        assert_eq!(resolved.tool_name(), "buf");
    }

    #[test]
    fn each_failure_stage_has_its_own_message() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog_for(temp.path());

        let mut escaping = ToolReference::new("s1", "tools/buf");
        escaping.tool_path = "../outside/buf".to_string();
        let err = resolve_tool(&catalog, &escaping).unwrap_err();
        assert!(err.to_string().contains("'..'"), "{err}");

        let err = resolve_tool(&catalog, &ToolReference::new("nope", "tools/buf")).unwrap_err();
        assert!(err.to_string().contains("Source 'nope' not found"));

        let err = resolve_tool(&catalog, &ToolReference::new("s1", "tools/buf")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        fs::create_dir_all(temp.path().join("tools/buf")).unwrap();
        let err = resolve_tool(&catalog, &ToolReference::new("s1", "tools/buf")).unwrap_err();
        assert!(err.to_string().contains("tool.yml not found"));

        fs::write(
            temp.path().join("tools/buf").join(TOOL_DESCRIPTOR),
            BUF.replace("name: buf", "name: other"),
        )
        .unwrap();
        let err = resolve_tool(&catalog, &ToolReference::new("s1", "tools/buf")).unwrap_err();
        assert!(matches!(err, GeneratorError::ToolLoad { .. }));
        assert!(err.to_string().contains("Failed to load tool config"));
    }
}
