//! `.pyt` generation from catalog toolboxes.
//!
//! Generation is all-or-nothing: every reference of a toolbox must resolve
//! and enabled tools need distinct names before anything is written. A batch
//! validates every toolbox before writing the first one.

pub mod render;
pub mod resolve;

use crate::catalog::model::{Catalog, Toolbox};
use crate::catalog::service::CatalogService;
use crate::catalog::workspace::write_atomic;
use crate::error::GeneratorError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use render::metadata_path;
pub use resolve::{ResolvedTool, resolve_tool};

/// Files written for one toolbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedToolbox {
    pub toolbox_id: String,
    pub pyt_path: PathBuf,
    pub metadata_path: Option<PathBuf>,
}

impl GeneratedToolbox {
    fn files(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.pyt_path).chain(self.metadata_path.iter())
    }
}

struct Rendered {
    toolbox_id: String,
    pyt_path: PathBuf,
    pyt: String,
    metadata: Option<(PathBuf, String)>,
}

pub struct GeneratorService<'a> {
    catalog: &'a CatalogService,
}

impl<'a> GeneratorService<'a> {
    pub fn new(catalog: &'a CatalogService) -> Self {
        Self { catalog }
    }

    /// Resolve every reference of a toolbox and report each failure.
    pub fn validate_toolbox(
        &self,
        toolbox_id: &str,
    ) -> Result<(bool, Vec<String>), GeneratorError> {
        let catalog = self.catalog.load()?;
        let Some(toolbox) = catalog.toolbox(toolbox_id) else {
            return Ok((
                false,
                vec![GeneratorError::ToolboxNotFound(toolbox_id.to_string()).to_string()],
            ));
        };
        let errors = match resolve_all(&catalog, toolbox) {
            Ok(_) => Vec::new(),
            Err(errors) => errors,
        };
        Ok((errors.is_empty(), errors))
    }

    /// Where a toolbox goes when no output is given: its catalog path, with
    /// relative paths placed under `<workspace>/toolboxes`.
    pub fn default_output_path(&self, toolbox: &Toolbox) -> PathBuf {
        if toolbox.path.is_absolute() {
            toolbox.path.clone()
        } else {
            self.catalog.workspace().toolboxes_dir().join(&toolbox.path)
        }
    }

    pub fn generate_toolbox(
        &self,
        toolbox_id: &str,
        output_path: &Path,
        metadata: bool,
    ) -> Result<GeneratedToolbox, GeneratorError> {
        let catalog = self.catalog.load()?;
        let toolbox = catalog
            .toolbox(toolbox_id)
            .ok_or_else(|| GeneratorError::ToolboxNotFound(toolbox_id.to_string()))?;
        let rendered = render_toolbox(&catalog, toolbox, output_path, metadata)?;
        let generated = write_rendered(&rendered)?;
        info!(
            toolbox = toolbox_id,
            path = %generated.pyt_path.display(),
            tools = toolbox.enabled_tools().count(),
            "generated toolbox"
        );
        Ok(generated)
    }

    /// Generate every catalog toolbox to `<output_dir>/<id>.pyt`.
    ///
    /// All toolboxes are validated first, so an invalid one stops the batch
    /// before any file is written. A failed write removes the files the
    /// batch already produced.
    pub fn generate_all_toolboxes(
        &self,
        output_dir: &Path,
        metadata: bool,
    ) -> Result<Vec<GeneratedToolbox>, GeneratorError> {
        let catalog = self.catalog.load()?;

        let mut pending = Vec::with_capacity(catalog.toolboxes.len());
        for toolbox in &catalog.toolboxes {
            let output = output_dir.join(format!("{}.pyt", toolbox.id));
            let rendered = render_toolbox(&catalog, toolbox, &output, metadata)
                .map_err(|err| batch_error(&toolbox.id, err))?;
            pending.push(rendered);
        }

        let mut written: Vec<GeneratedToolbox> = Vec::with_capacity(pending.len());
        for rendered in &pending {
            match write_rendered(rendered) {
                Ok(generated) => written.push(generated),
                Err(err) => {
                    remove_all(&written);
                    return Err(batch_error(&rendered.toolbox_id, err));
                }
            }
        }
        info!(
            count = written.len(),
            dir = %output_dir.display(),
            "generated all toolboxes"
        );
        Ok(written)
    }
}

fn batch_error(toolbox_id: &str, err: GeneratorError) -> GeneratorError {
    GeneratorError::Batch {
        toolbox_id: toolbox_id.to_string(),
        source: Box::new(err),
    }
}

/// Resolve references in toolbox order, collecting every failure.
fn resolve_all(catalog: &Catalog, toolbox: &Toolbox) -> Result<Vec<ResolvedTool>, Vec<String>> {
    let mut resolved = Vec::with_capacity(toolbox.tools.len());
    let mut errors = Vec::new();
    for reference in &toolbox.tools {
        match resolve_tool(catalog, reference) {
            Ok(tool) => resolved.push(tool),
            Err(err) => errors.push(err.to_string()),
        }
    }
    errors.extend(duplicate_names(toolbox, &resolved));
    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(errors)
    }
}

/// Enabled tools that would share one entry in the generated `.pyt`.
fn duplicate_names(toolbox: &Toolbox, resolved: &[ResolvedTool]) -> Vec<String> {
    let mut by_name: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for tool in resolved.iter().filter(|t| t.reference.enabled) {
        by_name.entry(tool.display_name()).or_default().push(format!(
            "{}:{}",
            tool.reference.source_id, tool.reference.tool_path
        ));
    }
    by_name
        .into_iter()
        .filter(|(_, refs)| refs.len() > 1)
        .map(|(name, refs)| {
            format!(
                "Tool name '{name}' is used by {} enabled tools in toolbox '{}' ({}); give all but one an alias",
                refs.len(),
                toolbox.id,
                refs.join(", ")
            )
        })
        .collect()
}

fn render_toolbox(
    catalog: &Catalog,
    toolbox: &Toolbox,
    output_path: &Path,
    metadata: bool,
) -> Result<Rendered, GeneratorError> {
    let tools = resolve_all(catalog, toolbox).map_err(|errors| GeneratorError::Invalid {
        toolbox_id: toolbox.id.clone(),
        errors,
    })?;
    let now = Utc::now();
    Ok(Rendered {
        toolbox_id: toolbox.id.clone(),
        pyt_path: output_path.to_path_buf(),
        pyt: render::render_pyt(toolbox, &tools, now),
        metadata: metadata.then(|| {
            (
                metadata_path(output_path),
                render::render_metadata(toolbox, &tools, now),
            )
        }),
    })
}

fn write_rendered(rendered: &Rendered) -> Result<GeneratedToolbox, GeneratorError> {
    write_atomic(&rendered.pyt_path, rendered.pyt.as_bytes()).map_err(|err| {
        GeneratorError::io(format!("writing {}", rendered.pyt_path.display()), err)
    })?;
    let mut generated = GeneratedToolbox {
        toolbox_id: rendered.toolbox_id.clone(),
        pyt_path: rendered.pyt_path.clone(),
        metadata_path: None,
    };
    if let Some((path, xml)) = &rendered.metadata {
        if let Err(err) = write_atomic(path, xml.as_bytes()) {
            remove_all(std::slice::from_ref(&generated));
            return Err(GeneratorError::io(format!("writing {}", path.display()), err));
        }
        generated.metadata_path = Some(path.clone());
    }
    Ok(generated)
}

fn remove_all(generated: &[GeneratedToolbox]) {
    for path in generated.iter().flat_map(GeneratedToolbox::files) {
        if let Err(err) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %err, "could not remove partial output");
        }
    }
}
