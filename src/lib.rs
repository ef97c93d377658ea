//! Catalog and code generation for ArcGIS Pro Python toolboxes.
//!
//! Tools are described by `tool.yml` files spread across sources (local
//! folders, network shares, git repositories). The catalog records the
//! sources and which tools belong to each toolbox; discovery scans sources
//! for descriptors; the generator writes a `.pyt` (and `.pyt.xml`) per
//! toolbox once every tool reference resolves.

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod generator;
pub mod observability;
pub mod runtime;
pub mod schema_loader;
pub mod settings;

pub use catalog::{
    Catalog, CatalogService, CatalogSettings, NewSource, Source, SourceType, SourceUpdate,
    ToolReference, ToolReferenceUpdate, Toolbox, ToolboxUpdate,
};
pub use config::{ToolConfig, ToolboxConfig};
pub use discovery::{DiscoveredTool, DiscoveredToolbox, DiscoveryService, ScanOutcome, ScanWarning};
pub use error::{
    CatalogError, ConfigError, DiscoveryError, GeneratorError, GitError, ModelError, RuntimeError,
};
pub use generator::{GeneratedToolbox, GeneratorService, ResolvedTool};
pub use settings::Settings;

/// Split a comma- or whitespace-separated list, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::split_list;

    #[test]
    fn split_list_handles_commas_and_spaces() {
        assert_eq!(split_list("gis, arcpy  buffer,,"), vec!["gis", "arcpy", "buffer"]);
        assert!(split_list(" , ").is_empty());
    }
}
