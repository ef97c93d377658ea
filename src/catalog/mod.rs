//! The toolbox catalog.
//!
//! A catalog file (`catalogs/default.yml` inside the workspace) records where
//! tools live (`sources`) and which tools make up each generated toolbox
//! (`toolboxes[].tools`). `CatalogService` is the only writer; the discovery
//! and generator services read through it.

pub mod identity;
pub mod index;
pub mod lock;
pub mod model;
pub mod service;
pub mod workspace;

pub use identity::{alias_from_slug, is_slug, normalize_tool_path, validate_tool_path};
pub use index::{CatalogIndex, validate_catalog};
pub use lock::CatalogLock;
pub use model::{
    Catalog, CatalogSettings, NewSource, Source, SourceLocation, SourceType, SourceUpdate,
    ToolReference, ToolReferenceUpdate, Toolbox, ToolboxUpdate,
};
pub use service::{CatalogService, DEFAULT_CATALOG_VERSION};
pub use workspace::Workspace;
