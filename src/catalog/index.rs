//! Indexed, validated view of a catalog.
//!
//! Building the index enforces the catalog-level invariants the schema cannot
//! express: the version format, unique source and toolbox ids, and each
//! item's own invariants.

use crate::catalog::identity::is_catalog_version;
use crate::catalog::model::{Catalog, Source, Toolbox};
use crate::error::ModelError;
use std::collections::BTreeMap;

/// Catalog plus lookups keyed by source and toolbox id.
#[derive(Debug)]
pub struct CatalogIndex<'a> {
    catalog: &'a Catalog,
    sources: BTreeMap<&'a str, &'a Source>,
    toolboxes: BTreeMap<&'a str, &'a Toolbox>,
}

impl<'a> CatalogIndex<'a> {
    pub fn build(catalog: &'a Catalog) -> Result<Self, ModelError> {
        validate_version(&catalog.version)?;

        let mut sources = BTreeMap::new();
        for source in &catalog.sources {
            source.validate()?;
            if sources.insert(source.id.as_str(), source).is_some() {
                return Err(ModelError::new(format!("duplicate source id '{}'", source.id)));
            }
        }

        let mut toolboxes = BTreeMap::new();
        for toolbox in &catalog.toolboxes {
            toolbox.validate()?;
            if toolboxes.insert(toolbox.id.as_str(), toolbox).is_some() {
                return Err(ModelError::new(format!(
                    "duplicate toolbox id '{}'",
                    toolbox.id
                )));
            }
        }

        Ok(Self {
            catalog,
            sources,
            toolboxes,
        })
    }

    pub fn source(&self, id: &str) -> Option<&'a Source> {
        self.sources.get(id).copied()
    }

    pub fn toolbox(&self, id: &str) -> Option<&'a Toolbox> {
        self.toolboxes.get(id).copied()
    }

    /// Source ids in sorted order.
    pub fn source_ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.sources.keys().copied()
    }

    pub fn toolbox_ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.toolboxes.keys().copied()
    }

    /// Toolbox ids whose tool lists mention `source_id`.
    pub fn toolboxes_using(&self, source_id: &str) -> Vec<&'a str> {
        self.catalog
            .toolboxes
            .iter()
            .filter(|tb| tb.references_source(source_id))
            .map(|tb| tb.id.as_str())
            .collect()
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }
}

/// Check every invariant of a catalog without keeping the index.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), ModelError> {
    CatalogIndex::build(catalog).map(|_| ())
}

fn validate_version(version: &str) -> Result<(), ModelError> {
    if is_catalog_version(version) {
        Ok(())
    } else {
        Err(ModelError::new(format!(
            "version must match ^\\d+\\.\\d+$, got '{version}'"
        )))
    }
}
