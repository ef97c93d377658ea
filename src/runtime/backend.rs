//! The geoprocessing engine as a capability interface.
//!
//! Tool functions only see `&dyn GeoprocessingBackend`; an ArcGIS-backed
//! implementation lives outside this crate and tests pass a fake.

use crate::error::RuntimeError;
use crate::runtime::MessageSink;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpatialReference {
    pub name: String,
    pub wkid: Option<u32>,
}

impl SpatialReference {
    pub fn is_unknown(&self) -> bool {
        self.name.is_empty() || self.name == "Unknown"
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetDescription {
    pub name: String,
    pub shape_type: Option<String>,
    pub spatial_reference: Option<SpatialReference>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferRequest {
    pub input: String,
    pub output: String,
    pub distance: f64,
    pub units: String,
    pub dissolve: bool,
}

impl BufferRequest {
    /// Distance in the `"<value> <units>"` form the engine expects.
    pub fn linear_unit(&self) -> String {
        format!("{} {}", self.distance, self.units)
    }
}

pub trait GeoprocessingBackend {
    fn exists(&self, dataset: &str) -> bool;
    fn describe(&self, dataset: &str) -> Result<DatasetDescription, RuntimeError>;
    fn count(&self, dataset: &str) -> Result<u64, RuntimeError>;
    fn buffer(&self, request: &BufferRequest) -> Result<(), RuntimeError>;
    fn clip(&self, input: &str, clip: &str, output: &str) -> Result<(), RuntimeError>;
}

/// Fail unless `dataset` exists.
pub fn require_dataset(
    backend: &dyn GeoprocessingBackend,
    dataset: &str,
) -> Result<(), RuntimeError> {
    if backend.exists(dataset) {
        Ok(())
    } else {
        Err(RuntimeError::Validation(format!(
            "Input does not exist: {dataset}"
        )))
    }
}

/// Report a dataset's spatial reference, warning when it is unknown.
pub fn report_spatial_reference(
    backend: &dyn GeoprocessingBackend,
    dataset: &str,
    messages: &mut dyn MessageSink,
) -> Result<(), RuntimeError> {
    let description = backend.describe(dataset)?;
    match description.spatial_reference {
        Some(sr) if !sr.is_unknown() => {
            let wkid = sr
                .wkid
                .map(|code| code.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            messages.message(&format!("Spatial Reference: {} (WKID: {wkid})", sr.name));
        }
        _ => messages.warning(&format!(
            "Warning: {dataset} has unknown spatial reference"
        )),
    }
    Ok(())
}
