use ofp_core::error::{CoordinateError, ProjectionError, RasterError};
use thiserror::Error;

/// Failures reported by external collaborators (geocoder, catalog, asset store, ...)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("No footprint feature found: {0}")]
    FeatureNotFound(String),

    #[error("No terrain height at ({x}, {y})")]
    NoHeight { x: f64, y: f64 },

    #[error("No image for collection {collection}, direction {direction}")]
    NoMatchingImage { collection: String, direction: String },

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Unreadable image asset: {0}")]
    InvalidAsset(String),

    #[error("Persisting result failed: {0}")]
    PersistFailed(String),

    #[error("Transient failure: {0}")]
    Transient(String),
}

impl CollaboratorError {
    /// Worth retrying after a pause
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum IoError {
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Coordinate transform error: {0}")]
    Coordinate(#[from] CoordinateError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Schema mismatch at `{field}`: {reason}")]
    SchemaMismatch { field: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl IoError {
    pub(crate) fn schema(field: &str, reason: impl Into<String>) -> Self {
        IoError::SchemaMismatch {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IoError>;
