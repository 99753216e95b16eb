use thiserror::Error;

use crate::coordinate::CrsCode;

/// Common errors across the footprint projection pipeline
#[derive(Error, Debug)]
pub enum OfpError {
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Coordinate transform error: {0}")]
    CoordinateTransform(#[from] CoordinateError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Degenerate projection: depth {depth} is within the focal plane")]
    Degenerate { depth: f64 },

    #[error("Viewing ray is parallel to the ground plane")]
    RayParallelToPlane,

    #[error("Invalid camera: {0}")]
    InvalidCamera(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    #[error("Footprint lies entirely outside the image")]
    FootprintOutsideImage,

    #[error("Buffered footprint is empty")]
    EmptyBuffer,

    #[error("Invalid ground sample distance: {0} (must be > 0)")]
    InvalidGroundSampleDistance(f64),

    #[error("Invalid buffer distance: {0} (must be >= 0)")]
    InvalidBufferDistance(f64),

    #[error("Invalid raster dimensions")]
    InvalidDimensions,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Invalid latitude: {0} (must be -90 to 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be -180 to 180)")]
    InvalidLongitude(f64),

    #[error("Invalid CRS identifier: {0}")]
    InvalidCrsCode(String),

    #[error("Unsupported transform from {from} to {to}")]
    UnsupportedCrs { from: CrsCode, to: CrsCode },

    #[error("Coordinate transform failed: {0}")]
    TransformFailed(String),
}

pub type Result<T> = std::result::Result<T, OfpError>;
