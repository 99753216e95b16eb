//! Interfaces to the external services a batch depends on
//!
//! Every call may block on network or disk. Implementations hold their own
//! endpoints and credentials; the orchestrator only sees these traits.

use nalgebra::Point2;
use ofp_core::coordinate::{BoundingBox, CrsCode, ImagePoint};
use ofp_core::footprint::FootprintRing;
use ofp_core::raster::RasterImage;

use crate::batch::PairKey;
use crate::catalog::ImageDescriptor;
use crate::config::Rendering;
use crate::error::CollaboratorError;

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// A geocoded address
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// Longitude, degrees (CRS84)
    pub lon: f64,
    /// Latitude, degrees (CRS84)
    pub lat: f64,
    /// Cadastral identifiers (parcel number, land registry district, ...)
    pub cadastral_ids: Vec<String>,
}

/// Footprint outline as delivered by a cadastral or building service
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarFootprint {
    pub points: Vec<Point2<f64>>,
    /// Elevations per vertex when the service provides them
    pub heights: Option<Vec<f64>>,
    pub crs: CrsCode,
}

pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> CollaboratorResult<GeocodedAddress>;
}

pub trait FootprintSource: Send + Sync {
    /// Footprint of the target inside `region` (CRS84)
    fn footprint(&self, region: &BoundingBox, target: &GeocodedAddress) -> CollaboratorResult<PlanarFootprint>;
}

pub trait TerrainModel: Send + Sync {
    /// Terrain elevation at (x, y) given in `crs`
    fn height(&self, crs: CrsCode, x: f64, y: f64) -> CollaboratorResult<f64>;
}

pub trait ImageryCatalog: Send + Sync {
    /// Zero or one image covering `region` (CRS84) for a collection and viewing direction
    fn find(
        &self,
        region: &BoundingBox,
        collection: &str,
        direction: &str,
    ) -> CollaboratorResult<Option<ImageDescriptor>>;
}

pub trait AssetFetcher: Send + Sync {
    /// Raw, still encoded, image bytes
    fn fetch(&self, descriptor: &ImageDescriptor) -> CollaboratorResult<Vec<u8>>;
}

/// Everything persisted for one rendering of one pair
#[derive(Debug, Clone, Copy)]
pub struct OutputRecord<'a> {
    pub target: &'a str,
    pub key: &'a PairKey,
    pub rendering: Rendering,
    pub image: &'a RasterImage,
    pub descriptor: &'a ImageDescriptor,
    /// Projected, unbuffered footprint in source image pixels
    pub footprint: &'a FootprintRing<ImagePoint>,
    pub ground_sample_distance: f64,
}

/// Append-only store for batch results
pub trait ResultSink: Send + Sync {
    fn persist(&self, record: &OutputRecord<'_>) -> CollaboratorResult<()>;
}
