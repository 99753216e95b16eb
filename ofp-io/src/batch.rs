//! Batch orchestration over (collection, direction) pairs
//!
//! A batch resolves one target address to a ground footprint, then runs every
//! configured (collection, direction) pair independently on a bounded worker
//! pool. A failing pair is recorded in the report and never stops the others.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use nalgebra::Point3;
use ofp_core::camera::Projector;
use ofp_core::coordinate::{BoundingBox, CrsCode, CrsTransform, GroundPoint, ImagePoint};
use ofp_core::error::{CoordinateError, ProjectionError, RasterError};
use ofp_core::footprint::{self, FootprintRing};
use ofp_core::geometry::PixelBounds;
use ofp_core::raster::{FootprintRasterizer, Processed, RasterImage};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::collaborators::{
    AssetFetcher, CollaboratorResult, FootprintSource, Geocoder, ImageryCatalog, OutputRecord,
    PlanarFootprint, ResultSink, TerrainModel,
};
use crate::config::{BatchConfig, Rendering};
use crate::error::{CollaboratorError, IoError, Result};
use crate::image::decode_rgb;

/// Stable identity of one pair, independent of completion order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    /// Position in the declared collection-major order
    pub index: usize,
    pub collection: String,
    pub direction: String,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.collection, self.direction)
    }
}

/// Cooperative stop signal, checked before each pair starts
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    ImageProduced {
        image_id: String,
        renderings: Vec<Rendering>,
        /// `None` when an empty buffer passed the image through uncropped
        crop: Option<PixelBounds>,
    },
    NoImageFound,
    ProjectionFailed(ProjectionError),
    FootprintOutsideFrame,
    RasterFailed(RasterError),
    TransformFailed(CoordinateError),
    CollaboratorFailed(CollaboratorError),
    /// Not started because the batch was cancelled
    Cancelled,
}

impl PairOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PairOutcome::ImageProduced { .. } => "image produced",
            PairOutcome::NoImageFound => "no image found",
            PairOutcome::ProjectionFailed(_) => "projection failed",
            PairOutcome::FootprintOutsideFrame => "footprint outside frame",
            PairOutcome::RasterFailed(_) => "raster failed",
            PairOutcome::TransformFailed(_) => "transform failed",
            PairOutcome::CollaboratorFailed(_) => "collaborator failed",
            PairOutcome::Cancelled => "cancelled",
        }
    }

    pub fn is_produced(&self) -> bool {
        matches!(self, PairOutcome::ImageProduced { .. })
    }
}

impl fmt::Display for PairOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairOutcome::ImageProduced { image_id, .. } => write!(f, "{} ({image_id})", self.label()),
            PairOutcome::ProjectionFailed(err) => write!(f, "{}: {err}", self.label()),
            PairOutcome::RasterFailed(err) => write!(f, "{}: {err}", self.label()),
            PairOutcome::TransformFailed(err) => write!(f, "{}: {err}", self.label()),
            PairOutcome::CollaboratorFailed(err) => write!(f, "{}: {err}", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    pub key: PairKey,
    pub outcome: PairOutcome,
}

/// Per-pair outcomes in declared order
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub target: String,
    pub results: Vec<PairResult>,
}

impl BatchReport {
    pub fn outcome(&self, collection: &str, direction: &str) -> Option<&PairOutcome> {
        self.results
            .iter()
            .find(|r| r.key.collection == collection && r.key.direction == direction)
            .map(|r| &r.outcome)
    }

    pub fn produced(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_produced()).count()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}/{} images", self.target, self.produced(), self.results.len())?;
        for result in &self.results {
            writeln!(f, "  {:>3} {:<24} {}", result.key.index, result.key.to_string(), result.outcome)?;
        }
        Ok(())
    }
}

/// The external services a batch talks to
pub struct Collaborators {
    pub geocoder: Box<dyn Geocoder>,
    pub footprints: Box<dyn FootprintSource>,
    pub terrain: Box<dyn TerrainModel>,
    pub catalog: Box<dyn ImageryCatalog>,
    pub assets: Box<dyn AssetFetcher>,
    pub sink: Box<dyn ResultSink>,
    pub crs: Box<dyn CrsTransform>,
}

/// Target footprint resolved once per batch, in the working CRS
#[derive(Debug, Clone)]
struct Target {
    region: BoundingBox,
    ring: FootprintRing<GroundPoint>,
    centroid: GroundPoint,
}

pub struct Orchestrator {
    config: BatchConfig,
    collaborators: Collaborators,
    rasterizer: FootprintRasterizer,
}

impl Orchestrator {
    pub fn new(config: BatchConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let rasterizer = FootprintRasterizer::new(config.buffer)
            .with_require_visible(config.require_visible_footprint)
            .with_outline(config.outline);
        Ok(Self {
            config,
            collaborators,
            rasterizer,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Pairs in declared order: collection-major, then direction
    pub fn plan(&self) -> Vec<PairKey> {
        self.config
            .collections
            .iter()
            .flat_map(|collection| {
                self.config
                    .directions
                    .iter()
                    .map(move |direction| (collection.clone(), direction.clone()))
            })
            .enumerate()
            .map(|(index, (collection, direction))| PairKey {
                index,
                collection,
                direction,
            })
            .collect()
    }

    /// Run every pair for `address`.
    ///
    /// Fails only when the target itself cannot be resolved (address,
    /// footprint or terrain); per-pair failures are reported in the result.
    pub fn run(&self, address: &str, cancel: &CancellationToken) -> Result<BatchReport> {
        let target = self.resolve_target(address)?;
        let plan = self.plan();
        info!(
            address,
            pairs = plan.len(),
            workers = self.config.max_workers,
            "starting batch"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()?;

        let results: Vec<PairResult> = pool.install(|| {
            plan.into_par_iter()
                .map(|key| {
                    let outcome = if cancel.is_cancelled() {
                        PairOutcome::Cancelled
                    } else {
                        self.process_pair(address, &target, &key)
                    };
                    if outcome.is_produced() {
                        info!(%key, "{outcome}");
                    } else {
                        warn!(%key, "{outcome}");
                    }
                    PairResult { key, outcome }
                })
                .collect()
        });

        let report = BatchReport {
            target: address.to_string(),
            results,
        };
        info!(produced = report.produced(), total = report.results.len(), "batch finished");
        Ok(report)
    }

    fn resolve_target(&self, address: &str) -> Result<Target> {
        let location = self.retry("geocode", || self.collaborators.geocoder.geocode(address))?;
        let region = BoundingBox::around(location.lon, location.lat, self.config.bbox_margin_deg);
        debug!(bbox = %region.to_query_string(), "catalog query region");

        let planar = self.retry("footprint", || {
            self.collaborators.footprints.footprint(&region, &location)
        })?;
        let ring = self.ground_ring(&planar)?;
        let centroid = ring.centroid().ok_or_else(|| {
            CollaboratorError::FeatureNotFound(format!("empty footprint for {address}"))
        })?;

        Ok(Target {
            region,
            ring,
            centroid,
        })
    }

    /// Bring a planar footprint into the working CRS and attach elevations
    fn ground_ring(&self, planar: &PlanarFootprint) -> Result<FootprintRing<GroundPoint>> {
        let working = self.config.working_crs;
        if let Some(heights) = &planar.heights {
            if heights.len() != planar.points.len() {
                return Err(IoError::InvalidInput(format!(
                    "footprint has {} vertices but {} heights",
                    planar.points.len(),
                    heights.len()
                )));
            }
        }

        let mut ring = Vec::with_capacity(planar.points.len());
        for (i, point) in planar.points.iter().enumerate() {
            let (x, y) = self
                .collaborators
                .crs
                .transform(planar.crs, working, point.x, point.y)?;
            let z = match &planar.heights {
                Some(heights) => heights[i],
                None => self.retry("terrain", || self.collaborators.terrain.height(working, x, y))?,
            };
            ring.push(Point3::new(x, y, z));
        }
        Ok(FootprintRing::new(ring))
    }

    fn process_pair(&self, address: &str, target: &Target, key: &PairKey) -> PairOutcome {
        let found = self.retry("catalog", || {
            self.collaborators
                .catalog
                .find(&target.region, &key.collection, &key.direction)
        });
        let descriptor = match found {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) | Err(CollaboratorError::NoMatchingImage { .. }) => return PairOutcome::NoImageFound,
            Err(err) => return PairOutcome::CollaboratorFailed(err),
        };
        let camera = &descriptor.camera;

        let (ring, centroid) = match self.to_camera_crs(target, camera.crs()) {
            Ok(converted) => converted,
            Err(err) => return PairOutcome::TransformFailed(err),
        };
        let projected = match footprint::project_ring(camera, &ring, self.config.vertex_policy) {
            Ok(projected) => projected,
            Err(err) => return PairOutcome::ProjectionFailed(err),
        };
        let gsd = match descriptor.gsd {
            Some(gsd) => gsd,
            None => match camera.ground_sample_distance_at(&centroid) {
                Ok(gsd) => gsd,
                Err(err) => return PairOutcome::ProjectionFailed(err),
            },
        };
        debug!(%key, image = %descriptor.id, gsd, vertices = projected.len(), "projected footprint");

        let bytes = match self.retry("asset", || self.collaborators.assets.fetch(&descriptor)) {
            Ok(bytes) => bytes,
            Err(err) => return PairOutcome::CollaboratorFailed(err),
        };
        let image = match decode_rgb(&bytes) {
            Ok(image) => image,
            Err(err) => return PairOutcome::CollaboratorFailed(CollaboratorError::InvalidAsset(err.to_string())),
        };
        // Projected pixels only mean something on the sensor's own grid
        let (width, height) = camera.image_size();
        if (image.width(), image.height()) != (width, height) {
            return PairOutcome::CollaboratorFailed(CollaboratorError::InvalidAsset(format!(
                "{} is {}x{} but the camera sensor is {width}x{height}",
                descriptor.id,
                image.width(),
                image.height()
            )));
        }

        // Render everything before persisting anything
        let renderings = self.config.output.renderings();
        let mut rendered = Vec::with_capacity(renderings.len());
        for &rendering in renderings {
            match self.render(rendering, image.clone(), &projected, gsd) {
                Ok(processed) => rendered.push((rendering, processed)),
                Err(RasterError::FootprintOutsideImage) => return PairOutcome::FootprintOutsideFrame,
                Err(err) => return PairOutcome::RasterFailed(err),
            }
        }

        let mut crop = None;
        for (rendering, processed) in &rendered {
            let record = OutputRecord {
                target: address,
                key,
                rendering: *rendering,
                image: &processed.image,
                descriptor: &descriptor,
                footprint: &projected,
                ground_sample_distance: gsd,
            };
            if let Err(err) = self.retry("persist", || self.collaborators.sink.persist(&record)) {
                return PairOutcome::CollaboratorFailed(err);
            }
            crop = processed.crop;
        }

        PairOutcome::ImageProduced {
            image_id: descriptor.id.clone(),
            renderings: renderings.to_vec(),
            crop,
        }
    }

    fn render(
        &self,
        rendering: Rendering,
        image: RasterImage,
        projected: &FootprintRing<ImagePoint>,
        gsd: f64,
    ) -> std::result::Result<Processed, RasterError> {
        match rendering {
            Rendering::Masked => self.rasterizer.process(image, projected, gsd),
            Rendering::Outlined => self.rasterizer.outline(image, projected, gsd),
        }
    }

    fn to_camera_crs(
        &self,
        target: &Target,
        crs: CrsCode,
    ) -> std::result::Result<(FootprintRing<GroundPoint>, GroundPoint), CoordinateError> {
        let from = self.config.working_crs;
        if from == crs {
            return Ok((target.ring.clone(), target.centroid));
        }

        let convert = |p: &GroundPoint| -> std::result::Result<GroundPoint, CoordinateError> {
            let (x, y) = self.collaborators.crs.transform(from, crs, p.x, p.y)?;
            Ok(Point3::new(x, y, p.z))
        };
        let ring: FootprintRing<GroundPoint> = target
            .ring
            .iter()
            .map(convert)
            .collect::<std::result::Result<_, _>>()?;
        Ok((ring, convert(&target.centroid)?))
    }

    /// Call a collaborator, retrying transient failures with doubling pauses
    fn retry<T>(&self, what: &str, mut call: impl FnMut() -> CollaboratorResult<T>) -> CollaboratorResult<T> {
        let policy = self.config.retry;
        let mut attempt = 1;
        loop {
            match call() {
                Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                    let pause = policy.backoff(attempt);
                    warn!(what, attempt, ?pause, %err, "transient failure, retrying");
                    thread::sleep(pause);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_pair_key_display() {
        let key = PairKey {
            index: 3,
            collection: "aerial2019".into(),
            direction: "west".into(),
        };
        assert_eq!(key.to_string(), "aerial2019_west");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(PairOutcome::NoImageFound.to_string(), "no image found");
        assert_eq!(
            PairOutcome::ProjectionFailed(ProjectionError::Degenerate { depth: 0.0 }).to_string(),
            "projection failed: Degenerate projection: depth 0 is within the focal plane"
        );
        assert!(!PairOutcome::Cancelled.is_produced());
    }
}
