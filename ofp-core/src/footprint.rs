//! Footprint rings and their projection onto an image

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::camera::Projector;
use crate::coordinate::{BoundingBox, GroundPoint, ImagePoint};
use crate::error::ProjectionError;
use crate::geometry;

/// Ordered polygon boundary; closure from last to first point is implicit
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintRing<P> {
    points: Vec<P>,
}

impl<P> FootprintRing<P> {
    pub fn new(points: Vec<P>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[P] {
        &self.points
    }

    pub fn into_points(self) -> Vec<P> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.points.iter()
    }
}

impl<P> FromIterator<P> for FootprintRing<P> {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FootprintRing<GroundPoint> {
    /// Vertex mean, used as a representative point for the footprint
    pub fn centroid(&self) -> Option<GroundPoint> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Some(GroundPoint::from(sum / self.points.len() as f64))
    }
}

impl FootprintRing<ImagePoint> {
    /// Shift every vertex, e.g. into the frame of a cropped image
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        self.points
            .iter()
            .map(|p| ImagePoint::new(p.x + dx, p.y + dy))
            .collect()
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(self.points.iter().map(|p| (p.x, p.y)))
    }

    /// Shoelace area, positive for rings turning left in x-right/y-up axes
    pub fn signed_area(&self) -> f64 {
        geometry::signed_area(&self.points)
    }
}

/// What to do with a vertex that cannot be projected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexPolicy {
    /// Any degenerate vertex fails the whole ring
    #[default]
    FailRing,
    /// Skip degenerate vertices and keep the rest in order
    DropVertex,
}

/// Project a ground ring onto an image, preserving vertex order
pub fn project_ring<P>(
    projector: &P,
    ring: &FootprintRing<GroundPoint>,
    policy: VertexPolicy,
) -> Result<FootprintRing<ImagePoint>, ProjectionError>
where
    P: Projector + ?Sized,
{
    let mut projected = Vec::with_capacity(ring.len());
    let mut last_error = None;

    for (index, point) in ring.iter().enumerate() {
        match projector.project(point) {
            Ok(pixel) => projected.push(pixel),
            Err(err) if policy == VertexPolicy::DropVertex => {
                warn!(index, %err, "dropping unprojectable footprint vertex");
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    match last_error {
        Some(err) if projected.is_empty() => Err(err),
        _ => Ok(FootprintRing::new(projected)),
    }
}
