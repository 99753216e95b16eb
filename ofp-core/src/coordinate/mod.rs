//! Coordinate types, CRS identifiers and CRS transformation adapters

mod crs;
mod transforms;

pub use crs::CrsCode;
pub use transforms::{CrsTransform, UtmTransform, UtmZone};

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Ground point (X, Y, Z) in a projected CRS, Z being the terrain elevation
pub type GroundPoint = Point3<f64>;

/// Pixel coordinate, origin at the upper-left corner, x right, y down
pub type ImagePoint = Point2<f64>;

/// Axis-aligned box in a 2D CRS (x = easting or longitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Square box of `margin` units on each side of a location
    pub fn around(x: f64, y: f64, margin: f64) -> Self {
        Self {
            min_x: x - margin,
            min_y: y - margin,
            max_x: x + margin,
            max_y: y + margin,
        }
    }

    /// Smallest box containing every point, `None` for an empty iterator
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::around(x, y, 0.0);
        for (x, y) in iter {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        Some(bbox)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }

    /// Catalog query form `min_x,min_y,max_x,max_y`
    pub fn to_query_string(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_around() {
        let bbox = BoundingBox::around(10.5, 55.25, 0.25);
        assert_eq!(bbox.min_x, 10.25);
        assert_eq!(bbox.max_x, 10.75);
        assert_eq!(bbox.min_y, 55.0);
        assert_eq!(bbox.max_y, 55.5);
        assert_eq!(bbox.center(), (10.5, 55.25));
    }

    #[test]
    fn test_bbox_enclosing() {
        let bbox = BoundingBox::enclosing(vec![(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)]).unwrap();
        assert_eq!(bbox.min_x, -2.0);
        assert_eq!(bbox.min_y, -1.0);
        assert_eq!(bbox.max_x, 4.0);
        assert_eq!(bbox.max_y, 5.0);

        assert!(BoundingBox::enclosing(Vec::new()).is_none());
    }

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::around(0.0, 0.0, 1.0);
        let b = BoundingBox::around(1.5, 0.0, 1.0);
        let c = BoundingBox::around(5.0, 5.0, 1.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_bbox_query_string() {
        let bbox = BoundingBox {
            min_x: 10.5,
            min_y: 55.25,
            max_x: 10.75,
            max_y: 55.5,
        };
        assert_eq!(bbox.to_query_string(), "10.5,55.25,10.75,55.5");
    }
}
