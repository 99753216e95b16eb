//! Small planar helpers shared by the projector and the rasterizer

use nalgebra::{Point2, Vector2};

/// Coincidence tolerance for ring vertices, in pixels
pub const VERTEX_EPSILON: f64 = 1e-9;

/// Shoelace area over an implicitly closed ring
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x * q.y - q.x * p.y;
    }
    0.5 * twice_area
}

/// 2D cross product (z component)
pub fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Drop zero-length edges, including an explicit closing vertex
pub fn dedup_ring(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_none_or(|last| (p - last).norm() > VERTEX_EPSILON) {
            out.push(*p);
        }
    }
    while out.len() > 1 && (out[0] - out[out.len() - 1]).norm() <= VERTEX_EPSILON {
        out.pop();
    }
    out
}

/// Half-open pixel rectangle `[x_min, x_max) x [y_min, y_max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl PixelBounds {
    /// Pixels touched by the given points, clipped to a `width` x `height` grid.
    /// Returns `None` when nothing of the points' extent overlaps the grid.
    pub fn covering<'a, I>(points: I, width: usize, height: usize) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point2<f64>>,
    {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
            return None;
        }

        let clip = |v: f64, limit: usize| v.clamp(0.0, limit as f64) as usize;
        let bounds = Self {
            x_min: clip(min.x.floor(), width),
            y_min: clip(min.y.floor(), height),
            x_max: clip(max.x.floor() + 1.0, width),
            y_max: clip(max.y.floor() + 1.0, height),
        };

        (bounds.width() > 0 && bounds.height() > 0).then_some(bounds)
    }

    pub fn width(&self) -> usize {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> usize {
        self.y_max.saturating_sub(self.y_min)
    }

    pub fn contains(&self, other: &PixelBounds) -> bool {
        self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }
}
