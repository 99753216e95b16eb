use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::geometry::{self, VERTEX_EPSILON};

/// Turns with a smaller cross product count as straight or as reversals
const ANGLE_EPSILON: f64 = 1e-12;

/// How the offset curve is continued around convex corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum JoinStyle {
    /// Sharp corners; corners longer than `limit` times the distance are squared off
    Miter { limit: f64 },
    /// Circular arcs whose chords stay within `arc_tolerance` pixels of the true arc
    Round { arc_tolerance: f64 },
}

impl Default for JoinStyle {
    fn default() -> Self {
        JoinStyle::Miter { limit: 2.0 }
    }
}

/// Grow a ring outward by `distance` pixels.
///
/// The result is the raw offset curve: reflex corners are bridged through the
/// original vertex, so the loops that appear where offsets overlap carry the
/// same winding as the surrounding area and disappear under a nonzero fill.
/// An empty vector means the buffered footprint is empty.
pub fn buffer_ring(ring: &[Point2<f64>], distance: f64, join: JoinStyle) -> Vec<Point2<f64>> {
    let mut points = geometry::dedup_ring(ring);
    if points.is_empty() {
        return points;
    }

    if distance <= 0.0 {
        let area = geometry::signed_area(&points);
        if points.len() < 3 || area.abs() <= VERTEX_EPSILON {
            return Vec::new();
        }
        return points;
    }

    if points.len() == 1 {
        return point_cap(&points[0], distance, join);
    }

    if geometry::signed_area(&points) < 0.0 {
        points.reverse();
    }

    let count = points.len();
    let mut curve = Vec::with_capacity(count * 3);
    for i in 0..count {
        let prev = &points[(i + count - 1) % count];
        let cur = &points[i];
        let next = &points[(i + 1) % count];
        offset_corner(&mut curve, prev, cur, next, distance, join);
    }

    geometry::dedup_ring(&curve)
}

fn right_normal(u: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(u.y, -u.x)
}

fn offset_corner(
    curve: &mut Vec<Point2<f64>>,
    prev: &Point2<f64>,
    cur: &Point2<f64>,
    next: &Point2<f64>,
    distance: f64,
    join: JoinStyle,
) {
    let u1 = (cur - prev).normalize();
    let u2 = (next - cur).normalize();
    let n1 = right_normal(&u1);
    let n2 = right_normal(&u2);
    let turn_cross = geometry::cross(&u1, &u2);
    let turn_dot = u1.dot(&u2);

    if turn_cross.abs() < ANGLE_EPSILON && turn_dot > 0.0 {
        curve.push(cur + n1 * distance);
        return;
    }

    if turn_cross < 0.0 && turn_cross.abs() >= ANGLE_EPSILON {
        // Reflex corner: bridge through the vertex itself
        curve.push(cur + n1 * distance);
        curve.push(*cur);
        curve.push(cur + n2 * distance);
        return;
    }

    // Convex corner, or a full reversal at the tip of a zero-width spike
    let turn = if turn_cross.abs() < ANGLE_EPSILON {
        PI
    } else {
        turn_cross.atan2(turn_dot)
    };

    match join {
        JoinStyle::Miter { limit } => {
            let cos_half = ((1.0 + turn_dot) * 0.5).max(0.0).sqrt();
            if cos_half * limit.max(1.0) >= 1.0 {
                curve.push(cur + (n1 + n2) * (distance / (1.0 + turn_dot)));
            } else {
                let k = (turn / 4.0).tan();
                curve.push(cur + (n1 + u1 * k) * distance);
                curve.push(cur + (n2 - u2 * k) * distance);
            }
        }
        JoinStyle::Round { arc_tolerance } => {
            let start = n1.y.atan2(n1.x);
            let steps = arc_steps(turn, distance, arc_tolerance);
            for step in 0..=steps {
                let angle = start + turn * step as f64 / steps as f64;
                curve.push(cur + Vector2::new(angle.cos(), angle.sin()) * distance);
            }
        }
    }
}

/// Chord count keeping the sagitta under `tolerance`
fn arc_steps(sweep: f64, radius: f64, tolerance: f64) -> usize {
    let tolerance = tolerance.max(1e-3).min(radius);
    let step = 2.0 * (1.0 - tolerance / radius).acos();
    let step = if step > 0.0 { step.min(FRAC_PI_2) } else { FRAC_PI_2 };
    ((sweep.abs() / step).ceil() as usize).max(1)
}

/// Buffer of a single point: a disc or an axis-aligned square
fn point_cap(center: &Point2<f64>, distance: f64, join: JoinStyle) -> Vec<Point2<f64>> {
    match join {
        JoinStyle::Miter { .. } => vec![
            center + Vector2::new(-distance, -distance),
            center + Vector2::new(distance, -distance),
            center + Vector2::new(distance, distance),
            center + Vector2::new(-distance, distance),
        ],
        JoinStyle::Round { arc_tolerance } => {
            let steps = arc_steps(2.0 * PI, distance, arc_tolerance).max(8);
            (0..steps)
                .map(|step| {
                    let angle = 2.0 * PI * step as f64 / steps as f64;
                    center + Vector2::new(angle.cos(), angle.sin()) * distance
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::fill::BufferedMask;

    const MITER: JoinStyle = JoinStyle::Miter { limit: 2.0 };
    const ROUND: JoinStyle = JoinStyle::Round { arc_tolerance: 0.1 };

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2<f64>> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    fn extent(points: &[Point2<f64>]) -> (f64, f64, f64, f64) {
        points.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(a, b, c, d), p| (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
        )
    }

    fn square() -> Vec<Point2<f64>> {
        pts(&[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0), (10.0, 20.0)])
    }

    /// A U opening towards +y with a 10 px wide notch
    fn u_shape() -> Vec<Point2<f64>> {
        pts(&[
            (10.0, 10.0),
            (40.0, 10.0),
            (40.0, 40.0),
            (30.0, 40.0),
            (30.0, 20.0),
            (20.0, 20.0),
            (20.0, 40.0),
            (10.0, 40.0),
        ])
    }

    #[test]
    fn test_zero_distance_is_identity() {
        let ring = square();
        assert_eq!(buffer_ring(&ring, 0.0, MITER), ring);
    }

    #[test]
    fn test_round_join_below_tolerance_floor() {
        let buffered = buffer_ring(&square(), 5e-4, ROUND);
        let (x0, y0, x1, y1) = extent(&buffered);
        assert!((x0 - (10.0 - 5e-4)).abs() < 1e-9 && (y0 - (10.0 - 5e-4)).abs() < 1e-9);
        assert!((x1 - (20.0 + 5e-4)).abs() < 1e-9 && (y1 - (20.0 + 5e-4)).abs() < 1e-9);

        let cap = buffer_ring(&pts(&[(5.0, 5.0)]), 1e-4, ROUND);
        assert!(cap.len() >= 8);
        assert!(cap.iter().all(|p| ((p - Point2::new(5.0, 5.0)).norm() - 1e-4).abs() < 1e-12));
    }

    #[test]
    fn test_zero_distance_degenerate_is_empty() {
        let line = pts(&[(0.0, 0.0), (5.0, 5.0), (10.0, 10.0)]);
        assert!(buffer_ring(&line, 0.0, MITER).is_empty());
        assert!(buffer_ring(&[], 3.0, MITER).is_empty());
    }

    #[test]
    fn test_miter_square_grows_evenly() {
        let buffered = buffer_ring(&square(), 2.0, MITER);
        assert_eq!(buffered.len(), 4);
        assert_eq!(extent(&buffered), (8.0, 8.0, 22.0, 22.0));
    }

    #[test]
    fn test_orientation_independent() {
        let reversed: Vec<_> = square().into_iter().rev().collect();
        assert_eq!(extent(&buffer_ring(&reversed, 2.0, MITER)), (8.0, 8.0, 22.0, 22.0));
    }

    #[test]
    fn test_miter_limit_squares_sharp_spikes() {
        // Thin triangle whose apex miter would run far beyond twice the distance
        let spike = pts(&[(0.0, 0.0), (100.0, 5.0), (0.0, 10.0)]);
        let (_, _, max_x, _) = extent(&buffer_ring(&spike, 2.0, MITER));
        assert!(max_x <= 100.0 + 2.0 * 2.0 + 1e-9);
        assert!(max_x > 100.0);
    }

    #[test]
    fn test_round_join_stays_within_distance() {
        let buffered = buffer_ring(&square(), 3.0, ROUND);
        for p in &buffered {
            let dx = (p.x - p.x.clamp(10.0, 20.0)).abs();
            let dy = (p.y - p.y.clamp(10.0, 20.0)).abs();
            assert!(((dx * dx + dy * dy).sqrt() - 3.0).abs() < 1e-9);
        }
        assert_eq!(extent(&buffered), (7.0, 7.0, 23.0, 23.0));
    }

    #[test]
    fn test_collinear_vertices() {
        let with_midpoints = pts(&[
            (10.0, 10.0),
            (15.0, 10.0),
            (20.0, 10.0),
            (20.0, 20.0),
            (10.0, 20.0),
        ]);
        assert_eq!(
            extent(&buffer_ring(&with_midpoints, 2.0, MITER)),
            extent(&buffer_ring(&square(), 2.0, MITER))
        );
    }

    #[test]
    fn test_zero_length_edges() {
        let repeated = pts(&[
            (10.0, 10.0),
            (10.0, 10.0),
            (20.0, 10.0),
            (20.0, 20.0),
            (20.0, 20.0),
            (10.0, 20.0),
            (10.0, 10.0),
        ]);
        assert_eq!(buffer_ring(&repeated, 2.0, MITER), buffer_ring(&square(), 2.0, MITER));
    }

    #[test]
    fn test_segment_becomes_capsule() {
        let segment = pts(&[(10.0, 10.0), (30.0, 10.0)]);
        let buffered = buffer_ring(&segment, 2.0, MITER);
        assert_eq!(extent(&buffered), (8.0, 8.0, 32.0, 12.0));

        let mask = BufferedMask::rasterize(&buffered, 40, 20);
        assert!(mask.contains(20, 8));
        assert!(mask.contains(20, 11));
        assert!(!mask.contains(20, 13));
    }

    #[test]
    fn test_single_point_cap() {
        let dot = pts(&[(5.0, 5.0)]);
        assert_eq!(extent(&buffer_ring(&dot, 2.0, MITER)), (3.0, 3.0, 7.0, 7.0));
        let disc = buffer_ring(&dot, 2.0, ROUND);
        assert!(disc.len() >= 8);
        assert!(disc.iter().all(|p| ((p - Point2::new(5.0, 5.0)).norm() - 2.0).abs() < 1e-9));
    }

    #[test]
    fn test_overlapping_offsets_close_the_notch() {
        let ring = u_shape();
        let buffered = buffer_ring(&ring, 6.0, MITER);
        let mask = BufferedMask::rasterize(&buffered, 60, 60);

        // Within 6 px of both arms: filled
        assert!(mask.contains(25, 30));
        // Far outside
        assert!(!mask.contains(55, 55));
        // Still outside the outer offset
        assert!(!mask.contains(2, 25));
    }

    #[test]
    fn test_narrow_buffer_keeps_the_notch_open() {
        let ring = u_shape();
        let buffered = buffer_ring(&ring, 2.0, MITER);
        let mask = BufferedMask::rasterize(&buffered, 60, 60);
        assert!(!mask.contains(25, 30));
        assert!(mask.contains(21, 30));
        assert!(mask.contains(28, 30));
    }

    #[test]
    fn test_self_intersecting_input() {
        let bow_tie = pts(&[(10.0, 10.0), (30.0, 30.0), (30.0, 10.0), (10.0, 30.0)]);
        let buffered = buffer_ring(&bow_tie, 2.0, MITER);
        assert!(!buffered.is_empty());

        let mask = BufferedMask::rasterize(&buffered, 40, 40);
        assert!(mask.contains(12, 20));
        assert!(mask.contains(28, 20));
        let (min_x, min_y, max_x, max_y) = extent(&buffered);
        assert!(min_x < 10.0 && min_y < 10.0 && max_x > 30.0 && max_y > 30.0);
    }

    #[test]
    fn test_buffer_is_monotonic() {
        for join in [MITER, ROUND] {
            for ring in [square(), u_shape(), pts(&[(0.0, 0.0), (100.0, 5.0), (0.0, 10.0)])] {
                let mut previous = extent(&ring);
                for step in 1..=12 {
                    let current = extent(&buffer_ring(&ring, step as f64 * 0.75, join));
                    assert!(current.0 <= previous.0 + 1e-9);
                    assert!(current.1 <= previous.1 + 1e-9);
                    assert!(current.2 >= previous.2 - 1e-9);
                    assert!(current.3 >= previous.3 - 1e-9);
                    previous = current;
                }
            }
        }
    }
}
