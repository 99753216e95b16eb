use nalgebra::{Point3, Vector3};

use super::{DEPTH_EPSILON, ExteriorOrientation, InteriorOrientation, Projector};
use crate::coordinate::{CrsCode, GroundPoint, ImagePoint};
use crate::error::ProjectionError;

/// Calibrated frame camera: one photograph's geometry at capture time.
///
/// Ground points handed to [`Projector::project`] must already be expressed
/// in [`CameraModel::crs`]; no reprojection happens here.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    interior: InteriorOrientation,
    exterior: ExteriorOrientation,
    crs: CrsCode,
}

impl CameraModel {
    pub fn new(interior: InteriorOrientation, exterior: ExteriorOrientation, crs: CrsCode) -> Self {
        Self {
            interior,
            exterior,
            crs,
        }
    }

    pub fn interior(&self) -> &InteriorOrientation {
        &self.interior
    }

    pub fn exterior(&self) -> &ExteriorOrientation {
        &self.exterior
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    /// Depth of a ground point along the viewing axis (third rotation row
    /// applied to the offset from the perspective center)
    pub fn depth(&self, point: &GroundPoint) -> f64 {
        let d = point - self.exterior.perspective_center();
        self.exterior.rotation().row(2).transpose().dot(&d)
    }

    /// Approximate ground sample distance (world units per pixel) at a point
    pub fn ground_sample_distance_at(&self, point: &GroundPoint) -> Result<f64, ProjectionError> {
        let depth = self.depth(point);
        if depth.abs() < DEPTH_EPSILON {
            return Err(ProjectionError::Degenerate { depth });
        }
        Ok(depth.abs() / self.interior.focal_length_px())
    }

    /// Whether a pixel coordinate lies within the sensor frame
    pub fn contains(&self, pixel: &ImagePoint) -> bool {
        let (cols, rows) = self.interior.sensor_dimensions();
        pixel.x >= 0.0 && pixel.y >= 0.0 && pixel.x < cols as f64 && pixel.y < rows as f64
    }

    /// Intersect the viewing ray through `pixel` with the plane `Z = ground_z`
    pub fn back_project(&self, pixel: &ImagePoint, ground_z: f64) -> Result<GroundPoint, ProjectionError> {
        let f = self.interior.focal_length_px();
        let (x0, y0) = self.interior.principal_point_px();
        let (_, rows) = self.interior.sensor_dimensions();

        // Undo the upper-left flip, then rotate the image ray into world axes
        let ya = rows as f64 - pixel.y;
        let ray_camera = Vector3::new(pixel.x - x0, ya - y0, -f);
        let ray_world = self.exterior.rotation().transpose() * ray_camera;

        if ray_world.z.abs() < DEPTH_EPSILON {
            return Err(ProjectionError::RayParallelToPlane);
        }

        let center = self.exterior.perspective_center();
        let scale = (ground_z - center.z) / ray_world.z;
        if scale <= 0.0 {
            // Plane lies behind the camera
            return Err(ProjectionError::RayParallelToPlane);
        }

        Ok(Point3::new(
            center.x + scale * ray_world.x,
            center.y + scale * ray_world.y,
            ground_z,
        ))
    }
}

impl Projector for CameraModel {
    fn project(&self, point: &GroundPoint) -> Result<ImagePoint, ProjectionError> {
        let f = self.interior.focal_length_px();
        let (x0, y0) = self.interior.principal_point_px();
        let (_, rows) = self.interior.sensor_dimensions();

        let r = self.exterior.rotation();
        let d = point - self.exterior.perspective_center();

        let n = r[(2, 0)] * d.x + r[(2, 1)] * d.y + r[(2, 2)] * d.z;
        if n.abs() < DEPTH_EPSILON || !n.is_finite() {
            return Err(ProjectionError::Degenerate { depth: n });
        }

        let xa = x0 - f * (r[(0, 0)] * d.x + r[(0, 1)] * d.y + r[(0, 2)] * d.z) / n;
        let ya = y0 - f * (r[(1, 0)] * d.x + r[(1, 1)] * d.y + r[(1, 2)] * d.z) / n;

        // Move the origin from lower-left to upper-left
        Ok(ImagePoint::new(xa, rows as f64 - ya))
    }

    fn image_size(&self) -> (usize, usize) {
        self.interior.sensor_dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector2};

    /// Nadir camera 100 units above the origin, 50 px focal length, 100x100 sensor
    fn nadir_camera() -> CameraModel {
        let interior = InteriorOrientation::new(5.0, 0.1, Vector2::zeros(), 100, 100).unwrap();
        let exterior = ExteriorOrientation::new(Matrix3::identity(), Point3::new(0.0, 0.0, 100.0)).unwrap();
        CameraModel::new(interior, exterior, CrsCode::ETRS89_UTM32N)
    }

    fn oblique_camera() -> CameraModel {
        let interior =
            InteriorOrientation::new(123.0, 0.00376, Vector2::new(0.12, -0.08), 14192, 10640).unwrap();
        let exterior =
            ExteriorOrientation::from_opk(0.78, -0.03, 1.52, Point3::new(586_000.0, 6_137_000.0, 1_450.0))
                .unwrap();
        CameraModel::new(interior, exterior, CrsCode::ETRS89_UTM32N)
    }

    #[test]
    fn test_ground_point_below_center_hits_image_center() {
        let camera = nadir_camera();
        let pixel = camera.project(&Point3::new(0.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(pixel.x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(pixel.y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ground_offset_along_x() {
        // n = -100, so xa = 50 - 50 * 10 / -100
        let camera = nadir_camera();
        let pixel = camera.project(&Point3::new(10.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(pixel.x, 55.0, epsilon = 1e-9);
        assert_relative_eq!(pixel.y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ground_offset_along_y_moves_up_the_image() {
        let camera = nadir_camera();
        let pixel = camera.project(&Point3::new(0.0, 10.0, 0.0)).unwrap();
        assert_relative_eq!(pixel.x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(pixel.y, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_point_in_focal_plane_is_degenerate() {
        let camera = nadir_camera();
        let result = camera.project(&Point3::new(0.0, 0.0, 100.0));
        assert_eq!(result, Err(ProjectionError::Degenerate { depth: 0.0 }));

        let result = camera.project(&Point3::new(25.0, -5.0, 100.0));
        assert!(matches!(result, Err(ProjectionError::Degenerate { .. })));
    }

    #[test]
    fn test_principal_point_offset_shifts_pixels() {
        let interior = InteriorOrientation::new(5.0, 0.1, Vector2::new(1.0, 2.0), 100, 100).unwrap();
        let exterior = ExteriorOrientation::new(Matrix3::identity(), Point3::new(0.0, 0.0, 100.0)).unwrap();
        let camera = CameraModel::new(interior, exterior, CrsCode::ETRS89_UTM32N);

        let pixel = camera.project(&Point3::origin()).unwrap();
        assert_relative_eq!(pixel.x, 60.0, epsilon = 1e-9);
        assert_relative_eq!(pixel.y, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let camera = oblique_camera();
        let point = Point3::new(586_400.0, 6_137_250.0, 14.5);
        let first = camera.project(&point).unwrap();
        for _ in 0..10 {
            assert_eq!(camera.project(&point).unwrap(), first);
        }
    }

    #[test]
    fn test_round_trip_simple_camera() {
        let camera = nadir_camera();
        for &(u, v) in &[(50.0, 50.0), (12.25, 80.5), (99.0, 0.5), (-20.0, 130.0)] {
            let pixel = ImagePoint::new(u, v);
            let ground = camera.back_project(&pixel, 0.0).unwrap();
            let reprojected = camera.project(&ground).unwrap();
            assert!((reprojected - pixel).norm() < 1e-6);
        }
    }

    #[test]
    fn test_round_trip_oblique_camera() {
        let camera = oblique_camera();
        let pixel = ImagePoint::new(7000.0, 5200.0);
        let ground = camera.back_project(&pixel, 12.0).unwrap();
        assert_relative_eq!(ground.z, 12.0);

        let reprojected = camera.project(&ground).unwrap();
        assert!((reprojected - pixel).norm() < 1e-6);
    }

    #[test]
    fn test_back_project_rejects_plane_behind_camera() {
        let camera = nadir_camera();
        let result = camera.back_project(&ImagePoint::new(50.0, 50.0), 200.0);
        assert_eq!(result, Err(ProjectionError::RayParallelToPlane));
    }

    #[test]
    fn test_ground_sample_distance() {
        let camera = nadir_camera();
        let gsd = camera.ground_sample_distance_at(&Point3::origin()).unwrap();
        assert_relative_eq!(gsd, 2.0, epsilon = 1e-12);

        let degenerate = camera.ground_sample_distance_at(&Point3::new(0.0, 0.0, 100.0));
        assert!(degenerate.is_err());
    }

    #[test]
    fn test_contains_and_no_bounds_check() {
        let camera = nadir_camera();
        // Far off to the side: still projects, just outside the frame
        let pixel = camera.project(&Point3::new(500.0, 0.0, 0.0)).unwrap();
        assert!(!camera.contains(&pixel));
        assert!(camera.contains(&ImagePoint::new(0.0, 99.9)));
        assert!(!camera.contains(&ImagePoint::new(100.0, 10.0)));
    }

    #[test]
    fn test_image_size() {
        let camera = oblique_camera();
        assert_eq!(camera.image_size(), (14192, 10640));
    }
}
