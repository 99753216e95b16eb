use nalgebra::{Matrix3, Point3, Vector2};

use crate::error::ProjectionError;

type Result<T> = std::result::Result<T, ProjectionError>;

const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Internal camera geometry at capture time
#[derive(Debug, Clone, PartialEq)]
pub struct InteriorOrientation {
    focal_length_mm: f64,
    pixel_spacing_mm: f64,
    principal_point_offset_mm: Vector2<f64>,
    sensor_cols: usize,
    sensor_rows: usize,
}

impl InteriorOrientation {
    pub fn new(
        focal_length_mm: f64,
        pixel_spacing_mm: f64,
        principal_point_offset_mm: Vector2<f64>,
        sensor_cols: usize,
        sensor_rows: usize,
    ) -> Result<Self> {
        if !(focal_length_mm.is_finite() && focal_length_mm > 0.0) {
            return Err(ProjectionError::InvalidCamera(format!(
                "focal length must be positive, got {focal_length_mm}"
            )));
        }
        if !(pixel_spacing_mm.is_finite() && pixel_spacing_mm > 0.0) {
            return Err(ProjectionError::InvalidCamera(format!(
                "pixel spacing must be positive, got {pixel_spacing_mm}"
            )));
        }
        if !(principal_point_offset_mm.x.is_finite() && principal_point_offset_mm.y.is_finite()) {
            return Err(ProjectionError::InvalidCamera(
                "principal point offset must be finite".to_string(),
            ));
        }
        if sensor_cols == 0 || sensor_rows == 0 {
            return Err(ProjectionError::InvalidCamera(format!(
                "sensor dimensions must be positive, got {sensor_cols}x{sensor_rows}"
            )));
        }

        Ok(Self {
            focal_length_mm,
            pixel_spacing_mm,
            principal_point_offset_mm,
            sensor_cols,
            sensor_rows,
        })
    }

    pub fn focal_length_mm(&self) -> f64 {
        self.focal_length_mm
    }

    pub fn pixel_spacing_mm(&self) -> f64 {
        self.pixel_spacing_mm
    }

    pub fn principal_point_offset_mm(&self) -> Vector2<f64> {
        self.principal_point_offset_mm
    }

    /// Focal length expressed in pixels
    pub fn focal_length_px(&self) -> f64 {
        self.focal_length_mm / self.pixel_spacing_mm
    }

    /// Principal point in pixels, measured from the sensor's lower-left
    /// corner (the photogrammetric image frame, y up)
    pub fn principal_point_px(&self) -> (f64, f64) {
        let x0 = self.sensor_cols as f64 * 0.5
            + self.principal_point_offset_mm.x / self.pixel_spacing_mm;
        let y0 = self.sensor_rows as f64 * 0.5
            + self.principal_point_offset_mm.y / self.pixel_spacing_mm;
        (x0, y0)
    }

    /// Sensor size (columns, rows)
    pub fn sensor_dimensions(&self) -> (usize, usize) {
        (self.sensor_cols, self.sensor_rows)
    }
}

/// Camera position and attitude at capture time
#[derive(Debug, Clone, PartialEq)]
pub struct ExteriorOrientation {
    rotation: Matrix3<f64>,
    perspective_center: Point3<f64>,
}

impl ExteriorOrientation {
    /// `rotation` maps world axes onto camera axes and must be orthonormal
    pub fn new(rotation: Matrix3<f64>, perspective_center: Point3<f64>) -> Result<Self> {
        if rotation.iter().any(|v| !v.is_finite())
            || perspective_center.iter().any(|v| !v.is_finite())
        {
            return Err(ProjectionError::InvalidCamera(
                "exterior orientation contains non-finite values".to_string(),
            ));
        }

        let deviation = (rotation * rotation.transpose() - Matrix3::identity()).amax();
        if deviation > ORTHONORMAL_TOLERANCE {
            return Err(ProjectionError::InvalidCamera(format!(
                "rotation matrix is not orthonormal (deviation {deviation:e})"
            )));
        }

        Ok(Self {
            rotation,
            perspective_center,
        })
    }

    /// Build from omega/phi/kappa angles in radians (sequential x, y, z rotations)
    pub fn from_opk(omega: f64, phi: f64, kappa: f64, perspective_center: Point3<f64>) -> Result<Self> {
        let (so, co) = omega.sin_cos();
        let (sp, cp) = phi.sin_cos();
        let (sk, ck) = kappa.sin_cos();

        #[rustfmt::skip]
        let rotation = Matrix3::new(
            cp * ck,  so * sp * ck + co * sk,  -co * sp * ck + so * sk,
            -cp * sk, -so * sp * sk + co * ck, co * sp * sk + so * ck,
            sp,       -so * cp,                co * cp,
        );

        Self::new(rotation, perspective_center)
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn perspective_center(&self) -> &Point3<f64> {
        &self.perspective_center
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_focal_length_px() {
        let io = InteriorOrientation::new(100.0, 0.004, Vector2::zeros(), 14192, 10640).unwrap();
        assert!((io.focal_length_px() - 25_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_interior_principal_point() {
        let io = InteriorOrientation::new(100.0, 0.004, Vector2::new(0.08, -0.04), 1000, 800).unwrap();
        let (x0, y0) = io.principal_point_px();
        assert!((x0 - 520.0).abs() < 1e-9);
        assert!((y0 - 390.0).abs() < 1e-9);
    }

    #[test]
    fn test_interior_rejects_bad_values() {
        assert!(InteriorOrientation::new(0.0, 0.004, Vector2::zeros(), 10, 10).is_err());
        assert!(InteriorOrientation::new(100.0, -1.0, Vector2::zeros(), 10, 10).is_err());
        assert!(InteriorOrientation::new(100.0, 0.004, Vector2::zeros(), 0, 10).is_err());
        assert!(InteriorOrientation::new(100.0, 0.004, Vector2::new(f64::NAN, 0.0), 10, 10).is_err());
    }

    #[test]
    fn test_exterior_rejects_non_orthonormal() {
        let skewed = Matrix3::new(1.0, 0.1, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let result = ExteriorOrientation::new(skewed, Point3::origin());
        assert!(matches!(result, Err(ProjectionError::InvalidCamera(_))));

        let scaled = Matrix3::identity() * 2.0;
        assert!(ExteriorOrientation::new(scaled, Point3::origin()).is_err());
    }

    #[test]
    fn test_opk_zero_is_identity() {
        let eo = ExteriorOrientation::from_opk(0.0, 0.0, 0.0, Point3::new(1.0, 2.0, 3.0)).unwrap();
        assert!((eo.rotation() - Matrix3::identity()).amax() < 1e-12);
        assert_eq!(eo.perspective_center(), &Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_opk_is_orthonormal() {
        // A typical oblique attitude: 45 degree tilt plus heading
        let eo = ExteriorOrientation::from_opk(0.785, 0.02, 1.3, Point3::origin()).unwrap();
        let r = eo.rotation();
        assert!((r * r.transpose() - Matrix3::identity()).amax() < 1e-12);
        assert!((r.determinant() - 1.0).abs() < 1e-12);
    }
}
