//! Camera models and ground-to-image projection

mod frame;
mod orientation;

pub use frame::CameraModel;
pub use orientation::{ExteriorOrientation, InteriorOrientation};

use crate::coordinate::{GroundPoint, ImagePoint};
use crate::error::ProjectionError;

/// Denominators below this magnitude are treated as lying in the focal plane
pub const DEPTH_EPSILON: f64 = 1e-9;

/// Anything that maps ground points onto an image grid
pub trait Projector {
    /// Project a ground point to upper-left-origin pixel coordinates.
    /// No bounds check is made against the image size.
    fn project(&self, point: &GroundPoint) -> Result<ImagePoint, ProjectionError>;

    /// Get image dimensions (columns, rows) this projector is calibrated for
    fn image_size(&self) -> (usize, usize);
}
