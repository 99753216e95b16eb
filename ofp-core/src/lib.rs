pub mod camera;
pub mod coordinate;
pub mod error;
pub mod footprint;
pub mod geometry;
pub mod raster;

pub use camera::{CameraModel, ExteriorOrientation, InteriorOrientation, Projector};
pub use coordinate::{BoundingBox, CrsCode, CrsTransform, GroundPoint, ImagePoint, UtmTransform};
pub use error::{CoordinateError, OfpError, ProjectionError, RasterError, Result};
pub use footprint::{FootprintRing, VertexPolicy, project_ring};
pub use raster::{BufferOptions, FootprintRasterizer, JoinStyle, OutlineStyle, Processed, RasterImage};
