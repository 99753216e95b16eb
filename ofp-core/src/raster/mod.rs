//! Footprint buffering, masking and cropping

mod fill;
mod image;
mod offset;

pub use fill::BufferedMask;
pub use image::RasterImage;
pub use offset::{JoinStyle, buffer_ring};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinate::ImagePoint;
use crate::error::RasterError;
use crate::footprint::FootprintRing;
use crate::geometry::PixelBounds;

/// Outward margin around a footprint, in ground units (metres for projected CRSs)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferOptions {
    pub distance: f64,
    pub join: JoinStyle,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            distance: 1.0,
            join: JoinStyle::default(),
        }
    }
}

/// Stroke used when drawing the buffered boundary for visual checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineStyle {
    /// RGBA; only as many components as the image has channels are used
    pub color: [u8; 4],
    /// Stroke width in pixels
    pub width: usize,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0, 255],
            width: 3,
        }
    }
}

/// Result of one rasterizer pass
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub image: RasterImage,
    /// Buffered ring in the coordinates of the input image
    pub buffered: Option<FootprintRing<ImagePoint>>,
    /// Crop window taken from the input image, `None` when the image is returned untouched
    pub crop: Option<PixelBounds>,
}

impl Processed {
    fn identity(image: RasterImage) -> Self {
        Self {
            image,
            buffered: None,
            crop: None,
        }
    }

    /// The buffer was empty and the image came back unmodified
    pub fn is_identity(&self) -> bool {
        self.crop.is_none()
    }
}

/// Masks and crops images around a projected footprint
#[derive(Debug, Clone, Default)]
pub struct FootprintRasterizer {
    buffer: BufferOptions,
    require_visible: bool,
    outline: OutlineStyle,
}

impl FootprintRasterizer {
    pub fn new(buffer: BufferOptions) -> Self {
        Self {
            buffer,
            ..Self::default()
        }
    }

    /// Treat an empty buffered footprint as an error instead of passing the image through
    pub fn with_require_visible(mut self, require_visible: bool) -> Self {
        self.require_visible = require_visible;
        self
    }

    pub fn with_outline(mut self, outline: OutlineStyle) -> Self {
        self.outline = outline;
        self
    }

    pub fn buffer(&self) -> &BufferOptions {
        &self.buffer
    }

    /// Convert the physical buffer distance to pixels
    pub fn buffer_px(&self, ground_sample_distance: f64) -> Result<f64, RasterError> {
        if !(ground_sample_distance.is_finite() && ground_sample_distance > 0.0) {
            return Err(RasterError::InvalidGroundSampleDistance(ground_sample_distance));
        }
        let distance = self.buffer.distance;
        if !(distance.is_finite() && distance >= 0.0) {
            return Err(RasterError::InvalidBufferDistance(distance));
        }
        Ok(distance / ground_sample_distance)
    }

    /// Outward offset of `ring`; `None` when nothing of the footprint is left
    pub fn buffered_ring(
        &self,
        ring: &FootprintRing<ImagePoint>,
        ground_sample_distance: f64,
    ) -> Result<Option<FootprintRing<ImagePoint>>, RasterError> {
        let buffer_px = self.buffer_px(ground_sample_distance)?;
        let buffered = buffer_ring(ring.points(), buffer_px, self.buffer.join);
        debug!(buffer_px, input = ring.len(), output = buffered.len(), "buffered footprint");

        if !buffered.is_empty() {
            return Ok(Some(FootprintRing::new(buffered)));
        }
        if self.require_visible {
            return Err(RasterError::EmptyBuffer);
        }
        Ok(None)
    }

    /// Zero everything outside the buffered footprint and crop to its bounding box
    pub fn process(
        &self,
        mut image: RasterImage,
        ring: &FootprintRing<ImagePoint>,
        ground_sample_distance: f64,
    ) -> Result<Processed, RasterError> {
        let Some(buffered) = self.buffered_ring(ring, ground_sample_distance)? else {
            debug!("empty buffered footprint, returning image unchanged");
            return Ok(Processed::identity(image));
        };

        let (width, height) = (image.width(), image.height());
        let bounds = PixelBounds::covering(buffered.iter(), width, height)
            .ok_or(RasterError::FootprintOutsideImage)?;

        let mask = BufferedMask::rasterize(buffered.points(), width, height);
        image.apply_mask(&mask);
        debug!(?bounds, pixels = mask.count(), "masked footprint");

        Ok(Processed {
            image: image.crop(&bounds),
            buffered: Some(buffered),
            crop: Some(bounds),
        })
    }

    /// Draw the buffered footprint's boundary onto the unmasked image and crop to it
    pub fn outline(
        &self,
        mut image: RasterImage,
        ring: &FootprintRing<ImagePoint>,
        ground_sample_distance: f64,
    ) -> Result<Processed, RasterError> {
        let Some(buffered) = self.buffered_ring(ring, ground_sample_distance)? else {
            return Ok(Processed::identity(image));
        };

        let (width, height) = (image.width(), image.height());
        let bounds = PixelBounds::covering(buffered.iter(), width, height)
            .ok_or(RasterError::FootprintOutsideImage)?;

        let mask = BufferedMask::rasterize(buffered.points(), width, height);
        draw_boundary(&mut image, &mask, &self.outline);

        Ok(Processed {
            image: image.crop(&bounds),
            buffered: Some(buffered),
            crop: Some(bounds),
        })
    }
}

fn draw_boundary(image: &mut RasterImage, mask: &BufferedMask, style: &OutlineStyle) {
    let (width, height, channels) = (image.width(), image.height(), image.channels());
    let radius = style.width / 2;
    let data = image.data_mut();

    for (col, row) in mask.boundary() {
        let rows = row.saturating_sub(radius)..(row + radius + 1).min(height);
        for y in rows {
            let cols = col.saturating_sub(radius)..(col + radius + 1).min(width);
            for x in cols {
                for c in 0..channels {
                    data[[y, x, c]] = style.color.get(c).copied().unwrap_or(u8::MAX);
                }
            }
        }
    }
}

/// Mask and crop `image` to `ring` grown by `buffer_distance_physical` ground units,
/// using the default join.
pub fn process(
    image: RasterImage,
    ring: &FootprintRing<ImagePoint>,
    ground_sample_distance: f64,
    buffer_distance_physical: f64,
) -> Result<RasterImage, RasterError> {
    let rasterizer = FootprintRasterizer::new(BufferOptions {
        distance: buffer_distance_physical,
        ..BufferOptions::default()
    });
    Ok(rasterizer.process(image, ring, ground_sample_distance)?.image)
}
