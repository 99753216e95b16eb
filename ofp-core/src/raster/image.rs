use ndarray::{Array3, s};

use super::fill::BufferedMask;
use crate::error::RasterError;
use crate::geometry::PixelBounds;

/// Owned pixel grid, shape `[rows, cols, channels]`
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    data: Array3<u8>,
}

impl RasterImage {
    /// Black image of the given size
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self, RasterError> {
        Self::from_array(Array3::zeros((height, width, channels)))
    }

    pub fn from_array(data: Array3<u8>) -> Result<Self, RasterError> {
        let (rows, cols, channels) = data.dim();
        if rows == 0 || cols == 0 || channels == 0 {
            return Err(RasterError::InvalidDimensions);
        }
        Ok(Self { data })
    }

    /// Build from interleaved row-major samples
    pub fn from_raw(
        width: usize,
        height: usize,
        channels: usize,
        samples: Vec<u8>,
    ) -> Result<Self, RasterError> {
        let data = Array3::from_shape_vec((height, width, channels), samples)
            .map_err(|_| RasterError::InvalidDimensions)?;
        Self::from_array(data)
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }

    pub fn into_array(self) -> Array3<u8> {
        self.data
    }

    /// Interleaved row-major samples, as image codecs expect them
    pub fn to_raw(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn sample(&self, x: usize, y: usize, channel: usize) -> u8 {
        self.data[[y, x, channel]]
    }

    /// Zero every channel of the pixels the mask leaves out
    pub fn apply_mask(&mut self, mask: &BufferedMask) {
        for ((row, col, _), value) in self.data.indexed_iter_mut() {
            if !mask.contains(col, row) {
                *value = 0;
            }
        }
    }

    pub fn crop(&self, bounds: &PixelBounds) -> RasterImage {
        let view = self
            .data
            .slice(s![bounds.y_min..bounds.y_max, bounds.x_min..bounds.x_max, ..]);
        RasterImage {
            data: view.to_owned(),
        }
    }
}
