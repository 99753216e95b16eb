//! Decoding fetched assets into rasters and writing results back out

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use ofp_core::raster::RasterImage;

use crate::error::{IoError, Result};

/// Decode any supported format (TIFF, JPEG, PNG, ...) into an RGB raster
pub fn decode_rgb(bytes: &[u8]) -> Result<RasterImage> {
    let decoded = image::load_from_memory(bytes)?;
    from_dynamic(decoded)
}

/// Read an image file into an RGB raster
pub fn open_rgb<P: AsRef<Path>>(path: P) -> Result<RasterImage> {
    from_dynamic(image::open(path)?)
}

fn from_dynamic(decoded: DynamicImage) -> Result<RasterImage> {
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(RasterImage::from_raw(
        width as usize,
        height as usize,
        3,
        rgb.into_raw(),
    )?)
}

/// Convert a raster of 1, 3 or 4 channels for the `image` encoders
pub fn to_dynamic(raster: &RasterImage) -> Result<DynamicImage> {
    let (width, height) = (raster.width() as u32, raster.height() as u32);
    let raw = raster.to_raw();
    let invalid = || IoError::InvalidInput("raster buffer does not match its dimensions".to_string());

    let dynamic = match raster.channels() {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw).ok_or_else(invalid)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw).ok_or_else(invalid)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, raw).ok_or_else(invalid)?),
        n => {
            return Err(IoError::InvalidInput(format!(
                "cannot encode a raster with {n} channels"
            )));
        }
    };
    Ok(dynamic)
}

pub fn encode_png(raster: &RasterImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    to_dynamic(raster)?.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

pub fn save_png<P: AsRef<Path>>(raster: &RasterImage, path: P) -> Result<()> {
    to_dynamic(raster)?.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
