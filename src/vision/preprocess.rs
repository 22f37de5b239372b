use std::io::Cursor;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{ImageError, ImageFormat, RgbImage};

use super::ClassifyError;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Pixel data laid out as a single NHWC batch: one image, `height` rows
/// of `width` RGB pixels, channel values in 0..=255.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl ImageBatch {
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, 3]
    }
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an upload into RGB regardless of its original color type.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, ClassifyError> {
    let img = image::load_from_memory(bytes).map_err(|e| match e {
        ImageError::Decoding(_) | ImageError::Unsupported(_) => {
            tracing::info!("Rejected upload that is not an image: {}", e);
            ClassifyError::InvalidImage
        }
        other => ClassifyError::Preprocess(other.into()),
    })?;
    Ok(img.to_rgb8())
}

pub fn resize(img: &RgbImage, size: u32) -> RgbImage {
    image::imageops::resize(img, size, size, FilterType::CatmullRom)
}

pub fn to_batch(img: &RgbImage) -> ImageBatch {
    ImageBatch {
        height: img.height() as usize,
        width: img.width() as usize,
        data: img.as_raw().iter().map(|v| f32::from(*v)).collect(),
    }
}

/// PNG bytes of the image encoded as base64 for inline display.
pub fn to_base64_png(img: &RgbImage) -> Result<String> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(STANDARD.encode(buf.into_inner()))
}
