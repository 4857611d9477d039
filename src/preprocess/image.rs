use std::path::Path;

use image::{imageops::FilterType, io::Reader as ImageReader, DynamicImage};
use tracing::debug;

use super::{FeatureVector, PreprocessError};

/// Side length of the square input the vision classifier was trained on
pub const IMAGE_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

const MEAN: [f32; CHANNELS] = [0.485, 0.456, 0.406];
const STD: [f32; CHANNELS] = [0.229, 0.224, 0.225];

/// Load an uploaded image and convert it to a normalized `[1, 3, 224, 224]` tensor.
pub fn preprocess_image(path: &Path) -> Result<FeatureVector, PreprocessError> {
    // Uploads may carry any extension (or none), so sniff the format from the bytes.
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!(
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "Image decoded"
    );
    Ok(image_to_features(&img))
}

/// Resize, grayscale to three channels, scale to [0,1] and normalize, laid out NCHW.
pub fn image_to_features(img: &DynamicImage) -> FeatureVector {
    let resized = img
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
        .to_rgb8();

    let plane = (IMAGE_SIZE * IMAGE_SIZE) as usize;
    let mut data = vec![0.0f32; CHANNELS * plane];

    for (i, pixel) in resized.pixels().enumerate() {
        let value = luma(pixel[0], pixel[1], pixel[2]) as f32 / 255.0;
        for c in 0..CHANNELS {
            data[c * plane + i] = (value - MEAN[c]) / STD[c];
        }
    }

    FeatureVector::new(
        data,
        vec![1, CHANNELS as u64, IMAGE_SIZE as u64, IMAGE_SIZE as u64],
    )
}

/// ITU-R 601-2 luma in fixed point, rounded the way the training pipeline's
/// grayscale conversion rounds.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}
