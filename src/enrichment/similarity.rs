//! Cover similarity.
//!
//! RMS of the grayscale difference image, computed from its histogram:
//! `sqrt(sum(h[i] * i^2) / pixels)`. Identical images score 0.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Decode an image, sniffing the format from its bytes.
///
/// Scratch files carry no extension, so the path can't be trusted.
pub fn load(path: &Path) -> Result<DynamicImage, image::ImageError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// ITU-R 601-2 luma, `L = R*299/1000 + G*587/1000 + B*114/1000`, truncated.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let l = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
    l.min(255) as u8
}

/// RMS distance between two images.
///
/// The candidate is resized to the reference's dimensions when they differ.
pub fn rms_distance(reference: &DynamicImage, candidate: &DynamicImage) -> f64 {
    let reference = reference.to_rgb8();
    let (width, height) = reference.dimensions();
    let pixels = f64::from(width) * f64::from(height);
    if pixels == 0.0 {
        return 0.0;
    }

    let mut candidate = candidate.to_rgb8();
    if candidate.dimensions() != (width, height) {
        candidate = image::imageops::resize(&candidate, width, height, FilterType::Triangle);
    }

    let mut histogram = [0u64; 256];
    for (a, b) in reference.pixels().zip(candidate.pixels()) {
        let l = luma(a[0].abs_diff(b[0]), a[1].abs_diff(b[1]), a[2].abs_diff(b[2]));
        histogram[usize::from(l)] += 1;
    }

    let sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| count as f64 * (i * i) as f64)
        .sum();
    (sum / pixels).sqrt()
}
