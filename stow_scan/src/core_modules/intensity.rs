// THEORY:
// The first stage of the detector reduces whatever the camera delivered to a
// single channel of brightness and smooths away sensor noise. Everything after
// this stage works on `GrayImage`s only.
//
// - Colour frames are reduced with the Rec. 601 luma weights, the same weights
//   broadcast video uses. Grey frames pass through untouched.
// - Smoothing is a Gaussian blur parameterised by an odd kernel size. The sigma
//   is derived from the kernel size so that a "21" means the same amount of
//   smoothing an operator is used to from other vision tooling.

use image::{DynamicImage, GrayImage, Luma, RgbaImage, imageops};

use crate::error::DetectionError;

const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Converts any frame to 8-bit intensity.
pub fn to_intensity(frame: &DynamicImage) -> GrayImage {
    if let Some(gray) = frame.as_luma8() {
        return gray.clone();
    }

    let rgb = frame.to_rgb8();
    let (width, height) = rgb.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Wraps a raw RGBA buffer, as delivered by capture callbacks, into a frame.
pub fn frame_from_rgba(width: u32, height: u32, bytes: Vec<u8>) -> Result<DynamicImage, DetectionError> {
    let expected = width as usize * height as usize * 4;
    let actual = bytes.len();
    RgbaImage::from_raw(width, height, bytes)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| {
            DetectionError::MalformedFrame(format!(
                "{width}x{height} RGBA needs {expected} bytes, got {actual}"
            ))
        })
}

/// Normalises a requested kernel size: sizes of 0 or 1 mean "no blur", even
/// sizes are rounded up to the next odd size.
pub fn effective_kernel_size(kernel_size: u32) -> u32 {
    match kernel_size {
        0 | 1 => 1,
        k if k % 2 == 0 => k + 1,
        k => k,
    }
}

/// Gaussian sigma for a kernel size, following the common
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8` convention.
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Blurs an intensity image with a Gaussian of the given kernel size.
pub fn gaussian_blur(gray: &GrayImage, kernel_size: u32) -> GrayImage {
    let kernel_size = effective_kernel_size(kernel_size);
    if kernel_size <= 1 {
        return gray.clone();
    }
    imageops::blur(gray, sigma_for_kernel(kernel_size))
}
