// THEORY:
// The `BackgroundModel` is the detector's memory of what the scene looks like
// when nothing is moving. It is a per-pixel running average of blurred
// intensities kept in floating point, so that slow lighting drift is absorbed a
// little at a time instead of in 8-bit steps.
//
// Lifecycle:
// - It is born from a single frame, copied and promoted to `f32`.
// - Every later frame is blended in with an exponential moving average:
//   `bg = (1 - rate) * bg + rate * frame`.
// - Comparisons are made against the average rounded back to 8 bits.
// - It never outlives a move phase: the owner throws it away whenever the
//   camera itself has been displaced.

use image::{GrayImage, Luma};

pub struct BackgroundModel {
    width: u32,
    height: u32,
    mean: Vec<f32>,
}

impl BackgroundModel {
    /// Seeds the model from one frame.
    pub fn from_frame(frame: &GrayImage) -> Self {
        let (width, height) = frame.dimensions();
        Self {
            width,
            height,
            mean: frame.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Blends `frame` into the running average. The frame must have the
    /// model's dimensions.
    pub fn accumulate(&mut self, frame: &GrayImage, rate: f32) {
        let keep = 1.0 - rate;
        for (mean, &value) in self.mean.iter_mut().zip(frame.as_raw()) {
            *mean = keep * *mean + rate * value as f32;
        }
    }

    /// The model rounded back to 8-bit intensities.
    pub fn rounded(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([Self::round(self.mean[(y * self.width + x) as usize])])
        })
    }

    /// Absolute per-pixel difference between `frame` and the rounded model.
    pub fn difference(&self, frame: &GrayImage) -> GrayImage {
        let diff = frame
            .as_raw()
            .iter()
            .zip(&self.mean)
            .map(|(&value, &mean)| value.abs_diff(Self::round(mean)))
            .collect();
        GrayImage::from_raw(self.width, self.height, diff)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    fn round(value: f32) -> u8 {
        value.round().clamp(0.0, 255.0) as u8
    }
}
