// THEORY:
// The `motion_detector` module assembles the vision stages into the component
// the controller talks to. A detector turns one camera frame into at most one
// `MotionObservation`: the largest region of the frame that differs from the
// learned background.
//
// The per-frame pipeline (`SubtractionStage`):
// 1.  Reduce to intensity and blur (`intensity`).
// 2.  No background yet: seed it from this frame and report nothing. The
//     priming frame can never produce an observation.
// 3.  Blend the frame into the background (`background_model`).
// 4.  Difference against the rounded background, threshold, dilate
//     (`foreground_mask`).
// 5.  Group into regions and keep the largest one above the minimum area
//     (`region_detector`).
//
// Two detectors share that pipeline and are chosen explicitly by the caller
// through `DetectorKind`:
// - `AdvancedMotionDetector` takes every knob from `TuningParameters` and
//   reports the true centroid of the region's pixel mask.
// - `BasicMotionDetector` runs with fixed, forgiving settings and steers by the
//   centre of the bounding box. It ignores tunables entirely.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core_modules::background_model::BackgroundModel;
use crate::core_modules::foreground_mask::ForegroundMask;
use crate::core_modules::intensity::{gaussian_blur, to_intensity};
use crate::core_modules::motion_region::{BoundingBox, MotionRegion};
use crate::core_modules::region_detector::region_detector;
use crate::error::DetectionError;
use crate::settings::TuningParameters;

/// The result of one detection pass. Produced fresh every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionObservation {
    pub detected: bool,
    pub centroid: (f64, f64),
    pub area: u32,
    pub bounding_box: BoundingBox,
}

impl MotionObservation {
    /// An observation that saw nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(centroid: (f64, f64), area: u32, bounding_box: BoundingBox) -> Self {
        Self {
            detected: true,
            centroid,
            area,
            bounding_box,
        }
    }
}

/// Turns frames into motion observations while maintaining a background model.
pub trait MotionDetector: Send {
    /// Processes one frame. The first frame after construction or `reset`
    /// only primes the background and never reports motion.
    fn detect(&mut self, frame: &DynamicImage) -> Result<MotionObservation, DetectionError>;

    /// Drops the background model; the next frame re-primes it.
    fn reset(&mut self);

    /// Whether a background model currently exists.
    fn is_primed(&self) -> bool;

    /// Picks up new tunables. Takes effect from the next frame.
    fn configure(&mut self, params: &TuningParameters);

    fn name(&self) -> &'static str;
}

/// Selects a detector implementation at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Basic,
    #[default]
    Advanced,
}

impl DetectorKind {
    pub fn create(self, params: &TuningParameters) -> Box<dyn MotionDetector> {
        match self {
            DetectorKind::Basic => Box::new(BasicMotionDetector::new()),
            DetectorKind::Advanced => Box::new(AdvancedMotionDetector::new(params)),
        }
    }
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" | "simple" => Ok(DetectorKind::Basic),
            "advanced" => Ok(DetectorKind::Advanced),
            other => Err(format!("unknown detector kind: {other}")),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Basic => f.write_str("basic"),
            DetectorKind::Advanced => f.write_str("advanced"),
        }
    }
}

/// Knobs of the shared subtraction pipeline.
#[derive(Debug, Clone, PartialEq)]
struct SubtractionSettings {
    blur_size: u32,
    learning_rate: f32,
    sensitivity: u8,
    dilate_iterations: u32,
    min_area: u32,
}

impl From<&TuningParameters> for SubtractionSettings {
    fn from(params: &TuningParameters) -> Self {
        Self {
            blur_size: params.gaussian_blur_size,
            learning_rate: params.background_learning_rate.clamp(0.0, 1.0) as f32,
            sensitivity: params.tracking_sensitivity.min(255) as u8,
            dilate_iterations: params.dilate_iterations,
            min_area: params.min_area,
        }
    }
}

/// Background subtraction from raw frame to the largest qualifying region.
struct SubtractionStage {
    settings: SubtractionSettings,
    background: Option<BackgroundModel>,
}

impl SubtractionStage {
    fn new(settings: SubtractionSettings) -> Self {
        Self {
            settings,
            background: None,
        }
    }

    fn largest_region(&mut self, frame: &DynamicImage) -> Result<Option<MotionRegion>, DetectionError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            trace!("zero-sized frame ignored");
            return Ok(None);
        }

        let gray = gaussian_blur(&to_intensity(frame), self.settings.blur_size);

        let Some(background) = self.background.as_mut() else {
            self.background = Some(BackgroundModel::from_frame(&gray));
            debug!(width, height, "background model initialised");
            return Ok(None);
        };

        if background.dimensions() != (width, height) {
            return Err(DetectionError::FrameSizeMismatch {
                expected: background.dimensions(),
                actual: (width, height),
            });
        }

        background.accumulate(&gray, self.settings.learning_rate);
        let diff = background.difference(&gray);

        let mut mask = ForegroundMask::from_difference(&diff, self.settings.sensitivity);
        mask.dilate(self.settings.dilate_iterations);

        let regions = region_detector::find_regions(&mask);
        let found = regions.len();
        let largest = region_detector::select_largest(regions, self.settings.min_area);
        trace!(found, qualifying = largest.is_some(), "regions analysed");
        Ok(largest)
    }
}

/// The fully tunable detector.
pub struct AdvancedMotionDetector {
    stage: SubtractionStage,
}

impl AdvancedMotionDetector {
    pub fn new(params: &TuningParameters) -> Self {
        Self {
            stage: SubtractionStage::new(params.into()),
        }
    }
}

impl MotionDetector for AdvancedMotionDetector {
    fn detect(&mut self, frame: &DynamicImage) -> Result<MotionObservation, DetectionError> {
        Ok(match self.stage.largest_region(frame)? {
            Some(region) => MotionObservation::at(region.centroid, region.area, region.bounding_box),
            None => MotionObservation::none(),
        })
    }

    fn reset(&mut self) {
        self.stage.background = None;
    }

    fn is_primed(&self) -> bool {
        self.stage.background.is_some()
    }

    fn configure(&mut self, params: &TuningParameters) {
        self.stage.settings = params.into();
    }

    fn name(&self) -> &'static str {
        "advanced"
    }
}

const BASIC_SETTINGS: SubtractionSettings = SubtractionSettings {
    blur_size: 21,
    learning_rate: 0.5,
    sensitivity: 25,
    dilate_iterations: 2,
    min_area: 2000,
};

/// The fixed-parameter fallback detector.
pub struct BasicMotionDetector {
    stage: SubtractionStage,
}

impl BasicMotionDetector {
    pub fn new() -> Self {
        Self {
            stage: SubtractionStage::new(BASIC_SETTINGS),
        }
    }
}

impl Default for BasicMotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector for BasicMotionDetector {
    fn detect(&mut self, frame: &DynamicImage) -> Result<MotionObservation, DetectionError> {
        Ok(match self.stage.largest_region(frame)? {
            Some(region) => {
                let bbox = region.bounding_box;
                let centre = ((bbox.x + bbox.width / 2) as f64, (bbox.y + bbox.height / 2) as f64);
                MotionObservation::at(centre, region.area, bbox)
            }
            None => MotionObservation::none(),
        })
    }

    fn reset(&mut self) {
        self.stage.background = None;
    }

    fn is_primed(&self) -> bool {
        self.stage.background.is_some()
    }

    fn configure(&mut self, _params: &TuningParameters) {
        debug!("basic detector runs with fixed settings, tunables ignored");
    }

    fn name(&self) -> &'static str {
        "basic"
    }
}
