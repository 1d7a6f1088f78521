// THEORY:
// A `MotionRegion` is one contiguous patch of foreground pixels in a single
// frame, summarised by the handful of numbers the controller steers by: how
// big it is, where its middle is, and the box that encloses it.
//
// Key architectural principles:
// 1.  **Snapshot only**: a region has no memory. The same person seen in two
//     consecutive frames produces two unrelated regions. Stop-and-Scan never
//     associates detections across frames, it simply acts on the largest one.
// 2.  **Dumb container**: regions are produced by the region detector and
//     consumed by the motion detectors; they carry no behaviour beyond small
//     geometric helpers.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, `(x, y)` being the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Builds a box from inclusive corner coordinates.
    pub fn from_corners(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// A single, spatially coherent foreground region within one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRegion {
    /// Position of this region in discovery (raster) order. Not persistent.
    pub ordinal: usize,
    /// Number of foreground pixels in the region.
    pub area: u32,
    /// Mean pixel coordinate of the region's mask.
    pub centroid: (f64, f64),
    pub bounding_box: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_inclusive() {
        let bbox = BoundingBox::from_corners(2, 3, 2, 7);
        assert_eq!(bbox, BoundingBox { x: 2, y: 3, width: 1, height: 5 });
        assert_eq!(bbox.center(), (2.5, 5.5));
    }
}
