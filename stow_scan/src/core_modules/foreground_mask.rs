// THEORY:
// A `ForegroundMask` is the binary answer to "which pixels changed?". It is
// produced by thresholding a difference image and then cleaned up with
// morphological dilation: each pass grows every foreground pixel into its 3x3
// neighbourhood, which knits together fragments of one moving object and fills
// pinholes before region finding runs.
//
// Like the other core data types it is a dumb container. It knows how to build
// and grow itself; grouping pixels into regions is the job of the region
// detector.

use image::GrayImage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl ForegroundMask {
    /// Marks every pixel whose difference is strictly greater than `threshold`.
    pub fn from_difference(diff: &GrayImage, threshold: u8) -> Self {
        let (width, height) = diff.dimensions();
        Self {
            width,
            height,
            bits: diff.as_raw().iter().map(|&d| d > threshold).collect(),
        }
    }

    /// Builds a mask from explicit bits, row-major.
    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Option<Self> {
        if bits.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self { width, height, bits })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Grows the mask with a 3x3 square structuring element, `iterations` times.
    /// Pixels outside the image never contribute.
    pub fn dilate(&mut self, iterations: u32) {
        for _ in 0..iterations {
            let source = self.bits.clone();
            let (w, h) = (self.width as i64, self.height as i64);
            for y in 0..h {
                for x in 0..w {
                    let index = (y * w + x) as usize;
                    if source[index] {
                        continue;
                    }
                    let mut hit = false;
                    'window: for dy in -1..=1 {
                        for dx in -1..=1 {
                            let (nx, ny) = (x + dx, y + dy);
                            if nx >= 0 && nx < w && ny >= 0 && ny < h && source[(ny * w + nx) as usize] {
                                hit = true;
                                break 'window;
                            }
                        }
                    }
                    self.bits[index] = hit;
                }
            }
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }
}
