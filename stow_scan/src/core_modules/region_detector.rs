// THEORY:
// The `region_detector` is the spatial grouping stage of the detector. It turns
// a binary `ForegroundMask` into a list of `MotionRegion`s, one per maximal
// 8-connected group of foreground pixels, and picks the one worth chasing.
//
// Algorithm:
// 1.  **Raster seeding**: the mask is scanned top-to-bottom, left-to-right. The
//     first unvisited foreground pixel met becomes the seed of a new region, so
//     regions come out in a fixed, reproducible order.
// 2.  **Region growing**: from each seed a flood fill visits every foreground
//     pixel reachable through the 8 neighbours, marking them visited so no pixel
//     ever belongs to two regions.
// 3.  **Aggregation**: while growing, the fill keeps running sums of the pixel
//     coordinates and the extreme corners, giving area, centroid (first moment of
//     the mask divided by its area) and bounding box without a second pass.
// 4.  **Selection**: regions smaller than the minimum area are discarded and the
//     largest survivor wins. On equal areas the region discovered first wins,
//     which makes the choice deterministic for identical input.

use crate::core_modules::foreground_mask::ForegroundMask;
use crate::core_modules::motion_region::{BoundingBox, MotionRegion};

pub mod region_detector {
    use super::*;

    const NEIGHBOURS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    /// Finds every 8-connected foreground region, in raster discovery order.
    pub fn find_regions(mask: &ForegroundMask) -> Vec<MotionRegion> {
        let (width, height) = (mask.width(), mask.height());
        let mut visited = vec![false; width as usize * height as usize];
        let mut regions = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if visited[index] || !mask.is_set(x, y) {
                    continue;
                }
                let region = grow_region((x, y), mask, &mut visited, regions.len());
                regions.push(region);
            }
        }

        regions
    }

    /// The largest region of at least `min_area` pixels. Ties go to the region
    /// found first.
    pub fn select_largest(regions: Vec<MotionRegion>, min_area: u32) -> Option<MotionRegion> {
        let mut best: Option<MotionRegion> = None;
        for region in regions.into_iter().filter(|r| r.area >= min_area) {
            if best.as_ref().is_none_or(|current| region.area > current.area) {
                best = Some(region);
            }
        }
        best
    }

    /// Depth-first flood fill from `seed`, aggregating region statistics.
    fn grow_region(
        seed: (u32, u32),
        mask: &ForegroundMask,
        visited: &mut [bool],
        ordinal: usize,
    ) -> MotionRegion {
        let width = mask.width() as i64;
        let height = mask.height() as i64;

        let mut stack = vec![seed];
        visited[(seed.1 as i64 * width + seed.0 as i64) as usize] = true;

        let mut area: u64 = 0;
        let mut sum_x: u64 = 0;
        let mut sum_y: u64 = 0;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        while let Some((x, y)) = stack.pop() {
            area += 1;
            sum_x += x as u64;
            sum_y += y as u64;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for (dx, dy) in NEIGHBOURS {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || nx >= width || ny < 0 || ny >= height {
                    continue;
                }
                let index = (ny * width + nx) as usize;
                if !visited[index] && mask.is_set(nx as u32, ny as u32) {
                    visited[index] = true;
                    stack.push((nx as u32, ny as u32));
                }
            }
        }

        MotionRegion {
            ordinal,
            area: area as u32,
            centroid: (sum_x as f64 / area as f64, sum_y as f64 / area as f64),
            bounding_box: BoundingBox::from_corners(min_x, min_y, max_x, max_y),
        }
    }
}
