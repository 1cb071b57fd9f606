// src/detectors/motion.rs
//
// Frame-differencing motion detector: grayscale absolute difference against
// the previous frame, binary threshold, then 4-connected region growing.
// Each region yields its centroid and pixel count as a MotionCandidate.

use tracing::debug;

use crate::detectors::MotionDetector;
use crate::types::{Frame, MotionCandidate};

#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl GrayFrame {
    /// From packed RGB bytes, BT.601 luma.
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Self {
        let data = rgb
            .chunks_exact(3)
            .map(|p| (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32) as u8)
            .collect();
        Self { data, width, height }
    }

    fn same_shape(&self, other: &GrayFrame) -> bool {
        self.width == other.width && self.height == other.height && self.data.len() == other.data.len()
    }
}

#[derive(Debug)]
pub struct FrameDifferenceDetector {
    prev: Option<GrayFrame>,
    threshold: u8,
    min_region_px: usize,
}

impl Default for FrameDifferenceDetector {
    fn default() -> Self {
        Self::new(25, 4)
    }
}

impl FrameDifferenceDetector {
    pub fn new(threshold: u8, min_region_px: usize) -> Self {
        Self {
            prev: None,
            threshold,
            min_region_px: min_region_px.max(1),
        }
    }

    /// Regions that changed between `prev` and `cur`. Frames must share a shape.
    pub fn diff_regions(&self, prev: &GrayFrame, cur: &GrayFrame) -> Vec<MotionCandidate> {
        let (w, h) = (cur.width, cur.height);
        let mask: Vec<bool> = prev
            .data
            .iter()
            .zip(&cur.data)
            .map(|(a, b)| a.abs_diff(*b) > self.threshold)
            .collect();

        let mut visited = vec![false; mask.len()];
        let mut regions = Vec::new();
        let mut queue = std::collections::VecDeque::new();

        for start in 0..mask.len() {
            if !mask[start] || visited[start] {
                continue;
            }
            visited[start] = true;
            queue.push_back(start);

            let (mut sx, mut sy, mut n) = (0.0f64, 0.0f64, 0usize);
            while let Some(i) = queue.pop_front() {
                let (x, y) = (i % w, i / w);
                sx += x as f64;
                sy += y as f64;
                n += 1;

                let mut visit = |j: usize| {
                    if mask[j] && !visited[j] {
                        visited[j] = true;
                        queue.push_back(j);
                    }
                };
                if x > 0 {
                    visit(i - 1);
                }
                if x + 1 < w {
                    visit(i + 1);
                }
                if y > 0 {
                    visit(i - w);
                }
                if y + 1 < h {
                    visit(i + w);
                }
            }

            if n >= self.min_region_px {
                regions.push(MotionCandidate {
                    x: (sx / n as f64) as f32,
                    y: (sy / n as f64) as f32,
                    area: n as f32,
                });
            }
        }
        regions
    }
}

impl MotionDetector for FrameDifferenceDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<MotionCandidate> {
        let Some(image) = frame.image.as_ref() else {
            return Vec::new();
        };
        let (w, h) = image.dimensions();
        let cur = GrayFrame::from_rgb(image.as_raw(), w as usize, h as usize);

        let regions = match self.prev.as_ref() {
            Some(prev) if prev.same_shape(&cur) => self.diff_regions(prev, &cur),
            Some(_) => {
                debug!("Frame size changed, restarting motion reference");
                Vec::new()
            }
            None => Vec::new(),
        };
        self.prev = Some(cur);
        regions
    }

    fn reset(&mut self) {
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectionHints;
    use image::{Rgb, RgbImage};

    fn frame_with_square(x0: u32, y0: u32, side: u32) -> Frame {
        let mut img = RgbImage::from_pixel(64, 48, Rgb([10, 10, 10]));
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        Frame::with_image(0.0, img, DetectionHints::default())
    }

    #[test]
    fn test_first_frame_has_no_motion() {
        let mut det = FrameDifferenceDetector::default();
        assert!(det.detect(&frame_with_square(5, 5, 4)).is_empty());
    }

    #[test]
    fn test_moved_square_yields_two_regions() {
        let mut det = FrameDifferenceDetector::default();
        det.detect(&frame_with_square(5, 5, 4));
        let mut regions = det.detect(&frame_with_square(40, 20, 4));
        regions.sort_by(|a, b| a.x.total_cmp(&b.x));

        assert_eq!(regions.len(), 2, "vacated and newly covered areas");
        assert_eq!(regions[0].area, 16.0);
        assert!((regions[0].x - 6.5).abs() < 1e-4);
        assert!((regions[1].x - 41.5).abs() < 1e-4);
        assert!((regions[1].y - 21.5).abs() < 1e-4);
    }

    #[test]
    fn test_small_noise_is_dropped_and_reset_clears_reference() {
        let mut det = FrameDifferenceDetector::new(25, 4);
        det.detect(&frame_with_square(5, 5, 1));
        assert!(det.detect(&frame_with_square(30, 30, 1)).is_empty());

        det.reset();
        assert!(det.detect(&frame_with_square(40, 20, 4)).is_empty());
    }
}
