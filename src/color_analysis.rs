// src/color_analysis.rs
//
// HSV thresholding of the cone colours.
//
// The camera frame is cropped to a horizontal band in front of the car,
// converted to 8-bit HSV (H 0..=180, S 0..=255, V 0..=255) and every pixel
// inside all three inclusive bounds of a marker's ColorRange is set in that
// marker's mask. Blue and yellow are segmented independently; their ranges
// may overlap.

use crate::types::{ColorRange, CropRect, Frame, Hsv, MarkerClass};
use tracing::trace;

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Single-channel mask, 255 = foreground, 0 = background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl BinaryMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.data[y * self.width + x] = if on { 255 } else { 0 };
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&p| p != 0).count()
    }

    /// Fill an axis-aligned rectangle, clipped to the mask.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize) {
        for yy in y..(y + h).min(self.height) {
            for xx in x..(x + w).min(self.width) {
                self.set(xx, yy, true);
            }
        }
    }
}

/// Borrowed rectangular window into a frame. Coordinates are already clipped.
#[derive(Debug, Clone, Copy)]
pub struct FrameRegion<'a> {
    frame: &'a Frame,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
}

impl<'a> FrameRegion<'a> {
    /// Clip `crop` against the frame. A crop outside the frame yields a 0-sized region.
    pub fn new(frame: &'a Frame, crop: CropRect) -> Self {
        let x0 = crop.x.min(frame.width);
        let y0 = crop.y.min(frame.height);
        let x1 = crop.x.saturating_add(crop.width).min(frame.width);
        let y1 = crop.y.saturating_add(crop.height).min(frame.height);
        Self {
            frame,
            x0,
            y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    pub fn full(frame: &'a Frame) -> Self {
        Self {
            frame,
            x0: 0,
            y0: 0,
            width: frame.width,
            height: frame.height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.frame.is_empty()
    }

    /// (r, g, b) of the pixel at region coordinates (x, y), None past the buffer end.
    #[inline]
    pub fn rgb(&self, x: usize, y: usize) -> Option<(u8, u8, u8)> {
        let channels = self.frame.layout.channels();
        let idx = (self.y0 + y) * self.frame.stride() + (self.x0 + x) * channels;
        self.frame
            .data
            .get(idx..idx + channels)
            .map(|px| self.frame.layout.rgb(px))
    }
}

// ============================================================================
// HSV CONVERSION
// ============================================================================

/// Convert RGB to 8-bit HSV with half-degree hue, rounding to nearest.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);

    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    Hsv {
        h: (h / 2.0).round().min(180.0) as u8,
        s: s.round().min(255.0) as u8,
        v: max as u8,
    }
}

// ============================================================================
// SEGMENTER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ColorSegmenter {
    class: MarkerClass,
    range: ColorRange,
}

impl ColorSegmenter {
    pub fn new(class: MarkerClass, range: ColorRange) -> Self {
        Self { class, range }
    }

    /// Threshold a region into a mask of the same size. Reads only.
    pub fn segment(&self, region: &FrameRegion<'_>) -> BinaryMask {
        if region.is_empty() {
            return BinaryMask::empty();
        }

        let mut mask = BinaryMask::new(region.width(), region.height());
        for y in 0..region.height() {
            for x in 0..region.width() {
                let Some((r, g, b)) = region.rgb(x, y) else {
                    continue;
                };
                if self.range.contains(rgb_to_hsv(r, g, b)) {
                    mask.set(x, y, true);
                }
            }
        }

        trace!(
            "{} mask: {} of {} pixels set",
            self.class.as_str(),
            mask.count_set(),
            mask.width * mask.height
        );
        mask
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelLayout;

    fn solid_frame(w: usize, h: usize, rgb: (u8, u8, u8)) -> Frame {
        let mut data = vec![0u8; w * h * 3];
        for px in data.chunks_exact_mut(3) {
            px[0] = rgb.0;
            px[1] = rgb.1;
            px[2] = rgb.2;
        }
        Frame {
            data,
            width: w,
            height: h,
            layout: PixelLayout::Rgb8,
            timestamp_us: 0,
        }
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), Hsv { h: 0, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(0, 255, 0), Hsv { h: 60, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(0, 0, 255), Hsv { h: 120, s: 255, v: 255 });
        assert_eq!(rgb_to_hsv(255, 255, 0), Hsv { h: 30, s: 255, v: 255 });
    }

    #[test]
    fn test_rgb_to_hsv_grey_has_no_hue() {
        let hsv = rgb_to_hsv(128, 128, 128);
        assert_eq!(hsv.h, 0);
        assert_eq!(hsv.s, 0);
        assert_eq!(hsv.v, 128);
    }

    #[test]
    fn test_cone_colours_land_in_default_ranges() {
        // Cone blue: hue ~ 112, strong saturation
        assert!(ColorRange::BLUE_CONES.contains(rgb_to_hsv(20, 40, 200)));
        // Cone yellow: orange-ish yellow, moderate saturation
        assert!(ColorRange::YELLOW_CONES.contains(rgb_to_hsv(230, 190, 110)));
        assert!(!ColorRange::YELLOW_CONES.contains(rgb_to_hsv(20, 40, 200)));
    }

    #[test]
    fn test_segment_sets_matching_pixels() {
        let frame = solid_frame(8, 4, (20, 40, 200));
        let seg = ColorSegmenter::new(MarkerClass::Blue, ColorRange::BLUE_CONES);
        let mask = seg.segment(&FrameRegion::full(&frame));
        assert_eq!(mask.count_set(), 32);

        let seg = ColorSegmenter::new(MarkerClass::Yellow, ColorRange::YELLOW_CONES);
        assert_eq!(seg.segment(&FrameRegion::full(&frame)).count_set(), 0);
    }

    #[test]
    fn test_segment_does_not_touch_frame() {
        let frame = solid_frame(4, 4, (20, 40, 200));
        let before = frame.data.clone();
        let seg = ColorSegmenter::new(MarkerClass::Blue, ColorRange::BLUE_CONES);
        let _ = seg.segment(&FrameRegion::full(&frame));
        assert_eq!(frame.data, before);
    }

    #[test]
    fn test_bgra_layout_is_respected() {
        // BGRA bytes of the blue cone colour
        let frame = Frame {
            data: vec![200, 40, 20, 255],
            width: 1,
            height: 1,
            layout: PixelLayout::Bgra8,
            timestamp_us: 0,
        };
        let seg = ColorSegmenter::new(MarkerClass::Blue, ColorRange::BLUE_CONES);
        assert_eq!(seg.segment(&FrameRegion::full(&frame)).count_set(), 1);
    }

    #[test]
    fn test_crop_is_clipped_and_empty_crop_yields_empty_mask() {
        let frame = solid_frame(10, 10, (20, 40, 200));
        let seg = ColorSegmenter::new(MarkerClass::Blue, ColorRange::BLUE_CONES);

        let region = FrameRegion::new(
            &frame,
            CropRect {
                x: 6,
                y: 8,
                width: 100,
                height: 100,
            },
        );
        let mask = seg.segment(&region);
        assert_eq!((mask.width, mask.height), (4, 2));

        let outside = FrameRegion::new(
            &frame,
            CropRect {
                x: 20,
                y: 0,
                width: 5,
                height: 5,
            },
        );
        assert!(seg.segment(&outside).is_empty());
    }
}
