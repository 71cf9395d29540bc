// src/detector.rs
//
// Frame -> one centroid per marker class.

use crate::color_analysis::{ColorSegmenter, FrameRegion};
use crate::contours::{ContourCentroidExtractor, MarkerExtraction};
use crate::types::{Config, CropRect, Frame, MarkerClass, MarkerPair};
use tracing::debug;

/// Per-frame detection output. Extraction details are kept for the overlay.
#[derive(Debug, Clone)]
pub struct FrameDetections {
    pub markers: MarkerPair,
    pub blue: MarkerExtraction,
    pub yellow: MarkerExtraction,
    /// Crop actually used after clipping to the frame.
    pub region: CropRect,
}

impl FrameDetections {
    pub fn extraction(&self, class: MarkerClass) -> &MarkerExtraction {
        match class {
            MarkerClass::Blue => &self.blue,
            MarkerClass::Yellow => &self.yellow,
        }
    }
}

/// Anything that can locate both marker classes in a frame.
pub trait MarkerDetector: Send {
    fn detect(&self, frame: &Frame) -> FrameDetections;
}

/// HSV thresholding + contour centroids over a fixed crop.
#[derive(Debug, Clone)]
pub struct ColorMarkerDetector {
    crop: CropRect,
    blue: ColorSegmenter,
    yellow: ColorSegmenter,
    extractor: ContourCentroidExtractor,
}

impl ColorMarkerDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            crop: config.detection.crop,
            blue: ColorSegmenter::new(MarkerClass::Blue, config.markers.blue),
            yellow: ColorSegmenter::new(MarkerClass::Yellow, config.markers.yellow),
            extractor: ContourCentroidExtractor::new(config.detection.min_contour_area),
        }
    }
}

impl MarkerDetector for ColorMarkerDetector {
    fn detect(&self, frame: &Frame) -> FrameDetections {
        let region = FrameRegion::new(frame, self.crop);
        let clipped = CropRect {
            x: self.crop.x.min(frame.width),
            y: self.crop.y.min(frame.height),
            width: region.width(),
            height: region.height(),
        };

        let blue = self
            .extractor
            .extract_detailed(MarkerClass::Blue, &self.blue.segment(&region));
        let yellow = self
            .extractor
            .extract_detailed(MarkerClass::Yellow, &self.yellow.segment(&region));

        debug!(
            "frame {}: blue x={:.1} yellow x={:.1}",
            frame.timestamp_us, blue.centroid.x, yellow.centroid.x
        );

        FrameDetections {
            markers: MarkerPair {
                blue: blue.centroid,
                yellow: yellow.centroid,
            },
            blue,
            yellow,
            region: clipped,
        }
    }
}
