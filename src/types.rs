// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub markers: MarkersConfig,
    pub detection: DetectionConfig,
    pub zones: ZoneConfig,
    pub accuracy: AccuracyConfig,
    pub input: InputConfig,
    pub ground_truth: GroundTruthConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// 8-bit HSV pixel (H 0..=180, S/V 0..=255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Inclusive HSV bounds on the 8-bit scale (H 0..=180, S/V 0..=255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub hue_min: u8,
    pub hue_max: u8,
    pub sat_min: u8,
    pub sat_max: u8,
    pub val_min: u8,
    pub val_max: u8,
}

impl ColorRange {
    pub const BLUE_CONES: ColorRange = ColorRange {
        hue_min: 100,
        hue_max: 140,
        sat_min: 120,
        sat_max: 255,
        val_min: 40,
        val_max: 255,
    };

    pub const YELLOW_CONES: ColorRange = ColorRange {
        hue_min: 15,
        hue_max: 25,
        sat_min: 75,
        sat_max: 185,
        val_min: 147,
        val_max: 255,
    };

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.hue_min..=self.hue_max).contains(&hsv.h)
            && (self.sat_min..=self.sat_max).contains(&hsv.s)
            && (self.val_min..=self.val_max).contains(&hsv.v)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkersConfig {
    pub blue: ColorRange,
    pub yellow: ColorRange,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            blue: ColorRange::BLUE_CONES,
            yellow: ColorRange::YELLOW_CONES,
        }
    }
}

impl MarkersConfig {
    pub fn range_for(&self, class: MarkerClass) -> ColorRange {
        match class {
            MarkerClass::Blue => self.blue,
            MarkerClass::Yellow => self.yellow,
        }
    }
}

/// Region of interest inside the full frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Regions must have a contour area strictly greater than this.
    pub min_contour_area: f64,
    pub crop: CropRect,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_contour_area: 75.0,
            crop: CropRect {
                x: 0,
                y: 310,
                width: 640,
                height: 50,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneTableVariant {
    #[default]
    Canonical,
    Legacy,
}

/// Horizontal zone boundaries in crop x-coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub far_left: f32,
    pub left: f32,
    pub center: f32,
    pub right: f32,
    pub far_right: f32,
    pub table: ZoneTableVariant,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            far_left: 5.0,
            left: 120.0,
            center: 240.0,
            right: 360.0,
            far_right: 480.0,
            table: ZoneTableVariant::Canonical,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyConfig {
    pub tolerance: f64,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self { tolerance: 0.05 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub frames_dir: String,
    pub width: usize,
    pub height: usize,
    pub layout: PixelLayout,
    /// Used when a frame file name carries no timestamp.
    pub frame_interval_us: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            frames_dir: "frames".to_string(),
            width: 640,
            height: 480,
            layout: PixelLayout::Bgra8,
            frame_interval_us: 50_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundTruthConfig {
    pub replay_csv: Option<String>,
    pub message_id: u32,
}

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            replay_csv: None,
            message_id: GROUND_STEERING_REQUEST_ID,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub records_file: String,
    pub summary_file: String,
    pub save_annotated: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
            records_file: "steering.csv".to_string(),
            summary_file: "summary.json".to_string(),
            save_annotated: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "cone_steering=info".to_string(),
        }
    }
}

/// Message id of the ground steering request in the vehicle message set.
pub const GROUND_STEERING_REQUEST_ID: u32 = 1090;

// ============================================================================
// FRAMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
}

impl PixelLayout {
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
            PixelLayout::Rgba8 | PixelLayout::Bgra8 => 4,
        }
    }

    /// Read the (r, g, b) triple from one pixel's bytes.
    #[inline]
    pub fn rgb(&self, px: &[u8]) -> (u8, u8, u8) {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Rgba8 => (px[0], px[1], px[2]),
            PixelLayout::Bgr8 | PixelLayout::Bgra8 => (px[2], px[1], px[0]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub layout: PixelLayout,
    pub timestamp_us: i64,
}

impl Frame {
    pub fn stride(&self) -> usize {
        self.width * self.layout.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }
}

/// Sample time as delivered by the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStamp {
    pub seconds: i64,
    pub microseconds: i64,
}

impl TimeStamp {
    pub fn as_micros(&self) -> i64 {
        self.seconds * 1_000_000 + self.microseconds
    }
}

// ============================================================================
// DETECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerClass {
    Blue,
    Yellow,
}

impl MarkerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerClass::Blue => "BLUE",
            MarkerClass::Yellow => "YELLOW",
        }
    }

    pub fn other(&self) -> MarkerClass {
        match self {
            MarkerClass::Blue => MarkerClass::Yellow,
            MarkerClass::Yellow => MarkerClass::Blue,
        }
    }
}

/// Marker position in crop coordinates. `x == 0` is the "nothing detected" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Centroid {
    pub class: MarkerClass,
    pub x: f32,
    pub y: f32,
}

impl Centroid {
    pub fn new(class: MarkerClass, x: f32, y: f32) -> Self {
        Self { class, x, y }
    }

    pub fn undefined(class: MarkerClass) -> Self {
        Self { class, x: 0.0, y: 0.0 }
    }

    pub fn is_defined(&self) -> bool {
        self.x > 0.0
    }

    pub fn position(&self) -> Option<(f32, f32)> {
        self.is_defined().then_some((self.x, self.y))
    }
}

/// One centroid per marker class for a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPair {
    pub blue: Centroid,
    pub yellow: Centroid,
}

impl MarkerPair {
    pub fn new(blue_x: f32, yellow_x: f32) -> Self {
        Self {
            blue: Centroid::new(MarkerClass::Blue, blue_x, 0.0),
            yellow: Centroid::new(MarkerClass::Yellow, yellow_x, 0.0),
        }
    }

    pub fn undefined() -> Self {
        Self {
            blue: Centroid::undefined(MarkerClass::Blue),
            yellow: Centroid::undefined(MarkerClass::Yellow),
        }
    }

    pub fn get(&self, class: MarkerClass) -> Centroid {
        match class {
            MarkerClass::Blue => self.blue,
            MarkerClass::Yellow => self.yellow,
        }
    }
}

impl Default for MarkerPair {
    fn default() -> Self {
        Self::undefined()
    }
}

// ============================================================================
// STEERING
// ============================================================================

/// Which marker class is on the vehicle's left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    /// Blue cones on the left.
    Clockwise,
    /// Yellow cones on the left.
    CounterClockwise,
}

impl Orientation {
    pub fn left_marker(&self) -> MarkerClass {
        match self {
            Orientation::Clockwise => MarkerClass::Blue,
            Orientation::CounterClockwise => MarkerClass::Yellow,
        }
    }
}

/// The seven quantized steering commands. Negative turns right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SteeringAngle {
    HardRight,
    SharpRight,
    Right,
    #[default]
    Straight,
    Left,
    SharpLeft,
    HardLeft,
}

impl SteeringAngle {
    pub const ALL: [SteeringAngle; 7] = [
        SteeringAngle::HardRight,
        SteeringAngle::SharpRight,
        SteeringAngle::Right,
        SteeringAngle::Straight,
        SteeringAngle::Left,
        SteeringAngle::SharpLeft,
        SteeringAngle::HardLeft,
    ];

    pub fn value(&self) -> f64 {
        match self {
            SteeringAngle::HardRight => -0.25,
            SteeringAngle::SharpRight => -0.20,
            SteeringAngle::Right => -0.10,
            SteeringAngle::Straight => 0.0,
            SteeringAngle::Left => 0.10,
            SteeringAngle::SharpLeft => 0.20,
            SteeringAngle::HardLeft => 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteeringEstimate {
    pub timestamp_us: i64,
    pub angle: SteeringAngle,
    /// None when the angle was carried over from the previous frame.
    pub orientation: Option<Orientation>,
}

impl SteeringEstimate {
    pub fn is_frozen(&self) -> bool {
        self.orientation.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthSample {
    pub timestamp_us: i64,
    pub value: f64,
}

/// One line of the per-frame output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub timestamp_us: i64,
    pub ground_truth: f64,
    pub estimated_angle: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_combines_to_micros() {
        let ts = TimeStamp {
            seconds: 1_600_000_000,
            microseconds: 123_456,
        };
        assert_eq!(ts.as_micros(), 1_600_000_000_123_456);
    }

    #[test]
    fn test_centroid_sentinel() {
        let c = Centroid::undefined(MarkerClass::Blue);
        assert!(!c.is_defined());
        assert_eq!(c.position(), None);
        assert!(Centroid::new(MarkerClass::Yellow, 0.5, 3.0).is_defined());
    }

    #[test]
    fn test_layout_reads_rgb_order() {
        let px = [10u8, 20, 30, 255];
        assert_eq!(PixelLayout::Bgra8.rgb(&px), (30, 20, 10));
        assert_eq!(PixelLayout::Rgb8.rgb(&px), (10, 20, 30));
    }

    #[test]
    fn test_color_range_is_inclusive() {
        let r = ColorRange::YELLOW_CONES;
        assert!(r.contains(Hsv { h: 15, s: 75, v: 147 }));
        assert!(r.contains(Hsv { h: 25, s: 185, v: 255 }));
        assert!(!r.contains(Hsv { h: 26, s: 100, v: 200 }));
    }
}
