// src/overlay.rs
//
// Annotated crop images for inspecting detections. Presentation only;
// nothing here feeds back into the estimate.

use crate::color_analysis::FrameRegion;
use crate::detector::FrameDetections;
use crate::types::{Frame, FrameRecord, MarkerClass};
use anyhow::{bail, Context, Result};
use opencv::{
    core::{self, Mat, Point, Scalar},
    imgcodecs, imgproc,
    prelude::*,
};
use std::path::{Path, PathBuf};

/// BGR drawing colours.
pub mod colors {
    use opencv::core::Scalar;

    pub const BLUE_CONE: Scalar = Scalar::new(255.0, 90.0, 40.0, 0.0);
    pub const YELLOW_CONE: Scalar = Scalar::new(0.0, 220.0, 255.0, 0.0);
    pub const CENTROID: Scalar = Scalar::new(0.0, 0.0, 255.0, 0.0);
    pub const TEXT: Scalar = Scalar::new(255.0, 255.0, 255.0, 0.0);
}

const CENTROID_RADIUS: i32 = 4;
const TEXT_SCALE: f64 = 1.0;

fn class_color(class: MarkerClass) -> Scalar {
    match class {
        MarkerClass::Blue => colors::BLUE_CONE,
        MarkerClass::Yellow => colors::YELLOW_CONE,
    }
}

/// "TS: <µs>; GROUND STEERING: <gt>; CalAng: <estimate>"
pub fn caption(record: &FrameRecord) -> String {
    format!(
        "TS: {}; GROUND STEERING: {:.3}; CalAng: {:.2}",
        record.timestamp_us, record.ground_truth, record.estimated_angle
    )
}

/// BGR copy of the detection crop with contours, centroids and the
/// per-frame caption drawn in.
pub fn render(frame: &Frame, detections: &FrameDetections, record: &FrameRecord) -> Result<Mat> {
    let region = FrameRegion::new(frame, detections.region);
    if region.is_empty() {
        bail!("Nothing to render, crop is empty");
    }
    let (w, h) = (region.width(), region.height());

    let mut img = Mat::new_rows_cols_with_default(
        h as i32,
        w as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    {
        let bytes = img.data_bytes_mut()?;
        for y in 0..h {
            for x in 0..w {
                if let Some((r, g, b)) = region.rgb(x, y) {
                    let i = (y * w + x) * 3;
                    bytes[i..i + 3].copy_from_slice(&[b, g, r]);
                }
            }
        }
    }

    for class in [MarkerClass::Blue, MarkerClass::Yellow] {
        let color = class_color(class);
        for contour in &detections.extraction(class).contours {
            let n = contour.points.len();
            for i in 0..n {
                let (a, b) = (contour.points[i], contour.points[(i + 1) % n]);
                imgproc::line(&mut img, a, b, color, 1, imgproc::LINE_8, 0)?;
            }
        }
    }

    for class in [MarkerClass::Blue, MarkerClass::Yellow] {
        if let Some((cx, cy)) = detections.extraction(class).centroid.position() {
            imgproc::circle(
                &mut img,
                Point::new(cx.round() as i32, cy.round() as i32),
                CENTROID_RADIUS,
                colors::CENTROID,
                -1,
                imgproc::LINE_8,
                0,
            )?;
        }
    }

    imgproc::put_text(
        &mut img,
        &caption(record),
        Point::new(2, h as i32 - 4),
        imgproc::FONT_HERSHEY_PLAIN,
        TEXT_SCALE,
        colors::TEXT,
        1,
        imgproc::LINE_8,
        false,
    )?;

    Ok(img)
}

/// Writes `<timestamp>_<angle>.png` files into one directory.
pub struct AnnotatedWriter {
    dir: PathBuf,
    written: u64,
}

impl AnnotatedWriter {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir, written: 0 })
    }

    pub fn save(
        &mut self,
        frame: &Frame,
        detections: &FrameDetections,
        record: &FrameRecord,
    ) -> Result<PathBuf> {
        let img = render(frame, detections, record)?;
        let path = self.dir.join(format!(
            "{}_{:+.2}.png",
            record.timestamp_us, record.estimated_angle
        ));
        let name = path
            .to_str()
            .with_context(|| format!("Non UTF-8 path {}", path.display()))?;
        if !imgcodecs::imwrite(name, &img, &core::Vector::new())? {
            bail!("Failed to save {}", path.display());
        }
        self.written += 1;
        Ok(path)
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}
