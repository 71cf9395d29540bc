// src/contours.rs
//
// Connected-region borders and their centroids.
//
// The mask goes through imgproc::find_contours with the full hierarchy
// (RETR_TREE) and straight runs collapsed (CHAIN_APPROX_SIMPLE). Each border
// is scored with contour_area and located with moments.
//
// Selection is last-wins over the order OpenCV returns the contours in: every
// border whose area exceeds the threshold overwrites the running result.
// Sibling borders come back in reverse discovery order, so among separate
// blobs the topmost one is reported. A border with a zero moment denominator
// never becomes a candidate.

use crate::color_analysis::BinaryMask;
use crate::types::{Centroid, MarkerClass};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Vec4i, Vector},
    imgproc,
    prelude::*,
};
use tracing::{trace, warn};

// ============================================================================
// PUBLIC TYPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct Contour {
    /// Polygon vertices in mask coordinates.
    pub points: Vec<Point>,
    /// Index of the enclosing border in the same contour list.
    pub parent: Option<usize>,
    /// Border of a hole inside a region rather than of the region itself.
    pub is_hole: bool,
    pub area: f64,
    pub moments: core::Moments,
}

impl Contour {
    /// None when the moment denominator is zero.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let m = &self.moments;
        (m.m00 != 0.0).then(|| (m.m10 / m.m00, m.m01 / m.m00))
    }
}

/// Everything the extractor looked at for one mask.
#[derive(Debug, Clone)]
pub struct MarkerExtraction {
    pub centroid: Centroid,
    pub contours: Vec<Contour>,
    /// Contours that passed the area threshold and had a usable centroid.
    pub candidates: usize,
}

// ============================================================================
// CONTOUR SEARCH
// ============================================================================

fn mask_to_mat(mask: &BinaryMask) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        mask.height as i32,
        mask.width as i32,
        core::CV_8UC1,
        core::Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(&mask.data);
    Ok(mat)
}

/// All outer and hole borders of `mask`, in the order OpenCV reports them.
pub fn find_contours(mask: &BinaryMask) -> Result<Vec<Contour>> {
    if mask.is_empty() {
        return Ok(Vec::new());
    }

    let mat = mask_to_mat(mask)?;
    let mut found = Vector::<Vector<Point>>::new();
    let mut hierarchy = Vector::<Vec4i>::new();
    imgproc::find_contours_with_hierarchy(
        &mat,
        &mut found,
        &mut hierarchy,
        imgproc::RETR_TREE,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;

    // hierarchy[i] = [next, previous, first child, parent]
    let parents: Vec<Option<usize>> = hierarchy
        .iter()
        .map(|h| usize::try_from(h[3]).ok())
        .collect();

    let mut contours = Vec::with_capacity(found.len());
    for (i, polygon) in found.iter().enumerate() {
        let mut depth = 0;
        let mut up = parents.get(i).copied().flatten();
        while let Some(p) = up {
            depth += 1;
            up = parents.get(p).copied().flatten();
        }

        contours.push(Contour {
            area: imgproc::contour_area(&polygon, false)?,
            moments: imgproc::moments(&polygon, false)?,
            points: polygon.to_vec(),
            parent: parents.get(i).copied().flatten(),
            is_hole: depth % 2 == 1,
        });
    }

    Ok(contours)
}

// ============================================================================
// EXTRACTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct ContourCentroidExtractor {
    min_area: f64,
}

impl ContourCentroidExtractor {
    pub fn new(min_area: f64) -> Self {
        Self { min_area }
    }

    pub fn extract(&self, class: MarkerClass, mask: &BinaryMask) -> Centroid {
        self.extract_detailed(class, mask).centroid
    }

    /// A failed contour search counts as "nothing found" for this frame.
    pub fn extract_detailed(&self, class: MarkerClass, mask: &BinaryMask) -> MarkerExtraction {
        let contours = find_contours(mask).unwrap_or_else(|e| {
            warn!("{} contour search failed: {:#}", class.as_str(), e);
            Vec::new()
        });
        let mut centroid = Centroid::undefined(class);
        let mut candidates = 0;

        for contour in &contours {
            if contour.area <= self.min_area {
                continue;
            }
            let Some((cx, cy)) = contour.centroid() else {
                continue;
            };
            // x <= 0 is indistinguishable from "nothing found"
            if cx > 0.0 {
                candidates += 1;
                centroid = Centroid::new(class, cx as f32, cy as f32);
            }
        }

        trace!(
            "{}: {} contours, {} candidates, centroid x={:.1}",
            class.as_str(),
            contours.len(),
            candidates,
            centroid.x
        );

        MarkerExtraction {
            centroid,
            contours,
            candidates,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
