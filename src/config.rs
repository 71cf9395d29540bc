// src/config.rs

use crate::types::{ColorRange, Config, MarkerClass};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<()> {
        for class in [MarkerClass::Blue, MarkerClass::Yellow] {
            validate_range(class, &self.markers.range_for(class))?;
        }

        let z = &self.zones;
        if !(z.far_left < z.left && z.left < z.center && z.center < z.right && z.right < z.far_right)
        {
            bail!(
                "Zone boundaries must be strictly increasing: far_left={} left={} center={} right={} far_right={}",
                z.far_left,
                z.left,
                z.center,
                z.right,
                z.far_right
            );
        }

        if self.accuracy.tolerance.is_nan() || self.accuracy.tolerance <= 0.0 {
            bail!(
                "Accuracy tolerance must be positive, got {}",
                self.accuracy.tolerance
            );
        }

        let crop = &self.detection.crop;
        if crop.width == 0 || crop.height == 0 {
            bail!("Crop region must not be empty ({}x{})", crop.width, crop.height);
        }

        if self.detection.min_contour_area < 0.0 {
            bail!(
                "min_contour_area must not be negative, got {}",
                self.detection.min_contour_area
            );
        }

        Ok(())
    }
}

fn validate_range(class: MarkerClass, range: &ColorRange) -> Result<()> {
    if range.hue_min > range.hue_max || range.hue_max > 180 {
        bail!(
            "{} hue range {}..={} is invalid (8-bit hue tops out at 180)",
            class.as_str(),
            range.hue_min,
            range.hue_max
        );
    }
    if range.sat_min > range.sat_max {
        bail!(
            "{} saturation range {}..={} is inverted",
            class.as_str(),
            range.sat_min,
            range.sat_max
        );
    }
    if range.val_min > range.val_max {
        bail!(
            "{} value range {}..={} is inverted",
            class.as_str(),
            range.val_min,
            range.val_max
        );
    }
    Ok(())
}
