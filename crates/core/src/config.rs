//! Linkage engine configuration
//!
//! Tolerances and style defaults used by the consistency pass and the
//! record reader. Configuration can be loaded from a JSON file or built
//! programmatically.

use crate::geometry::Tolerance;
use crate::persistence::{PersistenceError, PersistenceResult};
use std::fs;
use std::path::Path;

/// Configuration for anchor/annotation linkage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Point comparison tolerance
    pub tolerance: Tolerance,

    /// Tolerance for "shelf angle is already 0 or PI"
    pub angle_epsilon: f64,

    /// Current drawing style scale
    pub style_scale: f64,

    /// Default shelf distance, in style units (multiplied by `style_scale`)
    pub shelf_distance_factor: f64,

    /// Label given to freshly created anchors
    pub default_name: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            angle_epsilon: 1e-6,
            style_scale: 1.0,
            shelf_distance_factor: 20.0,
            default_name: "2".to_string(),
        }
    }
}

impl LinkConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let config: LinkConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the point tolerance.
    pub fn with_point_tolerance(mut self, equal_point: f64) -> Self {
        self.tolerance = Tolerance::new(equal_point);
        self
    }

    /// Sets the shelf angle tolerance.
    pub fn with_angle_epsilon(mut self, epsilon: f64) -> Self {
        self.angle_epsilon = epsilon;
        self
    }

    /// Sets the drawing style scale.
    pub fn with_style_scale(mut self, scale: f64) -> Self {
        self.style_scale = scale;
        self
    }

    /// Sets the default anchor label.
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    /// Shelf distance given to new anchors and to records that predate it
    pub fn default_note_distance(&self) -> f64 {
        self.shelf_distance_factor * self.style_scale
    }

    fn validate(&self) -> PersistenceResult<()> {
        let checks = [
            ("tolerance.equal_point", self.tolerance.equal_point),
            ("angle_epsilon", self.angle_epsilon),
            ("style_scale", self.style_scale),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(PersistenceError::InvalidConfig(format!(
                    "{field} must be a positive finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
