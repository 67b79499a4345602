//! Overlay transform record shared by the gesture interpreter, the settings
//! panel and the rendering surface.

use crate::config::OverlayConfig;
use serde::{Deserialize, Serialize};

/// Smallest scale the overlay may take after any mutation.
pub const MIN_SCALE: f64 = 0.1;

/// Perspective distance used when composing the tilt rotation.
const PERSPECTIVE_PX: u32 = 1000;

/// Visual parameters applied to the traced reference image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayTransform {
    pub opacity: f64,
    pub scale: f64,
    pub position_x: f64,
    pub position_y: f64,
    /// Degrees, never normalized.
    pub rotation: f64,
    pub tilt_x: f64,
    pub tilt_y: f64,
}

impl OverlayTransform {
    /// Compose the CSS transform for the rendering surface.
    ///
    /// Order matters: translate relative to center, scale, rotate, then the
    /// perspective tilt.
    pub fn css_transform(&self) -> String {
        format!(
            "translate(calc(-50% + {}px), calc(-50% + {}px)) scale({}) rotate({}deg) perspective({}px) rotateX({}deg) rotateY({}deg)",
            self.position_x,
            self.position_y,
            self.scale,
            self.rotation,
            PERSPECTIVE_PX,
            self.tilt_x,
            self.tilt_y
        )
    }

    /// Set the scale, holding it at or above [`MIN_SCALE`].
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = clamp_scale(scale);
    }

    /// Apply absolute values from a settings panel write.
    pub fn apply(&mut self, patch: &TransformPatch) {
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(scale) = patch.scale {
            self.set_scale(scale);
        }
        if let Some(x) = patch.position_x {
            self.position_x = x;
        }
        if let Some(y) = patch.position_y {
            self.position_y = y;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(tilt_x) = patch.tilt_x {
            self.tilt_x = tilt_x;
        }
        if let Some(tilt_y) = patch.tilt_y {
            self.tilt_y = tilt_y;
        }
    }
}

impl Default for OverlayTransform {
    fn default() -> Self {
        Self::from(&OverlayConfig::default())
    }
}

impl From<&OverlayConfig> for OverlayTransform {
    fn from(config: &OverlayConfig) -> Self {
        Self {
            opacity: config.opacity.clamp(0.0, 1.0),
            scale: clamp_scale(config.scale),
            position_x: config.position_x,
            position_y: config.position_y,
            rotation: config.rotation,
            tilt_x: config.tilt_x,
            tilt_y: config.tilt_y,
        }
    }
}

/// A partial, absolute-valued update coming from the settings panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformPatch {
    pub opacity: Option<f64>,
    pub scale: Option<f64>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub rotation: Option<f64>,
    pub tilt_x: Option<f64>,
    pub tilt_y: Option<f64>,
}

impl TransformPatch {
    /// A patch that overwrites every field with `transform`.
    pub fn full(transform: &OverlayTransform) -> Self {
        Self {
            opacity: Some(transform.opacity),
            scale: Some(transform.scale),
            position_x: Some(transform.position_x),
            position_y: Some(transform.position_y),
            rotation: Some(transform.rotation),
            tilt_x: Some(transform.tilt_x),
            tilt_y: Some(transform.tilt_y),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub(crate) fn clamp_scale(scale: f64) -> f64 {
    // NaN compares false and falls through to the floor as well
    if scale >= MIN_SCALE {
        scale
    } else {
        MIN_SCALE
    }
}
