use super::geometry::{angle_deg, angular_change, distance, Point};
use crate::config::GestureConfig;
use crate::transform::{clamp_scale, OverlayTransform};
use serde::{Deserialize, Serialize};

/// Gesture session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureMode {
    Idle,
    Drag,
    Pinch,
    /// Absorbing for the rest of the session.
    Rotate,
}

/// How a two-finger move was interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinchUpdate {
    Tilt { tilt_x: f64, tilt_y: f64 },
    Scale(f64),
    Rotate(f64),
    /// Degenerate anchor geometry; nothing to apply.
    None,
}

/// One continuous pointer/touch interaction, from first contact to release.
#[derive(Debug, Clone)]
pub struct GestureSession {
    mode: GestureMode,
    anchor_transform: OverlayTransform,
    anchor_points: Vec<Point>,
    anchor_distance: f64,
    anchor_angle: f64,
    last_point: Point,
}

impl GestureSession {
    pub fn drag(start: Point, transform: OverlayTransform) -> Self {
        Self {
            mode: GestureMode::Drag,
            anchor_transform: transform,
            anchor_points: vec![start],
            anchor_distance: 0.0,
            anchor_angle: 0.0,
            last_point: start,
        }
    }

    pub fn pinch(first: Point, second: Point, transform: OverlayTransform) -> Self {
        Self {
            mode: GestureMode::Pinch,
            anchor_transform: transform,
            anchor_points: vec![first, second],
            anchor_distance: distance(first, second),
            anchor_angle: angle_deg(first, second),
            last_point: first,
        }
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    pub fn anchor_transform(&self) -> &OverlayTransform {
        &self.anchor_transform
    }

    pub fn anchor_points(&self) -> &[Point] {
        &self.anchor_points
    }

    pub fn anchor_distance(&self) -> f64 {
        self.anchor_distance
    }

    pub fn anchor_angle(&self) -> f64 {
        self.anchor_angle
    }

    /// Position delta since the previous drag event. Position is the one
    /// quantity tracked frame to frame.
    pub fn drag_delta(&mut self, current: Point) -> (f64, f64) {
        let delta = (current.x - self.last_point.x, current.y - self.last_point.y);
        self.last_point = current;
        delta
    }

    /// Interpret a two-finger move against the anchor snapshot.
    ///
    /// Pure in the anchor and the current contacts, except for the one-way
    /// promotion from `Pinch` to `Rotate`.
    pub fn pinch_update(
        &mut self,
        config: &GestureConfig,
        first: Point,
        second: Point,
    ) -> PinchUpdate {
        let current_distance = distance(first, second);
        let change = angular_change(self.anchor_angle, angle_deg(first, second));
        let anchor = &self.anchor_transform;

        if self.mode == GestureMode::Pinch && change.abs() >= config.rotate_threshold_deg {
            self.mode = GestureMode::Rotate;
        }

        match self.mode {
            GestureMode::Rotate => PinchUpdate::Rotate(anchor.rotation + change),
            GestureMode::Pinch if change.abs() < config.tilt_threshold_deg => PinchUpdate::Tilt {
                tilt_x: anchor.tilt_x
                    + (current_distance - self.anchor_distance) / config.tilt_distance_divisor,
                tilt_y: anchor.tilt_y + change / config.tilt_angle_divisor,
            },
            GestureMode::Pinch if self.anchor_distance > f64::EPSILON => {
                PinchUpdate::Scale(clamp_scale(
                    anchor.scale * (current_distance / self.anchor_distance),
                ))
            }
            _ => PinchUpdate::None,
        }
    }
}

impl PinchUpdate {
    pub fn apply_to(self, transform: &mut OverlayTransform) -> bool {
        match self {
            PinchUpdate::Tilt { tilt_x, tilt_y } => {
                transform.tilt_x = tilt_x;
                transform.tilt_y = tilt_y;
            }
            PinchUpdate::Scale(scale) => transform.set_scale(scale),
            PinchUpdate::Rotate(rotation) => transform.rotation = rotation,
            PinchUpdate::None => return false,
        }
        true
    }
}
