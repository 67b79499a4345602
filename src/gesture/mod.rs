//! Pointer and multi-touch gesture interpretation for the overlay image.
//!
//! A session starts when a pointer or touch lands on the overlay and ends on
//! release or cancel. One contact drags; two contacts pinch, and a pinch is
//! classified on every move by its angular change since the anchor:
//!
//! - below the tilt threshold: perspective tilt
//! - between the thresholds: scale
//! - at or above the rotate threshold: promoted to rotate for the rest of
//!   the session
//!
//! Every two-finger update is computed from the anchor snapshot taken at
//! session start, never from the previous frame.

mod geometry;
mod interpreter;
mod session;

pub use geometry::{angle_deg, angular_change, distance, Point};
pub use interpreter::{GestureInterpreter, HitTarget, InputOutcome, PointerInput};
pub use session::{GestureMode, GestureSession, PinchUpdate};
