use super::geometry::Point;
use super::session::{GestureMode, GestureSession};
use crate::config::GestureConfig;
use crate::transform::{OverlayTransform, TransformPatch};
use tracing::{debug, trace};

/// What the raw input landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Overlay,
    Elsewhere,
}

/// Raw pointer/touch input delivered by the interaction surface, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    MouseDown { target: HitTarget, position: Point },
    MouseMove { position: Point },
    MouseUp,
    /// Negative `delta_y` means scrolling up (zoom in).
    Wheel { target: HitTarget, delta_y: f64 },
    TouchStart { target: HitTarget, touches: Vec<Point> },
    TouchMove { touches: Vec<Point> },
    /// `remaining` is the number of contacts still down after the release.
    TouchEnd { remaining: usize },
    TouchCancel,
}

/// Side effects the host must carry out for one input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputOutcome {
    /// Suppress native scroll/zoom for this event.
    pub prevent_default: bool,
    pub transform_changed: bool,
    pub mode_changed: Option<GestureMode>,
}

/// Turns pointer and multi-touch streams into anchor-relative updates of the
/// overlay transform. Never suspends; every call completes synchronously.
#[derive(Debug)]
pub struct GestureInterpreter {
    config: GestureConfig,
    transform: OverlayTransform,
    session: Option<GestureSession>,
    locked: bool,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig, initial: OverlayTransform) -> Self {
        Self {
            config,
            transform: initial,
            session: None,
            locked: false,
        }
    }

    pub fn transform(&self) -> &OverlayTransform {
        &self.transform
    }

    pub fn mode(&self) -> GestureMode {
        self.session
            .as_ref()
            .map(GestureSession::mode)
            .unwrap_or(GestureMode::Idle)
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Locking ends any session and makes the interpreter ignore input.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        if locked && self.session.take().is_some() {
            debug!("Overlay locked; gesture session ended");
        }
    }

    /// Absolute write from the settings panel. Rejected while a gesture
    /// session is in progress so the two writers never interleave.
    pub fn apply_patch(&mut self, patch: &TransformPatch) -> bool {
        if self.session.is_some() {
            debug!("Ignoring panel write during {:?} gesture", self.mode());
            return false;
        }
        self.transform.apply(patch);
        true
    }

    /// Restore the transform to `defaults`, ending any session.
    pub fn reset(&mut self, defaults: OverlayTransform) {
        self.session = None;
        self.transform = defaults;
    }

    /// Feed one input event.
    pub fn handle(&mut self, input: PointerInput) -> InputOutcome {
        if self.locked {
            return InputOutcome::default();
        }

        let before = self.mode();
        let mut outcome = match input {
            PointerInput::MouseDown { target, position } => self.on_pointer_down(target, position),
            PointerInput::MouseMove { position } => self.on_drag_move(position),
            PointerInput::MouseUp => self.end_if(|mode| mode == GestureMode::Drag),
            PointerInput::Wheel { target, delta_y } => self.on_wheel(target, delta_y),
            PointerInput::TouchStart { target, touches } => self.on_touch_start(target, &touches),
            PointerInput::TouchMove { touches } => self.on_touch_move(&touches),
            PointerInput::TouchEnd { remaining } => self.end_if(|mode| match mode {
                GestureMode::Pinch | GestureMode::Rotate => remaining < 2,
                _ => true,
            }),
            PointerInput::TouchCancel => self.end_if(|_| true),
        };

        let after = self.mode();
        if after != before {
            debug!("Gesture mode {:?} -> {:?}", before, after);
            outcome.mode_changed = Some(after);
        }
        outcome
    }

    fn on_pointer_down(&mut self, target: HitTarget, position: Point) -> InputOutcome {
        if target != HitTarget::Overlay {
            return InputOutcome::default();
        }
        self.session = Some(GestureSession::drag(position, self.transform));
        InputOutcome {
            prevent_default: true,
            ..Default::default()
        }
    }

    fn on_touch_start(&mut self, target: HitTarget, touches: &[Point]) -> InputOutcome {
        if target != HitTarget::Overlay {
            return InputOutcome::default();
        }
        // Extra contacts never restart a two-finger session
        if matches!(self.mode(), GestureMode::Pinch | GestureMode::Rotate) {
            return InputOutcome {
                prevent_default: true,
                ..Default::default()
            };
        }
        self.session = match touches {
            [single] => Some(GestureSession::drag(*single, self.transform)),
            [first, second] => Some(GestureSession::pinch(*first, *second, self.transform)),
            _ => return InputOutcome::default(),
        };
        InputOutcome {
            prevent_default: true,
            ..Default::default()
        }
    }

    fn on_drag_move(&mut self, position: Point) -> InputOutcome {
        let Some(session) = self.session.as_mut() else {
            return InputOutcome::default();
        };
        if session.mode() != GestureMode::Drag {
            return InputOutcome::default();
        }

        let (dx, dy) = session.drag_delta(position);
        self.transform.position_x += dx;
        self.transform.position_y += dy;
        trace!("Drag by ({}, {})", dx, dy);

        InputOutcome {
            prevent_default: true,
            transform_changed: dx != 0.0 || dy != 0.0,
            mode_changed: None,
        }
    }

    fn on_touch_move(&mut self, touches: &[Point]) -> InputOutcome {
        let Some(mode) = self.session.as_ref().map(GestureSession::mode) else {
            return InputOutcome::default();
        };

        match (mode, touches) {
            (GestureMode::Drag, [single]) => self.on_drag_move(*single),
            (GestureMode::Pinch | GestureMode::Rotate, [first, second, ..]) => {
                let Some(session) = self.session.as_mut() else {
                    return InputOutcome::default();
                };
                let update = session.pinch_update(&self.config, *first, *second);
                trace!("Pinch update {:?}", update);
                InputOutcome {
                    prevent_default: true,
                    transform_changed: update.apply_to(&mut self.transform),
                    mode_changed: None,
                }
            }
            // A contact was lifted without a touchend reaching us
            (GestureMode::Pinch | GestureMode::Rotate, _) => {
                self.session = None;
                InputOutcome {
                    prevent_default: true,
                    ..Default::default()
                }
            }
            _ => InputOutcome {
                prevent_default: true,
                ..Default::default()
            },
        }
    }

    fn on_wheel(&mut self, target: HitTarget, delta_y: f64) -> InputOutcome {
        if target != HitTarget::Overlay {
            return InputOutcome::default();
        }
        // Horizontal-only wheel events carry delta_y == 0
        let step = if delta_y < 0.0 {
            self.config.wheel_step
        } else if delta_y > 0.0 {
            -self.config.wheel_step
        } else {
            0.0
        };
        let before = self.transform.scale;
        self.transform.set_scale(before + step);

        InputOutcome {
            prevent_default: true,
            transform_changed: self.transform.scale != before,
            mode_changed: None,
        }
    }

    fn end_if(&mut self, should_end: impl FnOnce(GestureMode) -> bool) -> InputOutcome {
        if should_end(self.mode()) {
            self.session = None;
        }
        InputOutcome::default()
    }
}
