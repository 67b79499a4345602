use crate::gesture::{HitTarget, Point, PointerInput};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DRAG_STEP: f64 = 10.0;
const PINCH_RADIUS: f64 = 50.0;

/// Operator commands for the interactive terminal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Drag { dx: i8, dy: i8 },
    ZoomIn,
    ZoomOut,
    RotateLeft,
    RotateRight,
    PinchGrow,
    PinchShrink,
    Tilt,
    ToggleVisibility,
    TogglePause,
    NextCamera,
    RequestPermission,
    Reset,
    ToggleLock,
    Quit,
}

impl KeyCommand {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        let command = match code {
            KeyCode::Left => KeyCommand::Drag { dx: -1, dy: 0 },
            KeyCode::Right => KeyCommand::Drag { dx: 1, dy: 0 },
            KeyCode::Up => KeyCommand::Drag { dx: 0, dy: -1 },
            KeyCode::Down => KeyCommand::Drag { dx: 0, dy: 1 },
            KeyCode::Char('+') | KeyCode::Char('=') => KeyCommand::ZoomIn,
            KeyCode::Char('-') => KeyCommand::ZoomOut,
            KeyCode::Char('[') => KeyCommand::RotateLeft,
            KeyCode::Char(']') => KeyCommand::RotateRight,
            KeyCode::Char('s') => KeyCommand::PinchGrow,
            KeyCode::Char('S') => KeyCommand::PinchShrink,
            KeyCode::Char('t') => KeyCommand::Tilt,
            KeyCode::Char('h') => KeyCommand::ToggleVisibility,
            KeyCode::Char('p') => KeyCommand::TogglePause,
            KeyCode::Char('n') => KeyCommand::NextCamera,
            KeyCode::Char('g') => KeyCommand::RequestPermission,
            KeyCode::Char('r') => KeyCommand::Reset,
            KeyCode::Char('l') => KeyCommand::ToggleLock,
            KeyCode::Char('q') | KeyCode::Esc => KeyCommand::Quit,
            _ => return None,
        };
        Some(command)
    }

    /// Pointer input equivalent to this command, as if performed on the
    /// overlay around `center`. Empty for non-gesture commands.
    pub fn pointer_inputs(self, center: Point) -> Vec<PointerInput> {
        match self {
            KeyCommand::Drag { dx, dy } => vec![
                PointerInput::MouseDown {
                    target: HitTarget::Overlay,
                    position: center,
                },
                PointerInput::MouseMove {
                    position: Point::new(
                        center.x + f64::from(dx) * DRAG_STEP,
                        center.y + f64::from(dy) * DRAG_STEP,
                    ),
                },
                PointerInput::MouseUp,
            ],
            KeyCommand::ZoomIn => vec![PointerInput::Wheel {
                target: HitTarget::Overlay,
                delta_y: -1.0,
            }],
            KeyCommand::ZoomOut => vec![PointerInput::Wheel {
                target: HitTarget::Overlay,
                delta_y: 1.0,
            }],
            KeyCommand::RotateLeft => pinch(center, PINCH_RADIUS, -15.0),
            KeyCommand::RotateRight => pinch(center, PINCH_RADIUS, 15.0),
            KeyCommand::PinchGrow => pinch(center, PINCH_RADIUS * 1.2, 7.0),
            KeyCommand::PinchShrink => pinch(center, PINCH_RADIUS * 0.8, 7.0),
            KeyCommand::Tilt => pinch(center, PINCH_RADIUS * 1.2, 2.0),
            _ => Vec::new(),
        }
    }
}

/// Two contacts placed horizontally around `center`, then moved to `radius`
/// and turned by `angle_deg`, then lifted.
fn pinch(center: Point, radius: f64, angle_deg: f64) -> Vec<PointerInput> {
    vec![
        PointerInput::TouchStart {
            target: HitTarget::Overlay,
            touches: vec![
                center.offset_polar(PINCH_RADIUS, 180.0),
                center.offset_polar(PINCH_RADIUS, 0.0),
            ],
        },
        PointerInput::TouchMove {
            touches: vec![
                center.offset_polar(radius, 180.0 + angle_deg),
                center.offset_polar(radius, angle_deg),
            ],
        },
        PointerInput::TouchEnd { remaining: 0 },
    ]
}

/// Raw-mode terminal reader forwarding commands to the session loop.
pub struct KeyboardInputHandler {
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token }
    }

    /// Start listening for keyboard input.
    pub fn start(&self, sender: mpsc::UnboundedSender<KeyCommand>) {
        info!("Starting keyboard input handler - press q to quit");
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                let _ = sender.send(KeyCommand::Quit);
                return;
            }

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        match KeyCommand::from_key(key_event.code) {
                            Some(command) => {
                                if sender.send(command).is_err() || command == KeyCommand::Quit {
                                    break;
                                }
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });
    }

    pub fn stop(&self) {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GestureConfig;
    use crate::gesture::GestureInterpreter;
    use crate::transform::OverlayTransform;

    fn run(command: KeyCommand) -> OverlayTransform {
        let mut interpreter =
            GestureInterpreter::new(GestureConfig::default(), OverlayTransform::default());
        for input in command.pointer_inputs(Point::new(200.0, 200.0)) {
            interpreter.handle(input);
        }
        *interpreter.transform()
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(KeyCommand::from_key(KeyCode::Char('q')), Some(KeyCommand::Quit));
        assert_eq!(
            KeyCommand::from_key(KeyCode::Left),
            Some(KeyCommand::Drag { dx: -1, dy: 0 })
        );
        assert_eq!(KeyCommand::from_key(KeyCode::Char('z')), None);
        assert!(KeyCommand::Quit.pointer_inputs(Point::default()).is_empty());
    }

    #[test]
    fn test_synthesized_gestures() {
        let defaults = OverlayTransform::default();

        let dragged = run(KeyCommand::Drag { dx: 1, dy: 0 });
        assert_eq!(dragged.position_x, defaults.position_x + DRAG_STEP);

        let rotated = run(KeyCommand::RotateRight);
        assert!((rotated.rotation - 15.0).abs() < 1e-9);

        let grown = run(KeyCommand::PinchGrow);
        assert!((grown.scale - defaults.scale * 1.2).abs() < 1e-9);
        assert_eq!(grown.rotation, defaults.rotation);

        let tilted = run(KeyCommand::Tilt);
        assert!((tilted.tilt_x - 2.0).abs() < 1e-9);
        assert!((tilted.tilt_y - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let handler = KeyboardInputHandler::new(CancellationToken::new());
        handler.stop();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
