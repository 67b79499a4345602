use crate::camera::PermissionState;
use crate::error::EventBusError;
use crate::gesture::GestureMode;
use crate::transform::OverlayTransform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Status notifications emitted by the tracing core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TraceEvent {
    /// A live camera stream was acquired
    CameraStarted {
        device_id: String,
        strategy: String,
        timestamp: DateTime<Utc>,
    },
    /// The live camera stream was released
    CameraStopped { timestamp: DateTime<Utc> },
    /// Camera permission state changed
    PermissionChanged {
        state: PermissionState,
        timestamp: DateTime<Utc>,
    },
    /// An acquisition attempt failed
    CameraFailed {
        message: String,
        retry_count: u32,
        timestamp: DateTime<Utc>,
    },
    /// An automatic retry was scheduled
    RetryScheduled { attempt: u32, delay_ms: u64 },
    /// Device enumeration produced a new list
    DevicesChanged { count: usize },
    /// The hosting document became hidden or visible
    VisibilityChanged { hidden: bool },
    /// The gesture session switched mode
    GestureModeChanged { mode: GestureMode },
    /// The overlay transform was written
    TransformChanged { transform: OverlayTransform },
}

impl TraceEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            TraceEvent::CameraStarted {
                device_id,
                strategy,
                ..
            } => format!("Camera {} started ({})", device_id, strategy),
            TraceEvent::CameraStopped { .. } => "Camera stopped".to_string(),
            TraceEvent::PermissionChanged { state, .. } => {
                format!("Camera permission {}", state)
            }
            TraceEvent::CameraFailed {
                message,
                retry_count,
                ..
            } => format!("Camera failed (retry {}): {}", retry_count, message),
            TraceEvent::RetryScheduled { attempt, delay_ms } => {
                format!("Camera retry {} in {}ms", attempt, delay_ms)
            }
            TraceEvent::DevicesChanged { count } => format!("{} camera device(s)", count),
            TraceEvent::VisibilityChanged { hidden } => {
                format!("Document {}", if *hidden { "hidden" } else { "visible" })
            }
            TraceEvent::GestureModeChanged { mode } => format!("Gesture mode {:?}", mode),
            TraceEvent::TransformChanged { transform } => {
                format!("Transform {}", transform.css_transform())
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            TraceEvent::CameraStarted { .. } => "camera_started",
            TraceEvent::CameraStopped { .. } => "camera_stopped",
            TraceEvent::PermissionChanged { .. } => "permission_changed",
            TraceEvent::CameraFailed { .. } => "camera_failed",
            TraceEvent::RetryScheduled { .. } => "retry_scheduled",
            TraceEvent::DevicesChanged { .. } => "devices_changed",
            TraceEvent::VisibilityChanged { .. } => "visibility_changed",
            TraceEvent::GestureModeChanged { .. } => "gesture_mode_changed",
            TraceEvent::TransformChanged { .. } => "transform_changed",
        }
    }
}

/// Event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<TraceEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers. Never blocks.
    pub fn publish(&self, event: TraceEvent) -> Result<usize, EventBusError> {
        match &event {
            TraceEvent::CameraStarted { .. } | TraceEvent::PermissionChanged { .. } => {
                info!("{}", event.description());
            }
            TraceEvent::CameraFailed { .. } => {
                error!("{}", event.description());
            }
            TraceEvent::RetryScheduled { .. } => {
                warn!("{}", event.description());
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    pub fn matches(&self, event: &TraceEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<TraceEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<TraceEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<TraceEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain the next matching event without waiting
    pub fn try_recv(&mut self) -> Result<Option<TraceEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
