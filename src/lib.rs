pub mod access;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod gesture;
pub mod keyboard;
pub mod surface;
pub mod transform;

pub use access::{AccessPolicy, DailySessionPolicy, MAX_DAILY_SESSIONS};
pub use camera::{
    CameraManager, CameraState, DeviceInfo, DeviceNodeGateway, FilePermissionStore, MediaGateway,
    MediaStream, MemoryPermissionStore, PermissionState, PermissionStore, SimulatedGateway,
};
pub use config::TraceMateConfig;
pub use error::{CameraError, EventBusError, Result, TraceMateError};
pub use events::{EventBus, EventFilter, EventReceiver, TraceEvent};
pub use gesture::{GestureInterpreter, GestureMode, HitTarget, InputOutcome, Point, PointerInput};
pub use keyboard::{KeyCommand, KeyboardInputHandler};
pub use surface::TracingSurface;
pub use transform::{OverlayTransform, TransformPatch};
