//! Camera acquisition: a single live stream kept alive across transient
//! failures, behind a pluggable hardware gateway.

mod device_node;
mod gateway;
mod manager;
mod permission_store;
mod simulated;
mod strategy;
mod types;
#[cfg(test)]
mod tests;

pub use device_node::DeviceNodeGateway;
pub use gateway::MediaGateway;
pub use manager::{CameraManager, CameraState};
pub use permission_store::{FilePermissionStore, MemoryPermissionStore, PermissionStore};
pub use simulated::{ScriptedOutcome, SimulatedGateway};
pub use strategy::{strategy_ladder, Strategy};
pub use types::{
    DeviceInfo, DeviceSelector, FacingMode, MediaStream, MediaTrack, PermissionState,
    StreamConstraints, TrackKind,
};
