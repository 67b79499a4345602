use super::types::{DeviceInfo, MediaStream, PermissionState, StreamConstraints};
use crate::error::CameraError;
use async_trait::async_trait;

/// Port to the platform's camera hardware.
///
/// `acquire` futures may be dropped before completion when an attempt is
/// cancelled or times out; implementations must not leak a stream in that
/// case.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// List video inputs in platform order.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CameraError>;

    /// Request hardware access under one constraint set.
    async fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaStream, CameraError>;

    /// Stop every track of a stream produced by this gateway.
    fn release(&self, stream: &MediaStream);

    /// Current permission state, or `None` when the platform cannot say.
    async fn query_permission(&self) -> Option<PermissionState>;

    fn name(&self) -> &str;
}
