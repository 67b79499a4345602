use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceMateError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Tracing session not permitted for this user")]
    SessionNotPermitted,
}

/// Failures reported by a media gateway or by the acquisition ladder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Camera access denied: {details}")]
    PermissionDenied { details: String },

    #[error("Camera device {device} is busy")]
    DeviceBusy { device: String },

    #[error("Camera device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("No camera satisfies constraint: {constraint}")]
    Overconstrained { constraint: String },

    #[error("Camera device {device} failed: {details}")]
    Hardware { device: String, details: String },

    #[error("No video tracks found in the camera stream")]
    NoVideoTracks,

    #[error("Camera initialization timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("All {attempts} camera initialization strategies failed (last: {last})")]
    AllStrategiesFailed { attempts: usize, last: String },

    #[error("Failed to enumerate devices: {details}")]
    Enumeration { details: String },

    #[error("Camera not available on this system")]
    NotAvailable,
}

impl CameraError {
    /// True when the user or the system refused camera access.
    pub fn is_permission_denial(&self) -> bool {
        matches!(self, CameraError::PermissionDenied { .. })
    }

    /// True when an automatic retry has a chance of succeeding.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CameraError::PermissionDenied { .. } | CameraError::NotAvailable
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            CameraError::PermissionDenied { .. } => {
                "Camera permission denied. Please enable camera access in your browser settings."
                    .to_string()
            }
            CameraError::Enumeration { .. } => "Failed to enumerate devices".to_string(),
            other => format!("Failed to access camera: {}", other),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, TraceMateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denial_is_terminal() {
        let denied = CameraError::PermissionDenied {
            details: "NotAllowedError".to_string(),
        };
        assert!(denied.is_permission_denial());
        assert!(!denied.is_recoverable());
        assert!(denied.user_message().contains("permission denied"));
    }

    #[test]
    fn test_transient_errors_are_recoverable() {
        let busy = CameraError::DeviceBusy {
            device: "/dev/video0".to_string(),
        };
        assert!(busy.is_recoverable());
        assert!(!busy.is_permission_denial());
        assert!(busy.user_message().starts_with("Failed to access camera"));

        let timeout = CameraError::Timeout {
            timeout: Duration::from_secs(10),
        };
        assert!(timeout.is_recoverable());
    }

    #[test]
    fn test_camera_error_converts() {
        let err: TraceMateError = CameraError::NotAvailable.into();
        assert_eq!(
            err.to_string(),
            "Camera error: Camera not available on this system"
        );
    }
}
