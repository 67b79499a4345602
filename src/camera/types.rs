use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Camera permission as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Unknown,
    Prompt,
    Granted,
    Denied,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionState::Unknown => "unknown",
            PermissionState::Prompt => "prompt",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
        };
        f.write_str(name)
    }
}

/// A video input as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    /// Empty until the platform has granted camera access.
    pub label: String,
}

impl DeviceInfo {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
        }
    }

    /// Label suitable for a device selector, with a placeholder for
    /// unlabeled devices.
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            let prefix: String = self.device_id.chars().take(5).collect();
            format!("Camera {}...", prefix)
        } else {
            self.label.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    Exact(String),
    Facing(FacingMode),
    Any,
}

/// Constraint set for one acquisition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub device: DeviceSelector,
    /// Preferred, not required.
    pub ideal_resolution: Option<(u32, u32)>,
    pub audio: bool,
}

impl StreamConstraints {
    /// Any camera, no constraints.
    pub fn any() -> Self {
        Self {
            device: DeviceSelector::Any,
            ideal_resolution: None,
            audio: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub kind: TrackKind,
    pub label: String,
    pub ended: bool,
}

impl MediaTrack {
    pub fn video(label: impl Into<String>) -> Self {
        Self {
            kind: TrackKind::Video,
            label: label.into(),
            ended: false,
        }
    }

    pub fn audio(label: impl Into<String>) -> Self {
        Self {
            kind: TrackKind::Audio,
            label: label.into(),
            ended: false,
        }
    }
}

/// A live media stream handed out by a gateway. Only the gateway that
/// produced it can stop its tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    id: Uuid,
    device_id: String,
    resolution: Option<(u32, u32)>,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(
        device_id: impl Into<String>,
        resolution: Option<(u32, u32)>,
        tracks: Vec<MediaTrack>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            resolution,
            tracks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.resolution
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Video tracks that have not ended.
    pub fn active_video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks
            .iter()
            .filter(|track| track.kind == TrackKind::Video && !track.ended)
    }
}
