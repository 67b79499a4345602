use super::types::{DeviceSelector, FacingMode, StreamConstraints};
use crate::config::CameraConfig;

/// One rung of the acquisition ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub name: &'static str,
    pub constraints: StreamConstraints,
}

/// Progressively looser constraint sets, tried in order until one yields a
/// usable stream.
pub fn strategy_ladder(device_id: Option<&str>, config: &CameraConfig) -> Vec<Strategy> {
    let preferred = match device_id {
        Some(id) => DeviceSelector::Exact(id.to_string()),
        None => DeviceSelector::Facing(FacingMode::Environment),
    };

    vec![
        Strategy {
            name: "Specific device with high quality",
            constraints: StreamConstraints {
                device: preferred.clone(),
                ideal_resolution: Some(config.preferred_resolution),
                audio: false,
            },
        },
        Strategy {
            name: "Specific device only",
            constraints: StreamConstraints {
                device: preferred,
                ideal_resolution: None,
                audio: false,
            },
        },
        Strategy {
            name: "Any camera",
            constraints: StreamConstraints::any(),
        },
        Strategy {
            name: "Minimal constraints",
            constraints: StreamConstraints {
                device: DeviceSelector::Facing(FacingMode::Environment),
                ideal_resolution: Some(config.fallback_resolution),
                audio: false,
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_with_device() {
        let ladder = strategy_ladder(Some("cam-1"), &CameraConfig::default());
        assert_eq!(ladder.len(), 4);
        assert_eq!(
            ladder[0].constraints.device,
            DeviceSelector::Exact("cam-1".to_string())
        );
        assert_eq!(ladder[0].constraints.ideal_resolution, Some((1280, 720)));
        assert_eq!(
            ladder[1].constraints.device,
            DeviceSelector::Exact("cam-1".to_string())
        );
        assert_eq!(ladder[1].constraints.ideal_resolution, None);
        assert_eq!(ladder[2].constraints, StreamConstraints::any());
        assert_eq!(
            ladder[3].constraints.device,
            DeviceSelector::Facing(FacingMode::Environment)
        );
        assert_eq!(ladder[3].constraints.ideal_resolution, Some((640, 480)));
        assert!(ladder.iter().all(|s| !s.constraints.audio));
    }

    #[test]
    fn test_ladder_without_device_prefers_rear_camera() {
        let ladder = strategy_ladder(None, &CameraConfig::default());
        assert_eq!(
            ladder[0].constraints.device,
            DeviceSelector::Facing(FacingMode::Environment)
        );
        assert_eq!(
            ladder[1].constraints.device,
            DeviceSelector::Facing(FacingMode::Environment)
        );
    }
}
