use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TraceMateConfig {
    pub camera: CameraConfig,
    pub gesture: GestureConfig,
    pub overlay: OverlayConfig,
    pub storage: StorageConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Device to open on mount; the rear/environment camera is preferred when unset
    #[serde(default)]
    pub initial_device: Option<String>,

    /// Resolution requested by the first rung of the strategy ladder
    #[serde(default = "default_preferred_resolution")]
    pub preferred_resolution: (u32, u32),

    /// Resolution requested by the last-resort rung
    #[serde(default = "default_fallback_resolution")]
    pub fallback_resolution: (u32, u32),

    /// Upper bound for one walk of the strategy ladder
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Automatic retries after a failed acquisition
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before each automatic retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Directory holding videoN device nodes
    #[serde(default = "default_device_root")]
    pub device_root: String,

    /// sysfs directory describing video4linux devices
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,
}

impl CameraConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Gesture classification constants. These were tuned by hand; keep them
/// configurable rather than derived.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GestureConfig {
    /// Angular change (degrees) below which a two-finger move is a tilt
    #[serde(default = "default_tilt_threshold")]
    pub tilt_threshold_deg: f64,

    /// Angular change (degrees) at which a pinch is promoted to rotate
    #[serde(default = "default_rotate_threshold")]
    pub rotate_threshold_deg: f64,

    /// Finger distance change (px) per degree of tiltX
    #[serde(default = "default_tilt_distance_divisor")]
    pub tilt_distance_divisor: f64,

    /// Angular change (degrees) per degree of tiltY
    #[serde(default = "default_tilt_angle_divisor")]
    pub tilt_angle_divisor: f64,

    /// Scale change per wheel tick
    #[serde(default = "default_wheel_step")]
    pub wheel_step: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OverlayConfig {
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub tilt_x: f64,
    #[serde(default)]
    pub tilt_y: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// File holding the persisted camera permission flag
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl TraceMateConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("tracemate.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.preferred_resolution",
                vec![
                    default_preferred_resolution().0,
                    default_preferred_resolution().1,
                ],
            )?
            .set_default(
                "camera.fallback_resolution",
                vec![
                    default_fallback_resolution().0,
                    default_fallback_resolution().1,
                ],
            )?
            .set_default(
                "camera.acquire_timeout_ms",
                default_acquire_timeout_ms() as i64,
            )?
            .set_default("camera.max_retries", default_max_retries())?
            .set_default("camera.retry_delay_ms", default_retry_delay_ms() as i64)?
            .set_default("camera.device_root", default_device_root())?
            .set_default("camera.sysfs_root", default_sysfs_root())?
            .set_default("gesture.tilt_threshold_deg", default_tilt_threshold())?
            .set_default("gesture.rotate_threshold_deg", default_rotate_threshold())?
            .set_default(
                "gesture.tilt_distance_divisor",
                default_tilt_distance_divisor(),
            )?
            .set_default("gesture.tilt_angle_divisor", default_tilt_angle_divisor())?
            .set_default("gesture.wheel_step", default_wheel_step())?
            .set_default("overlay.opacity", default_opacity())?
            .set_default("overlay.scale", default_scale())?
            .set_default("storage.state_path", default_state_path())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // TRACEMATE_CAMERA__MAX_RETRIES=5 style overrides
            .add_source(
                Environment::with_prefix("TRACEMATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: TraceMateConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if camera.preferred_resolution.0 == 0
            || camera.preferred_resolution.1 == 0
            || camera.fallback_resolution.0 == 0
            || camera.fallback_resolution.1 == 0
        {
            return Err(ConfigError::Message(
                "Camera resolutions must be greater than 0".to_string(),
            ));
        }

        if camera.acquire_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera acquire_timeout_ms must be greater than 0".to_string(),
            ));
        }

        let gesture = &self.gesture;
        if gesture.tilt_threshold_deg < 0.0 {
            return Err(ConfigError::Message(
                "Gesture tilt_threshold_deg must not be negative".to_string(),
            ));
        }

        if gesture.rotate_threshold_deg < gesture.tilt_threshold_deg {
            return Err(ConfigError::Message(
                "Gesture rotate_threshold_deg must not be below tilt_threshold_deg".to_string(),
            ));
        }

        if gesture.tilt_distance_divisor <= 0.0 || gesture.tilt_angle_divisor <= 0.0 {
            return Err(ConfigError::Message(
                "Gesture tilt divisors must be greater than 0".to_string(),
            ));
        }

        if gesture.wheel_step <= 0.0 {
            return Err(ConfigError::Message(
                "Gesture wheel_step must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.overlay.opacity) {
            return Err(ConfigError::Message(
                "Overlay opacity must be within [0, 1]".to_string(),
            ));
        }

        if self.overlay.scale < crate::transform::MIN_SCALE {
            return Err(ConfigError::Message(format!(
                "Overlay scale must be at least {}",
                crate::transform::MIN_SCALE
            )));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for TraceMateConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            gesture: GestureConfig::default(),
            overlay: OverlayConfig::default(),
            storage: StorageConfig {
                state_path: default_state_path(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_device: None,
            preferred_resolution: default_preferred_resolution(),
            fallback_resolution: default_fallback_resolution(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            device_root: default_device_root(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tilt_threshold_deg: default_tilt_threshold(),
            rotate_threshold_deg: default_rotate_threshold(),
            tilt_distance_divisor: default_tilt_distance_divisor(),
            tilt_angle_divisor: default_tilt_angle_divisor(),
            wheel_step: default_wheel_step(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            opacity: default_opacity(),
            scale: default_scale(),
            position_x: 0.0,
            position_y: 0.0,
            rotation: 0.0,
            tilt_x: 0.0,
            tilt_y: 0.0,
        }
    }
}

// Default value functions
fn default_preferred_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_fallback_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_acquire_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_device_root() -> String {
    "/dev".to_string()
}
fn default_sysfs_root() -> String {
    "/sys/class/video4linux".to_string()
}

fn default_tilt_threshold() -> f64 {
    5.0
}
fn default_rotate_threshold() -> f64 {
    10.0
}
fn default_tilt_distance_divisor() -> f64 {
    10.0
}
fn default_tilt_angle_divisor() -> f64 {
    2.0
}
fn default_wheel_step() -> f64 {
    0.05
}

fn default_opacity() -> f64 {
    0.5
}
fn default_scale() -> f64 {
    0.8
}

fn default_state_path() -> String {
    "./tracemate-state.json".to_string()
}
fn default_event_bus_capacity() -> usize {
    100
}
