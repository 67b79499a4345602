use crate::access::AccessPolicy;
use crate::camera::{CameraManager, MediaGateway, MediaStream, PermissionStore};
use crate::config::TraceMateConfig;
use crate::error::{Result, TraceMateError};
use crate::events::{EventBus, TraceEvent};
use crate::gesture::{GestureInterpreter, GestureMode, InputOutcome, PointerInput};
use crate::transform::{OverlayTransform, TransformPatch};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Controller for one tracing view: owns the camera manager and the gesture
/// interpreter for as long as the view is mounted.
pub struct TracingSurface {
    camera: CameraManager,
    gesture: GestureInterpreter,
    access: Arc<dyn AccessPolicy>,
    event_bus: Arc<EventBus>,
    overlay_defaults: OverlayTransform,
    mounted: bool,
    hidden: bool,
}

impl TracingSurface {
    pub fn new(
        config: &TraceMateConfig,
        gateway: Arc<dyn MediaGateway>,
        store: Arc<dyn PermissionStore>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let camera = CameraManager::new(config.camera.clone(), gateway, store)
            .with_event_bus(Arc::clone(&event_bus));
        let overlay_defaults = OverlayTransform::from(&config.overlay);

        Self {
            camera,
            gesture: GestureInterpreter::new(config.gesture.clone(), overlay_defaults),
            access,
            event_bus,
            overlay_defaults,
            mounted: false,
            hidden: false,
        }
    }

    pub fn camera(&self) -> &CameraManager {
        &self.camera
    }

    pub fn gesture(&self) -> &GestureInterpreter {
        &self.gesture
    }

    pub fn transform(&self) -> &OverlayTransform {
        self.gesture.transform()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Open a tracing session and start the camera.
    ///
    /// Restricted users are refused once their session allowance is used up.
    pub async fn mount(&mut self) -> Result<Option<Arc<MediaStream>>> {
        if self.mounted {
            return Ok(self.camera.stream());
        }

        if !self.access.is_unrestricted() {
            if !self.access.is_session_permitted() {
                warn!("Session limit reached, refusing to mount tracing surface");
                return Err(TraceMateError::SessionNotPermitted);
            }
            self.access.record_session();
        }

        info!("Mounting tracing surface");
        self.mounted = true;
        Ok(self.camera.mount().await)
    }

    /// Release the camera and end any gesture in progress.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        info!("Unmounting tracing surface");
        self.camera.unmount();
        let outcome = self.gesture.handle(PointerInput::TouchCancel);
        self.publish_outcome(outcome);
        self.mounted = false;
    }

    pub fn handle_input(&mut self, input: PointerInput) -> InputOutcome {
        let outcome = self.gesture.handle(input);
        self.publish_outcome(outcome);
        outcome
    }

    /// Absolute write from the settings panel.
    pub fn apply_panel(&mut self, patch: &TransformPatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        let applied = self.gesture.apply_patch(patch);
        if applied {
            self.publish_transform();
        }
        applied
    }

    pub fn reset_overlay(&mut self) {
        debug!("Resetting overlay transform");
        let was_active = self.gesture.mode() != GestureMode::Idle;
        self.gesture.reset(self.overlay_defaults);
        if was_active {
            self.publish(TraceEvent::GestureModeChanged {
                mode: GestureMode::Idle,
            });
        }
        self.publish_transform();
    }

    pub fn set_locked(&mut self, locked: bool) {
        let was_active = self.gesture.mode() != GestureMode::Idle;
        self.gesture.set_locked(locked);
        if was_active && self.gesture.mode() == GestureMode::Idle {
            self.publish(TraceEvent::GestureModeChanged {
                mode: GestureMode::Idle,
            });
        }
    }

    pub async fn on_visibility_change(&mut self, hidden: bool) -> Option<Arc<MediaStream>> {
        self.hidden = hidden;
        self.publish(TraceEvent::VisibilityChanged { hidden });
        if !self.mounted {
            return None;
        }
        self.camera.on_visibility_change(hidden).await
    }

    pub async fn switch_camera(&self, device_id: String) -> Option<Arc<MediaStream>> {
        self.camera.switch_camera(device_id).await
    }

    /// Switch to the device after the current one in enumeration order.
    pub async fn next_camera(&self) -> Option<Arc<MediaStream>> {
        let devices = self.camera.devices();
        if devices.len() < 2 {
            debug!("No other camera to switch to");
            return None;
        }

        let current = self.camera.current_device_id();
        let index = devices
            .iter()
            .position(|device| Some(&device.device_id) == current.as_ref())
            .map(|i| (i + 1) % devices.len())
            .unwrap_or(0);
        self.switch_camera(devices[index].device_id.clone()).await
    }

    fn publish_outcome(&self, outcome: InputOutcome) {
        if outcome.transform_changed {
            self.publish_transform();
        }
        if let Some(mode) = outcome.mode_changed {
            self.publish(TraceEvent::GestureModeChanged { mode });
        }
    }

    fn publish_transform(&self) {
        self.publish(TraceEvent::TransformChanged {
            transform: *self.gesture.transform(),
        });
    }

    fn publish(&self, event: TraceEvent) {
        let _ = self.event_bus.publish(event);
    }
}

impl Drop for TracingSurface {
    fn drop(&mut self) {
        if self.mounted {
            self.camera.unmount();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DailySessionPolicy;
    use crate::camera::{MemoryPermissionStore, SimulatedGateway};
    use crate::gesture::{HitTarget, Point};

    fn create_surface(
        gateway: &Arc<SimulatedGateway>,
        access: Arc<dyn AccessPolicy>,
    ) -> TracingSurface {
        let mut config = TraceMateConfig::default();
        config.camera.retry_delay_ms = 10;
        TracingSurface::new(
            &config,
            gateway.clone(),
            Arc::new(MemoryPermissionStore::default()),
            access,
        )
    }

    #[tokio::test]
    async fn test_mount_starts_camera_and_unmount_releases() {
        let gateway = Arc::new(SimulatedGateway::new(1));
        let mut surface = create_surface(&gateway, Arc::new(DailySessionPolicy::unrestricted()));

        assert!(surface.mount().await.unwrap().is_some());
        assert!(surface.is_mounted());
        assert_eq!(gateway.live_streams(), 1);

        surface.unmount();
        assert!(!surface.is_mounted());
        assert_eq!(gateway.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_session_limit_refuses_mount() {
        let gateway = Arc::new(SimulatedGateway::new(1));
        let access = Arc::new(DailySessionPolicy::new(1));

        let mut first = create_surface(&gateway, access.clone());
        first.mount().await.unwrap();
        first.unmount();

        let mut second = create_surface(&gateway, access);
        assert!(matches!(
            second.mount().await,
            Err(TraceMateError::SessionNotPermitted)
        ));
        assert_eq!(gateway.acquire_calls(), 1);
    }

    #[tokio::test]
    async fn test_unvalidated_zero_capacity_config() {
        let gateway = Arc::new(SimulatedGateway::new(1));
        let mut config = TraceMateConfig::default();
        config.system.event_bus_capacity = 0;
        assert!(config.validate().is_err());

        let mut surface = TracingSurface::new(
            &config,
            gateway.clone(),
            Arc::new(MemoryPermissionStore::default()),
            Arc::new(DailySessionPolicy::unrestricted()),
        );
        assert!(surface.mount().await.unwrap().is_some());
        assert!(surface.camera().error().is_none());
    }

    #[tokio::test]
    async fn test_drop_releases_camera() {
        let gateway = Arc::new(SimulatedGateway::new(1));
        {
            let mut surface =
                create_surface(&gateway, Arc::new(DailySessionPolicy::unrestricted()));
            surface.mount().await.unwrap();
        }
        assert_eq!(gateway.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_gesture_events_published() {
        let gateway = Arc::new(SimulatedGateway::new(1));
        let mut surface = create_surface(&gateway, Arc::new(DailySessionPolicy::unrestricted()));
        let mut receiver = surface.event_bus().subscribe();

        surface.handle_input(PointerInput::MouseDown {
            target: HitTarget::Overlay,
            position: Point::new(0.0, 0.0),
        });
        surface.handle_input(PointerInput::MouseMove {
            position: Point::new(5.0, 0.0),
        });

        let mut types = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            types.push(event.event_type());
        }
        assert_eq!(types, vec!["gesture_mode_changed", "transform_changed"]);

        // Panel is locked out until the drag ends
        let patch = TransformPatch {
            opacity: Some(0.9),
            ..Default::default()
        };
        assert!(!surface.apply_panel(&patch));
        surface.handle_input(PointerInput::MouseUp);
        assert!(surface.apply_panel(&patch));
        assert_eq!(surface.transform().opacity, 0.9);
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let gateway = Arc::new(SimulatedGateway::new(1));
        let mut surface = create_surface(&gateway, Arc::new(DailySessionPolicy::unrestricted()));

        surface.apply_panel(&TransformPatch {
            scale: Some(3.0),
            rotation: Some(45.0),
            ..Default::default()
        });
        surface.reset_overlay();
        assert_eq!(*surface.transform(), OverlayTransform::default());
    }

    #[tokio::test]
    async fn test_locked_surface_ignores_input() {
        let gateway = Arc::new(SimulatedGateway::new(1));
        let mut surface = create_surface(&gateway, Arc::new(DailySessionPolicy::unrestricted()));

        surface.set_locked(true);
        let outcome = surface.handle_input(PointerInput::Wheel {
            target: HitTarget::Overlay,
            delta_y: -1.0,
        });
        assert!(!outcome.prevent_default);
        assert_eq!(*surface.transform(), OverlayTransform::default());
    }

    #[tokio::test]
    async fn test_visibility_and_next_camera() {
        let gateway = Arc::new(SimulatedGateway::new(2));
        let mut surface = create_surface(&gateway, Arc::new(DailySessionPolicy::unrestricted()));
        surface.mount().await.unwrap();

        let stream = surface.next_camera().await.expect("stream");
        assert_eq!(stream.device_id(), "sim-cam-1");

        assert!(surface.on_visibility_change(true).await.is_none());
        assert!(surface.is_hidden());
        assert_eq!(gateway.live_streams(), 0);

        let stream = surface.on_visibility_change(false).await.expect("stream");
        assert_eq!(stream.device_id(), "sim-cam-1");
        assert_eq!(gateway.max_live_streams(), 1);
    }
}
