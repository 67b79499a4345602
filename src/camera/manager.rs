use super::gateway::MediaGateway;
use super::permission_store::PermissionStore;
use super::strategy::{strategy_ladder, Strategy};
use super::types::{DeviceInfo, MediaStream, PermissionState, StreamConstraints};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::events::{EventBus, TraceEvent};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Observable camera acquisition state.
#[derive(Debug, Clone)]
pub struct CameraState {
    pub stream: Option<Arc<MediaStream>>,
    pub devices: Vec<DeviceInfo>,
    pub current_device_id: Option<String>,
    pub permission: PermissionState,
    pub error: Option<String>,
    /// Operator intent to have a live stream.
    pub is_active: bool,
    pub retry_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptKind {
    Manual,
    Automatic,
}

enum AttemptOutcome {
    Acquired {
        stream: MediaStream,
        strategy: &'static str,
    },
    Failed(CameraError),
    Cancelled,
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

struct Inner {
    config: CameraConfig,
    gateway: Arc<dyn MediaGateway>,
    store: Arc<dyn PermissionStore>,
    event_bus: Option<Arc<EventBus>>,
    state: Mutex<CameraState>,
    // Lock order: attempt, then state
    attempt: Mutex<Option<InFlight>>,
    next_generation: Mutex<u64>,
    retry: Mutex<Option<JoinHandle<()>>>,
}

/// Owns one live camera stream at a time and keeps it alive across
/// transient failures.
///
/// Acquisitions are serialized: a `start` that arrives while another
/// acquisition is in flight is ignored. `stop` cancels the in-flight
/// acquisition, and a stream that resolves after cancellation is released
/// instead of stored. Failures never escape; they are recorded in
/// [`CameraState::error`].
#[derive(Clone)]
pub struct CameraManager {
    inner: Arc<Inner>,
}

/// Clears the in-flight slot when an attempt ends, including when its
/// future is dropped mid-flight.
struct AttemptGuard<'a> {
    inner: &'a Inner,
    generation: u64,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.inner.attempt.lock();
        if slot
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == self.generation)
        {
            *slot = None;
        }
    }
}

impl CameraManager {
    pub fn new(
        config: CameraConfig,
        gateway: Arc<dyn MediaGateway>,
        store: Arc<dyn PermissionStore>,
    ) -> Self {
        info!(
            "Creating camera manager with {} gateway (initial device: {:?})",
            gateway.name(),
            config.initial_device
        );

        let state = CameraState {
            stream: None,
            devices: Vec::new(),
            current_device_id: config.initial_device.clone(),
            permission: PermissionState::Unknown,
            error: None,
            is_active: true,
            retry_count: 0,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                gateway,
                store,
                event_bus: None,
                state: Mutex::new(state),
                attempt: Mutex::new(None),
                next_generation: Mutex::new(0),
                retry: Mutex::new(None),
            }),
        }
    }

    /// Publish status changes on `event_bus`. Must be called before the
    /// manager is cloned.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.event_bus = Some(event_bus);
        } else {
            warn!("Camera manager already shared; event bus not attached");
        }
        self
    }

    pub fn snapshot(&self) -> CameraState {
        self.inner.state.lock().clone()
    }

    /// Read-only handle to the live stream. Readers must not stop it.
    pub fn stream(&self) -> Option<Arc<MediaStream>> {
        self.inner.state.lock().stream.clone()
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.inner.state.lock().devices.clone()
    }

    pub fn current_device_id(&self) -> Option<String> {
        self.inner.state.lock().current_device_id.clone()
    }

    pub fn permission(&self) -> PermissionState {
        self.inner.state.lock().permission
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().is_active
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.state.lock().retry_count
    }

    pub fn is_acquiring(&self) -> bool {
        self.inner.attempt.lock().is_some()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.inner.config
    }

    /// Check permission and, when allowed, start the camera.
    pub async fn mount(&self) -> Option<Arc<MediaStream>> {
        self.check_permission().await;

        let (should_start, device) = {
            let state = self.inner.state.lock();
            (
                state.is_active && state.permission != PermissionState::Denied,
                state.current_device_id.clone(),
            )
        };

        if should_start {
            self.start(device).await
        } else {
            info!("Camera not started on mount (permission denied or inactive)");
            None
        }
    }

    /// Unconditionally release the camera.
    pub fn unmount(&self) {
        info!("Unmounting camera manager");
        self.stop();
    }

    /// Seed permission from the persisted flag, then let the platform
    /// query override it when supported.
    pub async fn check_permission(&self) -> PermissionState {
        if self.inner.store.load_granted() {
            debug!("Camera permission previously granted");
            self.set_permission(PermissionState::Granted);
        }

        match self.inner.gateway.query_permission().await {
            Some(PermissionState::Granted) => {
                self.set_permission(PermissionState::Granted);
                self.persist_granted();
            }
            Some(PermissionState::Denied) => {
                let denied = CameraError::PermissionDenied {
                    details: "permission query reported denied".to_string(),
                };
                self.inner.state.lock().error = Some(denied.user_message());
                self.set_permission(PermissionState::Denied);
            }
            Some(state @ PermissionState::Prompt) => self.set_permission(state),
            Some(PermissionState::Unknown) | None => {
                debug!("Permission query unsupported; will check on camera access");
            }
        }

        self.permission()
    }

    /// Acquire a stream for `device_id`, or the rear camera when `None`.
    ///
    /// Returns `None` without touching hardware when the manager is inactive
    /// or another acquisition is already in flight.
    pub async fn start(&self, device_id: Option<String>) -> Option<Arc<MediaStream>> {
        self.acquire(device_id, AttemptKind::Manual).await
    }

    /// Release the live stream and cancel any in-flight acquisition or
    /// pending retry. Idempotent.
    pub fn stop(&self) {
        if let Some(in_flight) = self.inner.attempt.lock().take() {
            debug!("Cancelling in-flight camera acquisition");
            in_flight.token.cancel();
        }
        self.cancel_retry();
        self.release_stream();
    }

    pub async fn switch_camera(&self, device_id: String) -> Option<Arc<MediaStream>> {
        info!("Switching camera to {}", device_id);
        self.inner.state.lock().current_device_id = Some(device_id.clone());
        self.start(Some(device_id)).await
    }

    pub fn pause(&self) {
        info!("Pausing camera");
        self.inner.state.lock().is_active = false;
        self.stop();
    }

    pub async fn resume(&self) -> Option<Arc<MediaStream>> {
        info!("Resuming camera");
        let device = {
            let mut state = self.inner.state.lock();
            state.is_active = true;
            state.current_device_id.clone()
        };
        self.start(device).await
    }

    /// Stop while the document is hidden; reacquire the same device when it
    /// becomes visible again, if still wanted and allowed.
    pub async fn on_visibility_change(&self, hidden: bool) -> Option<Arc<MediaStream>> {
        if hidden {
            debug!("Document hidden, stopping camera");
            self.stop();
            return None;
        }

        let (should_start, device) = {
            let state = self.inner.state.lock();
            (
                state.is_active && state.permission != PermissionState::Denied,
                state.current_device_id.clone(),
            )
        };

        if should_start {
            debug!("Document visible, resuming camera");
            self.start(device).await
        } else {
            None
        }
    }

    /// Enumerate video inputs. Failure degrades to an empty list.
    pub async fn refresh_devices(&self) -> Vec<DeviceInfo> {
        match self.inner.gateway.enumerate_devices().await {
            Ok(devices) => {
                info!("Available video devices: {}", devices.len());
                {
                    let mut state = self.inner.state.lock();
                    if state.current_device_id.is_none() {
                        if let Some(first) = devices.first() {
                            info!("Setting default camera device: {}", first.device_id);
                            state.current_device_id = Some(first.device_id.clone());
                        }
                    }
                    state.devices = devices.clone();
                }
                self.publish(TraceEvent::DevicesChanged {
                    count: devices.len(),
                });
                devices
            }
            Err(e) => {
                error!("Failed to enumerate devices: {}", e);
                self.inner.state.lock().error = Some(e.user_message());
                Vec::new()
            }
        }
    }

    /// One unconstrained acquisition, purely to elicit a permission prompt.
    pub async fn request_permission(&self) -> bool {
        let Some((generation, token)) = self.begin_attempt() else {
            debug!("Camera already initializing, ignoring permission request");
            return false;
        };
        let _guard = AttemptGuard {
            inner: &self.inner,
            generation,
        };

        self.cancel_retry();
        self.inner.state.lock().retry_count = 0;
        self.release_stream();

        let constraints = StreamConstraints::any();
        let result = tokio::select! {
            _ = token.cancelled() => return false,
            result = self.inner.gateway.acquire(&constraints) => result,
        };

        let result = result.and_then(|stream| {
            if stream.active_video_tracks().next().is_some() {
                Ok(stream)
            } else {
                self.inner.gateway.release(&stream);
                Err(CameraError::NoVideoTracks)
            }
        });

        match result {
            Ok(stream) => {
                let stored = {
                    let slot = self.inner.attempt.lock();
                    let current = slot
                        .as_ref()
                        .is_some_and(|in_flight| in_flight.generation == generation);
                    let mut state = self.inner.state.lock();
                    state.error = None;
                    state.retry_count = 0;
                    if current && state.is_active {
                        state.stream = Some(Arc::new(stream));
                        None
                    } else {
                        Some(stream)
                    }
                };
                if let Some(stale) = stored {
                    debug!("Permission granted while inactive; releasing stream");
                    self.inner.gateway.release(&stale);
                }
                self.set_permission(PermissionState::Granted);
                self.persist_granted();
                true
            }
            Err(e) => {
                warn!("Camera permission request failed: {}", e);
                self.inner.state.lock().error = Some("Failed to get camera permission".to_string());
                self.set_permission(PermissionState::Denied);
                false
            }
        }
    }

    async fn acquire(&self, device_id: Option<String>, kind: AttemptKind) -> Option<Arc<MediaStream>> {
        let Some((generation, token)) = self.begin_attempt() else {
            debug!("Camera already initializing, ignoring duplicate request");
            return None;
        };
        let _guard = AttemptGuard {
            inner: &self.inner,
            generation,
        };

        if !self.inner.state.lock().is_active {
            debug!("Camera not active, aborting initialization");
            return None;
        }

        if kind == AttemptKind::Manual {
            self.cancel_retry();
            self.inner.state.lock().retry_count = 0;
        }

        self.release_stream();
        self.inner.state.lock().error = None;

        info!("Starting camera initialization ({:?})", kind);
        let strategies = strategy_ladder(device_id.as_deref(), &self.inner.config);
        let timeout = self.inner.config.acquire_timeout();

        let outcome = tokio::select! {
            _ = token.cancelled() => AttemptOutcome::Cancelled,
            result = tokio::time::timeout(timeout, self.walk_ladder(&strategies)) => match result {
                Ok(Ok((stream, strategy))) => AttemptOutcome::Acquired { stream, strategy },
                Ok(Err(e)) => AttemptOutcome::Failed(e),
                Err(_) => AttemptOutcome::Failed(CameraError::Timeout { timeout }),
            },
        };

        self.settle(generation, outcome, device_id).await
    }

    async fn walk_ladder(
        &self,
        strategies: &[Strategy],
    ) -> Result<(MediaStream, &'static str), CameraError> {
        let mut denied = false;
        let mut last_error = None;

        for strategy in strategies {
            debug!("Trying camera strategy: {}", strategy.name);
            match self.inner.gateway.acquire(&strategy.constraints).await {
                Ok(stream) => {
                    if stream.active_video_tracks().next().is_none() {
                        warn!("Camera strategy {} returned no video tracks", strategy.name);
                        self.inner.gateway.release(&stream);
                        last_error = Some(CameraError::NoVideoTracks);
                        continue;
                    }
                    info!("Camera strategy successful: {}", strategy.name);
                    return Ok((stream, strategy.name));
                }
                Err(e) => {
                    warn!("Camera strategy failed: {}: {}", strategy.name, e);
                    denied |= e.is_permission_denial();
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no strategies".to_string());
        if denied {
            Err(CameraError::PermissionDenied { details: last })
        } else {
            Err(CameraError::AllStrategiesFailed {
                attempts: strategies.len(),
                last,
            })
        }
    }

    async fn settle(
        &self,
        generation: u64,
        outcome: AttemptOutcome,
        device_id: Option<String>,
    ) -> Option<Arc<MediaStream>> {
        match outcome {
            AttemptOutcome::Cancelled => {
                debug!("Camera acquisition cancelled");
                None
            }
            AttemptOutcome::Acquired { stream, strategy } => {
                let committed = {
                    let mut slot = self.inner.attempt.lock();
                    let current = slot
                        .as_ref()
                        .is_some_and(|in_flight| in_flight.generation == generation);
                    let mut state = self.inner.state.lock();
                    if current && state.is_active {
                        *slot = None;
                        let stream = Arc::new(stream);
                        state.stream = Some(Arc::clone(&stream));
                        state.error = None;
                        state.retry_count = 0;
                        Ok((stream, state.devices.is_empty()))
                    } else {
                        Err(stream)
                    }
                };

                let (stream, needs_devices) = match committed {
                    Ok(committed) => committed,
                    Err(stale) => {
                        info!("Discarding camera stream from a stopped attempt");
                        self.inner.gateway.release(&stale);
                        return None;
                    }
                };

                self.set_permission(PermissionState::Granted);
                self.persist_granted();
                self.publish(TraceEvent::CameraStarted {
                    device_id: stream.device_id().to_string(),
                    strategy: strategy.to_string(),
                    timestamp: Utc::now(),
                });

                if needs_devices {
                    self.refresh_devices().await;
                }

                Some(stream)
            }
            AttemptOutcome::Failed(e) => {
                let retry = {
                    let mut slot = self.inner.attempt.lock();
                    let current = slot
                        .as_ref()
                        .is_some_and(|in_flight| in_flight.generation == generation);
                    if !current {
                        debug!("Ignoring failure from a stopped attempt: {}", e);
                        return None;
                    }
                    *slot = None;

                    let mut state = self.inner.state.lock();
                    error!("Camera initialization failed: {}", e);
                    state.error = Some(e.user_message());
                    if e.is_permission_denial() {
                        state.permission = PermissionState::Denied;
                    }

                    let retry = state.is_active
                        && state.permission != PermissionState::Denied
                        && e.is_recoverable()
                        && state.retry_count < self.inner.config.max_retries;
                    if retry {
                        state.retry_count += 1;
                    }
                    self.publish(TraceEvent::CameraFailed {
                        message: e.user_message(),
                        retry_count: state.retry_count,
                        timestamp: Utc::now(),
                    });
                    retry.then_some(state.retry_count)
                };

                if e.is_permission_denial() {
                    self.publish(TraceEvent::PermissionChanged {
                        state: PermissionState::Denied,
                        timestamp: Utc::now(),
                    });
                }

                if let Some(attempt) = retry {
                    self.schedule_retry(attempt, device_id);
                }
                None
            }
        }
    }

    fn schedule_retry(&self, attempt: u32, device_id: Option<String>) {
        let delay = self.inner.config.retry_delay();
        info!(
            "Retrying camera initialization in {:?} (attempt {}/{})",
            delay, attempt, self.inner.config.max_retries
        );
        self.publish(TraceEvent::RetryScheduled {
            attempt,
            delay_ms: delay.as_millis() as u64,
        });

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let proceed = {
                let state = manager.inner.state.lock();
                state.is_active
                    && state.permission != PermissionState::Denied
                    && state.stream.is_none()
            };
            if proceed {
                manager.acquire(device_id, AttemptKind::Automatic).await;
            }
        });

        if let Some(previous) = self.inner.retry.lock().replace(handle) {
            if !previous.is_finished() {
                // Only reached from inside the running retry task itself
                debug!("Replacing handle of the running camera retry");
            }
        }
    }

    fn cancel_retry(&self) {
        if let Some(handle) = self.inner.retry.lock().take() {
            if !handle.is_finished() {
                debug!("Cancelling pending camera retry");
                handle.abort();
            }
        }
    }

    fn begin_attempt(&self) -> Option<(u64, CancellationToken)> {
        let mut slot = self.inner.attempt.lock();
        if slot.is_some() {
            return None;
        }

        let generation = {
            let mut next = self.inner.next_generation.lock();
            *next += 1;
            *next
        };
        let token = CancellationToken::new();
        *slot = Some(InFlight {
            generation,
            token: token.clone(),
        });
        Some((generation, token))
    }

    fn release_stream(&self) {
        let stream = self.inner.state.lock().stream.take();
        if let Some(stream) = stream {
            info!("Stopping camera tracks ({})", stream.device_id());
            self.inner.gateway.release(&stream);
            self.publish(TraceEvent::CameraStopped {
                timestamp: Utc::now(),
            });
        }
    }

    fn set_permission(&self, permission: PermissionState) {
        let changed = {
            let mut state = self.inner.state.lock();
            let changed = state.permission != permission;
            state.permission = permission;
            changed
        };
        if changed {
            self.publish(TraceEvent::PermissionChanged {
                state: permission,
                timestamp: Utc::now(),
            });
        }
    }

    fn persist_granted(&self) {
        if let Err(e) = self.inner.store.save_granted(true) {
            warn!("Failed to persist camera permission: {}", e);
        }
    }

    fn publish(&self, event: TraceEvent) {
        if let Some(event_bus) = &self.inner.event_bus {
            let _ = event_bus.publish(event);
        }
    }
}
