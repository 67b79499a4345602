use super::gateway::MediaGateway;
use super::types::{
    DeviceInfo, DeviceSelector, MediaStream, MediaTrack, PermissionState, StreamConstraints,
    TrackKind,
};
use crate::error::CameraError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// What the next `acquire` call does.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    /// Hand out a stream with one video track.
    Succeed,
    /// Hand out a stream with exactly these tracks.
    SucceedWithTracks(Vec<TrackKind>),
    /// Hand out a stream with no video track.
    NoVideo,
    Fail(CameraError),
    /// Never resolve.
    Hang,
}

/// Camera gateway backed by an in-process script instead of hardware.
///
/// Each `acquire` pops the next scripted outcome, falling back to the
/// default outcome once the script is exhausted. Live streams are tracked
/// so leaks are observable.
pub struct SimulatedGateway {
    devices: Vec<String>,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    default_outcome: Mutex<ScriptedOutcome>,
    permission: Mutex<Option<PermissionState>>,
    enumerate_error: Mutex<Option<CameraError>>,
    latency: Mutex<Duration>,
    granted: AtomicBool,
    acquire_calls: AtomicUsize,
    max_live: AtomicUsize,
    live: Mutex<HashSet<Uuid>>,
    requests: Mutex<Vec<StreamConstraints>>,
}

impl SimulatedGateway {
    /// Simulate `device_count` cameras named `sim-cam-0`, `sim-cam-1`, ...
    pub fn new(device_count: usize) -> Self {
        info!("Creating simulated camera gateway with {} device(s)", device_count);
        Self {
            devices: (0..device_count).map(|i| format!("sim-cam-{}", i)).collect(),
            script: Mutex::new(VecDeque::new()),
            default_outcome: Mutex::new(ScriptedOutcome::Succeed),
            permission: Mutex::new(None),
            enumerate_error: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            granted: AtomicBool::new(false),
            acquire_calls: AtomicUsize::new(0),
            max_live: AtomicUsize::new(0),
            live: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    pub fn with_default_outcome(self, outcome: ScriptedOutcome) -> Self {
        *self.default_outcome.lock() = outcome;
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    pub fn with_permission(self, permission: PermissionState) -> Self {
        *self.permission.lock() = Some(permission);
        self
    }

    pub fn push_outcome(&self, outcome: ScriptedOutcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn set_default_outcome(&self, outcome: ScriptedOutcome) {
        *self.default_outcome.lock() = outcome;
    }

    pub fn set_permission(&self, permission: Option<PermissionState>) {
        *self.permission.lock() = permission;
    }

    pub fn set_enumerate_error(&self, error: Option<CameraError>) {
        *self.enumerate_error.lock() = error;
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.live.lock().len()
    }

    /// Highest number of simultaneously live streams ever observed.
    pub fn max_live_streams(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<StreamConstraints> {
        self.requests.lock().clone()
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_outcome.lock().clone())
    }

    fn resolve_device(&self, selector: &DeviceSelector) -> Result<String, CameraError> {
        match selector {
            DeviceSelector::Exact(id) => self
                .devices
                .iter()
                .find(|device| *device == id)
                .cloned()
                .ok_or_else(|| CameraError::DeviceNotFound { device: id.clone() }),
            // Rear camera is listed last
            DeviceSelector::Facing(_) | DeviceSelector::Any => self
                .devices
                .last()
                .cloned()
                .ok_or(CameraError::NotAvailable),
        }
    }

    fn open(
        &self,
        constraints: &StreamConstraints,
        tracks: Vec<TrackKind>,
    ) -> Result<MediaStream, CameraError> {
        let device = self.resolve_device(&constraints.device)?;
        let tracks = tracks
            .into_iter()
            .map(|kind| match kind {
                TrackKind::Video => MediaTrack::video(format!("{} video", device)),
                TrackKind::Audio => MediaTrack::audio(format!("{} audio", device)),
            })
            .collect();
        let stream = MediaStream::new(device, constraints.ideal_resolution, tracks);

        self.granted.store(true, Ordering::SeqCst);
        let live = {
            let mut live = self.live.lock();
            live.insert(stream.id());
            live.len()
        };
        self.max_live.fetch_max(live, Ordering::SeqCst);
        debug!("Simulated stream {} opened on {}", stream.id(), stream.device_id());
        Ok(stream)
    }
}

#[async_trait]
impl MediaGateway for SimulatedGateway {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        if let Some(e) = self.enumerate_error.lock().clone() {
            return Err(e);
        }

        let granted = self.granted.load(Ordering::SeqCst);
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let label = if granted {
                    format!("Simulated Camera {}", i)
                } else {
                    String::new()
                };
                DeviceInfo::new(id.clone(), label)
            })
            .collect())
    }

    async fn acquire(&self, constraints: &StreamConstraints) -> Result<MediaStream, CameraError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(constraints.clone());
        let outcome = self.next_outcome();
        trace!("Simulated acquire {:?} -> {:?}", constraints.device, outcome);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match outcome {
            ScriptedOutcome::Succeed => self.open(constraints, vec![TrackKind::Video]),
            ScriptedOutcome::SucceedWithTracks(tracks) => self.open(constraints, tracks),
            ScriptedOutcome::NoVideo => self.open(constraints, Vec::new()),
            ScriptedOutcome::Fail(e) => Err(e),
            ScriptedOutcome::Hang => std::future::pending().await,
        }
    }

    fn release(&self, stream: &MediaStream) {
        if self.live.lock().remove(&stream.id()) {
            debug!("Simulated stream {} released", stream.id());
        }
    }

    async fn query_permission(&self) -> Option<PermissionState> {
        *self.permission.lock()
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
