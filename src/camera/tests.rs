use super::*;
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::events::{EventBus, TraceEvent};
use std::sync::Arc;
use std::time::Duration;

fn create_test_camera_config() -> CameraConfig {
    CameraConfig {
        acquire_timeout_ms: 200,
        retry_delay_ms: 10,
        ..Default::default()
    }
}

fn create_manager(gateway: &Arc<SimulatedGateway>) -> CameraManager {
    CameraManager::new(
        create_test_camera_config(),
        gateway.clone(),
        Arc::new(MemoryPermissionStore::default()),
    )
}

async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn busy() -> CameraError {
    CameraError::DeviceBusy {
        device: "sim-cam-1".to_string(),
    }
}

fn denied() -> CameraError {
    CameraError::PermissionDenied {
        details: "NotAllowedError".to_string(),
    }
}

#[tokio::test]
async fn test_start_acquires_stream_and_refreshes_devices() {
    let gateway = Arc::new(SimulatedGateway::new(2));
    let manager = create_manager(&gateway);

    let stream = manager.start(None).await.expect("stream");
    assert_eq!(stream.device_id(), "sim-cam-1");
    assert_eq!(manager.permission(), PermissionState::Granted);
    assert_eq!(manager.error(), None);
    assert_eq!(manager.retry_count(), 0);
    assert!(!manager.is_acquiring());

    let devices = manager.devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].label, "Simulated Camera 0");
    assert_eq!(manager.current_device_id().as_deref(), Some("sim-cam-0"));
}

#[tokio::test]
async fn test_concurrent_start_is_ignored() {
    let gateway = Arc::new(SimulatedGateway::new(1).with_latency(Duration::from_millis(50)));
    let manager = create_manager(&gateway);

    let (first, second) = tokio::join!(manager.start(None), manager.start(None));
    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(gateway.acquire_calls(), 1);
    assert_eq!(gateway.max_live_streams(), 1);
}

#[tokio::test]
async fn test_stop_cancels_in_flight_attempt() {
    let gateway = Arc::new(SimulatedGateway::new(1).with_latency(Duration::from_millis(100)));
    let manager = create_manager(&gateway);

    let task = tokio::spawn({
        let manager = manager.clone();
        async move { manager.start(None).await }
    });
    assert!(wait_for(|| manager.is_acquiring()).await);

    manager.stop();
    assert!(task.await.unwrap().is_none());
    assert!(manager.stream().is_none());
    assert!(!manager.is_acquiring());
    assert_eq!(gateway.live_streams(), 0);

    // A fresh start is admitted once the cancelled attempt is gone
    assert!(manager.start(None).await.is_some());
}

#[tokio::test]
async fn test_hung_gateway_times_out() {
    let gateway = Arc::new(SimulatedGateway::new(1).with_default_outcome(ScriptedOutcome::Hang));
    let config = CameraConfig {
        max_retries: 0,
        ..create_test_camera_config()
    };
    let manager = CameraManager::new(
        config,
        gateway.clone(),
        Arc::new(MemoryPermissionStore::default()),
    );

    assert!(manager.start(None).await.is_none());
    let error = manager.error().expect("error recorded");
    assert!(error.contains("timed out"), "{}", error);
    assert_eq!(gateway.acquire_calls(), 1);
    assert_eq!(gateway.live_streams(), 0);
    assert!(!manager.is_acquiring());
}

#[tokio::test]
async fn test_retries_stop_at_limit_and_manual_start_resets() {
    let gateway =
        Arc::new(SimulatedGateway::new(1).with_default_outcome(ScriptedOutcome::Fail(busy())));
    let manager = create_manager(&gateway);

    assert!(manager.start(None).await.is_none());

    // One manual attempt plus three retries, four strategies each
    assert!(wait_for(|| gateway.acquire_calls() == 16 && !manager.is_acquiring()).await);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(gateway.acquire_calls(), 16);
    assert_eq!(manager.retry_count(), 3);
    assert!(manager.error().unwrap().starts_with("Failed to access camera"));

    gateway.set_default_outcome(ScriptedOutcome::Succeed);
    assert!(manager.start(None).await.is_some());
    assert_eq!(manager.retry_count(), 0);
    assert_eq!(manager.error(), None);
}

#[tokio::test]
async fn test_retry_recovers_after_transient_failure() {
    let gateway = Arc::new(SimulatedGateway::new(1).with_script(vec![
        ScriptedOutcome::Fail(busy()),
        ScriptedOutcome::Fail(busy()),
        ScriptedOutcome::Fail(busy()),
        ScriptedOutcome::Fail(busy()),
    ]));
    let manager = create_manager(&gateway);

    assert!(manager.start(None).await.is_none());
    assert!(wait_for(|| manager.stream().is_some()).await);
    assert_eq!(manager.retry_count(), 0);
    assert_eq!(gateway.acquire_calls(), 5);
}

#[tokio::test]
async fn test_denial_disables_retries_until_permission_requested() {
    let gateway =
        Arc::new(SimulatedGateway::new(1).with_default_outcome(ScriptedOutcome::Fail(denied())));
    let manager = create_manager(&gateway);

    assert!(manager.start(None).await.is_none());
    assert_eq!(manager.permission(), PermissionState::Denied);
    assert_eq!(manager.error(), Some(denied().user_message()));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(gateway.acquire_calls(), 4);

    assert!(manager.on_visibility_change(false).await.is_none());
    assert_eq!(gateway.acquire_calls(), 4);

    gateway.set_default_outcome(ScriptedOutcome::Succeed);
    assert!(manager.request_permission().await);
    assert_eq!(manager.permission(), PermissionState::Granted);
    assert!(manager.stream().is_some());
    assert_eq!(gateway.requests().last(), Some(&StreamConstraints::any()));
}

#[tokio::test]
async fn test_denial_on_any_rung_wins() {
    let gateway = Arc::new(
        SimulatedGateway::new(1)
            .with_script(vec![ScriptedOutcome::Fail(denied())])
            .with_default_outcome(ScriptedOutcome::Fail(busy())),
    );
    let manager = create_manager(&gateway);

    assert!(manager.start(None).await.is_none());
    assert_eq!(manager.permission(), PermissionState::Denied);
    assert_eq!(manager.retry_count(), 0);
}

#[tokio::test]
async fn test_failed_permission_request_marks_denied() {
    let gateway =
        Arc::new(SimulatedGateway::new(1).with_default_outcome(ScriptedOutcome::Fail(busy())));
    let manager = create_manager(&gateway);

    assert!(!manager.request_permission().await);
    assert_eq!(manager.permission(), PermissionState::Denied);
    assert_eq!(
        manager.error().as_deref(),
        Some("Failed to get camera permission")
    );
}

#[tokio::test]
async fn test_third_strategy_with_audio_track() {
    let gateway = Arc::new(SimulatedGateway::new(2).with_script(vec![
        ScriptedOutcome::Fail(CameraError::Overconstrained {
            constraint: "width".to_string(),
        }),
        ScriptedOutcome::Fail(CameraError::DeviceNotFound {
            device: "sim-cam-0".to_string(),
        }),
        ScriptedOutcome::SucceedWithTracks(vec![TrackKind::Video, TrackKind::Audio]),
    ]));
    let manager = create_manager(&gateway);

    let stream = manager.start(Some("sim-cam-0".to_string())).await.expect("stream");
    assert_eq!(stream.tracks().len(), 2);
    assert_eq!(stream.active_video_tracks().count(), 1);

    let requests = gateway.requests();
    assert_eq!(
        requests[0].device,
        DeviceSelector::Exact("sim-cam-0".to_string())
    );
    assert_eq!(requests[2], StreamConstraints::any());
}

#[tokio::test]
async fn test_stream_without_video_falls_through() {
    let gateway =
        Arc::new(SimulatedGateway::new(1).with_script(vec![ScriptedOutcome::NoVideo]));
    let manager = create_manager(&gateway);

    assert!(manager.start(None).await.is_some());
    assert_eq!(gateway.acquire_calls(), 2);
    assert_eq!(gateway.live_streams(), 1);
    assert_eq!(gateway.max_live_streams(), 1);
}

#[tokio::test]
async fn test_switching_keeps_single_live_stream() {
    let gateway = Arc::new(SimulatedGateway::new(2));
    let manager = create_manager(&gateway);

    manager.start(None).await.expect("stream");
    manager.switch_camera("sim-cam-0".to_string()).await.expect("stream");
    let stream = manager
        .switch_camera("sim-cam-1".to_string())
        .await
        .expect("stream");

    assert_eq!(stream.device_id(), "sim-cam-1");
    assert_eq!(manager.current_device_id().as_deref(), Some("sim-cam-1"));
    assert_eq!(gateway.live_streams(), 1);
    assert_eq!(gateway.max_live_streams(), 1);
}

#[tokio::test]
async fn test_visibility_cycle_reacquires_same_device() {
    let gateway = Arc::new(SimulatedGateway::new(2));
    let manager = create_manager(&gateway);

    manager.switch_camera("sim-cam-0".to_string()).await.expect("stream");

    assert!(manager.on_visibility_change(true).await.is_none());
    assert!(manager.stream().is_none());
    assert_eq!(gateway.live_streams(), 0);
    assert!(manager.is_active());

    let stream = manager.on_visibility_change(false).await.expect("stream");
    assert_eq!(stream.device_id(), "sim-cam-0");
    assert_eq!(gateway.live_streams(), 1);
}

#[tokio::test]
async fn test_paused_manager_makes_no_gateway_calls() {
    let gateway = Arc::new(SimulatedGateway::new(1));
    let manager = create_manager(&gateway);

    manager.pause();
    assert!(manager.start(None).await.is_none());
    assert!(manager.on_visibility_change(false).await.is_none());
    assert_eq!(gateway.acquire_calls(), 0);

    assert!(manager.resume().await.is_some());
    assert!(manager.is_active());
}

#[tokio::test]
async fn test_start_while_paused_leaves_state_untouched() {
    let gateway =
        Arc::new(SimulatedGateway::new(1).with_default_outcome(ScriptedOutcome::Fail(busy())));
    let manager = create_manager(&gateway);

    manager.start(None).await;
    assert!(wait_for(|| manager.retry_count() == 3 && !manager.is_acquiring()).await);
    let error = manager.error();
    assert!(error.is_some());

    manager.pause();
    let calls = gateway.acquire_calls();
    assert!(manager.start(None).await.is_none());

    assert_eq!(manager.retry_count(), 3);
    assert_eq!(manager.error(), error);
    assert_eq!(gateway.acquire_calls(), calls);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let gateway = Arc::new(SimulatedGateway::new(1));
    let manager = create_manager(&gateway);

    manager.stop();
    manager.start(None).await.expect("stream");
    manager.stop();
    manager.stop();
    assert!(manager.stream().is_none());
    assert_eq!(gateway.live_streams(), 0);
}

#[tokio::test]
async fn test_enumeration_failure_keeps_device_list() {
    let gateway = Arc::new(SimulatedGateway::new(2));
    let manager = create_manager(&gateway);

    assert_eq!(manager.refresh_devices().await.len(), 2);

    gateway.set_enumerate_error(Some(CameraError::Enumeration {
        details: "NotSupportedError".to_string(),
    }));
    assert!(manager.refresh_devices().await.is_empty());
    assert_eq!(manager.error().as_deref(), Some("Failed to enumerate devices"));
    assert_eq!(manager.devices().len(), 2);
}

#[tokio::test]
async fn test_unlabeled_devices_get_placeholder() {
    let gateway = Arc::new(SimulatedGateway::new(1));
    let manager = create_manager(&gateway);

    let devices = manager.refresh_devices().await;
    assert_eq!(devices[0].label, "");
    assert_eq!(devices[0].display_label(), "Camera sim-c...");
}

#[tokio::test]
async fn test_stored_grant_seeds_permission() {
    let gateway = Arc::new(SimulatedGateway::new(1));
    let manager = CameraManager::new(
        create_test_camera_config(),
        gateway.clone(),
        Arc::new(MemoryPermissionStore::new(true)),
    );

    assert_eq!(manager.check_permission().await, PermissionState::Granted);
    assert_eq!(gateway.acquire_calls(), 0);
}

#[tokio::test]
async fn test_mount_with_denied_query_does_not_start() {
    let gateway = Arc::new(SimulatedGateway::new(1).with_permission(PermissionState::Denied));
    let manager = CameraManager::new(
        create_test_camera_config(),
        gateway.clone(),
        Arc::new(MemoryPermissionStore::new(true)),
    );

    assert!(manager.mount().await.is_none());
    assert_eq!(manager.permission(), PermissionState::Denied);
    assert_eq!(manager.error(), Some(denied().user_message()));
    assert_eq!(gateway.acquire_calls(), 0);
}

#[tokio::test]
async fn test_mount_starts_and_persists_grant() {
    let gateway = Arc::new(SimulatedGateway::new(1));
    let store = Arc::new(MemoryPermissionStore::default());
    let manager = CameraManager::new(create_test_camera_config(), gateway.clone(), store.clone());

    assert!(manager.mount().await.is_some());
    assert!(store.load_granted());

    manager.unmount();
    assert_eq!(gateway.live_streams(), 0);
}

#[tokio::test]
async fn test_events_published() {
    let gateway = Arc::new(SimulatedGateway::new(1));
    let event_bus = Arc::new(EventBus::new(32));
    let mut receiver = event_bus.subscribe();
    let manager = create_manager(&gateway).with_event_bus(event_bus);

    manager.start(None).await.expect("stream");
    manager.stop();

    let mut types = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        types.push(event.event_type());
    }
    assert!(types.contains(&"camera_started"));
    assert!(types.contains(&"permission_changed"));
    assert_eq!(types.last(), Some(&"camera_stopped"));

    let started = TraceEvent::CameraStarted {
        device_id: "sim-cam-0".to_string(),
        strategy: "Any camera".to_string(),
        timestamp: chrono::Utc::now(),
    };
    assert_eq!(started.description(), "Camera sim-cam-0 started (Any camera)");
}
