// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the media session controller

use meeting::backends::MediaPlatform;
use meeting::backends::simulated::{AcquireBehavior, SimulatedPlatform};
use meeting::backends::types::{DeviceKind, MediaDeviceInfo};
use meeting::errors::MediaError;
use meeting::session::{
    ControllerOptions, EventBus, MediaEvent, MediaSessionController, NoticeKind, NoticeReceiver,
    Notifier, RejectReason, ToggleOutcome, ToggleStatus, probe,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Fixture {
    platform: Arc<SimulatedPlatform>,
    controller: Arc<MediaSessionController>,
    bus: EventBus,
    notices: NoticeReceiver,
}

async fn fixture(platform: SimulatedPlatform) -> Fixture {
    let platform = Arc::new(platform);
    let (notifier, notices) = Notifier::channel();
    let bus = EventBus::new();
    let capability = probe(platform.as_ref(), &notifier).await;
    let dyn_platform: Arc<dyn MediaPlatform> = platform.clone();
    let controller = Arc::new(MediaSessionController::new(
        dyn_platform,
        capability,
        bus.clone(),
        notifier,
        ControllerOptions::default(),
    ));
    Fixture {
        platform,
        controller,
        bus,
        notices,
    }
}

fn drain(notices: &mut NoticeReceiver) -> Vec<NoticeKind> {
    let mut kinds = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        kinds.push(notice.kind);
    }
    kinds
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn count_events(bus: &EventBus, event: MediaEvent) -> (Arc<AtomicUsize>, meeting::session::Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let sub = bus.subscribe(event, move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (count, sub)
}

#[tokio::test]
async fn test_camera_starts_off() {
    let f = fixture(SimulatedPlatform::with_default_devices()).await;

    assert!(f.controller.desired().camera_off);
    assert!(!f.controller.desired().muted);
    assert_eq!(f.controller.status(), ToggleStatus::Idle { camera_on: false });
    assert_eq!(f.platform.acquire_calls(), 0);
}

#[tokio::test]
async fn test_toggle_on_verifies_and_releases_trial_stream() {
    let mut f = fixture(SimulatedPlatform::with_default_devices()).await;

    let outcome = f.controller.toggle_camera().await;

    assert_eq!(outcome, ToggleOutcome::TurnedOn);
    assert!(!f.controller.desired().camera_off);
    assert!(!f.controller.is_loading());
    assert_eq!(f.platform.acquire_calls(), 1);
    assert_eq!(f.platform.live_tracks(), 0, "trial stream must be released");

    let constraints = f.platform.last_constraints().expect("constraints recorded");
    assert!(!constraints.audio, "trial acquisition is video only");
    assert!(drain(&mut f.notices).contains(&NoticeKind::CameraOn));
}

#[tokio::test]
async fn test_toggle_off_does_not_touch_devices() {
    let f = fixture(SimulatedPlatform::with_default_devices()).await;
    assert_eq!(f.controller.toggle_camera().await, ToggleOutcome::TurnedOn);

    let outcome = f.controller.toggle_camera().await;

    assert_eq!(outcome, ToggleOutcome::TurnedOff);
    assert!(f.controller.desired().camera_off);
    assert_eq!(f.platform.acquire_calls(), 1);
}

#[tokio::test]
async fn test_denial_reverts_camera_and_clears_loading() {
    let mut f = fixture(SimulatedPlatform::with_default_devices()).await;
    f.platform.push_behavior(AcquireBehavior::Deny);

    let outcome = f.controller.toggle_camera().await;

    assert!(matches!(
        outcome,
        ToggleOutcome::Failed(MediaError::PermissionDenied(_))
    ));
    assert!(f.controller.desired().camera_off);
    assert!(!f.controller.is_loading());
    assert!(matches!(
        f.controller.last_failure(),
        Some(MediaError::PermissionDenied(_))
    ));
    assert!(drain(&mut f.notices).contains(&NoticeKind::AccessDenied));
}

#[tokio::test]
async fn test_stream_without_video_counts_as_failure() {
    let mut f = fixture(SimulatedPlatform::with_default_devices()).await;
    f.platform.push_behavior(AcquireBehavior::GrantWithoutVideo);

    let outcome = f.controller.toggle_camera().await;

    assert_eq!(outcome, ToggleOutcome::Failed(MediaError::NoUsableTracks));
    assert!(f.controller.desired().camera_off);
    assert_eq!(f.platform.live_tracks(), 0);
    assert!(drain(&mut f.notices).contains(&NoticeKind::DeviceUnavailable));
}

#[tokio::test]
async fn test_success_clears_previous_failure() {
    let f = fixture(SimulatedPlatform::with_default_devices()).await;
    f.platform.push_behavior(AcquireBehavior::Unavailable);
    assert!(matches!(
        f.controller.toggle_camera().await,
        ToggleOutcome::Failed(MediaError::DeviceUnavailable(_))
    ));

    assert_eq!(f.controller.toggle_camera().await, ToggleOutcome::TurnedOn);
    assert_eq!(f.controller.last_failure(), None);
}

#[tokio::test]
async fn test_toggle_while_in_flight_is_rejected() {
    let mut f = fixture(SimulatedPlatform::with_default_devices()).await;
    let gate = f.platform.gate_acquisitions();

    let controller = Arc::clone(&f.controller);
    let first = tokio::spawn(async move { controller.toggle_camera().await });
    wait_until(|| f.platform.acquire_calls() == 1).await;

    assert!(f.controller.is_loading());
    assert_eq!(f.controller.status(), ToggleStatus::Requesting);
    assert!(!f.controller.controls().camera_enabled);

    let second = f.controller.toggle_camera().await;
    assert_eq!(second, ToggleOutcome::Rejected(RejectReason::InFlight));
    assert_eq!(f.platform.acquire_calls(), 1);
    assert!(f.controller.is_loading(), "button stays disabled");
    assert!(drain(&mut f.notices).contains(&NoticeKind::ToggleBusy));

    gate.release_one();
    assert_eq!(first.await.expect("toggle task"), ToggleOutcome::TurnedOn);
    assert!(!f.controller.is_loading());
}

#[tokio::test]
async fn test_off_pressed_during_pending_on_ends_off() {
    let mut f = fixture(SimulatedPlatform::with_default_devices()).await;
    let gate = f.platform.gate_acquisitions();

    let controller = Arc::clone(&f.controller);
    let on = tokio::spawn(async move { controller.toggle_camera().await });
    wait_until(|| f.controller.is_loading()).await;

    assert_eq!(
        f.controller.toggle_camera().await,
        ToggleOutcome::Rejected(RejectReason::InFlight)
    );

    gate.release_one();
    assert_eq!(on.await.expect("toggle task"), ToggleOutcome::TurnedOn);

    assert!(f.controller.desired().camera_off, "last press wins");
    assert!(!f.controller.is_loading());
    assert_eq!(f.platform.acquire_calls(), 1, "turning off never acquires");
    assert_eq!(f.platform.live_tracks(), 0);
    let kinds = drain(&mut f.notices);
    assert!(kinds.contains(&NoticeKind::CameraOn));
    assert!(kinds.contains(&NoticeKind::CameraOff));
}

#[tokio::test]
async fn test_on_off_on_during_pending_on_ends_on() {
    let f = fixture(SimulatedPlatform::with_default_devices()).await;
    let gate = f.platform.gate_acquisitions();

    let controller = Arc::clone(&f.controller);
    let on = tokio::spawn(async move { controller.toggle_camera().await });
    wait_until(|| f.controller.is_loading()).await;

    for _ in 0..2 {
        assert_eq!(
            f.controller.toggle_camera().await,
            ToggleOutcome::Rejected(RejectReason::InFlight)
        );
    }

    gate.release_one();
    assert_eq!(on.await.expect("toggle task"), ToggleOutcome::TurnedOn);

    assert!(!f.controller.desired().camera_off);
    assert_eq!(f.platform.acquire_calls(), 1, "already on, nothing to redo");
}

#[tokio::test]
async fn test_on_pressed_during_failing_on_retries() {
    let f = fixture(SimulatedPlatform::with_default_devices()).await;
    f.platform.push_behavior(AcquireBehavior::Unavailable);
    let gate = f.platform.gate_acquisitions();

    let controller = Arc::clone(&f.controller);
    let first = tokio::spawn(async move { controller.toggle_camera().await });
    wait_until(|| f.controller.is_loading()).await;

    // Off then on again while the first request is pending
    f.controller.toggle_camera().await;
    f.controller.toggle_camera().await;

    gate.release_one();
    gate.release_one();
    assert!(matches!(
        first.await.expect("toggle task"),
        ToggleOutcome::Failed(MediaError::DeviceUnavailable(_))
    ));

    assert!(!f.controller.desired().camera_off);
    assert_eq!(f.platform.acquire_calls(), 2);
}

#[tokio::test]
async fn test_no_camera_is_notice_only() {
    let platform = SimulatedPlatform::new().with_devices(vec![MediaDeviceInfo {
        id: "mic".to_string(),
        label: "Mic".to_string(),
        kind: DeviceKind::AudioInput,
        facing: None,
    }]);
    let mut f = fixture(platform).await;
    drain(&mut f.notices);

    let outcome = f.controller.toggle_camera().await;

    assert_eq!(outcome, ToggleOutcome::Rejected(RejectReason::NoCamera));
    assert_eq!(f.platform.acquire_calls(), 0);
    assert!(f.controller.desired().camera_off);
    assert!(!f.controller.controls().camera_enabled);
    assert_eq!(drain(&mut f.notices), vec![NoticeKind::CameraDisabled]);
}

#[tokio::test]
async fn test_unsupported_platform_disables_camera() {
    let f = fixture(SimulatedPlatform::unsupported()).await;

    let outcome = f.controller.toggle_camera().await;

    assert_eq!(outcome, ToggleOutcome::Rejected(RejectReason::Unsupported));
    assert_eq!(f.platform.acquire_calls(), 0);
    assert!(!f.controller.controls().camera_enabled);
}

#[tokio::test]
async fn test_toggle_mute_never_touches_devices() {
    let mut f = fixture(SimulatedPlatform::with_default_devices()).await;
    assert_eq!(f.controller.toggle_camera().await, ToggleOutcome::TurnedOn);
    drain(&mut f.notices);
    let calls = f.platform.acquire_calls();
    let issued = f.platform.issued_tracks().len();

    assert!(f.controller.toggle_mute());
    assert!(!f.controller.toggle_mute());

    assert_eq!(f.platform.acquire_calls(), calls);
    assert_eq!(f.platform.issued_tracks().len(), issued);
    assert!(!f.controller.desired().camera_off);
    assert_eq!(
        drain(&mut f.notices),
        vec![NoticeKind::MicrophoneMuted, NoticeKind::MicrophoneEnabled]
    );
}

#[tokio::test]
async fn test_every_mutation_is_announced() {
    let f = fixture(SimulatedPlatform::with_default_devices()).await;
    let (changes, _sub) = count_events(&f.bus, MediaEvent::StateChanged);

    f.controller.toggle_mute();
    f.controller.toggle_camera().await;
    f.platform.push_behavior(AcquireBehavior::Deny);
    f.controller.toggle_camera().await;
    f.controller.toggle_camera().await;

    assert_eq!(changes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_capture_failure_reverts_camera() {
    let f = fixture(SimulatedPlatform::with_default_devices()).await;
    assert_eq!(f.controller.toggle_camera().await, ToggleOutcome::TurnedOn);
    let (changes, _sub) = count_events(&f.bus, MediaEvent::StateChanged);

    f.bus.publish(MediaEvent::CaptureFailed);

    assert!(f.controller.desired().camera_off);
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    // Already off: nothing more to announce
    f.bus.publish(MediaEvent::CaptureFailed);
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_start_muted_option() {
    let platform: Arc<dyn MediaPlatform> = Arc::new(SimulatedPlatform::with_default_devices());
    let (notifier, _notices) = Notifier::channel();
    let capability = probe(platform.as_ref(), &notifier).await;
    let controller = MediaSessionController::new(
        platform,
        capability,
        EventBus::new(),
        notifier,
        ControllerOptions {
            start_muted: true,
            ..Default::default()
        },
    );

    assert!(controller.desired().muted);
    assert!(controller.desired().camera_off);
}
