// SPDX-License-Identifier: GPL-3.0-only

//! Media session controller
//!
//! Owns the desired mute/camera state and is the only place it changes.
//! Turning the camera on goes through a trial acquisition that must show a
//! live video track; the trial stream is released right after the check,
//! since presenters are the only long-lived device owners.
//!
//! Per camera toggle:
//!
//! ```text
//! Idle ──► Requesting ──► Granted  ──► Idle(on)
//!                    ├──► Denied   ──► Idle(off)
//!                    └──► NoTracks ──► Idle(off)
//! ```
//!
//! `Requesting` always resolves: the in-flight flag lives in a guard whose
//! drop clears it and publishes [`MediaEvent::StateChanged`], whatever path
//! (or cancellation) ends the toggle.
//!
//! A press that arrives while a toggle is in flight is rejected with a busy
//! notice, but its intent is queued. Before the guard lets go, the running
//! toggle applies the latest queued intent, so the camera ends where the
//! last press pointed.

use super::bus::{EventBus, MediaEvent, Subscription};
use super::notice::{NoticeKind, Notifier};
use super::state::{DesiredMediaState, DeviceCapability, SharedState, StateHandle, ToggleStatus};
use crate::backends::MediaPlatform;
use crate::backends::types::{MediaConstraints, VideoConstraints};
use crate::errors::{MediaError, MediaResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Construction options
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    /// Constraints used for the trial acquisition
    pub constraints: VideoConstraints,
    pub start_muted: bool,
}

/// Why a toggle did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No media API on this system
    Unsupported,
    /// Probing found no camera
    NoCamera,
    /// Another camera toggle has not resolved yet
    InFlight,
}

/// Result of one `toggle_camera` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    TurnedOn,
    TurnedOff,
    /// Acquisition failed and the camera was forced off
    Failed(MediaError),
    /// No-op; a notice explains why
    Rejected(RejectReason),
}

/// View model for the controls bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlsState {
    pub muted: bool,
    pub camera_off: bool,
    /// A camera toggle is in flight
    pub loading: bool,
    /// The camera button accepts presses
    pub camera_enabled: bool,
}

struct Shared {
    state: watch::Sender<SharedState>,
    bus: EventBus,
    notifier: Notifier,
    toggle: Mutex<ToggleSlot>,
}

/// In-flight bookkeeping for camera toggles
#[derive(Debug, Default)]
struct ToggleSlot {
    in_flight: bool,
    /// `camera_off` the running toggle is heading for
    target: bool,
    /// `camera_off` asked for by presses made while in flight
    queued: Option<bool>,
}

impl Shared {
    fn desired(&self) -> DesiredMediaState {
        self.state.borrow().desired
    }

    fn slot(&self) -> MutexGuard<'_, ToggleSlot> {
        self.toggle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The local tile could not hold a capture while the camera was on
    fn on_capture_failed(&self) {
        let mut reverted = false;
        self.state.send_modify(|s| {
            if !s.desired.camera_off {
                s.desired.camera_off = true;
                reverted = true;
            }
        });

        if reverted {
            warn!("Local capture failed, reverting camera to off");
            self.bus.publish(MediaEvent::StateChanged);
        }
    }
}

/// Clears the in-flight flag and announces the new state on every exit
struct InFlightGuard<'a> {
    shared: &'a Shared,
    released: bool,
}

impl<'a> InFlightGuard<'a> {
    /// Take the slot for a toggle heading to `target`, or queue the press
    /// as the opposite of whatever the slot is heading for
    fn try_acquire(shared: &'a Shared, target: bool) -> Option<Self> {
        let mut slot = shared.slot();
        if slot.in_flight {
            let heading = slot.queued.unwrap_or(slot.target);
            slot.queued = Some(!heading);
            debug!(camera_off = !heading, "Toggle queued behind the one in flight");
            return None;
        }
        *slot = ToggleSlot {
            in_flight: true,
            target,
            queued: None,
        };
        Some(Self {
            shared,
            released: false,
        })
    }

    /// Next queued intent, or release the slot when none is left
    ///
    /// Checking the queue and releasing happen under one lock, so a press
    /// is either picked up here or finds the slot free.
    fn next_queued(&mut self) -> Option<bool> {
        let mut slot = self.shared.slot();
        match slot.queued.take() {
            Some(target) => {
                slot.target = target;
                Some(target)
            }
            None => {
                slot.in_flight = false;
                self.released = true;
                None
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            *self.shared.slot() = ToggleSlot::default();
        }
        self.shared.bus.publish(MediaEvent::StateChanged);
    }
}

/// Authoritative owner of the desired media state
pub struct MediaSessionController {
    shared: Arc<Shared>,
    platform: Arc<dyn MediaPlatform>,
    capability: DeviceCapability,
    constraints: VideoConstraints,
    _capture_failed: Subscription,
}

impl MediaSessionController {
    pub fn new(
        platform: Arc<dyn MediaPlatform>,
        capability: DeviceCapability,
        bus: EventBus,
        notifier: Notifier,
        options: ControllerOptions,
    ) -> Self {
        let (state, _) = watch::channel(SharedState {
            desired: DesiredMediaState {
                muted: options.start_muted,
                camera_off: true,
            },
            last_failure: None,
        });

        let shared = Arc::new(Shared {
            state,
            bus: bus.clone(),
            notifier,
            toggle: Mutex::new(ToggleSlot::default()),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let capture_failed = bus.subscribe(MediaEvent::CaptureFailed, move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_capture_failed();
            }
        });

        info!(
            platform = platform.name(),
            has_camera = capability.has_camera,
            constraints = %options.constraints,
            "Media session controller created"
        );

        Self {
            shared,
            platform,
            capability,
            constraints: options.constraints.bounded(),
            _capture_failed: capture_failed,
        }
    }

    pub fn desired(&self) -> DesiredMediaState {
        self.shared.desired()
    }

    /// Read-only handle for presenters
    pub fn state_handle(&self) -> StateHandle {
        StateHandle::new(self.shared.state.subscribe())
    }

    pub fn capability(&self) -> DeviceCapability {
        self.capability
    }

    pub fn last_failure(&self) -> Option<MediaError> {
        self.shared.state.borrow().last_failure.clone()
    }

    /// A camera toggle is waiting on the platform
    pub fn is_loading(&self) -> bool {
        self.shared.slot().in_flight
    }

    pub fn status(&self) -> ToggleStatus {
        if self.is_loading() {
            ToggleStatus::Requesting
        } else {
            ToggleStatus::Idle {
                camera_on: !self.desired().camera_off,
            }
        }
    }

    pub fn controls(&self) -> ControlsState {
        let desired = self.desired();
        let loading = self.is_loading();
        ControlsState {
            muted: desired.muted,
            camera_off: desired.camera_off,
            loading,
            camera_enabled: self.capability.camera_control_enabled() && !loading,
        }
    }

    /// Flip the outgoing-microphone flag; never touches a device
    pub fn toggle_mute(&self) -> bool {
        self.shared
            .state
            .send_modify(|s| s.desired.muted = !s.desired.muted);
        let muted = self.desired().muted;

        if muted {
            self.shared
                .notifier
                .notify(NoticeKind::MicrophoneMuted, "Microphone muted");
        } else {
            self.shared
                .notifier
                .notify(NoticeKind::MicrophoneEnabled, "Microphone enabled");
        }
        self.shared.bus.publish(MediaEvent::StateChanged);
        muted
    }

    /// Flip the camera, verifying access before reporting it on
    pub async fn toggle_camera(&self) -> ToggleOutcome {
        if self.capability.unsupported {
            self.shared.notifier.notify(
                NoticeKind::Unsupported,
                MediaError::UnsupportedPlatform.user_message(),
            );
            return ToggleOutcome::Rejected(RejectReason::Unsupported);
        }
        if !self.capability.has_camera {
            self.shared
                .notifier
                .notify(NoticeKind::CameraDisabled, "No camera available");
            return ToggleOutcome::Rejected(RejectReason::NoCamera);
        }
        let target = !self.desired().camera_off;
        let Some(mut guard) = InFlightGuard::try_acquire(&self.shared, target) else {
            self.shared.notifier.notify(
                NoticeKind::ToggleBusy,
                "Camera is still starting, please wait",
            );
            return ToggleOutcome::Rejected(RejectReason::InFlight);
        };

        let outcome = self.apply(target).await;

        while let Some(camera_off) = guard.next_queued() {
            if camera_off == self.desired().camera_off {
                debug!(camera_off, "Queued toggle already satisfied");
                continue;
            }
            info!(camera_off, "Applying toggle pressed while the last one was in flight");
            self.apply(camera_off).await;
        }

        outcome
    }

    /// Move the camera to `camera_off`; the caller holds the in-flight slot
    async fn apply(&self, camera_off: bool) -> ToggleOutcome {
        if camera_off {
            self.shared.state.send_modify(|s| {
                s.desired.camera_off = true;
                s.last_failure = None;
            });
            info!("Camera turned off");
            self.shared
                .notifier
                .notify(NoticeKind::CameraOff, "Camera turned off");
            return ToggleOutcome::TurnedOff;
        }

        info!(constraints = %self.constraints, "Requesting camera access");
        match self.trial_acquisition().await {
            Ok(()) => {
                self.shared.state.send_modify(|s| {
                    s.desired.camera_off = false;
                    s.last_failure = None;
                });
                info!("Camera turned on");
                self.shared
                    .notifier
                    .notify(NoticeKind::CameraOn, "Camera turned on");
                ToggleOutcome::TurnedOn
            }
            Err(e) => {
                warn!(error = %e, outcome = %e.outcome(), "Camera acquisition failed");
                self.shared.state.send_modify(|s| {
                    s.desired.camera_off = true;
                    s.last_failure = Some(e.clone());
                });
                self.shared
                    .notifier
                    .notify(NoticeKind::from(&e), e.user_message());
                ToggleOutcome::Failed(e)
            }
        }
    }

    /// Acquire, check for a live video track, release
    async fn trial_acquisition(&self) -> MediaResult<()> {
        let stream = self
            .platform
            .acquire(MediaConstraints::video_only(self.constraints.clone()))
            .await?;

        let verified = stream.has_live_video();
        stream.stop_all();
        debug!(verified, tracks = stream.tracks().len(), "Trial stream released");

        if verified {
            Ok(())
        } else {
            Err(MediaError::NoUsableTracks)
        }
    }
}

impl std::fmt::Debug for MediaSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSessionController")
            .field("platform", &self.platform.name())
            .field("capability", &self.capability)
            .field("desired", &self.desired())
            .field("loading", &self.is_loading())
            .finish()
    }
}
