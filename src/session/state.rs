// SPDX-License-Identifier: GPL-3.0-only

//! Session state shared between the controller and presenters

use crate::backends::types::{FrameReceiver, MediaStream, TrackObserver, TrackState};
use crate::errors::MediaError;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

/// What the user asked for, as opposed to what the devices are doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredMediaState {
    pub muted: bool,
    pub camera_off: bool,
}

impl Default for DesiredMediaState {
    /// Camera starts off; it only turns on through a verified toggle
    fn default() -> Self {
        Self {
            muted: false,
            camera_off: true,
        }
    }
}

/// Result of probing the devices once at mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCapability {
    pub has_camera: bool,
    pub has_microphone: bool,
    /// No media API exists at all; the camera control is disabled for good
    pub unsupported: bool,
}

impl DeviceCapability {
    /// Capability of a system without any media API
    pub fn unsupported() -> Self {
        Self {
            has_camera: false,
            has_microphone: false,
            unsupported: true,
        }
    }

    /// Whether the camera button may be pressed at all
    pub fn camera_control_enabled(&self) -> bool {
        self.has_camera && !self.unsupported
    }
}

/// Everything the controller publishes for others to re-read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SharedState {
    pub desired: DesiredMediaState,
    /// Why the camera was last forced off; cleared by success or an
    /// explicit turn-off
    pub last_failure: Option<MediaError>,
}

/// Read-only handle on the controller's authoritative state
#[derive(Debug, Clone)]
pub struct StateHandle(watch::Receiver<SharedState>);

impl StateHandle {
    pub(crate) fn new(receiver: watch::Receiver<SharedState>) -> Self {
        Self(receiver)
    }

    pub fn desired(&self) -> DesiredMediaState {
        self.0.borrow().desired
    }

    /// Copy of everything published, read under one borrow
    pub fn snapshot(&self) -> SharedState {
        self.0.borrow().clone()
    }
}

/// Where one camera toggle stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleStatus {
    /// Settled; `camera_on` is the resulting desired state
    Idle { camera_on: bool },
    /// Waiting on the platform
    Requesting,
}

/// Live tracks held by exactly one presenter
///
/// Dropping the session stops every track, so an owner cannot leak a
/// device handle by forgetting to release.
#[derive(Debug)]
pub struct CaptureSession {
    id: Uuid,
    stream: MediaStream,
    acquired_at: Instant,
}

impl CaptureSession {
    pub fn new(stream: MediaStream) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            stream,
            acquired_at: Instant::now(),
        };
        info!(
            session = %session.id,
            stream = %session.stream.id(),
            tracks = session.stream.tracks().len(),
            "Capture session started"
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    /// Still holding at least one live video track
    pub fn is_live(&self) -> bool {
        self.stream.has_live_video()
    }

    pub fn frames(&self) -> Option<FrameReceiver> {
        self.stream.frames()
    }

    /// Flips to ended when the platform stops the video track
    pub fn video_state(&self) -> Option<watch::Receiver<TrackState>> {
        self.stream.video_state()
    }

    pub fn observers(&self) -> Vec<TrackObserver> {
        self.stream.tracks().iter().map(|t| t.observer()).collect()
    }

    /// Stop all tracks and end the session
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stream.stop_all();
        debug!(
            session = %self.id,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Capture session released"
        );
    }
}
