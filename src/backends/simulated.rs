// SPDX-License-Identifier: GPL-3.0-only

//! Simulated media platform
//!
//! An in-process stand-in for real capture devices. Device lists and the
//! outcome of each acquisition are scripted, and every track it hands out
//! stays observable afterwards, so callers can check that nothing was left
//! running. Used by `--simulate` and by the test suite.

use super::MediaPlatform;
use super::types::*;
use crate::errors::{MediaError, MediaResult};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, info};

/// Width of the generated test pattern
const PATTERN_WIDTH: u32 = 64;
/// Height of the generated test pattern
const PATTERN_HEIGHT: u32 = 36;

/// What the next acquisition does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireBehavior {
    /// Grant access and return the requested tracks
    Grant,
    /// Grant access but return no video track
    GrantWithoutVideo,
    /// Refuse access
    Deny,
    /// The device cannot be opened
    Unavailable,
    /// Arbitrary platform error
    Fail(String),
}

struct SimState {
    devices: Vec<MediaDeviceInfo>,
    enumeration_error: Option<String>,
    script: VecDeque<AcquireBehavior>,
    fallback: AcquireBehavior,
    issued: Vec<TrackObserver>,
    acquire_calls: usize,
    enumerate_calls: usize,
    last_constraints: Option<MediaConstraints>,
    gate: Option<Arc<Semaphore>>,
}

/// Holds acquisitions until released, to observe in-flight states
#[derive(Clone)]
pub struct AcquisitionGate {
    semaphore: Arc<Semaphore>,
}

impl AcquisitionGate {
    /// Let exactly one pending (or future) acquisition proceed
    pub fn release_one(&self) {
        self.semaphore.add_permits(1);
    }
}

/// Scriptable fake platform
pub struct SimulatedPlatform {
    supported: bool,
    latency: Duration,
    state: Mutex<SimState>,
    permission: watch::Sender<PermissionState>,
}

impl SimulatedPlatform {
    /// Supported platform with no devices
    pub fn new() -> Self {
        let (permission, _) = watch::channel(PermissionState::Prompt);
        Self {
            supported: true,
            latency: Duration::ZERO,
            state: Mutex::new(SimState {
                devices: Vec::new(),
                enumeration_error: None,
                script: VecDeque::new(),
                fallback: AcquireBehavior::Grant,
                issued: Vec::new(),
                acquire_calls: 0,
                enumerate_calls: 0,
                last_constraints: None,
                gate: None,
            }),
            permission,
        }
    }

    /// One front camera and one microphone
    pub fn with_default_devices() -> Self {
        Self::new().with_devices(vec![
            MediaDeviceInfo {
                id: "sim-camera-0".to_string(),
                label: "Simulated Camera".to_string(),
                kind: DeviceKind::VideoInput,
                facing: Some(FacingMode::User),
            },
            MediaDeviceInfo {
                id: "sim-mic-0".to_string(),
                label: "Simulated Microphone".to_string(),
                kind: DeviceKind::AudioInput,
                facing: None,
            },
        ])
    }

    /// A system without any media API
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn with_devices(self, devices: Vec<MediaDeviceInfo>) -> Self {
        self.lock().devices = devices;
        self
    }

    /// Make every enumeration fail with `message`
    pub fn with_enumeration_failure(self, message: impl Into<String>) -> Self {
        self.lock().enumeration_error = Some(message.into());
        self
    }

    /// Delay every acquisition by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Behavior used once the script is exhausted
    pub fn with_fallback(self, behavior: AcquireBehavior) -> Self {
        self.lock().fallback = behavior;
        self
    }

    /// Queue the behavior of the next unscripted acquisition
    pub fn push_behavior(&self, behavior: AcquireBehavior) {
        self.lock().script.push_back(behavior);
    }

    /// Block acquisitions until the returned gate releases them
    pub fn gate_acquisitions(&self) -> AcquisitionGate {
        let semaphore = Arc::new(Semaphore::new(0));
        self.lock().gate = Some(Arc::clone(&semaphore));
        AcquisitionGate { semaphore }
    }

    /// Drive the permission observer from outside
    pub fn set_permission(&self, state: PermissionState) {
        self.permission.send_replace(state);
    }

    pub fn acquire_calls(&self) -> usize {
        self.lock().acquire_calls
    }

    pub fn enumerate_calls(&self) -> usize {
        self.lock().enumerate_calls
    }

    pub fn last_constraints(&self) -> Option<MediaConstraints> {
        self.lock().last_constraints.clone()
    }

    /// Every track ever handed out
    pub fn issued_tracks(&self) -> Vec<TrackObserver> {
        self.lock().issued.clone()
    }

    /// Tracks handed out and not yet stopped
    pub fn live_tracks(&self) -> usize {
        self.lock().issued.iter().filter(|t| t.is_live()).count()
    }

    /// Live video tracks, i.e. open camera handles
    pub fn live_video_tracks(&self) -> usize {
        self.lock()
            .issued
            .iter()
            .filter(|t| t.kind() == TrackKind::Video && t.is_live())
            .count()
    }

    /// The camera goes away under every live video track, as when it is
    /// unplugged; returns how many tracks ended
    pub fn disconnect_camera(&self) -> usize {
        let ended: Vec<_> = self
            .lock()
            .issued
            .iter()
            .filter(|t| t.kind() == TrackKind::Video && t.is_live())
            .cloned()
            .collect();
        for track in &ended {
            track.end();
        }
        info!(tracks = ended.len(), "Simulated camera disconnected");
        ended.len()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_device(&self, kind: DeviceKind, video: Option<&VideoConstraints>) -> Option<MediaDeviceInfo> {
        let state = self.lock();
        let mut candidates = state.devices.iter().filter(|d| d.kind == kind);
        match video {
            Some(c) if c.device_id.is_some() => {
                candidates.find(|d| Some(&d.id) == c.device_id.as_ref()).cloned()
            }
            Some(c) => {
                let all: Vec<_> = candidates.collect();
                all.iter()
                    .find(|d| d.facing == Some(c.facing_mode))
                    .or_else(|| all.first())
                    .map(|d| (*d).clone())
            }
            None => candidates.next().cloned(),
        }
    }

    fn open(&self, constraints: &MediaConstraints, behavior: AcquireBehavior) -> MediaResult<MediaStream> {
        match &behavior {
            AcquireBehavior::Deny => {
                self.permission.send_replace(PermissionState::Denied);
                return Err(MediaError::PermissionDenied(
                    "user dismissed the permission prompt".to_string(),
                ));
            }
            AcquireBehavior::Unavailable => {
                return Err(MediaError::DeviceUnavailable(
                    "device is busy".to_string(),
                ));
            }
            AcquireBehavior::Fail(msg) => return Err(MediaError::AcquisitionFailed(msg.clone())),
            AcquireBehavior::Grant | AcquireBehavior::GrantWithoutVideo => {}
        }

        self.permission.send_replace(PermissionState::Granted);

        let mut tracks = Vec::new();
        if let Some(video) = constraints.video.as_ref()
            && behavior == AcquireBehavior::Grant
        {
            let device = self
                .find_device(DeviceKind::VideoInput, Some(video))
                .ok_or_else(|| MediaError::DeviceUnavailable("no camera attached".to_string()))?;
            let (_, frames) = watch::channel(Some(Arc::new(test_pattern())));
            tracks.push(MediaTrack::new(TrackKind::Video, device.label).with_frames(frames));
        }
        if constraints.audio
            && let Some(mic) = self.find_device(DeviceKind::AudioInput, None)
        {
            tracks.push(MediaTrack::new(TrackKind::Audio, mic.label));
        }

        let stream = MediaStream::new(tracks);
        self.lock()
            .issued
            .extend(stream.tracks().iter().map(MediaTrack::observer));
        Ok(stream)
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPlatform for SimulatedPlatform {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn enumerate_devices(&self) -> BoxFuture<'_, MediaResult<Vec<MediaDeviceInfo>>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.enumerate_calls += 1;
            if !self.supported {
                return Err(MediaError::UnsupportedPlatform);
            }
            if let Some(msg) = state.enumeration_error.as_ref() {
                return Err(MediaError::EnumerationFailure(msg.clone()));
            }
            Ok(state.devices.clone())
        })
    }

    fn acquire(&self, constraints: MediaConstraints) -> BoxFuture<'_, MediaResult<MediaStream>> {
        Box::pin(async move {
            if !self.supported {
                return Err(MediaError::UnsupportedPlatform);
            }

            let gate = {
                let mut state = self.lock();
                state.acquire_calls += 1;
                state.last_constraints = Some(constraints.clone());
                state.gate.clone()
            };
            debug!(?constraints, "Simulated acquisition requested");

            if let Some(gate) = gate
                && let Ok(permit) = gate.acquire().await
            {
                permit.forget();
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let behavior = {
                let mut state = self.lock();
                let fallback = state.fallback.clone();
                state.script.pop_front().unwrap_or(fallback)
            };
            info!(?behavior, "Simulated acquisition resolved");
            self.open(&constraints, behavior)
        })
    }

    fn permission_events(&self) -> Option<watch::Receiver<PermissionState>> {
        Some(self.permission.subscribe())
    }
}

/// Vertical color bars, enough to tell a live tile from an empty one
fn test_pattern() -> VideoFrame {
    const BARS: [(u8, u8, u8); 7] = [
        (192, 192, 192),
        (192, 192, 0),
        (0, 192, 192),
        (0, 192, 0),
        (192, 0, 192),
        (192, 0, 0),
        (0, 0, 192),
    ];
    let stride = PATTERN_WIDTH * 3;
    let mut data = Vec::with_capacity((stride * PATTERN_HEIGHT) as usize);
    for _ in 0..PATTERN_HEIGHT {
        for x in 0..PATTERN_WIDTH {
            let (r, g, b) = BARS[(x as usize * BARS.len()) / PATTERN_WIDTH as usize];
            data.extend_from_slice(&[r, g, b]);
        }
    }
    VideoFrame {
        width: PATTERN_WIDTH,
        height: PATTERN_HEIGHT,
        stride,
        data: Arc::from(data),
    }
}
