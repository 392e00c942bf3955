// SPDX-License-Identifier: GPL-3.0-only
// Shared types for media platform abstraction

//! Shared types for media platforms

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// Kind tag reported by device enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::VideoInput => write!(f, "videoinput"),
            DeviceKind::AudioInput => write!(f, "audioinput"),
        }
    }
}

/// Which way a camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FacingMode {
    /// Front-facing (selfie) camera
    #[default]
    User,
    /// Rear camera
    Environment,
}

impl FacingMode {
    /// Parse libcamera's `api.libcamera.location` property
    pub fn from_location(location: &str) -> Option<Self> {
        match location {
            "front" => Some(FacingMode::User),
            "back" => Some(FacingMode::Environment),
            _ => None,
        }
    }
}

/// One input device as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    /// Platform-specific identifier passed back in constraints
    pub id: String,
    /// Human readable name (may be empty before permission is granted)
    pub label: String,
    pub kind: DeviceKind,
    /// Mount direction, if the platform knows it
    pub facing: Option<FacingMode>,
}

/// Video part of an acquisition request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub ideal_framerate: Option<u32>,
    pub facing_mode: FacingMode,
    /// Pin a specific device instead of choosing by facing mode
    pub device_id: Option<String>,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        use crate::constants::video;
        Self {
            ideal_width: video::IDEAL_WIDTH,
            ideal_height: video::IDEAL_HEIGHT,
            ideal_framerate: Some(video::IDEAL_FRAMERATE),
            facing_mode: FacingMode::User,
            device_id: None,
        }
    }
}

impl VideoConstraints {
    /// Clamp the requested size to the supported maximum
    pub fn bounded(mut self) -> Self {
        use crate::constants::video;
        self.ideal_width = self.ideal_width.clamp(1, video::MAX_WIDTH);
        self.ideal_height = self.ideal_height.clamp(1, video::MAX_HEIGHT);
        self
    }
}

impl std::fmt::Display for VideoConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.ideal_width, self.ideal_height)?;
        if let Some(fps) = self.ideal_framerate {
            write!(f, "@{}fps", fps)?;
        }
        write!(f, " ({:?})", self.facing_mode)
    }
}

/// Full acquisition request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: bool,
}

impl MediaConstraints {
    /// Video-only request, used for trial acquisitions
    pub fn video_only(video: VideoConstraints) -> Self {
        Self {
            video: Some(video),
            audio: false,
        }
    }
}

/// Track media type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Track lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// Permission state as observed from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Prompt,
    Granted,
    Denied,
}

/// Decoded RGB24 frame delivered by a live video track
#[derive(Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    pub data: Arc<[u8]>,
}

impl VideoFrame {
    /// RGB triple at (x, y), black when out of range
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = (y * self.stride + x * 3) as usize;
        if idx + 2 < self.data.len() {
            (self.data[idx], self.data[idx + 1], self.data[idx + 2])
        } else {
            (0, 0, 0)
        }
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VideoFrame({}x{}, {} bytes)",
            self.width,
            self.height,
            self.data.len()
        )
    }
}

/// Latest frame of a video track
pub type FrameReceiver = watch::Receiver<Option<Arc<VideoFrame>>>;

/// Platform hook that releases the device behind a track
pub trait TrackHandle: Send + Sync {
    fn stop(&self);
}

/// View on a track's liveness, kept after the track itself is gone
#[derive(Debug, Clone)]
pub struct TrackObserver {
    id: Uuid,
    kind: TrackKind,
    state: Arc<watch::Sender<TrackState>>,
}

impl TrackObserver {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        *self.state.borrow() == TrackState::Live
    }

    /// Receiver that flips to [`TrackState::Ended`] when the track ends
    pub fn watch(&self) -> watch::Receiver<TrackState> {
        self.state.subscribe()
    }

    /// Platform side: the device stopped delivering (unplugged, revoked,
    /// pipeline error)
    ///
    /// Only marks the track ended; the owner still releases the device
    /// with [`MediaTrack::stop`].
    pub fn end(&self) {
        if self.state.send_replace(TrackState::Ended) == TrackState::Live {
            debug!(track = %self.id, kind = ?self.kind, "Track ended by the platform");
        }
    }
}

/// One live audio or video track
///
/// Stopping is idempotent, and a track that is dropped while live is
/// stopped so no device handle outlives its owner.
pub struct MediaTrack {
    id: Uuid,
    kind: TrackKind,
    label: String,
    state: Arc<watch::Sender<TrackState>>,
    released: AtomicBool,
    handle: Option<Box<dyn TrackHandle>>,
    frames: Option<FrameReceiver>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        let (state, _) = watch::channel(TrackState::Live);
        Self {
            id: Uuid::new_v4(),
            kind,
            label: label.into(),
            state: Arc::new(state),
            released: AtomicBool::new(false),
            handle: None,
            frames: None,
        }
    }

    /// Attach the platform resource released by [`MediaTrack::stop`]
    pub fn with_handle(mut self, handle: impl TrackHandle + 'static) -> Self {
        self.handle = Some(Box::new(handle));
        self
    }

    /// Attach a frame feed (video tracks only)
    pub fn with_frames(mut self, frames: FrameReceiver) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> TrackState {
        *self.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    pub fn frames(&self) -> Option<FrameReceiver> {
        self.frames.clone()
    }

    pub fn observer(&self) -> TrackObserver {
        TrackObserver {
            id: self.id,
            kind: self.kind,
            state: Arc::clone(&self.state),
        }
    }

    /// Stop the track and release its device
    ///
    /// A track the platform already ended still has its device released.
    pub fn stop(&self) {
        let was = self.state.send_replace(TrackState::Ended);
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = &self.handle {
            handle.stop();
        }
        debug!(
            track = %self.id,
            kind = ?self.kind,
            label = %self.label,
            was = ?was,
            "Track stopped"
        );
    }
}

impl Drop for MediaTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Set of tracks returned by one acquisition call
#[derive(Debug)]
pub struct MediaStream {
    id: Uuid,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// At least one video track is still live
    pub fn has_live_video(&self) -> bool {
        self.video_tracks().any(MediaTrack::is_live)
    }

    /// Frame feed of the first live video track
    pub fn frames(&self) -> Option<FrameReceiver> {
        self.video_tracks()
            .filter(|t| t.is_live())
            .find_map(MediaTrack::frames)
    }

    /// Lifecycle of the video track frames come from; ends when capture
    /// is lost
    pub fn video_state(&self) -> Option<watch::Receiver<TrackState>> {
        self.video_tracks()
            .find(|t| t.is_live())
            .or_else(|| self.video_tracks().next())
            .map(|t| t.observer().watch())
    }

    /// Label of the first video track, for tile captions
    pub fn video_label(&self) -> Option<&str> {
        self.video_tracks().next().map(MediaTrack::label)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandle(Arc<AtomicUsize>);

    impl TrackHandle for CountingHandle {
        fn stop(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn stop_releases_handle_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let track = MediaTrack::new(TrackKind::Video, "cam")
            .with_handle(CountingHandle(Arc::clone(&stops)));
        let observer = track.observer();

        track.stop();
        track.stop();
        drop(track);

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(!observer.is_live());
    }

    #[test]
    fn platform_end_is_seen_and_device_still_released() {
        let stops = Arc::new(AtomicUsize::new(0));
        let track = MediaTrack::new(TrackKind::Video, "cam")
            .with_handle(CountingHandle(Arc::clone(&stops)));
        let observer = track.observer();
        let state = observer.watch();

        observer.end();

        assert_eq!(*state.borrow(), TrackState::Ended);
        assert!(!track.is_live());
        assert_eq!(stops.load(Ordering::SeqCst), 0);

        track.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_a_live_track_stops_it() {
        let track = MediaTrack::new(TrackKind::Audio, "mic");
        let observer = track.observer();
        drop(track);
        assert!(!observer.is_live());
    }

    #[test]
    fn stream_without_video_has_no_live_video() {
        let stream = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "mic")]);
        assert!(!stream.has_live_video());
        assert!(stream.frames().is_none());
    }

    #[test]
    fn constraints_are_clamped() {
        let c = VideoConstraints {
            ideal_width: 8000,
            ideal_height: 0,
            ..Default::default()
        }
        .bounded();
        assert_eq!(c.ideal_width, crate::constants::video::MAX_WIDTH);
        assert_eq!(c.ideal_height, 1);
    }
}
