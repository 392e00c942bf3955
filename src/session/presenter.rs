// SPDX-License-Identifier: GPL-3.0-only

//! Stream presenter
//!
//! One presenter per meeting tile. The local tile owns the long-lived
//! capture session and keeps it in line with the controller's desired
//! state; remote tiles never touch a device and only render badges.
//!
//! All work for one tile runs on a single task, so release and acquire for
//! that tile never interleave. The task also watches the held video track:
//! when the platform ends it, the tile drops the session, shows why, and
//! reports [`MediaEvent::CaptureFailed`] so the controller turns the camera
//! off.

use super::bus::{EventBus, MediaEvent, Subscription};
use super::notice::{NoticeKind, Notifier};
use super::state::{CaptureSession, DeviceCapability, StateHandle};
use crate::backends::MediaPlatform;
use crate::backends::types::{FrameReceiver, MediaConstraints, TrackState, VideoConstraints};
use crate::errors::{MediaError, PermissionOutcome};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Badges of a remote participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemotePlaceholder {
    pub muted: bool,
    pub camera_off: bool,
}

/// Where a tile's content comes from
#[derive(Debug, Clone)]
pub enum TileSource {
    /// This device; follows the controller's state
    Local(StateHandle),
    Remote(RemotePlaceholder),
}

impl TileSource {
    pub fn is_local(&self) -> bool {
        matches!(self, TileSource::Local(_))
    }
}

/// Per-tile inputs that may change while mounted
#[derive(Debug, Clone)]
pub struct TileProps {
    pub label: String,
    pub source: TileSource,
}

/// Dependencies shared by every presenter of one view
#[derive(Clone)]
pub struct PresenterContext {
    pub platform: Arc<dyn MediaPlatform>,
    pub capability: DeviceCapability,
    pub constraints: VideoConstraints,
    /// Also open the microphone with the camera
    pub capture_audio: bool,
    pub bus: EventBus,
    pub notifier: Notifier,
}

/// What a tile currently shows
#[derive(Debug, Clone)]
pub enum Surface {
    /// Live local capture
    Live {
        label: String,
        frames: Option<FrameReceiver>,
    },
    /// Acquisition in progress
    Connecting,
    CameraOff,
    /// Capture failed; the reason stays until the camera comes back
    Error {
        error: MediaError,
        message: String,
        retryable: bool,
    },
    /// Remote participant with video
    Placeholder,
}

impl Surface {
    fn error(error: MediaError) -> Self {
        Surface::Error {
            message: error.user_message(),
            retryable: error.is_retryable(),
            error,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Surface::Live { .. })
    }
}

/// Render model of one tile
#[derive(Debug, Clone)]
pub struct TileView {
    pub label: String,
    pub is_local: bool,
    /// Mute badge
    pub muted: bool,
    /// Whether the tile's own playback is silenced; always true locally
    pub playback_muted: bool,
    pub surface: Surface,
    /// Outcome of the last acquisition on this tile
    pub outcome: Option<PermissionOutcome>,
}

impl TileView {
    fn initial(props: &TileProps) -> Self {
        let (muted, surface) = match &props.source {
            TileSource::Local(state) => (state.desired().muted, Surface::CameraOff),
            TileSource::Remote(p) if p.camera_off => (p.muted, Surface::CameraOff),
            TileSource::Remote(p) => (p.muted, Surface::Placeholder),
        };
        Self {
            label: props.label.clone(),
            is_local: props.source.is_local(),
            muted,
            playback_muted: props.source.is_local(),
            surface,
            outcome: None,
        }
    }
}

/// Tile state machine; driven by [`PresenterHandle`]
pub struct StreamPresenter {
    props: TileProps,
    ctx: PresenterContext,
    session: Option<CaptureSession>,
    /// Failure of this tile's own last acquisition
    failure: Option<MediaError>,
    outcome: Option<PermissionOutcome>,
    view: watch::Sender<TileView>,
}

impl StreamPresenter {
    pub fn new(props: TileProps, ctx: PresenterContext) -> Self {
        let (view, _) = watch::channel(TileView::initial(&props));
        Self {
            props,
            ctx,
            session: None,
            failure: None,
            outcome: None,
            view,
        }
    }

    pub fn view(&self) -> watch::Receiver<TileView> {
        self.view.subscribe()
    }

    /// Currently holding a live capture
    pub fn has_session(&self) -> bool {
        self.session.as_ref().is_some_and(CaptureSession::is_live)
    }

    pub fn set_props(&mut self, props: TileProps) {
        debug!(label = %props.label, "Tile props updated");
        self.props = props;
    }

    fn wants_camera(&self) -> bool {
        match &self.props.source {
            TileSource::Local(state) => {
                !state.desired().camera_off && self.ctx.capability.camera_control_enabled()
            }
            TileSource::Remote(_) => false,
        }
    }

    /// Bring the tile in line with the current state
    ///
    /// Idempotent: a live session that is still wanted is kept unless
    /// `force` asks for a fresh acquisition.
    pub async fn reconcile(&mut self, force: bool) {
        if self.session.as_ref().is_some_and(|s| !s.is_live()) {
            self.capture_lost();
        }
        let wants = self.wants_camera();

        if wants && !force && self.has_session() {
            self.publish();
            return;
        }

        self.release();

        if !wants {
            self.publish();
            return;
        }

        self.publish_surface(Surface::Connecting);
        let audio = self.ctx.capture_audio && self.ctx.capability.has_microphone;
        let constraints = MediaConstraints {
            video: Some(self.ctx.constraints.clone().bounded()),
            audio,
        };
        info!(tile = %self.props.label, audio, "Acquiring local capture");
        let result = self.ctx.platform.acquire(constraints).await;

        // State may have moved while waiting on the platform
        let still_wanted = self.wants_camera();

        let error = match result {
            Ok(stream) if !still_wanted => {
                debug!("Camera no longer wanted, dropping fresh stream");
                stream.stop_all();
                self.publish();
                return;
            }
            Ok(stream) if !stream.has_live_video() => {
                stream.stop_all();
                MediaError::NoUsableTracks
            }
            Ok(stream) => {
                self.session = Some(CaptureSession::new(stream));
                self.failure = None;
                self.outcome = Some(PermissionOutcome::Granted);
                self.publish();
                return;
            }
            Err(e) if !still_wanted => {
                debug!(error = %e, "Camera no longer wanted, ignoring failed acquisition");
                self.publish();
                return;
            }
            Err(e) => e,
        };

        warn!(tile = %self.props.label, error = %error, "Local capture failed");
        self.outcome = Some(error.outcome());
        self.ctx
            .notifier
            .notify(NoticeKind::from(&error), error.user_message());
        self.failure = Some(error);
        self.publish();
        self.ctx.bus.publish(MediaEvent::CaptureFailed);
    }

    /// Lifecycle of the held video track, if any
    fn video_state(&self) -> Option<watch::Receiver<TrackState>> {
        self.session.as_ref().and_then(CaptureSession::video_state)
    }

    /// The platform ended the held capture; drop it and report the loss
    ///
    /// No-op unless a session is held that is no longer live.
    pub fn capture_lost(&mut self) {
        let Some(session) = self.session.take_if(|s| !s.is_live()) else {
            return;
        };
        let error = MediaError::DeviceUnavailable("camera stopped delivering".to_string());
        warn!(tile = %self.props.label, session = %session.id(), "Local capture lost");
        session.release();

        self.outcome = Some(error.outcome());
        self.ctx
            .notifier
            .notify(NoticeKind::from(&error), error.user_message());
        self.failure = Some(error);
        self.publish();

        if self.wants_camera() {
            self.ctx.bus.publish(MediaEvent::CaptureFailed);
        }
    }

    /// Stop every held track
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            session.release();
        }
    }

    fn publish(&self) {
        let surface = self.current_surface();
        self.publish_surface(surface);
    }

    fn publish_surface(&self, surface: Surface) {
        let muted = match &self.props.source {
            TileSource::Local(state) => state.desired().muted,
            TileSource::Remote(p) => p.muted,
        };
        self.view.send_replace(TileView {
            label: self.props.label.clone(),
            is_local: self.props.source.is_local(),
            muted,
            playback_muted: self.props.source.is_local(),
            surface,
            outcome: self.outcome,
        });
    }

    fn current_surface(&self) -> Surface {
        match &self.props.source {
            TileSource::Remote(p) if p.camera_off => Surface::CameraOff,
            TileSource::Remote(_) => Surface::Placeholder,
            TileSource::Local(state) => {
                let shared = state.snapshot();
                if let Some(session) = self.session.as_ref().filter(|s| s.is_live()) {
                    return Surface::Live {
                        label: session
                            .stream()
                            .video_label()
                            .unwrap_or("Camera")
                            .to_string(),
                        frames: session.frames(),
                    };
                }
                match shared.last_failure.or_else(|| self.failure.clone()) {
                    Some(error) => Surface::error(error),
                    None => Surface::CameraOff,
                }
            }
        }
    }
}

impl Drop for StreamPresenter {
    fn drop(&mut self) {
        self.release();
    }
}

/// Requests sent to a mounted presenter
#[derive(Debug)]
enum PresenterCommand {
    Retry,
    Update(TileProps),
    Unmount,
}

/// A mounted tile
///
/// Dropping the handle without [`PresenterHandle::unmount`] aborts the tile
/// task, which still stops every track it held.
pub struct PresenterHandle {
    label: String,
    commands: mpsc::UnboundedSender<PresenterCommand>,
    view: watch::Receiver<TileView>,
    task: Option<JoinHandle<()>>,
}

impl PresenterHandle {
    /// Spawn the tile task and run the first reconcile
    pub fn mount(presenter: StreamPresenter) -> Self {
        let label = presenter.props.label.clone();
        let view = presenter.view();
        let (commands, rx) = mpsc::unbounded_channel();

        let wake = Arc::new(Notify::new());
        let waker = Arc::clone(&wake);
        let subscription = presenter
            .ctx
            .bus
            .subscribe(MediaEvent::StateChanged, move || waker.notify_one());

        info!(tile = %label, "Mounting tile");
        let task = tokio::spawn(run(presenter, rx, wake, subscription));

        Self {
            label,
            commands,
            view,
            task: Some(task),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn view(&self) -> TileView {
        self.view.borrow().clone()
    }

    /// Receiver that changes whenever the tile re-renders
    pub fn watch(&self) -> watch::Receiver<TileView> {
        self.view.clone()
    }

    /// Force a fresh acquisition on this tile
    pub fn retry(&self) {
        let _ = self.commands.send(PresenterCommand::Retry);
    }

    pub fn update(&self, props: TileProps) {
        let _ = self.commands.send(PresenterCommand::Update(props));
    }

    /// Stop the tile and wait until its tracks are released
    pub async fn unmount(mut self) {
        let _ = self.commands.send(PresenterCommand::Unmount);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(tile = %self.label, error = %e, "Tile task ended abnormally");
        }
        info!(tile = %self.label, "Tile unmounted");
    }
}

impl Drop for PresenterHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut presenter: StreamPresenter,
    mut commands: mpsc::UnboundedReceiver<PresenterCommand>,
    wake: Arc<Notify>,
    _subscription: Subscription,
) {
    presenter.reconcile(false).await;

    loop {
        let video = presenter.video_state();
        tokio::select! {
            _ = wake.notified() => presenter.reconcile(false).await,
            _ = track_ended(video) => presenter.capture_lost(),
            command = commands.recv() => match command {
                Some(PresenterCommand::Retry) => presenter.reconcile(true).await,
                Some(PresenterCommand::Update(props)) => {
                    presenter.set_props(props);
                    presenter.reconcile(false).await;
                }
                Some(PresenterCommand::Unmount) | None => break,
            },
        }
    }

    presenter.release();
    presenter.publish();
}

/// Resolves once the watched track ends; never without a track
async fn track_ended(state: Option<watch::Receiver<TrackState>>) {
    match state {
        Some(mut state) => {
            // A closed channel means the track is gone as well
            let _ = state.wait_for(|s| *s == TrackState::Ended).await;
        }
        None => std::future::pending().await,
    }
}
