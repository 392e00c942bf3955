// SPDX-License-Identifier: MPL-2.0

//! Meeting view
//!
//! Composes the session pieces into one meeting:
//!
//! - probe the devices once on mount
//! - one controller for the local participant
//! - one presenter per tile (local first, then remote placeholders)
//! - the controls bar driving the controller
//!
//! # Architecture
//!
//! - `state`: actions, lobby, roster, and render snapshots
//! - `view`: terminal widgets

mod state;
pub mod view;

pub use state::{Action, Lobby, LobbyAction, MeetingSnapshot, UiState, roster};

use crate::backends::MediaPlatform;
use crate::config::Config;
use crate::session::{
    ControllerOptions, DeviceCapability, EventBus, MediaEvent, MediaSessionController,
    NoticeReceiver, Notifier, PresenterContext, PresenterHandle, StreamPresenter, Subscription,
    ToggleOutcome, probe, spawn_permission_logger,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A joined meeting
pub struct MeetingView {
    controller: Arc<MediaSessionController>,
    bus: EventBus,
    tiles: Vec<PresenterHandle>,
    left: Arc<AtomicBool>,
    permission_logger: Option<JoinHandle<()>>,
    _leave: Subscription,
}

impl MeetingView {
    /// Probe devices, create the controller, and mount every tile
    pub async fn mount(config: &Config, platform: Arc<dyn MediaPlatform>) -> (Self, NoticeReceiver) {
        let (notifier, notices) = Notifier::channel();
        let bus = EventBus::new();

        let capability = probe(platform.as_ref(), &notifier).await;
        let permission_logger = spawn_permission_logger(platform.as_ref());

        let controller = Arc::new(MediaSessionController::new(
            Arc::clone(&platform),
            capability,
            bus.clone(),
            notifier.clone(),
            ControllerOptions {
                constraints: config.video.clone(),
                start_muted: config.start_muted,
            },
        ));

        let ctx = PresenterContext {
            platform,
            capability,
            constraints: config.video.clone(),
            capture_audio: config.capture_audio,
            bus: bus.clone(),
            notifier,
        };
        let tiles = roster(&config.display_name, controller.state_handle())
            .into_iter()
            .map(|props| PresenterHandle::mount(StreamPresenter::new(props, ctx.clone())))
            .collect();

        let left = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&left);
        let leave = bus.subscribe(MediaEvent::Leave, move || {
            flag.store(true, Ordering::Release);
        });

        info!(
            has_camera = capability.has_camera,
            has_microphone = capability.has_microphone,
            "Joined meeting"
        );

        let view = Self {
            controller,
            bus,
            tiles,
            left,
            permission_logger,
            _leave: leave,
        };

        if !config.start_camera_off && capability.camera_control_enabled() {
            view.spawn_toggle_camera();
        }

        (view, notices)
    }

    pub fn controller(&self) -> &Arc<MediaSessionController> {
        &self.controller
    }

    pub fn capability(&self) -> DeviceCapability {
        self.controller.capability()
    }

    pub fn tiles(&self) -> &[PresenterHandle] {
        &self.tiles
    }

    /// The local participant's tile
    pub fn local_tile(&self) -> Option<&PresenterHandle> {
        self.tiles.first()
    }

    pub fn snapshot(&self) -> MeetingSnapshot {
        MeetingSnapshot {
            controls: self.controller.controls(),
            capability: self.controller.capability(),
            tiles: self.tiles.iter().map(PresenterHandle::view).collect(),
        }
    }

    pub fn toggle_mute(&self) -> bool {
        self.controller.toggle_mute()
    }

    /// Run a camera toggle without blocking the caller
    pub fn spawn_toggle_camera(&self) -> JoinHandle<ToggleOutcome> {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { controller.toggle_camera().await })
    }

    /// Retry affordance of the local tile
    ///
    /// With the camera off this goes through the verified toggle; with the
    /// camera on it asks the tile to reacquire.
    pub fn retry_local(&self) -> Option<JoinHandle<ToggleOutcome>> {
        if self.controller.desired().camera_off {
            return Some(self.spawn_toggle_camera());
        }
        if let Some(tile) = self.local_tile() {
            tile.retry();
        }
        None
    }

    /// Ask to leave; the view ends at its owner's next check
    pub fn request_leave(&self) {
        self.bus.publish(MediaEvent::Leave);
    }

    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::Acquire)
    }

    /// Dispatch one user intent
    pub fn handle(&self, action: Action) {
        match action {
            Action::ToggleMute => {
                self.toggle_mute();
            }
            Action::ToggleCamera => {
                self.spawn_toggle_camera();
            }
            Action::Retry => {
                self.retry_local();
            }
            Action::Leave => self.request_leave(),
            // Presentation only
            Action::ToggleHelp => {}
        }
    }

    /// Unmount every tile, stopping all tracks
    pub async fn leave(mut self) {
        for tile in self.tiles.drain(..) {
            tile.unmount().await;
        }
        if let Some(task) = self.permission_logger.take() {
            task.abort();
        }
        if self.controller.is_loading() {
            warn!("Leaving while a camera toggle is still pending");
        }
        info!("Left meeting");
    }
}
