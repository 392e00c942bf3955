// SPDX-License-Identifier: GPL-3.0-only

//! Local media session
//!
//! - [`prober`] finds out once which input kinds exist
//! - [`controller`] owns the desired mute/camera state
//! - [`presenter`] keeps each tile's capture in line with that state
//! - [`bus`] tells siblings that the state changed

pub mod bus;
pub mod controller;
pub mod notice;
pub mod permissions;
pub mod presenter;
pub mod prober;
pub mod state;

pub use bus::{EventBus, MediaEvent, Subscription};
pub use controller::{
    ControllerOptions, ControlsState, MediaSessionController, RejectReason, ToggleOutcome,
};
pub use notice::{Notice, NoticeKind, NoticeReceiver, Notifier};
pub use permissions::spawn_permission_logger;
pub use presenter::{
    PresenterContext, PresenterHandle, RemotePlaceholder, StreamPresenter, Surface, TileProps,
    TileSource, TileView,
};
pub use prober::probe;
pub use state::{
    CaptureSession, DesiredMediaState, DeviceCapability, SharedState, StateHandle, ToggleStatus,
};
