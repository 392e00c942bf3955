// SPDX-License-Identifier: MPL-2.0

//! Meeting - local camera and microphone session for a meeting room
//!
//! This library provides the local media side of a meeting view: probing
//! input devices, deciding whether the camera and microphone are on, and
//! keeping each tile's capture in line with that decision.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Meeting view composition and terminal widgets
//! - [`backends`]: Media platform abstraction (PipeWire, simulated)
//! - [`session`]: Capability prober, session controller, presenters, event bus
//! - [`config`]: User configuration handling
//! - [`terminal`]: Terminal front end
//!
//! # Example
//!
//! ```ignore
//! let platform = meeting::backends::platform_for(PlatformBackend::Simulated);
//! let (view, notices) = meeting::MeetingView::mount(&Config::default(), platform).await;
//! view.spawn_toggle_camera().await?;
//! view.leave().await;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use app::{Action, LobbyAction, MeetingSnapshot, MeetingView};
pub use backends::{MediaPlatform, PlatformBackend};
pub use config::Config;
pub use errors::{AppError, AppResult, MediaError, MediaResult, PermissionOutcome};
pub use session::{MediaSessionController, ToggleOutcome};
