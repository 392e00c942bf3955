// SPDX-License-Identifier: MPL-2.0

//! Media platform abstraction
//!
//! Everything the session layer needs from the host is behind
//! [`MediaPlatform`]: device enumeration, stream acquisition, and optional
//! permission observation. Track-level stop lives on [`MediaTrack`].
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │   Session layer (prober, controller,      │
//! │   presenters)                             │
//! └────────────────────┬──────────────────────┘
//!                      │
//! ┌────────────────────┴──────────────────────┐
//! │           MediaPlatform trait             │
//! │  ┌──────────────────┐  ┌───────────────┐  │
//! │  │ PipeWire +       │  │  Simulated    │  │
//! │  │ GStreamer        │  │  (scripted)   │  │
//! │  └──────────────────┘  └───────────────┘  │
//! └───────────────────────────────────────────┘
//! ```

#[cfg(feature = "pipewire")]
pub mod pipewire;
pub mod simulated;
pub mod types;

pub use types::*;

use crate::errors::MediaResult;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Host media capabilities consumed by the session layer
pub trait MediaPlatform: Send + Sync {
    /// Short name for logs and the device listing
    fn name(&self) -> &'static str;

    /// Whether any media capture API exists here at all
    fn is_supported(&self) -> bool;

    /// List input devices, tagged by kind
    fn enumerate_devices(&self) -> BoxFuture<'_, MediaResult<Vec<MediaDeviceInfo>>>;

    /// Open a stream satisfying `constraints`
    ///
    /// The returned tracks are live until stopped or dropped. A stream may
    /// legitimately come back without a video track; callers decide whether
    /// that counts as a failure.
    fn acquire(&self, constraints: MediaConstraints) -> BoxFuture<'_, MediaResult<MediaStream>>;

    /// Permission change notifications, when the platform exposes them
    fn permission_events(&self) -> Option<watch::Receiver<PermissionState>> {
        None
    }
}

/// Which platform implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlatformBackend {
    /// PipeWire devices captured through GStreamer
    #[default]
    PipeWire,
    /// In-process fake devices
    Simulated,
}

impl std::fmt::Display for PlatformBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformBackend::PipeWire => write!(f, "PipeWire"),
            PlatformBackend::Simulated => write!(f, "simulated"),
        }
    }
}

/// Get a platform instance for the given backend type
pub fn platform_for(backend: PlatformBackend) -> Arc<dyn MediaPlatform> {
    match backend {
        #[cfg(feature = "pipewire")]
        PlatformBackend::PipeWire => Arc::new(pipewire::PipeWirePlatform::new()),
        #[cfg(not(feature = "pipewire"))]
        PlatformBackend::PipeWire => {
            tracing::warn!("Built without PipeWire support, falling back to an unsupported platform");
            Arc::new(simulated::SimulatedPlatform::unsupported())
        }
        PlatformBackend::Simulated => {
            // The demo platform answers slowly enough to see the loading state
            let platform = simulated::SimulatedPlatform::with_default_devices()
                .with_latency(std::time::Duration::from_millis(600));
            Arc::new(platform)
        }
    }
}
