// SPDX-License-Identifier: MPL-2.0

//! PipeWire media platform
//!
//! Devices are discovered through `pw-dump` and opened with GStreamer's
//! `pipewiresrc`. Both are blocking, so they run on tokio's blocking pool.

mod enumeration;
mod pipeline;

pub use enumeration::{enumerate_pipewire_devices, is_pipewire_available, parse_pw_dump};

use super::MediaPlatform;
use super::types::*;
use crate::errors::{MediaError, MediaResult};
use futures::future::BoxFuture;
use std::sync::OnceLock;
use tracing::{info, warn};

/// PipeWire platform implementation
pub struct PipeWirePlatform {
    available: OnceLock<bool>,
}

impl PipeWirePlatform {
    pub fn new() -> Self {
        Self {
            available: OnceLock::new(),
        }
    }
}

impl Default for PipeWirePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPlatform for PipeWirePlatform {
    fn name(&self) -> &'static str {
        "PipeWire"
    }

    fn is_supported(&self) -> bool {
        *self.available.get_or_init(|| {
            let available = is_pipewire_available();
            info!(available, "Checked PipeWire availability");
            available
        })
    }

    fn enumerate_devices(&self) -> BoxFuture<'_, MediaResult<Vec<MediaDeviceInfo>>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(enumerate_pipewire_devices)
                .await
                .map_err(|e| MediaError::EnumerationFailure(e.to_string()))?
        })
    }

    fn acquire(&self, constraints: MediaConstraints) -> BoxFuture<'_, MediaResult<MediaStream>> {
        Box::pin(async move {
            if !self.is_supported() {
                return Err(MediaError::UnsupportedPlatform);
            }

            tokio::task::spawn_blocking(move || {
                // An unknown device list still lets PipeWire choose its default node
                let devices = enumerate_pipewire_devices().unwrap_or_else(|e| {
                    warn!(error = %e, "Enumeration failed before acquisition");
                    Vec::new()
                });
                pipeline::open_stream(&constraints, &devices)
            })
            .await
            .map_err(|e| MediaError::AcquisitionFailed(e.to_string()))?
        })
    }
}
