// SPDX-License-Identifier: GPL-3.0-only

//! Permission observation
//!
//! Diagnostics only. Nothing in the session decides anything from these
//! events; acquisitions report their own outcome.

use crate::backends::MediaPlatform;
use crate::backends::types::PermissionState;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Log permission changes until the platform stops reporting them
///
/// Returns `None` when the platform cannot observe permissions.
pub fn spawn_permission_logger(platform: &dyn MediaPlatform) -> Option<JoinHandle<()>> {
    let Some(mut rx) = platform.permission_events() else {
        debug!(platform = platform.name(), "Permission events not available");
        return None;
    };
    let platform = platform.name();

    Some(tokio::spawn(async move {
        log_state(platform, *rx.borrow_and_update());
        while rx.changed().await.is_ok() {
            log_state(platform, *rx.borrow_and_update());
        }
        debug!(platform, "Permission observer closed");
    }))
}

fn log_state(platform: &str, state: PermissionState) {
    match state {
        PermissionState::Denied => warn!(platform, ?state, "Camera permission state"),
        _ => info!(platform, ?state, "Camera permission state"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedPlatform;

    #[tokio::test]
    async fn logger_runs_for_observable_platforms() {
        let platform = SimulatedPlatform::with_default_devices();
        let task = spawn_permission_logger(&platform).expect("simulated platform reports");
        platform.set_permission(PermissionState::Denied);
        drop(platform);
        task.await.expect("logger exits once the platform is gone");
    }
}
