// SPDX-License-Identifier: GPL-3.0-only

//! Capability probing
//!
//! Runs once when the meeting view mounts. Never fails: any enumeration
//! problem degrades to "no camera" so the rest of the view keeps working.

use super::notice::{NoticeKind, Notifier};
use super::state::DeviceCapability;
use crate::backends::MediaPlatform;
use crate::backends::types::DeviceKind;
use crate::errors::MediaError;
use tracing::{info, warn};

/// Classify which input kinds exist
pub async fn probe(platform: &dyn MediaPlatform, notifier: &Notifier) -> DeviceCapability {
    if !platform.is_supported() {
        warn!(platform = platform.name(), "No media capture support");
        notifier.notify(
            NoticeKind::Unsupported,
            MediaError::UnsupportedPlatform.user_message(),
        );
        return DeviceCapability::unsupported();
    }

    let capability = match platform.enumerate_devices().await {
        Ok(devices) => DeviceCapability {
            has_camera: devices.iter().any(|d| d.kind == DeviceKind::VideoInput),
            has_microphone: devices.iter().any(|d| d.kind == DeviceKind::AudioInput),
            unsupported: false,
        },
        Err(MediaError::UnsupportedPlatform) => {
            notifier.notify(
                NoticeKind::Unsupported,
                MediaError::UnsupportedPlatform.user_message(),
            );
            return DeviceCapability::unsupported();
        }
        Err(e) => {
            // Fail closed: without a device list the camera stays disabled
            warn!(error = %e, "Device enumeration failed, treating camera as absent");
            DeviceCapability::default()
        }
    };

    info!(
        platform = platform.name(),
        has_camera = capability.has_camera,
        has_microphone = capability.has_microphone,
        "Probed device capability"
    );

    if !capability.has_camera {
        notifier.notify(NoticeKind::NoCameraDetected, "No camera detected");
    }

    capability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedPlatform;
    use crate::backends::types::MediaDeviceInfo;

    fn mic_only() -> SimulatedPlatform {
        SimulatedPlatform::new().with_devices(vec![MediaDeviceInfo {
            id: "mic".to_string(),
            label: "Mic".to_string(),
            kind: DeviceKind::AudioInput,
            facing: None,
        }])
    }

    #[tokio::test]
    async fn detects_camera_and_microphone() {
        let (notifier, mut rx) = Notifier::channel();
        let cap = probe(&SimulatedPlatform::with_default_devices(), &notifier).await;

        assert!(cap.has_camera);
        assert!(cap.has_microphone);
        assert!(!cap.unsupported);
        assert!(rx.try_recv().is_err(), "no notice when a camera exists");
    }

    #[tokio::test]
    async fn missing_camera_emits_notice() {
        let (notifier, mut rx) = Notifier::channel();
        let cap = probe(&mic_only(), &notifier).await;

        assert!(!cap.has_camera);
        assert!(cap.has_microphone);
        assert_eq!(
            rx.try_recv().map(|n| n.kind),
            Ok(NoticeKind::NoCameraDetected)
        );
    }

    #[tokio::test]
    async fn enumeration_failure_fails_closed() {
        let (notifier, _rx) = Notifier::channel();
        let platform = SimulatedPlatform::with_default_devices().with_enumeration_failure("boom");
        let cap = probe(&platform, &notifier).await;

        assert!(!cap.has_camera);
        assert!(!cap.unsupported);
    }

    #[tokio::test]
    async fn unsupported_platform_is_marked() {
        let (notifier, mut rx) = Notifier::channel();
        let cap = probe(&SimulatedPlatform::unsupported(), &notifier).await;

        assert!(cap.unsupported);
        assert!(!cap.camera_control_enabled());
        assert_eq!(rx.try_recv().map(|n| n.kind), Ok(NoticeKind::Unsupported));
    }
}
