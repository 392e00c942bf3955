// SPDX-License-Identifier: GPL-3.0-only

//! Transient user-visible notices
//!
//! Advisory only: nothing waits for a notice to be shown, and a missing
//! receiver just means nobody is looking.

use crate::errors::MediaError;
use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// What a notice is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    NoCameraDetected,
    CameraOn,
    CameraOff,
    MicrophoneMuted,
    MicrophoneEnabled,
    AccessDenied,
    DeviceUnavailable,
    /// Camera toggle pressed while one is already running
    ToggleBusy,
    /// Camera toggle pressed on a system without a camera
    CameraDisabled,
    Unsupported,
}

impl NoticeKind {
    /// Errors are styled differently from confirmations
    pub fn is_error(self) -> bool {
        matches!(
            self,
            NoticeKind::AccessDenied
                | NoticeKind::DeviceUnavailable
                | NoticeKind::NoCameraDetected
                | NoticeKind::Unsupported
        )
    }
}

impl From<&MediaError> for NoticeKind {
    fn from(err: &MediaError) -> Self {
        match err {
            MediaError::PermissionDenied(_) => NoticeKind::AccessDenied,
            MediaError::UnsupportedPlatform => NoticeKind::Unsupported,
            MediaError::EnumerationFailure(_)
            | MediaError::NoUsableTracks
            | MediaError::DeviceUnavailable(_)
            | MediaError::AcquisitionFailed(_) => NoticeKind::DeviceUnavailable,
        }
    }
}

/// One transient message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub issued_at: DateTime<Local>,
}

/// Receiving end, owned by whatever displays notices
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

/// Sending end, cloned into every component that emits notices
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, NoticeReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Emit a notice; never blocks and never fails
    pub fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        let message = message.into();
        if kind.is_error() {
            warn!(?kind, %message, "Notice");
        } else {
            info!(?kind, %message, "Notice");
        }

        let _ = self.sender.send(Notice {
            kind,
            message,
            issued_at: Local::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_arrive_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.notify(NoticeKind::MicrophoneMuted, "Microphone muted");
        notifier.notify(NoticeKind::MicrophoneEnabled, "Microphone enabled");

        assert_eq!(rx.try_recv().map(|n| n.kind), Ok(NoticeKind::MicrophoneMuted));
        assert_eq!(rx.try_recv().map(|n| n.kind), Ok(NoticeKind::MicrophoneEnabled));
    }

    #[test]
    fn notifying_without_receiver_is_fine() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.notify(NoticeKind::CameraOff, "Camera turned off");
    }
}
