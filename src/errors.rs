// SPDX-License-Identifier: MPL-2.0

//! Error types for the meeting application
//!
//! Device-layer failures are caught where an acquisition is attempted and
//! converted into [`MediaError`]. Nothing below the session layer is allowed
//! to reach the rendering code as an unhandled fault.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for the media layer
pub type MediaResult<T> = Result<T, MediaError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Media device errors
    Media(MediaError),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Media device error taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Listing input devices failed; callers degrade to "no camera"
    EnumerationFailure(String),
    /// The user or the OS refused access to the device
    PermissionDenied(String),
    /// Access was granted but the stream carried no live video track
    NoUsableTracks,
    /// No media capture API exists on this system at all
    UnsupportedPlatform,
    /// The device is missing, busy, or vanished while opening
    DeviceUnavailable(String),
    /// Any other failure while opening the stream
    AcquisitionFailed(String),
}

/// Transient result of one acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    DeviceUnavailable,
}

impl MediaError {
    /// Outcome class this error belongs to
    pub fn outcome(&self) -> PermissionOutcome {
        match self {
            MediaError::PermissionDenied(_) => PermissionOutcome::Denied,
            MediaError::EnumerationFailure(_)
            | MediaError::NoUsableTracks
            | MediaError::UnsupportedPlatform
            | MediaError::DeviceUnavailable(_)
            | MediaError::AcquisitionFailed(_) => PermissionOutcome::DeviceUnavailable,
        }
    }

    /// Short human-readable reason shown in notices and on the local tile
    pub fn user_message(&self) -> String {
        match self {
            MediaError::EnumerationFailure(_) => "Could not list media devices".to_string(),
            MediaError::PermissionDenied(_) => "Camera access denied".to_string(),
            MediaError::NoUsableTracks => "Camera returned no video".to_string(),
            MediaError::UnsupportedPlatform => {
                "Camera and microphone are not supported on this system".to_string()
            }
            MediaError::DeviceUnavailable(msg) => format!("Camera unavailable: {}", msg),
            MediaError::AcquisitionFailed(msg) => format!("Could not start camera: {}", msg),
        }
    }

    /// Whether a manual retry can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, MediaError::UnsupportedPlatform)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Media(e) => write!(f, "Media error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::EnumerationFailure(msg) => {
                write!(f, "Device enumeration failed: {}", msg)
            }
            MediaError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            MediaError::NoUsableTracks => write!(f, "Stream has no usable video tracks"),
            MediaError::UnsupportedPlatform => write!(f, "No media capture support"),
            MediaError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            MediaError::AcquisitionFailed(msg) => write!(f, "Acquisition failed: {}", msg),
        }
    }
}

impl fmt::Display for PermissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionOutcome::Granted => write!(f, "granted"),
            PermissionOutcome::Denied => write!(f, "denied"),
            PermissionOutcome::DeviceUnavailable => write!(f, "device unavailable"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for MediaError {}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        AppError::Media(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_maps_to_denied_outcome() {
        let err = MediaError::PermissionDenied("portal refused".into());
        assert_eq!(err.outcome(), PermissionOutcome::Denied);
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_stream_is_a_device_problem() {
        assert_eq!(
            MediaError::NoUsableTracks.outcome(),
            PermissionOutcome::DeviceUnavailable
        );
    }

    #[test]
    fn unsupported_platform_is_not_retryable() {
        assert!(!MediaError::UnsupportedPlatform.is_retryable());
    }
}
