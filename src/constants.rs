// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Bounded capture resolution requested for the local tile
pub mod video {
    /// Ideal capture width in pixels
    pub const IDEAL_WIDTH: u32 = 1280;

    /// Ideal capture height in pixels
    pub const IDEAL_HEIGHT: u32 = 720;

    /// Ideal capture framerate
    pub const IDEAL_FRAMERATE: u32 = 30;

    /// Upper bound applied to any configured width
    pub const MAX_WIDTH: u32 = 1920;

    /// Upper bound applied to any configured height
    pub const MAX_HEIGHT: u32 = 1080;
}

/// GStreamer pipeline tuning
pub mod pipeline {
    /// Maximum buffers queued in front of the appsink
    pub const MAX_BUFFERS: u32 = 2;

    /// PipeWire media class of camera nodes
    pub const VIDEO_SOURCE_CLASS: &str = "Video/Source";

    /// PipeWire media class of microphone nodes
    pub const AUDIO_SOURCE_CLASS: &str = "Audio/Source";
}

/// Timing constants
pub mod timing {
    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// How often a playing pipeline's bus is checked for errors and EOS
    pub const BUS_POLL_MS: u64 = 250;

    /// How long a transient notice stays on screen by default
    pub const NOTICE_DURATION_MS: u64 = 3000;

    /// Terminal redraw interval
    pub const UI_TICK_MS: u64 = 33;
}

/// Placeholder participants shown next to the local tile
pub mod roster {
    /// Display name used for the local participant when none is configured
    pub const LOCAL_DISPLAY_NAME: &str = "You";

    /// Remote placeholders: (name, muted, camera off)
    pub const REMOTE_PLACEHOLDERS: [(&str, bool, bool); 2] =
        [("Participant 2", true, false), ("Participant 3", false, true)];
}
