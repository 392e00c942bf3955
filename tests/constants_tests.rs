// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use meeting::backends::types::VideoConstraints;
use meeting::constants::{roster, timing, video};

#[test]
fn test_ideal_resolution_within_bounds() {
    assert!(video::IDEAL_WIDTH <= video::MAX_WIDTH);
    assert!(video::IDEAL_HEIGHT <= video::MAX_HEIGHT);

    // Defaults survive clamping unchanged
    let defaults = VideoConstraints::default();
    assert_eq!(defaults.clone().bounded(), defaults);
}

#[test]
fn test_remote_placeholders() {
    // One muted participant, one with the camera off
    assert!(roster::REMOTE_PLACEHOLDERS.iter().any(|&(_, muted, _)| muted));
    assert!(roster::REMOTE_PLACEHOLDERS.iter().any(|&(_, _, off)| off));
}

#[test]
fn test_timeouts_are_nonzero() {
    assert!(timing::START_TIMEOUT_SECS > 0);
    assert!(timing::STOP_TIMEOUT_SECS > 0);
    assert!(timing::UI_TICK_MS > 0);
}
