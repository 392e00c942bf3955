// SPDX-License-Identifier: MPL-2.0

//! PipeWire device enumeration
//!
//! Cameras and microphones are both PipeWire nodes; `pw-dump` lists them as
//! JSON with their `media.class`, which is all we need to classify them.

use crate::backends::types::{DeviceKind, FacingMode, MediaDeviceInfo};
use crate::constants::pipeline::{AUDIO_SOURCE_CLASS, VIDEO_SOURCE_CLASS};
use crate::errors::{MediaError, MediaResult};
use std::process::Command;
use tracing::{debug, warn};

/// Prefix of device ids that carry a PipeWire object serial
pub const SERIAL_PREFIX: &str = "pipewire-serial-";

/// Check whether GStreamer can reach PipeWire at all
pub fn is_pipewire_available() -> bool {
    if let Err(e) = gstreamer::init() {
        warn!(error = %e, "GStreamer init failed");
        return false;
    }
    gstreamer::ElementFactory::find("pipewiresrc").is_some()
}

/// Enumerate camera and microphone nodes via `pw-dump`
pub fn enumerate_pipewire_devices() -> MediaResult<Vec<MediaDeviceInfo>> {
    let output = Command::new("pw-dump")
        .output()
        .map_err(|e| MediaError::EnumerationFailure(format!("failed to run pw-dump: {}", e)))?;

    if !output.status.success() {
        return Err(MediaError::EnumerationFailure(format!(
            "pw-dump exited with {}",
            output.status
        )));
    }

    let stdout = std::str::from_utf8(&output.stdout)
        .map_err(|e| MediaError::EnumerationFailure(e.to_string()))?;

    parse_pw_dump(stdout)
}

/// Parse the JSON emitted by `pw-dump` into kind-tagged devices
pub fn parse_pw_dump(json: &str) -> MediaResult<Vec<MediaDeviceInfo>> {
    let nodes: Vec<serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| MediaError::EnumerationFailure(format!("invalid pw-dump output: {}", e)))?;

    let mut devices = Vec::new();

    for node in &nodes {
        if node.get("type").and_then(|v| v.as_str()) != Some("PipeWire:Interface:Node") {
            continue;
        }
        let Some(props) = node.get("info").and_then(|info| info.get("props")) else {
            continue;
        };
        let kind = match props.get("media.class").and_then(|v| v.as_str()) {
            Some(VIDEO_SOURCE_CLASS) => DeviceKind::VideoInput,
            Some(AUDIO_SOURCE_CLASS) => DeviceKind::AudioInput,
            _ => continue,
        };

        let label = props
            .get("node.description")
            .or_else(|| props.get("node.nick"))
            .or_else(|| props.get("node.name"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // object.serial is a number in recent PipeWire and a string in older ones
        let serial = props.get("object.serial").and_then(|v| {
            v.as_u64()
                .map(|n| n.to_string())
                .or_else(|| v.as_str().map(str::to_string))
        });
        let id = match (serial, node.get("id").and_then(|v| v.as_u64())) {
            (Some(serial), _) => format!("{}{}", SERIAL_PREFIX, serial),
            (None, Some(id)) => format!("pipewire-{}", id),
            (None, None) => continue,
        };

        let facing = props
            .get("api.libcamera.location")
            .and_then(|v| v.as_str())
            .and_then(FacingMode::from_location);

        debug!(id = %id, label = %label, kind = %kind, ?facing, "Found PipeWire device");
        devices.push(MediaDeviceInfo {
            id,
            label,
            kind,
            facing,
        });
    }

    Ok(devices)
}

/// `pipewiresrc` property selecting the node behind a device id
pub fn target_property(device_id: Option<&str>) -> String {
    match device_id {
        Some(id) if id.starts_with(SERIAL_PREFIX) => {
            format!("target-object={} ", &id[SERIAL_PREFIX.len()..])
        }
        Some(id) if id.starts_with("pipewire-") => {
            format!("target-object={} ", &id["pipewire-".len()..])
        }
        // Empty = let PipeWire pick its default node
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"[
        {"id": 30, "type": "PipeWire:Interface:Metadata", "props": {"metadata.name": "default"}},
        {"id": 51, "type": "PipeWire:Interface:Node", "info": {"props": {
            "media.class": "Video/Source",
            "node.description": "Integrated Camera",
            "object.serial": 2146,
            "api.libcamera.location": "front"
        }}},
        {"id": 52, "type": "PipeWire:Interface:Node", "info": {"props": {
            "media.class": "Audio/Source",
            "node.nick": "Built-in Mic",
            "object.serial": "77"
        }}},
        {"id": 53, "type": "PipeWire:Interface:Node", "info": {"props": {
            "media.class": "Audio/Sink",
            "node.description": "Speakers"
        }}},
        {"id": 54, "type": "PipeWire:Interface:Node", "info": {"props": {
            "media.class": "Video/Source",
            "node.name": "v4l2_input.usb"
        }}}
    ]"#;

    #[test]
    fn classifies_sources_and_skips_sinks() {
        let devices = parse_pw_dump(DUMP).expect("valid dump");
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].kind, DeviceKind::VideoInput);
        assert_eq!(devices[0].id, "pipewire-serial-2146");
        assert_eq!(devices[0].label, "Integrated Camera");
        assert_eq!(devices[0].facing, Some(FacingMode::User));

        assert_eq!(devices[1].kind, DeviceKind::AudioInput);
        assert_eq!(devices[1].id, "pipewire-serial-77");
        assert_eq!(devices[1].label, "Built-in Mic");

        assert_eq!(devices[2].id, "pipewire-54");
        assert_eq!(devices[2].facing, None);
    }

    #[test]
    fn garbage_is_an_enumeration_failure() {
        assert!(matches!(
            parse_pw_dump("not json"),
            Err(MediaError::EnumerationFailure(_))
        ));
    }

    #[test]
    fn target_property_uses_serial_or_node_id() {
        assert_eq!(
            target_property(Some("pipewire-serial-2146")),
            "target-object=2146 "
        );
        assert_eq!(target_property(Some("pipewire-54")), "target-object=54 ");
        assert_eq!(target_property(None), "");
    }
}
