// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for media devices
//!
//! This module provides command-line functionality for:
//! - Listing input devices and the probed capability
//! - Probing camera access with a trial acquisition

use meeting::backends::types::{DeviceKind, MediaConstraints};
use meeting::backends::MediaPlatform;
use meeting::errors::PermissionOutcome;
use meeting::session::{Notifier, probe};
use meeting::Config;
use std::sync::Arc;

/// List all input devices, grouped by kind
pub fn list_devices(platform: Arc<dyn MediaPlatform>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(print_devices(platform))
}

async fn print_devices(platform: Arc<dyn MediaPlatform>) -> Result<(), Box<dyn std::error::Error>> {
    if !platform.is_supported() {
        println!("Media capture is not supported on this system ({}).", platform.name());
        return Ok(());
    }

    let devices = platform.enumerate_devices().await?;
    println!("Platform: {}", platform.name());
    println!();

    for (kind, title) in [
        (DeviceKind::VideoInput, "Cameras"),
        (DeviceKind::AudioInput, "Microphones"),
    ] {
        let matching: Vec<_> = devices.iter().filter(|d| d.kind == kind).collect();
        println!("{}:", title);
        if matching.is_empty() {
            println!("  (none)");
        }
        for (index, device) in matching.iter().enumerate() {
            let label = if device.label.is_empty() {
                "(unnamed)"
            } else {
                device.label.as_str()
            };
            match device.facing {
                Some(facing) => {
                    println!("  [{}] {} ({:?})  id: {}", index, label, facing, device.id)
                }
                None => println!("  [{}] {}  id: {}", index, label, device.id),
            }
        }
        println!();
    }

    let (notifier, _notices) = Notifier::channel();
    let capability = probe(platform.as_ref(), &notifier).await;
    println!(
        "Camera: {}  Microphone: {}",
        yes_no(capability.has_camera),
        yes_no(capability.has_microphone)
    );
    Ok(())
}

/// Open the camera once, report the outcome, and release it
pub fn probe_camera(
    platform: Arc<dyn MediaPlatform>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let constraints = MediaConstraints::video_only(config.video.clone().bounded());
    println!("Requesting camera ({})...", constraints_label(&constraints));

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(async move {
        match platform.acquire(constraints).await {
            Ok(stream) if stream.has_live_video() => {
                let label = stream.video_label().unwrap_or("camera").to_string();
                stream.stop_all();
                println!("Opened: {}", label);
                PermissionOutcome::Granted
            }
            Ok(stream) => {
                stream.stop_all();
                println!("Access granted but no video track was delivered.");
                PermissionOutcome::DeviceUnavailable
            }
            Err(e) => {
                println!("{}", e.user_message());
                e.outcome()
            }
        }
    });

    println!("Outcome: {}", outcome);
    if outcome == PermissionOutcome::Granted {
        Ok(())
    } else {
        Err(format!("camera probe failed: {}", outcome).into())
    }
}

fn constraints_label(constraints: &MediaConstraints) -> String {
    constraints
        .video
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "audio only".to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
