// SPDX-License-Identifier: MPL-2.0

//! GStreamer pipelines behind PipeWire tracks
//!
//! Each track owns one pipeline. Video pipelines scale to the requested
//! bounds and deliver RGB frames to an appsink; audio pipelines just keep the
//! microphone node open. Stopping a track drops its pipeline to NULL, which
//! is what releases the device in PipeWire.
//!
//! Once playing, a watcher thread keeps reading the pipeline's bus. An error
//! or end-of-stream there (camera unplugged, node removed, access revoked)
//! ends the track so its owner can react.

use super::enumeration::target_property;
use crate::backends::types::*;
use crate::constants::{pipeline as tuning, timing};
use crate::errors::{MediaError, MediaResult};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Releases a track's pipeline
struct PipelineHandle {
    pipeline: gst::Pipeline,
    appsink: Option<AppSink>,
}

impl TrackHandle for PipelineHandle {
    fn stop(&self) {
        // Clear callbacks first so the frame sender is released with the device
        if let Some(appsink) = &self.appsink {
            appsink.set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        }

        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!(error = %e, "Failed to set pipeline to NULL");
            return;
        }

        let (result, state, _) = self
            .pipeline
            .state(gst::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));
        match result {
            Ok(_) => debug!(state = ?state, "Capture pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline stop had issues"),
        }
    }
}

/// Open every track `constraints` asks for
///
/// A camera that opens without reaching PLAYING produces no video track;
/// the caller decides whether an empty stream is acceptable. A microphone
/// that cannot be opened is logged and skipped.
pub fn open_stream(
    constraints: &MediaConstraints,
    devices: &[MediaDeviceInfo],
) -> MediaResult<MediaStream> {
    gst::init().map_err(|_| MediaError::UnsupportedPlatform)?;

    let mut tracks = Vec::new();

    if let Some(video) = constraints.video.as_ref() {
        let camera = resolve_camera(devices, video)?;
        if let Some(track) = open_video_track(camera, video)? {
            tracks.push(track);
        }
    }

    if constraints.audio {
        let mic = devices.iter().find(|d| d.kind == DeviceKind::AudioInput);
        match open_audio_track(mic) {
            Ok(Some(track)) => tracks.push(track),
            Ok(None) => warn!("Microphone did not start in time, continuing without audio"),
            Err(e) => warn!(error = %e, "Microphone unavailable, continuing without audio"),
        }
    }

    Ok(MediaStream::new(tracks))
}

/// Camera to open for a request, or `None` to let PipeWire pick its default
///
/// A pinned device that is not present is an error rather than a silent
/// switch to another camera. So is a device list that has microphones but
/// no camera, since enumeration clearly worked.
fn resolve_camera<'a>(
    devices: &'a [MediaDeviceInfo],
    video: &VideoConstraints,
) -> MediaResult<Option<&'a MediaDeviceInfo>> {
    match select_camera(devices, video) {
        Some(camera) => Ok(Some(camera)),
        None => {
            if let Some(id) = video.device_id.as_deref() {
                return Err(MediaError::DeviceUnavailable(format!(
                    "camera {} not found",
                    id
                )));
            }
            if devices.iter().any(|d| d.kind == DeviceKind::AudioInput) {
                return Err(MediaError::DeviceUnavailable("no camera found".to_string()));
            }
            Ok(None)
        }
    }
}

/// Pick the camera for a request: pinned id, then facing mode, then first
fn select_camera<'a>(
    devices: &'a [MediaDeviceInfo],
    video: &VideoConstraints,
) -> Option<&'a MediaDeviceInfo> {
    let mut cameras = devices.iter().filter(|d| d.kind == DeviceKind::VideoInput);
    if let Some(id) = video.device_id.as_deref() {
        return cameras.find(|d| d.id == id);
    }
    let cameras: Vec<_> = cameras.collect();
    cameras
        .iter()
        .find(|d| d.facing == Some(video.facing_mode))
        .or_else(|| cameras.first())
        .copied()
}

fn build_video_pipeline_string(target: &str, video: &VideoConstraints) -> String {
    let mut caps = format!(
        "video/x-raw,format=RGB,width=(int){},height=(int){}",
        video.ideal_width, video.ideal_height
    );
    if let Some(fps) = video.ideal_framerate {
        caps.push_str(&format!(",framerate=(fraction){}/1", fps));
    }
    format!(
        "pipewiresrc {}do-timestamp=true ! \
         videoconvert ! videoscale ! videorate ! {} ! \
         queue max-size-buffers={} leaky=downstream ! \
         appsink name=sink sync=false",
        target,
        caps,
        tuning::MAX_BUFFERS
    )
}

fn build_audio_pipeline_string(target: &str) -> String {
    format!(
        "pipewiresrc {}do-timestamp=true ! audio/x-raw ! audioconvert ! fakesink sync=false",
        target
    )
}

fn open_video_track(
    camera: Option<&MediaDeviceInfo>,
    video: &VideoConstraints,
) -> MediaResult<Option<MediaTrack>> {
    let target = target_property(camera.map(|c| c.id.as_str()));
    let description = build_video_pipeline_string(&target, video);
    info!(pipeline = %description, "Opening camera pipeline");

    let pipeline = launch(&description)?;

    let appsink = pipeline
        .by_name("sink")
        .and_then(|e| e.dynamic_cast::<AppSink>().ok())
        .ok_or_else(|| MediaError::AcquisitionFailed("pipeline has no appsink".to_string()))?;
    appsink.set_property("max-buffers", tuning::MAX_BUFFERS);
    appsink.set_property("drop", true);
    appsink.set_property("enable-last-sample", false);

    let (frame_tx, frame_rx) = watch::channel(None);
    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                let info = VideoInfo::from_caps(caps).map_err(|e| {
                    if frame_num % 30 == 0 {
                        error!(frame = frame_num, error = ?e, "Failed to read video info");
                    }
                    gst::FlowError::Error
                })?;
                let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                let frame = VideoFrame {
                    width: info.width(),
                    height: info.height(),
                    stride: info.stride()[0] as u32,
                    data: Arc::from(map.as_slice()),
                };
                frame_tx.send_replace(Some(Arc::new(frame)));
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );

    let handle = PipelineHandle {
        pipeline: pipeline.clone(),
        appsink: Some(appsink),
    };

    if !start(&pipeline).inspect_err(|_| handle.stop())? {
        handle.stop();
        return Ok(None);
    }

    let label = camera
        .map(|c| c.label.clone())
        .unwrap_or_else(|| "Default Camera (PipeWire)".to_string());
    info!(camera = %label, constraints = %video, "Camera pipeline playing");

    let track = MediaTrack::new(TrackKind::Video, label)
        .with_handle(handle)
        .with_frames(frame_rx);
    watch_bus(&pipeline, track.observer());
    Ok(Some(track))
}

fn open_audio_track(mic: Option<&MediaDeviceInfo>) -> MediaResult<Option<MediaTrack>> {
    let target = target_property(mic.map(|m| m.id.as_str()));
    let description = build_audio_pipeline_string(&target);
    info!(pipeline = %description, "Opening microphone pipeline");

    let pipeline = launch(&description)?;
    let handle = PipelineHandle {
        pipeline: pipeline.clone(),
        appsink: None,
    };

    if !start(&pipeline).inspect_err(|_| handle.stop())? {
        handle.stop();
        return Ok(None);
    }

    let label = mic
        .map(|m| m.label.clone())
        .unwrap_or_else(|| "Default Microphone (PipeWire)".to_string());
    let track = MediaTrack::new(TrackKind::Audio, label).with_handle(handle);
    watch_bus(&pipeline, track.observer());
    Ok(Some(track))
}

/// End `track` when its playing pipeline reports an error or EOS
///
/// The thread exits once the track is no longer live, whoever ended it.
fn watch_bus(pipeline: &gst::Pipeline, track: TrackObserver) {
    let Some(bus) = pipeline.bus() else {
        warn!(track = %track.id(), "Pipeline has no bus, capture loss will go unnoticed");
        return;
    };

    let spawned = thread::Builder::new()
        .name("meeting-bus-watch".to_string())
        .spawn(move || {
            let poll = gst::ClockTime::from_mseconds(timing::BUS_POLL_MS);
            while track.is_live() {
                let Some(msg) =
                    bus.timed_pop_filtered(poll, &[gst::MessageType::Error, gst::MessageType::Eos])
                else {
                    continue;
                };
                match msg.view() {
                    gst::MessageView::Error(err) => {
                        let debug_info = err.debug().map(|d| d.to_string());
                        let error = classify_error(&err.error(), debug_info.as_deref());
                        warn!(track = %track.id(), kind = ?track.kind(), error = %error, "Capture lost");
                        track.end();
                    }
                    gst::MessageView::Eos(_) => {
                        warn!(track = %track.id(), kind = ?track.kind(), "Capture reached end of stream");
                        track.end();
                    }
                    _ => {}
                }
            }
            debug!(track = %track.id(), "Bus watch finished");
        });

    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start bus watch");
    }
}

fn launch(description: &str) -> MediaResult<gst::Pipeline> {
    gst::parse::launch(description)
        .map_err(|e| MediaError::AcquisitionFailed(e.to_string()))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| MediaError::AcquisitionFailed("not a pipeline".to_string()))
}

/// Set PLAYING and wait for it; `Ok(false)` when it never got there
fn start(pipeline: &gst::Pipeline) -> MediaResult<bool> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| MediaError::AcquisitionFailed("pipeline has no bus".to_string()))?;

    if let Err(e) = pipeline.set_state(gst::State::Playing) {
        // The real reason is on the bus
        debug!(error = %e, "Failed to set pipeline to PLAYING");
        if let Some(err) = first_error(&bus) {
            return Err(err);
        }
        return Err(MediaError::AcquisitionFailed(e.to_string()));
    }

    let deadline = Instant::now() + Duration::from_secs(timing::START_TIMEOUT_SECS);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let timeout = gst::ClockTime::from_mseconds(remaining.as_millis() as u64);
        let Some(msg) = bus.timed_pop_filtered(
            timeout,
            &[gst::MessageType::Error, gst::MessageType::StateChanged],
        ) else {
            break;
        };

        match msg.view() {
            gst::MessageView::Error(err) => {
                let debug_info = err.debug().map(|d| d.to_string());
                return Err(classify_error(&err.error(), debug_info.as_deref()));
            }
            gst::MessageView::StateChanged(change) => {
                let from_pipeline = msg
                    .src()
                    .is_some_and(|src| src == pipeline.upcast_ref::<gst::Object>());
                if from_pipeline && change.current() == gst::State::Playing {
                    return Ok(true);
                }
            }
            _ => {}
        }
    }

    warn!("Pipeline did not reach PLAYING before the timeout");
    Ok(false)
}

fn first_error(bus: &gst::Bus) -> Option<MediaError> {
    let msg = bus.timed_pop_filtered(
        gst::ClockTime::from_mseconds(100),
        &[gst::MessageType::Error],
    )?;
    match msg.view() {
        gst::MessageView::Error(err) => {
            let debug_info = err.debug().map(|d| d.to_string());
            Some(classify_error(&err.error(), debug_info.as_deref()))
        }
        _ => None,
    }
}

/// Map a GStreamer error onto the media error taxonomy
fn classify_error(error: &glib::Error, debug_info: Option<&str>) -> MediaError {
    let message = match debug_info {
        Some(detail) => format!("{} ({})", error.message(), detail),
        None => error.message().to_string(),
    };

    if let Some(kind) = error.kind::<gst::ResourceError>() {
        return match kind {
            gst::ResourceError::NotAuthorized => MediaError::PermissionDenied(message),
            gst::ResourceError::NotFound
            | gst::ResourceError::Busy
            | gst::ResourceError::OpenRead
            | gst::ResourceError::OpenReadWrite => MediaError::DeviceUnavailable(message),
            _ => MediaError::AcquisitionFailed(message),
        };
    }

    // Portal refusals surface as plain strings from pipewiresrc
    let lowered = message.to_lowercase();
    if lowered.contains("permission denied") || lowered.contains("not authorized") {
        MediaError::PermissionDenied(message)
    } else {
        MediaError::AcquisitionFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(id: &str, facing: Option<FacingMode>) -> MediaDeviceInfo {
        MediaDeviceInfo {
            id: id.to_string(),
            label: id.to_string(),
            kind: DeviceKind::VideoInput,
            facing,
        }
    }

    #[test]
    fn facing_mode_wins_over_order() {
        let devices = vec![
            camera("rear", Some(FacingMode::Environment)),
            camera("front", Some(FacingMode::User)),
        ];
        let picked = select_camera(&devices, &VideoConstraints::default());
        assert_eq!(picked.map(|d| d.id.as_str()), Some("front"));
    }

    #[test]
    fn pinned_device_must_exist() {
        let devices = vec![camera("a", None)];
        let video = VideoConstraints {
            device_id: Some("b".to_string()),
            ..Default::default()
        };
        assert!(select_camera(&devices, &video).is_none());
    }

    #[test]
    fn missing_pinned_camera_is_unavailable() {
        let video = VideoConstraints {
            device_id: Some("b".to_string()),
            ..Default::default()
        };

        // No microphone either: still refuses to open the default camera
        let devices = vec![camera("a", None)];
        assert!(matches!(
            resolve_camera(&devices, &video),
            Err(MediaError::DeviceUnavailable(_))
        ));
        assert!(matches!(
            resolve_camera(&[], &video),
            Err(MediaError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn unpinned_request_without_cameras() {
        let video = VideoConstraints::default();

        // Unknown device list: PipeWire chooses
        assert!(matches!(resolve_camera(&[], &video), Ok(None)));

        let mic = MediaDeviceInfo {
            id: "mic".to_string(),
            label: "mic".to_string(),
            kind: DeviceKind::AudioInput,
            facing: None,
        };
        assert!(matches!(
            resolve_camera(&[mic], &video),
            Err(MediaError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn pinned_camera_is_resolved() {
        let devices = vec![camera("a", None), camera("b", None)];
        let video = VideoConstraints {
            device_id: Some("b".to_string()),
            ..Default::default()
        };
        let picked = resolve_camera(&devices, &video).expect("present");
        assert_eq!(picked.map(|d| d.id.as_str()), Some("b"));
    }

    #[test]
    fn video_pipeline_is_bounded() {
        let s = build_video_pipeline_string("target-object=5 ", &VideoConstraints::default());
        assert!(s.starts_with("pipewiresrc target-object=5 do-timestamp=true"));
        assert!(s.contains("width=(int)1280,height=(int)720"));
        assert!(s.contains("framerate=(fraction)30/1"));
        assert!(s.ends_with("appsink name=sink sync=false"));
    }
}
