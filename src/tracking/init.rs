//! Tracking initialization
//!
//! Brings up the camera stream and the landmarker. Runs off the render
//! thread; the render loop polls for the resulting [`TrackingSession`].

use std::path::Path;
use std::sync::Arc;

use crate::config::{CameraConfig, TrackingConfig};
use crate::error::{FacerigError, TrackingError};
use crate::render::scheduler::Clock;

use super::mediapipe::MpReceiver;
use super::replay::ReplayFeed;
use super::source::{LandmarkerOptions, TrackingSession};
use super::subprocess::TrackerSubprocess;

/// Initialize live tracking from the landmarker helper.
///
/// Validates the landmarker options, optionally launches the helper, binds
/// the UDP receiver and waits until the first frame arrives. Waits without a
/// timeout while the helper is alive; a helper that exits first fails
/// initialization.
pub async fn initialize_tracking(
    tracking: TrackingConfig,
    camera: CameraConfig,
) -> Result<TrackingSession, FacerigError> {
    let options = LandmarkerOptions::from_config(&tracking);
    options.validate()?;

    let mut helper = if tracking.auto_launch {
        let mut helper = TrackerSubprocess::new(&tracking, &camera);
        helper.start()?;
        Some(helper)
    } else {
        tracing::info!(
            "Helper auto-launch disabled, expecting packets on {}:{}",
            tracking.listen_address,
            tracking.port
        );
        None
    };

    let mut receiver = MpReceiver::new(&tracking);
    if let Err(e) = receiver.start() {
        if let Some(ref mut helper) = helper {
            helper.stop().await;
        }
        return Err(e);
    }

    tracing::info!(
        "Waiting for camera stream (device {}, {}x{} @ {} fps)",
        camera.device,
        camera.width,
        camera.height,
        camera.frame_rate
    );
    match helper.as_mut() {
        Some(helper) => {
            tokio::select! {
                ready = receiver.wait_for_data() => ready?,
                exited = helper.wait_exit() => {
                    let status = exited?;
                    return Err(TrackingError::Subprocess(format!(
                        "helper exited before the camera stream started ({})",
                        status
                    ))
                    .into());
                }
            }
        }
        None => receiver.wait_for_data().await?,
    }

    tracing::info!(
        "Face tracking online (model: {}, delegate: {})",
        options.model_asset_path,
        options.delegate
    );

    let (video, landmarker) = receiver.split();
    let session = TrackingSession::new(Box::new(video), Box::new(landmarker));
    Ok(match helper {
        Some(helper) => session.with_keepalive(helper),
        None => session,
    })
}

/// Initialize tracking from a recorded replay file.
pub fn initialize_replay<P: AsRef<Path>>(
    path: P,
    clock: Arc<dyn Clock>,
) -> Result<TrackingSession, FacerigError> {
    let feed = ReplayFeed::from_file(path, clock)?;
    let landmarker = feed.landmarker();
    Ok(TrackingSession::new(Box::new(feed), Box::new(landmarker)))
}
