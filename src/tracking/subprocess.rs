//! Face landmarker helper subprocess
//!
//! Launches and manages the Python landmarker helper as a child process with
//! automatic cleanup on drop.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::config::{CameraConfig, TrackingConfig};
use crate::error::{FacerigError, TrackingError};

/// Manages the landmarker helper subprocess (scripts/face_landmarker.py)
pub struct TrackerSubprocess {
    child: Option<Child>,
    tracking: TrackingConfig,
    camera: CameraConfig,
}

impl TrackerSubprocess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(tracking: &TrackingConfig, camera: &CameraConfig) -> Self {
        Self {
            child: None,
            tracking: tracking.clone(),
            camera: camera.clone(),
        }
    }

    /// Command-line arguments passed to the helper script.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.tracking.tracker_script.clone(),
            "--model".to_string(),
            self.tracking.model_asset_path.clone(),
            "--delegate".to_string(),
            self.tracking.delegate.to_string(),
            "--num-faces".to_string(),
            self.tracking.num_faces.to_string(),
            "--camera".to_string(),
            self.camera.device.to_string(),
            "--width".to_string(),
            self.camera.width.to_string(),
            "--height".to_string(),
            self.camera.height.to_string(),
            "--fps".to_string(),
            self.camera.frame_rate.to_string(),
            "--max-fps".to_string(),
            self.camera.max_frame_rate.to_string(),
            "--ip".to_string(),
            self.tracking.listen_address.clone(),
            "--port".to_string(),
            self.tracking.port.to_string(),
        ];
        if self.tracking.output_face_blendshapes {
            args.push("--blendshapes".to_string());
        }
        if self.tracking.output_transformation_matrixes {
            args.push("--matrixes".to_string());
        }
        args
    }

    /// Launch the helper subprocess.
    pub fn start(&mut self) -> Result<(), FacerigError> {
        if self.is_running() {
            return Ok(());
        }

        let mut child = Command::new("python3")
            .args(self.args())
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                TrackingError::Subprocess(format!(
                    "Failed to launch landmarker helper at '{}': {}",
                    self.tracking.tracker_script, e
                ))
            })?;

        tracing::info!(
            "Landmarker helper started (pid: {:?}, camera: {}, {}x{}@{}, delegate: {}, port: {})",
            child.id(),
            self.camera.device,
            self.camera.width,
            self.camera.height,
            self.camera.frame_rate,
            self.tracking.delegate,
            self.tracking.port,
        );

        // MediaPipe logs heavily to stderr; keep the pipe drained
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        self.child = Some(child);
        Ok(())
    }

    /// Wait until the helper exits. Errors immediately if it is not running.
    pub async fn wait_exit(&mut self) -> Result<std::process::ExitStatus, TrackingError> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| TrackingError::Subprocess("helper is not running".to_string()))?;
        let status = child
            .wait()
            .await
            .map_err(|e| TrackingError::Subprocess(format!("Failed to wait on helper: {}", e)))?;
        self.child = None;
        Ok(status)
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("Landmarker helper exited with: {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check helper status: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Stop the subprocess by killing it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping landmarker helper (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

/// Forward helper stderr lines to the log until the pipe closes.
///
/// Returns the number of lines forwarded.
pub async fn forward_stderr<R: AsyncRead + Unpin>(reader: R) -> usize {
    let mut lines = BufReader::new(reader).lines();
    let mut forwarded = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(target: "facerig::helper", "{}", line);
                forwarded += 1;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Helper stderr closed: {}", e);
                break;
            }
        }
    }
    forwarded
}
