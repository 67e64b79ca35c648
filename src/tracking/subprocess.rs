//! Tracker subprocess management
//!
//! Launches the MediaPipe Python helper as a child process with automatic
//! cleanup on drop. Must be started from within a tokio runtime.

use tokio::process::{Child, Command};

use crate::config::MediaPipeConfig;
use crate::error::TrackingError;

/// Manages a MediaPipe tracker subprocess (scripts/mp_tracker.py)
pub struct MpSubprocess {
    child: Option<Child>,
    config: MediaPipeConfig,
}

impl MpSubprocess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(config: &MediaPipeConfig) -> Self {
        Self {
            child: None,
            config: config.clone(),
        }
    }

    /// Launch the MediaPipe tracker subprocess.
    ///
    /// Runs: `python3 <tracker_script> --ip <listen_address> --port <port>
    ///        --capture <camera_device> --width <w> --height <h> --fps <fps>
    ///        --model-dir <model_dir>`
    pub fn start(&mut self) -> Result<(), TrackingError> {
        if self.is_running() {
            return Ok(());
        }

        let child = Command::new("python3")
            .arg(&self.config.tracker_script)
            .args(["--ip", &self.config.listen_address])
            .args(["--port", &self.config.port.to_string()])
            .args(["--capture", &self.config.camera_device.to_string()])
            .args(["--width", &self.config.capture_width.to_string()])
            .args(["--height", &self.config.capture_height.to_string()])
            .args(["--fps", &self.config.capture_fps.to_string()])
            .args(["--model-dir", &self.config.model_dir])
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| {
                TrackingError::Subprocess(format!(
                    "Failed to launch MediaPipe tracker at '{}': {}",
                    self.config.tracker_script, e
                ))
            })?;

        tracing::info!(
            "MediaPipe subprocess started (pid: {:?}, camera: {}, port: {})",
            child.id(),
            self.config.camera_device,
            self.config.port,
        );

        self.child = Some(child);
        Ok(())
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("MediaPipe subprocess exited with: {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check MediaPipe subprocess status: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Stop the subprocess. The kill is issued immediately; reaping is left
    /// to the runtime.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping MediaPipe subprocess (pid: {:?})", child.id());
            if let Err(e) = child.start_kill() {
                tracing::warn!("Failed to kill MediaPipe subprocess: {}", e);
            }
        }
    }
}

/// Check if the `mediapipe` Python package is available.
///
/// Runs `python3 -c "import mediapipe"` and returns true if it succeeds.
pub fn check_mediapipe_available() -> bool {
    match std::process::Command::new("python3")
        .args(["-c", "import mediapipe"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_running_before_start() {
        let mut sp = MpSubprocess::new(&MediaPipeConfig::default());
        assert!(!sp.is_running());
        sp.stop();
        assert!(!sp.is_running());
    }

    #[tokio::test]
    async fn test_missing_interpreter_script_reports_error_or_exits() {
        let config = MediaPipeConfig {
            tracker_script: "/nonexistent/mp_tracker.py".to_string(),
            ..Default::default()
        };
        let mut sp = MpSubprocess::new(&config);
        // Either python3 is missing (spawn error) or it exits quickly
        if sp.start().is_ok() {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            sp.stop();
        }
        assert!(!sp.is_running());
    }
}
