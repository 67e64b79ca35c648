//! MediaPipe face tracking source
//!
//! Receives JSON-over-UDP packets from the `scripts/mp_tracker.py` Python helper.
//! MediaPipe provides ARKit-compatible blendshape names and a facial
//! transformation matrix, which is everything the feature extractor needs.

use glam::{Mat3, Mat4};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use super::subprocess::{check_mediapipe_available, MpSubprocess};
use super::{FaceTrackingSource, RawFaceSample};
use crate::config::MediaPipeConfig;
use crate::error::TrackingError;

/// A single JSON packet from the MediaPipe tracker
#[derive(Debug, Clone, Deserialize)]
pub struct MpPacket {
    /// Whether a face was detected this frame
    pub face_detected: bool,
    /// ARKit blendshape name -> value (0.0-1.0)
    #[serde(default)]
    pub blendshapes: HashMap<String, f32>,
    /// Facial transformation matrix, 16 floats in row-major order
    #[serde(default)]
    pub transform: Option<[f32; 16]>,
    /// Head rotation in degrees [pitch, yaw, roll] (older tracker scripts)
    #[serde(default)]
    pub head_rotation: Option<[f32; 3]>,
}

impl MpPacket {
    /// Parse one UDP datagram
    pub fn parse(bytes: &[u8]) -> Result<Self, TrackingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| TrackingError::Parse(format!("MediaPipe packet: {}", e)))
    }

    /// Convert to a raw sample; `None` when no face was detected
    pub fn to_sample(&self) -> Option<RawFaceSample> {
        if !self.face_detected {
            return None;
        }

        let transform = match (self.transform, self.head_rotation) {
            // glam is column-major; the wire format is row-major
            (Some(rows), _) => Mat4::from_cols_array(&rows).transpose(),
            (None, Some([pitch, yaw, roll])) => Mat4::from_mat3(
                Mat3::from_rotation_y(yaw.to_radians())
                    * Mat3::from_rotation_x(pitch.to_radians())
                    * Mat3::from_rotation_z(roll.to_radians()),
            ),
            (None, None) => Mat4::IDENTITY,
        };

        Some(RawFaceSample {
            blendshapes: self.blendshapes.clone(),
            transform,
        })
    }
}

/// Camera + ML tracking source fed by the MediaPipe helper process
pub struct MediaPipeSource {
    config: MediaPipeConfig,
    socket: Option<UdpSocket>,
    subprocess: Option<MpSubprocess>,
    crashed_at: Option<Instant>,
    detect: fn() -> bool,
    helper_available: OnceLock<bool>,
}

impl MediaPipeSource {
    /// Create a new MediaPipe source (does not bind yet)
    pub fn new(config: &MediaPipeConfig) -> Self {
        Self::with_detector(config, check_mediapipe_available)
    }

    /// Create a source with a custom helper runtime check. The check runs at
    /// most once per source.
    pub fn with_detector(config: &MediaPipeConfig, detect: fn() -> bool) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            subprocess: None,
            crashed_at: None,
            detect,
            helper_available: OnceLock::new(),
        }
    }

    fn helper_available(&self) -> bool {
        *self.helper_available.get_or_init(|| {
            let available = (self.detect)();
            tracing::info!(
                "MediaPipe helper runtime {}",
                if available { "detected" } else { "not found" }
            );
            available
        })
    }

    /// Restart the helper after it exits, honoring the restart delay
    fn supervise(&mut self) {
        let Some(sp) = self.subprocess.as_mut() else {
            return;
        };
        if sp.is_running() {
            self.crashed_at = None;
            return;
        }
        if !self.config.auto_restart {
            return;
        }

        let crashed_at = *self.crashed_at.get_or_insert_with(Instant::now);
        if crashed_at.elapsed() >= Duration::from_secs(self.config.restart_delay_secs) {
            tracing::info!("MediaPipe subprocess exited, restarting");
            if let Err(e) = sp.start() {
                tracing::error!("Failed to restart MediaPipe tracker: {}", e);
            }
            self.crashed_at = None;
        }
    }
}

impl FaceTrackingSource for MediaPipeSource {
    fn name(&self) -> &'static str {
        "mediapipe"
    }

    fn is_available(&self) -> bool {
        // An externally launched tracker is the user's responsibility
        !self.config.auto_launch || self.helper_available()
    }

    fn requires_permission(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<(), TrackingError> {
        if self.socket.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr)
            .map_err(|e| TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e)))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TrackingError::Receiver(format!("Failed to set non-blocking: {}", e)))?;

        if self.config.auto_launch {
            let mut sp = MpSubprocess::new(&self.config);
            sp.start()?;
            self.subprocess = Some(sp);
        }

        tracing::info!("MediaPipe receiver listening on {}", addr);
        self.socket = Some(socket);
        Ok(())
    }

    fn poll_sample(&mut self) -> Result<Option<RawFaceSample>, TrackingError> {
        self.supervise();

        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut buf = [0u8; 65536];
        let mut latest = None;

        // Drain the socket; only the newest packet matters
        loop {
            match socket.recv(&mut buf) {
                Ok(0) => break,
                Ok(size) => match MpPacket::parse(&buf[..size]) {
                    Ok(packet) => latest = Some(packet),
                    Err(e) => tracing::debug!("Dropping packet: {}", e),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(TrackingError::Receiver(format!("Receive error: {}", e)));
                }
            }
        }

        Ok(latest.and_then(|p| p.to_sample()))
    }

    fn stop(&mut self) {
        if let Some(mut sp) = self.subprocess.take() {
            sp.stop();
        }
        if self.socket.take().is_some() {
            tracing::info!("MediaPipe receiver stopped");
        }
        self.crashed_at = None;
    }
}

impl Drop for MediaPipeSource {
    fn drop(&mut self) {
        self.stop();
    }
}
