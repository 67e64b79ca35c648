//! Tracking module
//!
//! Capture side of the pipeline:
//! - `features`: raw tracker sample -> normalized feature frame
//! - `mediapipe`: camera + MediaPipe Face Landmarker (JSON over UDP)
//! - `vmc`: sensor-based trackers over the VMC/OSC protocol
//! - `session`: start/stop/status lifecycle and the producer loop

pub mod features;
pub mod mediapipe;
pub mod session;
pub mod subprocess;
pub mod vmc;

pub use features::{extract, FacialFeatureFrame};
pub use session::{SessionState, TrackingSession};

use glam::Mat4;
use std::collections::HashMap;

use crate::config::{Config, SourceKind};
use crate::error::TrackingError;

/// One raw reading from a tracker: blendshape coefficients plus head pose
#[derive(Debug, Clone, PartialEq)]
pub struct RawFaceSample {
    /// ARKit blendshape name -> coefficient (nominally 0.0-1.0)
    pub blendshapes: HashMap<String, f32>,
    /// Head transform (rotation + translation)
    pub transform: Mat4,
}

impl Default for RawFaceSample {
    fn default() -> Self {
        Self {
            blendshapes: HashMap::new(),
            transform: Mat4::IDENTITY,
        }
    }
}

/// A capture backend that produces raw face samples.
///
/// Implementations are polled from the session's producer loop and must not
/// block: `poll_sample` returns the newest sample received since the last
/// call, or `None` if nothing new arrived.
pub trait FaceTrackingSource: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Whether this host can run the backend at all
    fn is_available(&self) -> bool;

    /// Whether starting needs a sensor (camera) permission grant
    fn requires_permission(&self) -> bool;

    /// Open sockets / launch helpers. Calling while running is a no-op.
    fn start(&mut self) -> Result<(), TrackingError>;

    /// Fetch the newest sample, if any
    fn poll_sample(&mut self) -> Result<Option<RawFaceSample>, TrackingError>;

    /// Release everything acquired by `start`. Idempotent.
    fn stop(&mut self);
}

/// Sensor access asked for by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Camera,
}

/// Grants or denies sensor access; the real prompt lives in the host shell.
pub trait PermissionProvider: Send + Sync {
    fn request(&self, sensor: SensorKind) -> bool;
}

/// Permission answer fixed up front (from configuration or tests)
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions {
    pub granted: bool,
}

impl PermissionProvider for StaticPermissions {
    fn request(&self, sensor: SensorKind) -> bool {
        tracing::debug!("Permission request for {:?}: granted={}", sensor, self.granted);
        self.granted
    }
}

/// Build the configured tracking source
pub fn create_source(config: &Config) -> Box<dyn FaceTrackingSource> {
    match config.tracking.source {
        SourceKind::MediaPipe => Box::new(mediapipe::MediaPipeSource::new(&config.mediapipe)),
        SourceKind::Vmc => Box::new(vmc::VmcSource::new(&config.vmc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_source_follows_config() {
        let mut config = Config::default();
        config.tracking.source = SourceKind::Vmc;
        let source = create_source(&config);
        assert_eq!(source.name(), "vmc");
        assert!(!source.requires_permission());

        config.tracking.source = SourceKind::MediaPipe;
        let source = create_source(&config);
        assert_eq!(source.name(), "mediapipe");
        assert!(source.requires_permission());
    }

    #[test]
    fn test_static_permissions() {
        assert!(StaticPermissions { granted: true }.request(SensorKind::Camera));
        assert!(!StaticPermissions { granted: false }.request(SensorKind::Camera));
    }
}
