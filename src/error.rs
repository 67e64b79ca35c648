//! Error types for facelink

use thiserror::Error;

/// Main error type for facelink
#[derive(Error, Debug)]
pub enum FacelinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Capture-side errors (device, permission, tracker I/O)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error("Face tracking is not supported on this device: {0}")]
    DeviceUnsupported(String),

    #[error("Sensor permission denied: {0}")]
    PermissionDenied(String),

    #[error("Tracker receiver error: {0}")]
    Receiver(String),

    #[error("Tracker parse error: {0}")]
    Parse(String),

    #[error("Tracker subprocess error: {0}")]
    Subprocess(String),
}

/// Errors crossing the capture/render boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// No boundary link was ever attached (running outside the hosting shell)
    #[error("No bridge channel available")]
    NoChannel,

    #[error("Bridge transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Bridge command '{command}' timed out after {millis} ms")]
    Timeout { command: String, millis: u64 },

    #[error("Malformed payload for '{command}': {message}")]
    DataFormat { command: String, message: String },

    /// The far side answered, but reported a failure in the payload
    #[error("Command '{command}' failed: {message}")]
    Rejected { command: String, message: String },
}

impl BridgeError {
    /// Whether the failure is due to the link itself rather than the command
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NoChannel | Self::TransportUnavailable(_) | Self::Timeout { .. }
        )
    }
}

/// Render-domain errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Failed to load avatar model '{name}': {message}")]
    RenderTarget { name: String, message: String },

    #[error("Render loop is not running")]
    LoopClosed,
}

/// Result type alias for facelink operations
pub type Result<T> = std::result::Result<T, FacelinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(BridgeError::NoChannel.is_transport());
        assert!(BridgeError::Timeout {
            command: "GetFaceTrackingStatus".into(),
            millis: 10
        }
        .is_transport());
        assert!(!BridgeError::DataFormat {
            command: "x".into(),
            message: "y".into()
        }
        .is_transport());
    }

    #[test]
    fn test_wraps_into_top_level() {
        let err: FacelinkError = TrackingError::PermissionDenied("camera".into()).into();
        assert!(err.to_string().contains("permission denied"));
    }
}
