//! Configuration parsing and management for facelink

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::avatar::ModelDescriptor;
use crate::error::{ConfigError, FacelinkError};
use crate::viewport::{Rect, ViewportTransform};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub mediapipe: MediaPipeConfig,
    pub vmc: VmcConfig,
    pub smoothing: SmoothingConfig,
    pub viewport: ViewportConfig,
    pub bridge: BridgeConfig,
    pub motions: MotionConfig,
    pub avatar: AvatarConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FacelinkError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, FacelinkError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, FacelinkError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Default location of the persisted preferences file
    pub fn settings_path() -> PathBuf {
        dirs_path().join("settings.toml")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FacelinkError> {
        let s = &self.smoothing;
        if !(s.factor > 0.0 && s.factor <= 1.0) {
            return Err(invalid("smoothing.factor", "Factor must be in (0.0, 1.0]"));
        }

        let v = &self.viewport;
        if v.min_scale <= 0.0 {
            return Err(invalid("viewport.min_scale", "Minimum scale must be greater than 0"));
        }
        if v.max_scale < v.min_scale {
            return Err(invalid(
                "viewport.max_scale",
                "Maximum scale must not be below minimum scale",
            ));
        }
        if v.drag_threshold_px < 0.0 {
            return Err(invalid("viewport.drag_threshold_px", "Threshold must not be negative"));
        }
        if v.baseline.scale <= 0.0 {
            return Err(invalid("viewport.baseline.scale", "Scale must be greater than 0"));
        }

        if self.tracking.capture_fps == 0 || self.tracking.capture_fps > 240 {
            return Err(invalid("tracking.capture_fps", "Capture rate must be between 1 and 240"));
        }

        if self.bridge.command_timeout_ms == 0 {
            return Err(invalid(
                "bridge.command_timeout_ms",
                "Timeout must be greater than 0",
            ));
        }

        if self.mediapipe.auto_launch && self.tracking.source == SourceKind::MediaPipe {
            let path = Path::new(&self.mediapipe.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "MediaPipe auto_launch enabled but tracker script not found at: {}",
                    self.mediapipe.tracker_script
                );
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> FacelinkError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Which capture backend feeds the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Camera frames through the MediaPipe face landmarker
    #[default]
    MediaPipe,
    /// Sensor-based trackers speaking the VMC/OSC protocol
    Vmc,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mediapipe" | "mp" | "camera" => Ok(Self::MediaPipe),
            "vmc" | "osc" | "sensor" => Ok(Self::Vmc),
            other => Err(format!("unknown tracking source '{}'", other)),
        }
    }
}

/// Capture-side session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Tracking backend
    pub source: SourceKind,
    /// Producer loop rate in Hz
    pub capture_fps: u32,
    /// Answer for sensor permission prompts (the host shell owns the real prompt)
    pub permission_granted: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::MediaPipe,
            capture_fps: 60,
            permission_granted: true,
        }
    }
}

/// MediaPipe face tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaPipeConfig {
    /// UDP port to receive MediaPipe data on
    pub port: u16,
    /// Listen address for UDP socket
    pub listen_address: String,
    /// Auto-launch the Python tracker subprocess
    pub auto_launch: bool,
    /// Path to mp_tracker.py script
    pub tracker_script: String,
    /// Camera device index
    pub camera_device: u32,
    /// Camera capture width
    pub capture_width: u32,
    /// Camera capture height
    pub capture_height: u32,
    /// Camera capture FPS
    pub capture_fps: u32,
    /// Directory to store/cache the MediaPipe model file
    pub model_dir: String,
    /// Auto-restart subprocess on crash
    pub auto_restart: bool,
    /// Delay before restarting crashed subprocess (seconds)
    pub restart_delay_secs: u64,
}

impl Default for MediaPipeConfig {
    fn default() -> Self {
        Self {
            port: 12346,
            listen_address: "127.0.0.1".to_string(),
            auto_launch: true,
            tracker_script: "scripts/mp_tracker.py".to_string(),
            camera_device: 0,
            capture_width: 640,
            capture_height: 480,
            capture_fps: 30,
            model_dir: ".".to_string(),
            auto_restart: true,
            restart_delay_secs: 3,
        }
    }
}

/// VMC protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmcConfig {
    /// Listen address for the OSC socket
    pub listen_address: String,
    /// VMC receiver port
    pub receiver_port: u16,
}

impl Default for VmcConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            receiver_port: 39539,
        }
    }
}

/// Exponential smoothing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Per-frame blend weight toward the target, in (0, 1]
    pub factor: f32,
    /// Multiplier applied to head angles before smoothing
    pub angle_scale: f32,
    /// Multiplier applied to eye ball offsets before smoothing
    pub eyeball_scale: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            factor: 0.3,
            angle_scale: 2.5,
            eyeball_scale: 1.0,
        }
    }
}

/// Viewport interaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Scale change per wheel notch
    pub wheel_step: f32,
    /// Cumulative |dx|+|dy| before a press becomes a drag
    pub drag_threshold_px: f32,
    /// Transform restored by reset
    pub baseline: ViewportTransform,
    /// Screen regions owned by overlay controls; presses there never start a drag
    pub reserved_regions: Vec<Rect>,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.05,
            max_scale: 2.0,
            wheel_step: 0.05,
            drag_threshold_px: 4.0,
            baseline: ViewportTransform::default(),
            reserved_regions: Vec::new(),
        }
    }
}

/// Bridge transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound on a single command round trip
    pub command_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 3000,
        }
    }
}

/// Motion group names played for tap hit regions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub head: String,
    pub body: String,
    pub generic: String,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            head: "TapHead".to_string(),
            body: "TapBody".to_string(),
            generic: "Tap".to_string(),
        }
    }
}

/// Avatar selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub model: ModelDescriptor,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            model: ModelDescriptor {
                name: "default".to_string(),
                url: "assets/default/model.json".to_string(),
            },
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("facelink");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/facelink");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/facelink");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("facelink");
        }
    }

    PathBuf::from(".")
}
