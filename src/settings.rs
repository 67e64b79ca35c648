//! Persisted user preferences
//!
//! The host shell owns the real key-value store; the pipeline only reads and
//! writes a handful of string keys through [`SettingsStore`]. The standalone
//! binary keeps them in a flat TOML table.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::avatar::ModelDescriptor;
use crate::config::Config;
use crate::error::{ConfigError, FacelinkError};

pub mod keys {
    pub const SMOOTHING_FACTOR: &str = "smoothing.factor";
    pub const VIEWPORT_SCALE: &str = "viewport.scale";
    pub const VIEWPORT_ROTATION: &str = "viewport.rotation";
    pub const MODEL_URL: &str = "avatar.model_url";
}

/// String key-value storage provided by the host
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// Process-local store, used when no host store is attached
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }
}

/// Store backed by a TOML file, rewritten on every `set`
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileSettings {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FacelinkError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFile(format!("{}: {}", path.display(), e)))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Settings store at {} ({} keys)", path.display(), values.len());
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), FacelinkError> {
        let contents = toml::to_string(values).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&values) {
            tracing::warn!("Failed to save settings to {}: {}", self.path.display(), e);
        }
    }
}

/// Typed view of the stored preferences
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub smoothing_factor: f32,
    pub scale: f32,
    pub rotation_degrees: f32,
    pub model: ModelDescriptor,
}

impl Preferences {
    /// Read stored values, falling back to the config for anything missing
    /// or unparseable
    pub fn load(store: &dyn SettingsStore, config: &Config) -> Self {
        let factor = read_f32(store, keys::SMOOTHING_FACTOR)
            .filter(|f| *f > 0.0 && *f <= 1.0)
            .unwrap_or(config.smoothing.factor);

        let (min, max) = (config.viewport.min_scale, config.viewport.max_scale);
        let scale = read_f32(store, keys::VIEWPORT_SCALE)
            .map(|s| s.clamp(min, max))
            .unwrap_or(config.viewport.baseline.scale);

        let rotation_degrees = read_f32(store, keys::VIEWPORT_ROTATION)
            .unwrap_or(config.viewport.baseline.rotation_degrees);

        let model = match store.get(keys::MODEL_URL) {
            Some(url) if !url.trim().is_empty() => ModelDescriptor {
                name: model_name_from_url(&url),
                url,
            },
            _ => config.avatar.model.clone(),
        };

        Self {
            smoothing_factor: factor,
            scale,
            rotation_degrees,
            model,
        }
    }

    pub fn save(&self, store: &dyn SettingsStore) {
        store.set(keys::SMOOTHING_FACTOR, &self.smoothing_factor.to_string());
        store.set(keys::VIEWPORT_SCALE, &self.scale.to_string());
        store.set(keys::VIEWPORT_ROTATION, &self.rotation_degrees.to_string());
        store.set(keys::MODEL_URL, &self.model.url);
    }

    /// Fold the preferences into a config for the render side
    pub fn apply_to(&self, config: &mut Config) {
        config.smoothing.factor = self.smoothing_factor;
        config.viewport.baseline.scale = self.scale;
        config.viewport.baseline.rotation_degrees = self.rotation_degrees;
        config.avatar.model = self.model.clone();
    }
}

fn read_f32(store: &dyn SettingsStore, key: &str) -> Option<f32> {
    let raw = store.get(key)?;
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            tracing::warn!("Ignoring invalid stored value for {}: '{}'", key, raw);
            None
        }
    }
}

/// Display name for a model URL: `.../hiyori/model.json` -> `hiyori`
pub fn model_name_from_url(url: &str) -> String {
    let path = url.strip_prefix("file://").unwrap_or(url);
    let mut parts = path.rsplit(['/', '\\']).filter(|p| !p.is_empty());
    let file = parts.next().unwrap_or(path);
    let stem = file.split('.').next().unwrap_or(file);
    match parts.next() {
        Some(dir) if stem == "model" || stem.is_empty() => dir.to_string(),
        _ => stem.to_string(),
    }
}
