//! Model asset loading
//!
//! A rig is described by a JSON manifest listing its parameters, motion
//! groups and hit areas. [`ManifestLoader`] resolves a [`ModelDescriptor`] to
//! such a manifest and builds an in-memory [`RigModel`] from it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::model::{AvatarModel, ModelDescriptor};
use crate::error::RenderError;
use crate::viewport::{Placement, Rect};

/// Resolves a descriptor to a loaded model
pub trait AssetLoader: Send + Sync {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn AvatarModel>, RenderError>;
}

/// On-disk rig description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigManifest {
    pub parameters: Vec<String>,
    /// Motion group -> motion files
    pub motions: HashMap<String, Vec<String>>,
    pub hit_areas: Vec<HitArea>,
}

/// Named rectangle in model-local coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitArea {
    pub name: String,
    #[serde(flatten)]
    pub rect: Rect,
}

/// Loads manifests from the local filesystem
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    base_dir: PathBuf,
}

impl ManifestLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Map a model URL to a path on disk
    pub fn resolve(&self, url: &str) -> Result<PathBuf, String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err("remote models must be installed locally first".to_string());
        }

        let raw = url.strip_prefix("file://").unwrap_or(url);
        if raw.is_empty() {
            return Err("empty model URL".to_string());
        }

        let path = Path::new(raw);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        })
    }
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

impl AssetLoader for ManifestLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn AvatarModel>, RenderError> {
        let target_error = |message: String| RenderError::RenderTarget {
            name: descriptor.name.clone(),
            message,
        };

        let path = self.resolve(&descriptor.url).map_err(target_error)?;
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| target_error(format!("{}: {}", path.display(), e)))?;
        let manifest: RigManifest = serde_json::from_str(&contents)
            .map_err(|e| target_error(format!("invalid manifest {}: {}", path.display(), e)))?;

        if manifest.parameters.is_empty() {
            return Err(target_error("manifest declares no parameters".to_string()));
        }

        tracing::info!(
            "Loaded model '{}' ({} parameters, {} motion groups, {} hit areas)",
            descriptor.name,
            manifest.parameters.len(),
            manifest.motions.len(),
            manifest.hit_areas.len()
        );

        Ok(Arc::new(RigModel::from_manifest(&descriptor.name, manifest)))
    }
}

#[derive(Debug, Default)]
struct RigRuntime {
    values: HashMap<String, f32>,
    placement: Placement,
    played: Vec<String>,
}

/// In-memory rig: records parameter writes, placement and motion playback
#[derive(Debug)]
pub struct RigModel {
    name: String,
    parameters: HashSet<String>,
    motions: HashMap<String, Vec<String>>,
    hit_areas: Vec<HitArea>,
    loaded: AtomicBool,
    runtime: Mutex<RigRuntime>,
}

impl RigModel {
    pub fn from_manifest(name: &str, manifest: RigManifest) -> Self {
        Self {
            name: name.to_string(),
            parameters: manifest.parameters.into_iter().collect(),
            motions: manifest.motions,
            hit_areas: manifest.hit_areas,
            loaded: AtomicBool::new(true),
            runtime: Mutex::new(RigRuntime::default()),
        }
    }

    pub fn builder(name: &str) -> RigModelBuilder {
        RigModelBuilder {
            name: name.to_string(),
            manifest: RigManifest::default(),
        }
    }

    /// Last value written to a parameter
    pub fn parameter(&self, parameter: &str) -> Option<f32> {
        self.runtime.lock().values.get(parameter).copied()
    }

    pub fn placement(&self) -> Placement {
        self.runtime.lock().placement
    }

    /// Motion groups played so far, oldest first
    pub fn played_motions(&self) -> Vec<String> {
        self.runtime.lock().played.clone()
    }

    /// Mark the rig as torn down; further writes are ignored
    pub fn dispose(&self) {
        self.loaded.store(false, Ordering::Release);
    }
}

impl AvatarModel for RigModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn supports(&self, parameter: &str) -> bool {
        self.parameters.contains(parameter)
    }

    fn set_parameter(&self, parameter: &str, value: f32) {
        if !self.is_loaded() || !self.supports(parameter) {
            return;
        }
        self.runtime.lock().values.insert(parameter.to_string(), value);
    }

    fn has_motion_group(&self, group: &str) -> bool {
        self.motions.get(group).is_some_and(|files| !files.is_empty())
    }

    fn play_motion(&self, group: &str) -> bool {
        if !self.is_loaded() || !self.has_motion_group(group) {
            return false;
        }
        self.runtime.lock().played.push(group.to_string());
        true
    }

    fn set_placement(&self, placement: Placement) {
        self.runtime.lock().placement = placement;
    }

    fn hit_test(&self, x: f32, y: f32) -> Vec<String> {
        let (lx, ly) = self.runtime.lock().placement.to_local(x, y);
        self.hit_areas
            .iter()
            .filter(|area| area.rect.contains(lx, ly))
            .map(|area| area.name.clone())
            .collect()
    }
}

/// Programmatic rig construction
#[derive(Debug)]
pub struct RigModelBuilder {
    name: String,
    manifest: RigManifest,
}

impl RigModelBuilder {
    pub fn parameter(mut self, name: &str) -> Self {
        self.manifest.parameters.push(name.to_string());
        self
    }

    pub fn parameters(mut self, names: &[&str]) -> Self {
        self.manifest
            .parameters
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn motion(mut self, group: &str, file: &str) -> Self {
        self.manifest
            .motions
            .entry(group.to_string())
            .or_default()
            .push(file.to_string());
        self
    }

    pub fn hit_area(mut self, name: &str, rect: Rect) -> Self {
        self.manifest.hit_areas.push(HitArea {
            name: name.to_string(),
            rect,
        });
        self
    }

    pub fn build(self) -> RigModel {
        RigModel::from_manifest(&self.name, self.manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"{
        "parameters": ["ParamAngleX", "ParamMouthOpenY"],
        "motions": { "TapHead": ["motions/head.motion3.json"], "Idle": [] },
        "hit_areas": [
            { "name": "Head", "x": -50.0, "y": -200.0, "width": 100.0, "height": 100.0 },
            { "name": "Body", "x": -80.0, "y": -100.0, "width": 160.0, "height": 250.0 }
        ]
    }"#;

    fn write_manifest(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("model.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_from_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(dir.path(), MANIFEST);
        let loader = ManifestLoader::new(dir.path());

        let model = loader
            .load(&ModelDescriptor {
                name: "hiyori".into(),
                url: format!("file://{}", path.display()),
            })
            .unwrap();

        assert_eq!(model.name(), "hiyori");
        assert!(model.is_loaded());
        assert!(model.supports("ParamMouthOpenY"));
        assert!(!model.supports("ParamBrowLY"));
        assert!(model.has_motion_group("TapHead"));
        assert!(!model.has_motion_group("Idle"));
    }

    #[test]
    fn test_load_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), MANIFEST);
        let loader = ManifestLoader::new(dir.path());
        let model = loader.load(&ModelDescriptor {
            name: "rel".into(),
            url: "model.json".into(),
        });
        assert!(model.is_ok());
    }

    #[test]
    fn test_load_failures_are_render_target_errors() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ManifestLoader::new(dir.path());

        let missing = loader.load(&ModelDescriptor {
            name: "ghost".into(),
            url: "nope.json".into(),
        });
        assert!(matches!(missing, Err(RenderError::RenderTarget { .. })));

        write_manifest(dir.path(), "{ not json");
        let broken = loader.load(&ModelDescriptor {
            name: "broken".into(),
            url: "model.json".into(),
        });
        assert!(matches!(broken, Err(RenderError::RenderTarget { .. })));

        let remote = loader.load(&ModelDescriptor {
            name: "remote".into(),
            url: "https://example.com/model.json".into(),
        });
        assert!(matches!(remote, Err(RenderError::RenderTarget { .. })));
    }

    #[test]
    fn test_hit_test_follows_placement() {
        let manifest: RigManifest = serde_json::from_str(MANIFEST).unwrap();
        let model = RigModel::from_manifest("m", manifest);

        assert_eq!(model.hit_test(0.0, -150.0), vec!["Head".to_string()]);
        assert_eq!(model.hit_test(0.0, 0.0), vec!["Body".to_string()]);
        assert!(model.hit_test(500.0, 500.0).is_empty());

        model.set_placement(Placement {
            anchor_x: 400.0,
            anchor_y: 300.0,
            scale: 2.0,
            rotation_radians: 0.0,
        });
        // Head spans local y -200..-100, i.e. screen y -100..100 at scale 2
        assert_eq!(model.hit_test(400.0, 0.0), vec!["Head".to_string()]);
        assert!(model.hit_test(0.0, -150.0).is_empty());
    }

    #[test]
    fn test_disposed_rig_ignores_writes() {
        let model = RigModel::builder("m")
            .parameter("ParamAngleX")
            .motion("Tap", "tap.json")
            .build();
        model.set_parameter("ParamAngleX", 3.0);
        assert_eq!(model.parameter("ParamAngleX"), Some(3.0));

        model.dispose();
        model.set_parameter("ParamAngleX", 9.0);
        assert_eq!(model.parameter("ParamAngleX"), Some(3.0));
        assert!(!model.play_motion("Tap"));
    }
}
