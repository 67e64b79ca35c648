//! Avatar model handle and the slot that owns it
//!
//! The renderer is opaque: a model only exposes named parameters, named
//! motion groups, a placement and a hit-test. Models are never mutated into a
//! different rig; a swap replaces the whole handle.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::viewport::Placement;

/// Where to find a model (`file://` URL or plain path)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub url: String,
}

/// A loaded rig as seen by the pipeline
pub trait AvatarModel: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// False while the rig is still initializing or after disposal
    fn is_loaded(&self) -> bool;

    /// Whether the rig exposes a parameter with this name
    fn supports(&self, parameter: &str) -> bool;

    fn set_parameter(&self, parameter: &str, value: f32);

    fn has_motion_group(&self, group: &str) -> bool;

    /// Start a motion from the group. Returns false if the group is absent.
    fn play_motion(&self, group: &str) -> bool;

    fn set_placement(&self, placement: Placement);

    /// Names of hit regions under a screen-space point
    fn hit_test(&self, x: f32, y: f32) -> Vec<String>;
}

/// Holds the current model; replaced in one step on swap
#[derive(Default)]
pub struct ModelSlot {
    current: RwLock<Option<Arc<dyn AvatarModel>>>,
    version: AtomicU64,
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSlot")
            .field("model", &self.current.read().as_ref().map(|m| m.name().to_string()))
            .field("version", &self.version())
            .finish()
    }
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the model (or clear it) and bump the version
    pub fn swap(&self, model: Option<Arc<dyn AvatarModel>>) -> u64 {
        let mut current = self.current.write();
        let old = std::mem::replace(&mut *current, model);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(
            "Avatar model swapped: {} -> {} (v{})",
            old.as_ref().map(|m| m.name()).unwrap_or("<none>"),
            current.as_ref().map(|m| m.name()).unwrap_or("<none>"),
            version
        );
        version
    }

    /// Consistent (version, model) pair for one frame's writes
    pub fn snapshot(&self) -> (u64, Option<Arc<dyn AvatarModel>>) {
        let current = self.current.read();
        (self.version.load(Ordering::Acquire), current.clone())
    }

    pub fn current(&self) -> Option<Arc<dyn AvatarModel>> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::assets::RigModel;

    fn rig(name: &str) -> Arc<dyn AvatarModel> {
        Arc::new(RigModel::builder(name).parameter("ParamAngleX").build())
    }

    #[test]
    fn test_swap_bumps_version() {
        let slot = ModelSlot::new();
        assert_eq!(slot.version(), 0);
        assert!(slot.current().is_none());

        assert_eq!(slot.swap(Some(rig("a"))), 1);
        assert_eq!(slot.current().unwrap().name(), "a");

        assert_eq!(slot.swap(Some(rig("b"))), 2);
        let (version, model) = slot.snapshot();
        assert_eq!(version, 2);
        assert_eq!(model.unwrap().name(), "b");

        slot.swap(None);
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_snapshot_outlives_swap() {
        let slot = ModelSlot::new();
        slot.swap(Some(rig("old")));
        let (_, held) = slot.snapshot();
        slot.swap(Some(rig("new")));

        // The old handle is still whole while anything holds it
        let held = held.unwrap();
        assert_eq!(held.name(), "old");
        assert!(held.supports("ParamAngleX"));
    }

    #[test]
    fn test_concurrent_swaps_are_whole() {
        let slot = Arc::new(ModelSlot::new());
        slot.swap(Some(rig("m0")));

        let writer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                for i in 1..200 {
                    slot.swap(Some(rig(&format!("m{}", i))));
                }
            })
        };

        for _ in 0..500 {
            let (_, model) = slot.snapshot();
            let model = model.unwrap();
            assert!(model.name().starts_with('m'));
            assert!(model.supports("ParamAngleX"));
        }
        writer.join().unwrap();
        assert_eq!(slot.version(), 200);
    }
}
