//! Tap hit regions -> motion playback

use super::model::AvatarModel;
use crate::config::MotionConfig;

/// Hit region names recognised by the dispatcher
pub const HEAD_AREA: &str = "Head";
pub const BODY_AREA: &str = "Body";

/// Picks the motion group for a tap and plays it
#[derive(Debug, Clone)]
pub struct MotionDispatcher {
    groups: MotionConfig,
}

impl MotionDispatcher {
    pub fn new(groups: MotionConfig) -> Self {
        Self { groups }
    }

    /// Head beats Body beats anything else
    pub fn select<S: AsRef<str>>(&self, hits: &[S]) -> &str {
        let has = |area: &str| hits.iter().any(|h| h.as_ref() == area);
        if has(HEAD_AREA) {
            &self.groups.head
        } else if has(BODY_AREA) {
            &self.groups.body
        } else {
            &self.groups.generic
        }
    }

    /// Fire-and-forget. A rig without the group is left alone.
    pub fn dispatch<S: AsRef<str>>(&self, model: &dyn AvatarModel, hits: &[S]) -> Option<String> {
        let group = self.select(hits);
        if !model.is_loaded() || !model.has_motion_group(group) {
            tracing::debug!("Model '{}' has no motion group '{}'", model.name(), group);
            return None;
        }
        model.play_motion(group).then(|| group.to_string())
    }
}

impl Default for MotionDispatcher {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::assets::RigModel;

    #[test]
    fn test_priority() {
        let dispatcher = MotionDispatcher::default();
        assert_eq!(dispatcher.select(&["Body", "Head"]), "TapHead");
        assert_eq!(dispatcher.select(&["Body"]), "TapBody");
        assert_eq!(dispatcher.select(&["Arm"]), "Tap");
        assert_eq!(dispatcher.select::<&str>(&[]), "Tap");
    }

    #[test]
    fn test_dispatch_plays_group() {
        let model = RigModel::builder("m")
            .motion("TapHead", "head.json")
            .motion("Tap", "tap.json")
            .build();
        let dispatcher = MotionDispatcher::default();

        assert_eq!(dispatcher.dispatch(&model, &["Head"]), Some("TapHead".to_string()));
        assert_eq!(dispatcher.dispatch(&model, &["Tail"]), Some("Tap".to_string()));
        assert_eq!(model.played_motions(), vec!["TapHead", "Tap"]);
    }

    #[test]
    fn test_missing_group_is_silent() {
        let model = RigModel::builder("m").motion("TapHead", "head.json").build();
        let dispatcher = MotionDispatcher::default();
        assert_eq!(dispatcher.dispatch(&model, &["Body"]), None);
        assert!(model.played_motions().is_empty());
    }
}
