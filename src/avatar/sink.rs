//! Applies smoothed state to a rig's named parameters.

use super::model::AvatarModel;
use super::state::SmoothedParameterState;

/// Parameter names written by the sink
pub mod params {
    pub const ANGLE_X: &str = "ParamAngleX";
    pub const ANGLE_Y: &str = "ParamAngleY";
    pub const ANGLE_Z: &str = "ParamAngleZ";
    pub const EYE_L_OPEN: &str = "ParamEyeLOpen";
    pub const EYE_R_OPEN: &str = "ParamEyeROpen";
    pub const EYE_BALL_X: &str = "ParamEyeBallX";
    pub const EYE_BALL_Y: &str = "ParamEyeBallY";
    pub const MOUTH_OPEN_Y: &str = "ParamMouthOpenY";
    pub const BROW_L_Y: &str = "ParamBrowLY";
    pub const BROW_R_Y: &str = "ParamBrowRY";
}

/// Outcome of one frame's writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkReport {
    pub written: usize,
    pub skipped: usize,
}

/// Writes one frame of parameters to the current model
#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterSink;

impl ParameterSink {
    pub fn new() -> Self {
        Self
    }

    /// Apply state plus raw brows. A missing or unloaded model makes the
    /// whole frame a no-op; unsupported parameters are skipped one by one.
    pub fn apply(
        &self,
        model: Option<&dyn AvatarModel>,
        state: &SmoothedParameterState,
        brows: (f32, f32),
    ) -> SinkReport {
        let Some(model) = model else {
            return SinkReport::default();
        };
        if !model.is_loaded() {
            tracing::trace!("Model '{}' not loaded yet, skipping frame", model.name());
            return SinkReport::default();
        }

        let writes = [
            (params::ANGLE_X, state.angle_x),
            (params::ANGLE_Y, state.angle_y),
            (params::ANGLE_Z, state.angle_z),
            (params::EYE_L_OPEN, state.eye_open_l),
            (params::EYE_R_OPEN, state.eye_open_r),
            (params::EYE_BALL_X, state.eye_ball_x),
            (params::EYE_BALL_Y, state.eye_ball_y),
            (params::MOUTH_OPEN_Y, state.mouth_open),
            (params::BROW_L_Y, brows.0),
            (params::BROW_R_Y, brows.1),
        ];

        let mut report = SinkReport::default();
        for (name, value) in writes {
            if model.supports(name) {
                model.set_parameter(name, value);
                report.written += 1;
            } else {
                report.skipped += 1;
            }
        }

        if report.skipped > 0 {
            tracing::trace!(
                "Model '{}' lacks {} of {} parameters",
                model.name(),
                report.skipped,
                writes.len()
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::assets::RigModel;

    #[test]
    fn test_writes_supported_parameters() {
        let model = RigModel::builder("m")
            .parameters(&[params::ANGLE_X, params::MOUTH_OPEN_Y, params::BROW_L_Y])
            .build();
        let state = SmoothedParameterState {
            angle_x: 12.5,
            mouth_open: 0.8,
            ..Default::default()
        };

        let report = ParameterSink::new().apply(Some(&model as &dyn AvatarModel), &state, (0.3, -0.1));
        assert_eq!(report, SinkReport { written: 3, skipped: 7 });
        assert_eq!(model.parameter(params::ANGLE_X), Some(12.5));
        assert_eq!(model.parameter(params::MOUTH_OPEN_Y), Some(0.8));
        assert_eq!(model.parameter(params::BROW_L_Y), Some(0.3));
        assert_eq!(model.parameter(params::EYE_L_OPEN), None);
    }

    #[test]
    fn test_missing_model_is_noop() {
        let report = ParameterSink::new().apply(None, &SmoothedParameterState::default(), (0.0, 0.0));
        assert_eq!(report, SinkReport::default());
    }

    #[test]
    fn test_unloaded_model_is_noop() {
        let model = RigModel::builder("m").parameter(params::ANGLE_X).build();
        model.dispose();
        let report = ParameterSink::new().apply(
            Some(&model as &dyn AvatarModel),
            &SmoothedParameterState::default(),
            (0.0, 0.0),
        );
        assert_eq!(report.written, 0);
        assert_eq!(model.parameter(params::ANGLE_X), None);
    }
}
