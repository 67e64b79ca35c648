//! Exponential smoothing of tracked features.
//!
//! Each frame moves every dimension a fixed fraction of the way toward its
//! target: `state += (target - state) * factor`. With a constant target the
//! error shrinks by `(1 - factor)` per update.

use super::state::SmoothedParameterState;
use crate::config::SmoothingConfig;
use crate::tracking::FacialFeatureFrame;

/// Per-dimension exponential filter for the render loop
#[derive(Debug, Clone)]
pub struct ParameterSmoother {
    factor: f32,
    angle_scale: f32,
    eyeball_scale: f32,
    state: SmoothedParameterState,
    /// Latest raw brow values (left, right); not smoothed
    brows: (f32, f32),
}

impl ParameterSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            factor: config.factor.clamp(f32::EPSILON, 1.0),
            angle_scale: config.angle_scale,
            eyeball_scale: config.eyeball_scale,
            state: SmoothedParameterState::default(),
            brows: (0.0, 0.0),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Change responsiveness; clamped into (0, 1]
    pub fn set_factor(&mut self, factor: f32) {
        if factor.is_finite() {
            self.factor = factor.clamp(f32::EPSILON, 1.0);
        }
    }

    pub fn state(&self) -> &SmoothedParameterState {
        &self.state
    }

    pub fn brows(&self) -> (f32, f32) {
        self.brows
    }

    /// Scaled target for a frame
    pub fn target(&self, frame: &FacialFeatureFrame) -> SmoothedParameterState {
        SmoothedParameterState {
            angle_x: frame.angle_x * self.angle_scale,
            angle_y: frame.angle_y * self.angle_scale,
            angle_z: frame.angle_z * self.angle_scale,
            eye_ball_x: frame.eye_ball_x * self.eyeball_scale,
            eye_ball_y: frame.eye_ball_y * self.eyeball_scale,
            ..SmoothedParameterState::from_frame(frame)
        }
    }

    /// Advance one step toward the frame
    pub fn update(&mut self, frame: &FacialFeatureFrame) -> &SmoothedParameterState {
        let target = self.target(frame).to_array();
        let mut current = self.state.to_array();
        for (value, goal) in current.iter_mut().zip(target) {
            *value += (goal - *value) * self.factor;
        }
        self.state = SmoothedParameterState::from_array(current);
        self.brows = (frame.brow_l, frame.brow_r);
        &self.state
    }

    /// Back to the neutral pose (tracking restart or model swap)
    pub fn reset(&mut self) {
        self.state = SmoothedParameterState::default();
        self.brows = (0.0, 0.0);
    }
}

impl Default for ParameterSmoother {
    fn default() -> Self {
        Self::new(&SmoothingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(f: impl FnOnce(&mut FacialFeatureFrame)) -> FacialFeatureFrame {
        let mut frame = FacialFeatureFrame::neutral();
        f(&mut frame);
        frame
    }

    #[test]
    fn test_convergence_rate() {
        let mut smoother = ParameterSmoother::default();
        let frame = frame_with(|f| f.mouth_open = 1.0);

        for _ in 0..7 {
            smoother.update(&frame);
        }
        // 1 - 0.7^7
        let expected = 1.0 - 0.7f32.powi(7);
        assert!((smoother.state().mouth_open - expected).abs() < 1e-5);
        assert!(smoother.state().mouth_open > 0.9);
    }

    #[test]
    fn test_geometric_error_decay() {
        let config = SmoothingConfig {
            factor: 0.5,
            ..Default::default()
        };
        let mut smoother = ParameterSmoother::new(&config);
        let frame = frame_with(|f| f.angle_x = 4.0);
        let target = 4.0 * config.angle_scale;

        for n in 1..=10 {
            smoother.update(&frame);
            let expected_err = target * 0.5f32.powi(n);
            assert!((target - smoother.state().angle_x - expected_err).abs() < 1e-4);
        }
    }

    #[test]
    fn test_scales_applied() {
        let config = SmoothingConfig {
            factor: 1.0,
            angle_scale: 2.0,
            eyeball_scale: 0.5,
        };
        let mut smoother = ParameterSmoother::new(&config);
        let frame = frame_with(|f| {
            f.angle_x = 10.0;
            f.angle_y = -5.0;
            f.angle_z = 1.0;
            f.eye_ball_x = 0.8;
            f.eye_open_l = 0.4;
        });
        let state = *smoother.update(&frame);
        assert_eq!(state.angle_x, 20.0);
        assert_eq!(state.angle_y, -10.0);
        assert_eq!(state.angle_z, 2.0);
        assert_eq!(state.eye_ball_x, 0.4);
        assert_eq!(state.eye_open_l, 0.4);
    }

    #[test]
    fn test_brows_bypass_smoothing() {
        let mut smoother = ParameterSmoother::default();
        let frame = frame_with(|f| {
            f.brow_l = 0.6;
            f.brow_r = -0.2;
        });
        smoother.update(&frame);
        assert_eq!(smoother.brows(), (0.6, -0.2));
    }

    #[test]
    fn test_reset() {
        let mut smoother = ParameterSmoother::default();
        let frame = frame_with(|f| {
            f.angle_x = 30.0;
            f.eye_open_l = 0.0;
            f.mouth_open = 1.0;
            f.brow_l = 1.0;
        });
        for _ in 0..20 {
            smoother.update(&frame);
        }
        smoother.reset();
        assert_eq!(*smoother.state(), SmoothedParameterState::default());
        assert_eq!(smoother.brows(), (0.0, 0.0));
    }

    #[test]
    fn test_set_factor_clamps() {
        let mut smoother = ParameterSmoother::default();
        smoother.set_factor(3.0);
        assert_eq!(smoother.factor(), 1.0);
        smoother.set_factor(f32::NAN);
        assert_eq!(smoother.factor(), 1.0);
        smoother.set_factor(0.0);
        assert!(smoother.factor() > 0.0);
    }
}
