//! Smoothed animation state owned by the render loop

use serde::{Deserialize, Serialize};

use crate::tracking::FacialFeatureFrame;

/// The eight smoothed dimensions driving the rig.
///
/// Brows are not part of this state; they are applied raw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmoothedParameterState {
    pub angle_x: f32,
    pub angle_y: f32,
    pub angle_z: f32,
    pub eye_open_l: f32,
    pub eye_open_r: f32,
    pub eye_ball_x: f32,
    pub eye_ball_y: f32,
    pub mouth_open: f32,
}

impl Default for SmoothedParameterState {
    fn default() -> Self {
        Self {
            angle_x: 0.0,
            angle_y: 0.0,
            angle_z: 0.0,
            eye_open_l: 1.0,
            eye_open_r: 1.0,
            eye_ball_x: 0.0,
            eye_ball_y: 0.0,
            mouth_open: 0.0,
        }
    }
}

impl SmoothedParameterState {
    pub const DIMENSIONS: usize = 8;

    /// Unscaled state matching a frame exactly
    pub fn from_frame(frame: &FacialFeatureFrame) -> Self {
        Self {
            angle_x: frame.angle_x,
            angle_y: frame.angle_y,
            angle_z: frame.angle_z,
            eye_open_l: frame.eye_open_l,
            eye_open_r: frame.eye_open_r,
            eye_ball_x: frame.eye_ball_x,
            eye_ball_y: frame.eye_ball_y,
            mouth_open: frame.mouth_open,
        }
    }

    pub fn to_array(&self) -> [f32; Self::DIMENSIONS] {
        [
            self.angle_x,
            self.angle_y,
            self.angle_z,
            self.eye_open_l,
            self.eye_open_r,
            self.eye_ball_x,
            self.eye_ball_y,
            self.mouth_open,
        ]
    }

    pub fn from_array(values: [f32; Self::DIMENSIONS]) -> Self {
        let [angle_x, angle_y, angle_z, eye_open_l, eye_open_r, eye_ball_x, eye_ball_y, mouth_open] =
            values;
        Self {
            angle_x,
            angle_y,
            angle_z,
            eye_open_l,
            eye_open_r,
            eye_ball_x,
            eye_ball_y,
            mouth_open,
        }
    }
}
