//! Facial feature extraction
//!
//! Turns a raw tracker sample (ARKit-style blendshape coefficients plus a 4x4
//! head transform) into the normalized [`FacialFeatureFrame`] the render side
//! consumes. Extraction is pure and total: missing or non-finite coefficients
//! read as 0, and every bounded field is clamped.
//!
//! Angle convention: the head rotation is taken to be `Ry(yaw) * Rx(pitch) *
//! Rz(roll)` (column vectors). With `mRC` the 1-based row/column element,
//! `pitch = asin(-m23)`, `yaw = atan2(m13, m33)`, `roll = atan2(m21, m22)`,
//! and the frame carries `angleX = yaw`, `angleY = pitch`, `angleZ = roll` in
//! degrees with no sign flips.

use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::RawFaceSample;

/// Common ARKit blendshape names
pub mod blendshapes {
    pub const BROW_DOWN_LEFT: &str = "browDownLeft";
    pub const BROW_DOWN_RIGHT: &str = "browDownRight";
    pub const BROW_OUTER_UP_LEFT: &str = "browOuterUpLeft";
    pub const BROW_OUTER_UP_RIGHT: &str = "browOuterUpRight";

    pub const EYE_BLINK_LEFT: &str = "eyeBlinkLeft";
    pub const EYE_BLINK_RIGHT: &str = "eyeBlinkRight";
    pub const EYE_LOOK_DOWN_LEFT: &str = "eyeLookDownLeft";
    pub const EYE_LOOK_DOWN_RIGHT: &str = "eyeLookDownRight";
    pub const EYE_LOOK_IN_LEFT: &str = "eyeLookInLeft";
    pub const EYE_LOOK_IN_RIGHT: &str = "eyeLookInRight";
    pub const EYE_LOOK_OUT_LEFT: &str = "eyeLookOutLeft";
    pub const EYE_LOOK_OUT_RIGHT: &str = "eyeLookOutRight";
    pub const EYE_LOOK_UP_LEFT: &str = "eyeLookUpLeft";
    pub const EYE_LOOK_UP_RIGHT: &str = "eyeLookUpRight";

    pub const JAW_OPEN: &str = "jawOpen";
}

/// One normalized tracking frame. Angles are degrees; the rest are unitless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacialFeatureFrame {
    pub angle_x: f32,
    pub angle_y: f32,
    pub angle_z: f32,
    /// 0 = closed, 1 = open
    pub eye_open_l: f32,
    pub eye_open_r: f32,
    /// -1..1, positive toward the subject's left
    pub eye_ball_x: f32,
    /// -1..1, positive up
    pub eye_ball_y: f32,
    pub mouth_open: f32,
    pub brow_l: f32,
    pub brow_r: f32,
}

impl FacialFeatureFrame {
    /// Face at rest, looking straight ahead with eyes open
    pub fn neutral() -> Self {
        Self {
            angle_x: 0.0,
            angle_y: 0.0,
            angle_z: 0.0,
            eye_open_l: 1.0,
            eye_open_r: 1.0,
            eye_ball_x: 0.0,
            eye_ball_y: 0.0,
            mouth_open: 0.0,
            brow_l: 0.0,
            brow_r: 0.0,
        }
    }

    /// Whether every field is a finite number
    pub fn is_finite(&self) -> bool {
        [
            self.angle_x,
            self.angle_y,
            self.angle_z,
            self.eye_open_l,
            self.eye_open_r,
            self.eye_ball_x,
            self.eye_ball_y,
            self.mouth_open,
            self.brow_l,
            self.brow_r,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Whether bounded fields sit in their documented ranges: eye openness
    /// and mouth in [0,1], gaze and brows in [-1,1]. Angles are unbounded.
    pub fn is_in_range(&self) -> bool {
        let unit = 0.0..=1.0;
        let signed = -1.0..=1.0;
        self.is_finite()
            && [self.eye_open_l, self.eye_open_r, self.mouth_open]
                .iter()
                .all(|v| unit.contains(v))
            && [self.eye_ball_x, self.eye_ball_y, self.brow_l, self.brow_r]
                .iter()
                .all(|v| signed.contains(v))
    }
}

impl Default for FacialFeatureFrame {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Extract a feature frame from one raw tracker sample.
pub fn extract(sample: &RawFaceSample) -> FacialFeatureFrame {
    use blendshapes::*;

    let bs = &sample.blendshapes;
    let get = |key: &str| coefficient(bs, key);

    let angles = head_angles(&sample.transform);

    let eye_open_l = (1.0 - get(EYE_BLINK_LEFT)).clamp(0.0, 1.0);
    let eye_open_r = (1.0 - get(EYE_BLINK_RIGHT)).clamp(0.0, 1.0);

    // Mirrored: the left eye looks "out" and the right eye looks "in" when
    // the gaze moves toward the subject's left.
    let left_x = get(EYE_LOOK_OUT_LEFT) - get(EYE_LOOK_IN_LEFT);
    let right_x = get(EYE_LOOK_IN_RIGHT) - get(EYE_LOOK_OUT_RIGHT);
    let eye_ball_x = ((left_x + right_x) * 0.5).clamp(-1.0, 1.0);

    let left_y = get(EYE_LOOK_UP_LEFT) - get(EYE_LOOK_DOWN_LEFT);
    let right_y = get(EYE_LOOK_UP_RIGHT) - get(EYE_LOOK_DOWN_RIGHT);
    let eye_ball_y = ((left_y + right_y) * 0.5).clamp(-1.0, 1.0);

    FacialFeatureFrame {
        angle_x: angles.yaw,
        angle_y: angles.pitch,
        angle_z: angles.roll,
        eye_open_l,
        eye_open_r,
        eye_ball_x,
        eye_ball_y,
        mouth_open: get(JAW_OPEN).clamp(0.0, 1.0),
        brow_l: (get(BROW_OUTER_UP_LEFT) - get(BROW_DOWN_LEFT)).clamp(-1.0, 1.0),
        brow_r: (get(BROW_OUTER_UP_RIGHT) - get(BROW_DOWN_RIGHT)).clamp(-1.0, 1.0),
    }
}

/// Decompose the rotation part of a head transform into pitch/yaw/roll degrees.
pub fn head_angles(transform: &Mat4) -> HeadAngles {
    let m = |row: usize, col: usize| -> f32 { transform.col(col - 1)[row - 1] };

    // Clamp guards asin against drift past +/-1 near gimbal lock
    let pitch = (-m(2, 3)).clamp(-1.0, 1.0).asin();
    let yaw = m(1, 3).atan2(m(3, 3));
    let roll = m(2, 1).atan2(m(2, 2));

    let angles = HeadAngles {
        pitch: pitch.to_degrees(),
        yaw: yaw.to_degrees(),
        roll: roll.to_degrees(),
    };

    if angles.pitch.is_finite() && angles.yaw.is_finite() && angles.roll.is_finite() {
        angles
    } else {
        HeadAngles::default()
    }
}

fn coefficient(map: &HashMap<String, f32>, key: &str) -> f32 {
    match map.get(key) {
        Some(v) if v.is_finite() => *v,
        _ => 0.0,
    }
}
