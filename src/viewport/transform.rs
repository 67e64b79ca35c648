//! Viewport transform and its projection onto the render surface

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Scale, rotation and pan applied to the avatar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportTransform {
    pub scale: f32,
    pub rotation_degrees: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation_degrees: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl ViewportTransform {
    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.offset_x, self.offset_y)
    }

    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset_x = offset.x;
        self.offset_y = offset.y;
    }

    pub fn is_finite(&self) -> bool {
        self.scale.is_finite()
            && self.rotation_degrees.is_finite()
            && self.offset_x.is_finite()
            && self.offset_y.is_finite()
    }

    /// Project onto a surface: anchor at surface center plus offset
    pub fn project(&self, surface: SurfaceSize) -> Placement {
        let center = surface.center();
        Placement {
            anchor_x: center.x + self.offset_x,
            anchor_y: center.y + self.offset_y,
            scale: self.scale,
            rotation_radians: self.rotation_degrees.to_radians(),
        }
    }
}

/// Render surface dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

/// Where and how the renderer draws the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub scale: f32,
    pub rotation_radians: f32,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            anchor_x: 0.0,
            anchor_y: 0.0,
            scale: 1.0,
            rotation_radians: 0.0,
        }
    }
}

impl Placement {
    /// Screen point -> model-local point
    pub fn to_local(&self, x: f32, y: f32) -> (f32, f32) {
        let relative = Vec2::new(x - self.anchor_x, y - self.anchor_y);
        let unrotated = Vec2::from_angle(-self.rotation_radians).rotate(relative);
        let scale = if self.scale.abs() > f32::EPSILON {
            self.scale
        } else {
            f32::EPSILON
        };
        let local = unrotated / scale;
        (local.x, local.y)
    }

    /// Model-local point -> screen point
    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        let scaled = Vec2::new(x, y) * self.scale;
        let rotated = Vec2::from_angle(self.rotation_radians).rotate(scaled);
        (rotated.x + self.anchor_x, rotated.y + self.anchor_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_anchor() {
        let transform = ViewportTransform {
            scale: 0.5,
            rotation_degrees: 90.0,
            offset_x: 10.0,
            offset_y: -20.0,
        };
        let placement = transform.project(SurfaceSize::new(800.0, 600.0));
        assert_eq!(placement.anchor_x, 410.0);
        assert_eq!(placement.anchor_y, 280.0);
        assert_eq!(placement.scale, 0.5);
        assert!((placement.rotation_radians - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let transform = ViewportTransform::default();
        let surface = SurfaceSize::new(1280.0, 720.0);
        assert_eq!(transform.project(surface), transform.project(surface));
    }

    #[test]
    fn test_local_screen_inverse() {
        let placement = Placement {
            anchor_x: 300.0,
            anchor_y: 200.0,
            scale: 1.5,
            rotation_radians: 0.7,
        };
        let (sx, sy) = placement.to_screen(12.0, -40.0);
        let (lx, ly) = placement.to_local(sx, sy);
        assert!((lx - 12.0).abs() < 1e-3);
        assert!((ly + 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_negative_surface_clamped() {
        let surface = SurfaceSize::new(-5.0, 10.0);
        assert_eq!(surface.width, 0.0);
        assert_eq!(surface.center(), Vec2::new(0.0, 5.0));
    }
}
