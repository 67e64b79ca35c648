//! Viewport module
//!
//! Owns the avatar's on-screen transform and turns pointer, wheel and pinch
//! input into pan/zoom changes. Independent of the tracking pipeline.

pub mod gesture;
pub mod transform;

pub use gesture::{DragTracker, GestureEvent, PinchTracker, Rect};
pub use transform::{Placement, SurfaceSize, ViewportTransform};

use glam::Vec2;

use crate::config::ViewportConfig;

/// A tap that should go to hit-testing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    pub x: f32,
    pub y: f32,
}

/// Pan/zoom/rotation state plus the drag/tap state machine
#[derive(Debug, Clone)]
pub struct ViewportController {
    transform: ViewportTransform,
    surface: SurfaceSize,
    min_scale: f32,
    max_scale: f32,
    wheel_step: f32,
    drag: DragTracker,
    pinch: PinchTracker,
}

impl ViewportController {
    pub fn new(config: &ViewportConfig) -> Self {
        let mut controller = Self {
            transform: ViewportTransform::default(),
            surface: SurfaceSize::default(),
            min_scale: config.min_scale,
            max_scale: config.max_scale.max(config.min_scale),
            wheel_step: config.wheel_step,
            drag: DragTracker::new(config.drag_threshold_px, config.reserved_regions.clone()),
            pinch: PinchTracker::default(),
        };
        controller.reset_to_default(&config.baseline);
        controller
    }

    pub fn transform(&self) -> &ViewportTransform {
        &self.transform
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn scale_range(&self) -> (f32, f32) {
        (self.min_scale, self.max_scale)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Overwrite every field. Non-finite or non-positive input is refused.
    pub fn set_transform(&mut self, scale: f32, rotation_degrees: f32, x: f32, y: f32) -> bool {
        let next = ViewportTransform {
            scale,
            rotation_degrees,
            offset_x: x,
            offset_y: y,
        };
        if !next.is_finite() || scale <= 0.0 {
            tracing::warn!("Ignoring invalid viewport transform: {:?}", next);
            return false;
        }
        self.transform = next;
        true
    }

    /// Restore a baseline exactly and abandon any gesture in progress
    pub fn reset_to_default(&mut self, baseline: &ViewportTransform) {
        self.drag.cancel();
        self.pinch.end();
        if !self.set_transform(
            baseline.scale,
            baseline.rotation_degrees,
            baseline.offset_x,
            baseline.offset_y,
        ) {
            self.transform = ViewportTransform::default();
        }
    }

    /// Current placement on the render surface. Pure; safe to call every frame.
    pub fn apply_to_target(&self) -> Placement {
        self.transform.project(self.surface)
    }

    /// Record a new surface size and reproject
    pub fn resize(&mut self, width: f32, height: f32) -> Placement {
        self.surface = SurfaceSize::new(width, height);
        self.apply_to_target()
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> GestureEvent {
        self.drag.pointer_down(Vec2::new(x, y), self.transform.offset())
    }

    /// True if the offset changed
    pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        match self.drag.pointer_move(Vec2::new(x, y)) {
            Some(GestureEvent::Dragged { offset }) => {
                self.transform.set_offset(offset);
                true
            }
            _ => false,
        }
    }

    /// A tap if the press never became a drag; otherwise the drag's final
    /// offset is committed
    pub fn pointer_up(&mut self, x: f32, y: f32) -> Option<Tap> {
        match self.drag.pointer_up(Vec2::new(x, y)) {
            Some(GestureEvent::Tap { x, y }) => Some(Tap { x, y }),
            Some(GestureEvent::Released { offset }) => {
                self.transform.set_offset(offset);
                None
            }
            _ => None,
        }
    }

    pub fn pointer_leave(&mut self) {
        if self.drag.pointer_leave().is_some() {
            tracing::trace!("Pointer left surface, gesture cancelled");
        }
    }

    /// One wheel event. Positive delta (scroll down) zooms out by one step.
    pub fn wheel(&mut self, delta: f32) -> f32 {
        if delta.is_finite() && delta != 0.0 {
            let step = -delta.signum() * self.wheel_step;
            self.set_scale(self.transform.scale + step);
        }
        self.transform.scale
    }

    pub fn pinch_start(&mut self, distance: f32) {
        self.drag.cancel();
        self.pinch.start(distance);
    }

    pub fn pinch_move(&mut self, distance: f32) -> f32 {
        if let Some(ratio) = self.pinch.update(distance) {
            self.set_scale(self.transform.scale * ratio);
        }
        self.transform.scale
    }

    pub fn pinch_end(&mut self) {
        self.pinch.end();
    }

    fn set_scale(&mut self, scale: f32) {
        if scale.is_finite() {
            self.transform.scale = scale.clamp(self.min_scale, self.max_scale);
        }
    }
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(&ViewportConfig::default())
    }
}
