//! Pointer gesture recognition: drag vs tap, and pinch ratios.
//!
//! A press starts tracking. The offset only moves once the pointer has
//! travelled past the threshold (`|dx| + |dy|` from the press point); a press
//! released before that is a tap.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open: left/top edges are inside, right/bottom edges are not
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// What a pointer event turned into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Press landed on an overlay control; the viewport ignores it
    Reserved,
    /// Tracking a press, nothing committed yet
    Pressed,
    /// Offset should become this value
    Dragged { offset: Vec2 },
    /// Released under the threshold
    Tap { x: f32, y: f32 },
    /// Drag finished; offset at the release point
    Released { offset: Vec2 },
    /// Pointer left the surface mid-gesture
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    Tracking {
        start: Vec2,
        base_offset: Vec2,
        committed: bool,
    },
}

/// Idle -> Tracking -> Idle
#[derive(Debug, Clone)]
pub struct DragTracker {
    threshold: f32,
    reserved: Vec<Rect>,
    state: DragState,
}

impl DragTracker {
    pub fn new(threshold: f32, reserved: Vec<Rect>) -> Self {
        Self {
            threshold: threshold.max(0.0),
            reserved,
            state: DragState::Idle,
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, DragState::Tracking { .. })
    }

    /// True once the threshold has been crossed in the current gesture
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Tracking { committed: true, .. })
    }

    pub fn pointer_down(&mut self, pointer: Vec2, current_offset: Vec2) -> GestureEvent {
        if self.reserved.iter().any(|r| r.contains(pointer.x, pointer.y)) {
            self.state = DragState::Idle;
            return GestureEvent::Reserved;
        }
        self.state = DragState::Tracking {
            start: pointer,
            base_offset: current_offset,
            committed: false,
        };
        GestureEvent::Pressed
    }

    /// `None` while idle or while still under the threshold
    pub fn pointer_move(&mut self, pointer: Vec2) -> Option<GestureEvent> {
        let DragState::Tracking {
            start,
            base_offset,
            committed,
        } = &mut self.state
        else {
            return None;
        };

        let displacement = pointer - *start;
        if !*committed {
            if displacement.x.abs() + displacement.y.abs() <= self.threshold {
                return None;
            }
            *committed = true;
            tracing::trace!("Drag committed at {:?}", displacement);
        }

        Some(GestureEvent::Dragged {
            offset: *base_offset + displacement,
        })
    }

    pub fn pointer_up(&mut self, pointer: Vec2) -> Option<GestureEvent> {
        let DragState::Tracking {
            start,
            base_offset,
            committed,
        } = std::mem::replace(&mut self.state, DragState::Idle)
        else {
            return None;
        };

        // A release past the threshold commits even with no move in between
        let displacement = pointer - start;
        if committed || displacement.x.abs() + displacement.y.abs() > self.threshold {
            Some(GestureEvent::Released {
                offset: base_offset + displacement,
            })
        } else {
            Some(GestureEvent::Tap {
                x: pointer.x,
                y: pointer.y,
            })
        }
    }

    pub fn pointer_leave(&mut self) -> Option<GestureEvent> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => None,
            DragState::Tracking { .. } => Some(GestureEvent::Cancelled),
        }
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

/// Two-finger zoom: ratio between successive finger distances
#[derive(Debug, Clone, Default)]
pub struct PinchTracker {
    last_distance: Option<f32>,
}

impl PinchTracker {
    pub fn start(&mut self, distance: f32) {
        self.last_distance = (distance > 0.0 && distance.is_finite()).then_some(distance);
    }

    /// Scale factor since the previous distance
    pub fn update(&mut self, distance: f32) -> Option<f32> {
        if !(distance > 0.0 && distance.is_finite()) {
            return None;
        }
        let last = self.last_distance?;
        self.last_distance = Some(distance);
        Some(distance / last)
    }

    pub fn end(&mut self) {
        self.last_distance = None;
    }

    pub fn is_active(&self) -> bool {
        self.last_distance.is_some()
    }
}
