//! Touch samples, touch lifecycle events and the per-finger tracking record.

use serde::{Deserialize, Serialize};
use std::ops::Sub;

use super::direction::{Directions, SwipeDirection};

/// Position in surface units. Screen convention: y grows downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// One move reading for a finger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    pub position: Point,
    /// Movement since the previous frame of this finger.
    pub delta: Point,
    /// Monotonic seconds.
    pub time: f64,
}

/// Touch lifecycle events as delivered by the input layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TouchEvent {
    Began {
        finger: usize,
        position: Point,
        time: f64,
    },
    Moved {
        finger: usize,
        position: Point,
        delta: Point,
        time: f64,
    },
    Ended {
        finger: usize,
        time: f64,
    },
}

impl TouchEvent {
    pub fn finger(&self) -> usize {
        match self {
            Self::Began { finger, .. } | Self::Moved { finger, .. } | Self::Ended { finger, .. } => {
                *finger
            }
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            Self::Began { time, .. } | Self::Moved { time, .. } | Self::Ended { time, .. } => *time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    /// Still tracking, no decision yet.
    #[default]
    Waiting,
    /// A swipe was detected and reported.
    Done,
    /// Timed out, or every candidate was ruled out.
    Failed,
}

impl DetectionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

/// Per-finger recognition state. Slots are reset, never reallocated, between touches.
#[derive(Debug, Clone, Default)]
pub struct TouchTracker {
    pub(super) start_point: Point,
    pub(super) start_time: f64,
    pub(super) candidates: Directions,
    pub(super) status: DetectionStatus,
    pub(super) completed: Option<SwipeDirection>,
}

impl TouchTracker {
    pub fn new(origin: Point, start_time: f64, initial: Directions) -> Self {
        let mut tracker = Self::default();
        tracker.reset_with_touch(origin, start_time, initial);
        tracker
    }

    /// Start a new lifecycle on this slot, abandoning whatever it held before.
    pub fn reset_with_touch(&mut self, origin: Point, start_time: f64, initial: Directions) {
        self.start_point = origin;
        self.start_time = start_time;
        self.candidates = initial;
        self.status = DetectionStatus::Waiting;
        self.completed = None;
    }

    pub fn start_point(&self) -> Point {
        self.start_point
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn candidates(&self) -> Directions {
        self.candidates
    }

    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn completed(&self) -> Option<SwipeDirection> {
        self.completed
    }

    pub(super) fn eliminate(&mut self, dirs: Directions) {
        self.candidates.remove(dirs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_discards_previous_lifecycle() {
        let mut t = TouchTracker::new(Point::new(1.0, 2.0), 0.0, Directions::all());
        t.eliminate(Directions::LEFT | Directions::UP);
        t.status = DetectionStatus::Done;
        t.completed = Some(SwipeDirection::Right);

        t.reset_with_touch(Point::new(10.0, 20.0), 3.5, Directions::LEFT | Directions::DOWN);

        assert_eq!(t.start_point(), Point::new(10.0, 20.0));
        assert_eq!(t.start_time(), 3.5);
        assert_eq!(t.candidates(), Directions::LEFT | Directions::DOWN);
        assert_eq!(t.status(), DetectionStatus::Waiting);
        assert_eq!(t.completed(), None);
    }

    #[test]
    fn event_serde_shape() {
        let ev = TouchEvent::Moved {
            finger: 1,
            position: Point::new(50.0, 105.0),
            delta: Point::new(-50.0, 5.0),
            time: 0.1,
        };
        let line = serde_json::to_string(&ev).unwrap();
        assert!(line.contains(r#""phase":"moved""#));

        let back: TouchEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, ev);
        assert_eq!(back.finger(), 1);
        assert_eq!(back.time(), 0.1);
    }

    #[test]
    fn terminal_states() {
        assert!(!DetectionStatus::Waiting.is_terminal());
        assert!(DetectionStatus::Done.is_terminal());
        assert!(DetectionStatus::Failed.is_terminal());
    }
}
