//! Multi-touch slot decoding: evdev MT protocol B in, touch lifecycle events out.

use log::trace;

use crate::swipe::{MAX_TOUCHES, Point, TouchEvent};

#[derive(Debug, Clone, Default)]
struct SlotState {
    tracking_id: i32, // -1 = inactive
    pos: Point,
    // position reported with the previous frame
    last_pos: Point,
    pending_begin: bool,
    pending_end: bool,
    active: bool,
}

#[derive(Debug, Clone, Copy)]
struct AxisRange {
    min: i32,
    max: i32,
}

impl AxisRange {
    fn normalize(&self, raw: i32) -> f32 {
        ((raw - self.min) as f32 / (self.max - self.min) as f32).clamp(0.0, 1.0)
    }
}

/// Turns per-slot axis updates into [`TouchEvent`]s, one batch per SYN_REPORT.
///
/// Positions are normalized against the device axis range and scaled to the
/// configured surface size. Finger ids are slot indices.
#[derive(Debug)]
pub struct Tracker {
    slots: Vec<SlotState>,
    // None while the device reports a slot past MAX_TOUCHES
    cur_slot: Option<usize>,
    x_range: AxisRange,
    y_range: AxisRange,
    surface: (f32, f32),
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            slots: vec![
                SlotState {
                    tracking_id: -1,
                    ..SlotState::default()
                };
                MAX_TOUCHES
            ],
            cur_slot: Some(0),
            x_range: AxisRange { min: 0, max: 4096 },
            y_range: AxisRange { min: 0, max: 4096 },
            surface: (1.0, 1.0),
        }
    }

    pub fn set_norm_ranges(&mut self, x_min: i32, x_max: i32, y_min: i32, y_max: i32) {
        self.x_range = AxisRange {
            min: x_min,
            max: x_max.max(x_min + 1),
        };
        self.y_range = AxisRange {
            min: y_min,
            max: y_max.max(y_min + 1),
        };
    }

    /// Rescale to a new surface. Positions are rescaled too so the next
    /// frame's delta stays in one unit system.
    pub fn set_surface(&mut self, width: f32, height: f32) {
        let (old_w, old_h) = self.surface;
        let (sx, sy) = (width / old_w, height / old_h);
        if sx.is_finite() && sy.is_finite() {
            for s in &mut self.slots {
                s.pos = Point::new(s.pos.x * sx, s.pos.y * sy);
                s.last_pos = Point::new(s.last_pos.x * sx, s.last_pos.y * sy);
            }
        }
        self.surface = (width, height);
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = usize::try_from(slot)
            .ok()
            .filter(|&i| i < self.slots.len());
        if self.cur_slot.is_none() {
            trace!("slot {slot} out of range, ignoring its updates");
        }
    }

    fn current(&mut self) -> Option<&mut SlotState> {
        self.cur_slot.and_then(|i| self.slots.get_mut(i))
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let Some(s) = self.current() else {
            return;
        };
        if tracking_id < 0 {
            if s.pending_begin {
                // down and up inside one frame: nothing was ever reported
                s.pending_begin = false;
            } else if s.active {
                s.pending_end = true;
            }
            s.active = false;
            s.tracking_id = -1;
        } else {
            // the kernel omits unchanged axes, so the slot keeps its last position
            if s.active {
                s.pending_end = true;
            }
            s.tracking_id = tracking_id;
            s.active = true;
            s.pending_begin = true;
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let x = self.x_range.normalize(raw) * self.surface.0;
        if let Some(s) = self.current() {
            s.pos.x = x;
        }
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let y = self.y_range.normalize(raw) * self.surface.1;
        if let Some(s) = self.current() {
            s.pos.y = y;
        }
    }

    /// Close the current frame. `now` is monotonic seconds.
    pub fn on_syn_report(&mut self, now: f64) -> Vec<TouchEvent> {
        let mut out = Vec::new();
        for (finger, s) in self.slots.iter_mut().enumerate() {
            if s.pending_end {
                s.pending_end = false;
                out.push(TouchEvent::Ended { finger, time: now });
            }
            if !s.active {
                continue;
            }
            if s.pending_begin {
                s.pending_begin = false;
                s.last_pos = s.pos;
                trace!("slot {finger}: tracking id {} down", s.tracking_id);
                out.push(TouchEvent::Began {
                    finger,
                    position: s.pos,
                    time: now,
                });
            } else if s.pos != s.last_pos {
                let delta = s.pos - s.last_pos;
                s.last_pos = s.pos;
                out.push(TouchEvent::Moved {
                    finger,
                    position: s.pos,
                    delta,
                    time: now,
                });
            }
        }
        if !out.is_empty() {
            trace!("frame @{now:.3}s: {} touch event(s)", out.len());
        }
        out
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }
}
