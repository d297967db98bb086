//! Per-finger swipe recognition by progressive elimination of directions.

use log::{debug, trace};
use serde::Deserialize;

use super::direction::{Directions, SwipeDirection, deserialize_directions};
use super::touch::{DetectionStatus, Point, TouchEvent, TouchSample, TouchTracker};

/// Number of finger slots a recognizer tracks. Matches the evdev slot decoder.
pub const MAX_TOUCHES: usize = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Initial candidate set; directions outside it are never reported.
    #[serde(deserialize_with = "deserialize_directions")]
    pub directions: Directions,
    /// Seconds from touch-down to completion. Zero or negative means unlimited.
    pub time_to_swipe: f64,
    /// Largest cross-axis drift still accepted.
    pub allowed_variance: f32,
    /// Along-axis travel that must be exceeded.
    pub minimum_distance: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            directions: Directions::LEFT,
            time_to_swipe: 0.5,
            allowed_variance: 35.0,
            minimum_distance: 40.0,
        }
    }
}

/// Delivered to the completion handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeEvent<'a> {
    pub recognizer: &'a str,
    pub finger: usize,
    pub direction: SwipeDirection,
}

pub type SwipeHandler = Box<dyn FnMut(&SwipeEvent<'_>) + Send>;

/// Tracks up to [`MAX_TOUCHES`] fingers and reports completed swipes.
///
/// The completion handler runs synchronously inside [`SwipeRecognizer::on_touch_moved`]
/// and must not feed events back into the same recognizer.
pub struct SwipeRecognizer {
    name: String,
    config: RecognizerConfig,
    slots: [Option<TouchTracker>; MAX_TOUCHES],
    handler: Option<SwipeHandler>,
}

impl std::fmt::Debug for SwipeRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwipeRecognizer")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("slots", &self.slots)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl SwipeRecognizer {
    pub fn new(name: impl Into<String>, config: RecognizerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            slots: Default::default(),
            handler: None,
        }
    }

    pub fn set_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&SwipeEvent<'_>) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Tracker for a finger, if that finger ever touched down.
    pub fn tracker(&self, finger: usize) -> Option<&TouchTracker> {
        self.slots.get(finger)?.as_ref()
    }

    /// A new touch-down always restarts detection for that finger.
    pub fn on_touch_began(&mut self, finger: usize, position: Point, time: f64) {
        let Some(slot) = self.slots.get_mut(finger) else {
            trace!("{}: ignoring touch-began for finger {finger}", self.name);
            return;
        };
        let initial = self.config.directions;
        match slot {
            Some(tracker) => tracker.reset_with_touch(position, time, initial),
            None => *slot = Some(TouchTracker::new(position, time, initial)),
        }
    }

    /// Returns the direction when this move completes a swipe.
    pub fn on_touch_moved(&mut self, finger: usize, sample: &TouchSample) -> Option<SwipeDirection> {
        let tracker = self.slots.get_mut(finger)?.as_mut()?;
        let direction = process_sample(&self.config, tracker, sample)?;

        debug!(
            "{}: finger {finger} swiped {direction} after {:.3}s",
            self.name,
            sample.time - tracker.start_time
        );
        let event = SwipeEvent {
            recognizer: &self.name,
            finger,
            direction,
        };
        if let Some(handler) = self.handler.as_mut() {
            handler(&event);
        }
        tracker.status = DetectionStatus::Done;
        Some(direction)
    }

    /// Lifting a finger leaves its slot as it is.
    pub fn on_touch_ended(&mut self, finger: usize, _time: f64) {
        if let Some(tracker) = self.tracker(finger) {
            trace!(
                "{}: finger {finger} lifted ({:?}, candidates {})",
                self.name,
                tracker.status(),
                tracker.candidates()
            );
        }
    }

    pub fn handle(&mut self, event: &TouchEvent) -> Option<SwipeDirection> {
        match *event {
            TouchEvent::Began {
                finger,
                position,
                time,
            } => {
                self.on_touch_began(finger, position, time);
                None
            }
            TouchEvent::Moved {
                finger,
                position,
                delta,
                time,
            } => self.on_touch_moved(
                finger,
                &TouchSample {
                    position,
                    delta,
                    time,
                },
            ),
            TouchEvent::Ended { finger, time } => {
                self.on_touch_ended(finger, time);
                None
            }
        }
    }
}

/// Narrow the tracker's candidates with one move sample.
fn process_sample(
    config: &RecognizerConfig,
    tracker: &mut TouchTracker,
    sample: &TouchSample,
) -> Option<SwipeDirection> {
    if tracker.status != DetectionStatus::Waiting {
        return None;
    }

    // A stale touch must never complete late.
    if config.time_to_swipe > 0.0 && sample.time - tracker.start_time > config.time_to_swipe {
        tracker.status = DetectionStatus::Failed;
        return None;
    }

    // Each frame rules out one horizontal and one vertical direction.
    if sample.delta.x > 0.0 {
        tracker.eliminate(Directions::LEFT);
    } else {
        tracker.eliminate(Directions::RIGHT);
    }
    if sample.delta.y < 0.0 {
        tracker.eliminate(Directions::DOWN);
    } else {
        tracker.eliminate(Directions::UP);
    }

    let x_abs = (sample.position.x - tracker.start_point.x).abs();
    let y_abs = (sample.position.y - tracker.start_point.y).abs();

    for direction in tracker.candidates.directions() {
        let (along, across) = if direction.is_horizontal() {
            (x_abs, y_abs)
        } else {
            (y_abs, x_abs)
        };
        if along <= config.minimum_distance {
            continue;
        }
        if across < config.allowed_variance {
            tracker.completed = Some(direction);
            return Some(direction);
        }
        // Travelled far enough but drifted off-axis: never again this touch.
        tracker.eliminate(direction.flag());
    }

    if tracker.candidates.is_empty() {
        tracker.status = DetectionStatus::Failed;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn config(directions: Directions) -> RecognizerConfig {
        RecognizerConfig {
            directions,
            time_to_swipe: 0.5,
            allowed_variance: 35.0,
            minimum_distance: 40.0,
        }
    }

    fn sample(x: f32, y: f32, dx: f32, dy: f32, time: f64) -> TouchSample {
        TouchSample {
            position: Point::new(x, y),
            delta: Point::new(dx, dy),
            time,
        }
    }

    fn recording(
        config: RecognizerConfig,
    ) -> (SwipeRecognizer, Arc<Mutex<Vec<(usize, SwipeDirection)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut r = SwipeRecognizer::new("test", config);
        let sink = seen.clone();
        r.set_handler(move |ev| sink.lock().unwrap().push((ev.finger, ev.direction)));
        (r, seen)
    }

    #[test]
    fn left_swipe_completes() {
        let (mut r, seen) = recording(config(Directions::LEFT));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        let got = r.on_touch_moved(0, &sample(50.0, 105.0, -50.0, 5.0, 0.1));

        assert_eq!(got, Some(SwipeDirection::Left));
        assert_eq!(*seen.lock().unwrap(), vec![(0, SwipeDirection::Left)]);
        let t = r.tracker(0).unwrap();
        assert_eq!(t.status(), DetectionStatus::Done);
        assert_eq!(t.completed(), Some(SwipeDirection::Left));
    }

    #[test]
    fn variance_eliminates_permanently() {
        let (mut r, seen) = recording(config(Directions::LEFT));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        assert_eq!(r.on_touch_moved(0, &sample(50.0, 140.0, -50.0, 40.0, 0.1)), None);
        assert!(r.tracker(0).unwrap().candidates().is_empty());
        assert_eq!(r.tracker(0).unwrap().status(), DetectionStatus::Failed);

        assert_eq!(r.on_touch_moved(0, &sample(45.0, 100.0, -5.0, -40.0, 0.2)), None);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn variance_disqualifies_only_that_direction() {
        let all = Directions::LEFT | Directions::DOWN;
        let (mut r, seen) = recording(config(all));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        // Left travelled 50 but drifted 38 down: Left is out, Down stays pending.
        assert_eq!(r.on_touch_moved(0, &sample(50.0, 138.0, -50.0, 38.0, 0.1)), None);
        assert_eq!(r.tracker(0).unwrap().candidates(), Directions::DOWN);
        assert_eq!(r.tracker(0).unwrap().status(), DetectionStatus::Waiting);

        // Further down, but already 50 off the vertical axis.
        assert_eq!(r.on_touch_moved(0, &sample(50.0, 160.0, 0.0, 22.0, 0.2)), None);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(r.tracker(0).unwrap().status(), DetectionStatus::Failed);
    }

    #[test]
    fn timeout_fails_without_callback() {
        let (mut r, seen) = recording(config(Directions::LEFT));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        assert_eq!(r.on_touch_moved(0, &sample(50.0, 105.0, -50.0, 5.0, 0.6)), None);
        assert_eq!(r.tracker(0).unwrap().status(), DetectionStatus::Failed);
        // Timeout is checked before narrowing.
        assert_eq!(r.tracker(0).unwrap().candidates(), Directions::LEFT);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn non_positive_time_budget_is_unlimited() {
        let mut cfg = config(Directions::RIGHT);
        cfg.time_to_swipe = 0.0;
        let (mut r, seen) = recording(cfg);
        r.on_touch_began(0, Point::new(0.0, 0.0), 0.0);

        assert_eq!(
            r.on_touch_moved(0, &sample(60.0, 0.0, 60.0, 0.0, 120.0)),
            Some(SwipeDirection::Right)
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn each_direction_with_straight_motion() {
        let cases = [
            (SwipeDirection::Left, Point::new(-45.0, 3.0)),
            (SwipeDirection::Right, Point::new(45.0, -3.0)),
            (SwipeDirection::Up, Point::new(2.0, -45.0)),
            (SwipeDirection::Down, Point::new(-2.0, 45.0)),
        ];
        for (expected, step) in cases {
            let (mut r, seen) = recording(config(Directions::all()));
            r.on_touch_began(3, Point::new(200.0, 200.0), 1.0);
            let pos = Point::new(200.0 + step.x, 200.0 + step.y);

            let got = r.on_touch_moved(3, &sample(pos.x, pos.y, step.x, step.y, 1.1));

            assert_eq!(got, Some(expected), "motion {step:?}");
            assert_eq!(*seen.lock().unwrap(), vec![(3, expected)]);
        }
    }

    #[test]
    fn unrequested_direction_is_never_reported() {
        let (mut r, seen) = recording(config(Directions::UP | Directions::DOWN));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        assert_eq!(r.on_touch_moved(0, &sample(20.0, 100.0, -80.0, 0.0, 0.1)), None);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_delta_counts_as_non_positive() {
        let (mut r, _) = recording(config(Directions::all()));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        r.on_touch_moved(0, &sample(100.0, 100.0, 0.0, 0.0, 0.05));

        assert_eq!(
            r.tracker(0).unwrap().candidates(),
            Directions::LEFT | Directions::DOWN
        );
    }

    #[test]
    fn short_moves_keep_candidates_pending() {
        let (mut r, seen) = recording(config(Directions::all()));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        r.on_touch_moved(0, &sample(80.0, 110.0, -20.0, 10.0, 0.05));
        assert_eq!(
            r.tracker(0).unwrap().candidates(),
            Directions::LEFT | Directions::DOWN
        );
        let got = r.on_touch_moved(0, &sample(55.0, 112.0, -25.0, 2.0, 0.1));

        assert_eq!(got, Some(SwipeDirection::Left));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn candidates_never_grow() {
        let (mut r, _) = recording(config(Directions::all()));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        let moves = [
            (105.0, 98.0, 5.0, -2.0),
            (101.0, 99.0, -4.0, 1.0),
            (103.0, 95.0, 2.0, -4.0),
            (99.0, 97.0, -4.0, 2.0),
        ];
        let mut prev = r.tracker(0).unwrap().candidates();
        for (i, (x, y, dx, dy)) in moves.into_iter().enumerate() {
            r.on_touch_moved(0, &sample(x, y, dx, dy, 0.01 * (i + 1) as f64));
            let now = r.tracker(0).unwrap().candidates();
            assert!(prev.contains(now), "{now} not within {prev}");
            prev = now;
        }
        assert!(prev.is_empty());
    }

    #[test]
    fn completed_slot_ignores_further_moves() {
        let (mut r, seen) = recording(config(Directions::LEFT));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);
        r.on_touch_moved(0, &sample(50.0, 100.0, -50.0, 0.0, 0.1));

        assert_eq!(r.on_touch_moved(0, &sample(0.0, 100.0, -50.0, 0.0, 0.2)), None);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn touch_began_resets_slot() {
        let (mut r, seen) = recording(config(Directions::LEFT | Directions::RIGHT));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);
        r.on_touch_moved(0, &sample(50.0, 100.0, -50.0, 0.0, 0.1));
        assert_eq!(r.tracker(0).unwrap().status(), DetectionStatus::Done);

        r.on_touch_began(0, Point::new(300.0, 300.0), 5.0);
        let t = r.tracker(0).unwrap();
        assert_eq!(t.status(), DetectionStatus::Waiting);
        assert_eq!(t.candidates(), Directions::LEFT | Directions::RIGHT);
        assert_eq!(t.completed(), None);

        let got = r.on_touch_moved(0, &sample(360.0, 300.0, 60.0, 0.0, 5.1));
        assert_eq!(got, Some(SwipeDirection::Right));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn unknown_and_out_of_range_fingers_are_ignored() {
        let (mut r, seen) = recording(config(Directions::LEFT));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);

        assert_eq!(r.on_touch_moved(4, &sample(0.0, 100.0, -100.0, 0.0, 0.1)), None);
        r.on_touch_began(MAX_TOUCHES, Point::new(0.0, 0.0), 0.0);
        assert_eq!(
            r.on_touch_moved(MAX_TOUCHES, &sample(-80.0, 0.0, -80.0, 0.0, 0.1)),
            None
        );
        r.on_touch_ended(MAX_TOUCHES + 7, 0.2);

        assert!(r.tracker(4).is_none());
        assert!(r.tracker(MAX_TOUCHES).is_none());
        assert_eq!(r.tracker(0).unwrap().status(), DetectionStatus::Waiting);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn fingers_are_independent() {
        let (mut r, seen) = recording(config(Directions::LEFT | Directions::UP));
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);
        r.on_touch_began(1, Point::new(400.0, 400.0), 0.0);

        r.on_touch_moved(1, &sample(400.0, 350.0, 0.0, -50.0, 0.1));
        r.on_touch_moved(0, &sample(40.0, 100.0, -60.0, 0.0, 0.1));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, SwipeDirection::Up), (0, SwipeDirection::Left)]
        );
    }

    #[test]
    fn horizontal_wins_when_both_axes_qualify() {
        let loose = RecognizerConfig {
            allowed_variance: 100.0,
            ..config(Directions::all())
        };
        let (mut r, seen) = recording(loose);
        r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);
        r.on_touch_began(1, Point::new(100.0, 100.0), 0.0);

        // Left and Up both clear distance and variance; Left is checked first.
        r.on_touch_moved(0, &sample(50.0, 40.0, -50.0, -60.0, 0.1));
        // Right before Down.
        r.on_touch_moved(1, &sample(150.0, 160.0, 50.0, 60.0, 0.1));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, SwipeDirection::Left), (1, SwipeDirection::Right)]
        );
    }

    #[test]
    fn handle_routes_events() {
        let (mut r, seen) = recording(config(Directions::DOWN));
        let events = [
            TouchEvent::Began {
                finger: 2,
                position: Point::new(10.0, 10.0),
                time: 0.0,
            },
            TouchEvent::Moved {
                finger: 2,
                position: Point::new(12.0, 70.0),
                delta: Point::new(2.0, 60.0),
                time: 0.1,
            },
            TouchEvent::Ended {
                finger: 2,
                time: 0.2,
            },
        ];
        let got: Vec<_> = events.iter().filter_map(|e| r.handle(e)).collect();

        assert_eq!(got, vec![SwipeDirection::Down]);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(r.tracker(2).unwrap().status(), DetectionStatus::Done);
    }

    #[test]
    fn works_without_handler() {
        let mut r = SwipeRecognizer::new("bare", config(Directions::RIGHT));
        r.on_touch_began(0, Point::new(0.0, 0.0), 0.0);
        assert_eq!(
            r.on_touch_moved(0, &sample(41.0, 0.0, 41.0, 0.0, 0.1)),
            Some(SwipeDirection::Right)
        );
    }

    #[test]
    fn config_from_toml() {
        let cfg: RecognizerConfig = toml::from_str(
            r#"
            directions = ["up", "down"]
            time_to_swipe = 0.0
            minimum_distance = 80.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.directions, Directions::UP | Directions::DOWN);
        assert_eq!(cfg.time_to_swipe, 0.0);
        assert_eq!(cfg.minimum_distance, 80.0);
        assert_eq!(cfg.allowed_variance, 35.0);
    }
}
