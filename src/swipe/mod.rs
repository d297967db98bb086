//! Single-finger swipe recognition.
//!
//! Every finger gets a [`TouchTracker`] holding the set of directions that are
//! still possible. Each move sample rules out one horizontal and one vertical
//! direction by the sign of its frame delta, then checks the remaining
//! candidates against the distance travelled from the touch origin:
//!
//! - far enough along the axis and within the allowed cross-axis drift: the
//!   swipe completes and the handler fires once;
//! - far enough but drifted too much: that direction is dropped for good.
//!
//! A touch that runs past its time budget, or runs out of candidates, fails
//! silently.
//!
//! ```
//! use swipectl::swipe::{Directions, Point, RecognizerConfig, SwipeDirection, SwipeRecognizer, TouchSample};
//!
//! let mut r = SwipeRecognizer::new("demo", RecognizerConfig {
//!     directions: Directions::LEFT | Directions::RIGHT,
//!     ..RecognizerConfig::default()
//! });
//! r.on_touch_began(0, Point::new(100.0, 100.0), 0.0);
//! let got = r.on_touch_moved(0, &TouchSample {
//!     position: Point::new(50.0, 105.0),
//!     delta: Point::new(-50.0, 5.0),
//!     time: 0.1,
//! });
//! assert_eq!(got, Some(SwipeDirection::Left));
//! ```

mod direction;
mod recognizer;
mod touch;

pub use direction::{Directions, SwipeDirection, UnknownDirection};
pub use recognizer::{MAX_TOUCHES, RecognizerConfig, SwipeEvent, SwipeHandler, SwipeRecognizer};
pub use touch::{DetectionStatus, Point, TouchEvent, TouchSample, TouchTracker};
