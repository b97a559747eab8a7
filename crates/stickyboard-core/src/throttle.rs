//! Rate limiting for ephemeral motion publishes.

use kurbo::Point;
use std::time::{Duration, Instant};

/// Default minimum interval between publishes (~20 Hz).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(50);
/// Default minimum movement before a publish is worth sending.
pub const DEFAULT_MIN_DISTANCE: f64 = 2.0;

/// Gates a stream of pointer positions down to a publishable rate.
///
/// Raw pointer events arrive far faster than peers need them; forwarding
/// each one floods the ephemeral channel. A position passes the gate only
/// if enough time has elapsed since the last accepted one and the pointer
/// moved a perceptible distance. Callers pass `now` explicitly so tests can
/// drive the clock.
#[derive(Debug, Clone)]
pub struct MotionPublisher {
    min_interval: Duration,
    min_distance: f64,
    last: Option<(Point, Instant)>,
}

impl MotionPublisher {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MIN_INTERVAL, DEFAULT_MIN_DISTANCE)
    }

    pub fn with_limits(min_interval: Duration, min_distance: f64) -> Self {
        Self {
            min_interval,
            min_distance,
            last: None,
        }
    }

    /// Offer a position; returns true if it should be published now.
    /// The first offer after a reset always passes.
    pub fn offer(&mut self, point: Point, now: Instant) -> bool {
        if let Some((last_point, last_time)) = self.last {
            if now.duration_since(last_time) < self.min_interval {
                return false;
            }
            if last_point.distance(point) < self.min_distance {
                return false;
            }
        }
        self.last = Some((point, now));
        true
    }

    /// Forget the last accepted position, e.g. when a gesture ends. The
    /// final position of a gesture bypasses the gate entirely and is sent
    /// by the caller regardless.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for MotionPublisher {
    fn default() -> Self {
        Self::new()
    }
}
