//! Frame pacing
//!
//! Deadlines advance by a fixed interval, not by measured elapsed time, so
//! a late tick does not push every later tick back. A loop that falls more
//! than one interval behind gives up on catching up and restarts the
//! schedule from the late tick.

use std::time::{Duration, Instant};

/// Fallback when a rate is not usable
const DEFAULT_FPS: f32 = 30.0;

#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    deadline: Instant,
    resets: u64,
}

/// Interval for `fps` frames per second played at `speed`
pub fn frame_interval(fps: f32, speed: f32) -> Duration {
    let rate = fps * speed;
    let rate = if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        DEFAULT_FPS
    };
    Duration::from_secs_f64(1.0 / f64::from(rate))
}

impl FramePacer {
    pub fn new(fps: f32, speed: f32, now: Instant) -> Self {
        Self {
            interval: frame_interval(fps, speed),
            deadline: now,
            resets: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Times the loop fell too far behind and restarted
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Change the rate; takes effect from the next deadline
    pub fn set_rate(&mut self, fps: f32, speed: f32) {
        self.interval = frame_interval(fps, speed);
    }

    /// Restart the schedule from `now`, e.g. after a pause
    pub fn restart(&mut self, now: Instant) {
        self.deadline = now;
    }

    /// Move to the next deadline and return how long to sleep until it
    pub fn advance(&mut self, now: Instant) -> Duration {
        self.deadline += self.interval;
        if now < self.deadline {
            return self.deadline - now;
        }
        if now - self.deadline > self.interval {
            // The late tick runs now and the schedule restarts from it
            self.deadline = now;
            self.resets += 1;
        }
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_includes_speed() {
        assert_eq!(frame_interval(25.0, 1.0), Duration::from_millis(40));
        assert_eq!(frame_interval(25.0, 2.0), Duration::from_millis(20));
        assert_eq!(frame_interval(0.0, 1.0), frame_interval(30.0, 1.0));
        assert_eq!(frame_interval(30.0, f32::NAN), frame_interval(30.0, 1.0));
    }

    #[test]
    fn test_deadline_does_not_drift() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(25.0, 1.0, start);

        // Tick finished 5 ms late; the sleep absorbs it
        let wait = pacer.advance(start + Duration::from_millis(5));
        assert_eq!(wait, Duration::from_millis(35));
        assert_eq!(pacer.deadline(), start + Duration::from_millis(40));

        let wait = pacer.advance(start + Duration::from_millis(40));
        assert_eq!(wait, Duration::from_millis(40));
        assert_eq!(pacer.deadline(), start + Duration::from_millis(80));
    }

    #[test]
    fn test_small_lag_catches_up() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(25.0, 1.0, start);
        // 30 ms behind the 40 ms deadline: run immediately, keep schedule
        let wait = pacer.advance(start + Duration::from_millis(70));
        assert_eq!(wait, Duration::ZERO);
        assert_eq!(pacer.deadline(), start + Duration::from_millis(40));
        assert_eq!(pacer.resets(), 0);
    }

    #[test]
    fn test_large_lag_resets() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(25.0, 1.0, start);
        let now = start + Duration::from_millis(200);
        assert_eq!(pacer.advance(now), Duration::ZERO);
        assert_eq!(pacer.deadline(), now);
        assert_eq!(pacer.resets(), 1);

        // The tick after a reset is one interval later, not two
        let wait = pacer.advance(now + Duration::from_millis(1));
        assert_eq!(wait, Duration::from_millis(39));
        assert_eq!(pacer.deadline(), now + Duration::from_millis(40));
        assert_eq!(pacer.resets(), 1);
    }
}
