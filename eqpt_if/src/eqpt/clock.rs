//! # Mission clock

/// Source of mission time. All waiting in the controller goes through here.
pub trait Clock {
    /// Seconds since the clock was created.
    fn now_s(&self) -> f64;

    /// Block for the given number of seconds. Non-positive durations return
    /// immediately.
    fn sleep(&mut self, duration_s: f64);
}
