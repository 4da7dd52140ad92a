use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Whole seconds derived from published milliseconds.
///
/// Moves by exactly one each time the elapsed time passes the next 1000 ms
/// boundary, so it never skips while updates are at most 1000 ms apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondsCounter {
    seconds: i64,
    last_second_millis: i64,
}

impl SecondsCounter {
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Returns the new value when the counter moved.
    pub fn observe(&mut self, elapsed_millis: i64) -> Option<i64> {
        if elapsed_millis >= self.last_second_millis + 1000 {
            self.seconds += 1;
            self.last_second_millis += 1000;
            Some(self.seconds)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    pub elapsed_millis: i64,
    pub second: Option<i64>,
}

/// Elapsed time of a session, made of completed laps plus the running one.
#[derive(Debug, Clone, Default)]
pub struct SessionClock {
    accumulated_millis: i64,
    lap_start: Option<Instant>,
    lap_millis: i64,
    counter: SecondsCounter,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.lap_start.is_some()
    }

    pub fn start_lap(&mut self, now: Instant) {
        if self.lap_start.is_none() {
            self.lap_start = Some(now);
            self.lap_millis = 0;
        }
    }

    pub fn tick(&mut self, now: Instant) -> Option<ClockTick> {
        let lap_start = self.lap_start?;
        self.lap_millis = now.saturating_duration_since(lap_start).as_millis() as i64;

        let elapsed_millis = self.elapsed_millis();
        Some(ClockTick {
            elapsed_millis,
            second: self.counter.observe(elapsed_millis),
        })
    }

    /// Folds the lap into the accumulated time.
    ///
    /// The lap length is the one seen at the last tick, not at the time of the call,
    /// so up to one tick interval of the lap is not counted.
    pub fn stop_lap(&mut self) -> i64 {
        if self.lap_start.take().is_some() {
            self.accumulated_millis += self.lap_millis;
            self.lap_millis = 0;
        }
        self.accumulated_millis
    }

    pub fn elapsed_millis(&self) -> i64 {
        self.accumulated_millis + self.lap_millis
    }

}
