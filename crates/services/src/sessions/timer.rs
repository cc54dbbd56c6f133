use practice_core::model::Level;
use serde::Serialize;

/// Countdown state. `elapsed` and `total` are in seconds (one tick each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimerState {
    pub elapsed: u32,
    pub total: u32,
    pub running: bool,
}

impl TimerState {
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.elapsed)
    }
}

/// What a single clock pulse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer paused or already expired; nothing changed.
    Idle,
    Counted,
    /// This pulse reached the total. Reported once per timer lifetime.
    Expired,
}

/// Session countdown driven by an external one-per-second pulse.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    state: TimerState,
    expired: bool,
}

impl Timer {
    #[must_use]
    pub fn new(level: Level) -> Self {
        let mut timer = Self::default();
        timer.init_timer(level);
        timer
    }

    /// Sets the total from the level's duration and zeroes elapsed. Leaves the timer paused.
    pub fn init_timer(&mut self, level: Level) {
        self.state = TimerState {
            elapsed: 0,
            total: level.total_duration_secs(),
            running: false,
        };
        self.expired = false;
    }

    pub fn reset_timer(&mut self, level: Level) {
        self.init_timer(level);
    }

    /// An expired timer stays stopped.
    pub fn start(&mut self) {
        if !self.expired {
            self.state.running = true;
        }
    }

    pub fn pause(&mut self) {
        self.state.running = false;
    }

    /// Count one pulse. `on_expire` runs exactly once, on the pulse that reaches the total.
    pub fn tick(&mut self, on_expire: impl FnOnce()) -> TickOutcome {
        if !self.state.running || self.expired {
            return TickOutcome::Idle;
        }

        self.state.elapsed = self.state.elapsed.saturating_add(1);
        if self.state.elapsed < self.state.total {
            return TickOutcome::Counted;
        }

        self.expired = true;
        self.state.running = false;
        on_expire();
        TickOutcome::Expired
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.state.remaining()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_uses_level_duration_and_starts_paused() {
        let timer = Timer::new(Level::Hsk1);
        assert_eq!(timer.state().total, 1800);
        assert_eq!(timer.state().elapsed, 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn ticks_only_count_while_running() {
        let mut timer = Timer::new(Level::Hsk2);
        assert_eq!(timer.tick(|| {}), TickOutcome::Idle);
        assert_eq!(timer.state().elapsed, 0);

        timer.start();
        assert_eq!(timer.tick(|| {}), TickOutcome::Counted);
        timer.pause();
        assert_eq!(timer.tick(|| {}), TickOutcome::Idle);
        assert_eq!(timer.state().elapsed, 1);
        assert_eq!(timer.remaining(), 1799);
    }

    #[test]
    fn expiry_fires_once_on_the_final_tick() {
        let mut timer = Timer::new(Level::Hsk5);
        timer.start();
        let mut fired = 0;

        for _ in 0..2399 {
            timer.tick(|| fired += 1);
        }
        assert_eq!(fired, 0);
        assert!(timer.is_running());

        assert_eq!(timer.tick(|| fired += 1), TickOutcome::Expired);
        assert_eq!(fired, 1);
        assert!(!timer.is_running());

        timer.start();
        assert_eq!(timer.tick(|| fired += 1), TickOutcome::Idle);
        assert_eq!(fired, 1);
        assert_eq!(timer.state().elapsed, 2400);
    }

    #[test]
    fn reset_clears_expiry() {
        let mut timer = Timer::new(Level::Hsk1);
        timer.start();
        for _ in 0..1800 {
            timer.tick(|| {});
        }
        assert!(timer.has_expired());

        timer.reset_timer(Level::Hsk6);
        assert!(!timer.has_expired());
        assert_eq!(timer.state().total, 2400);
        timer.start();
        assert_eq!(timer.tick(|| {}), TickOutcome::Counted);
    }
}
