/// Session timer: elapsed/remaining time with an optional limit.
///
/// States: Idle → Preview → Running → Stopped. Time accrues only while
/// Running, in fixed `dt` increments fed by the session step. The step
/// checks expiry before admitting any reveal on the same tick, so a
/// reveal can never sneak in after time has run out.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerState {
    Idle,
    Preview,
    Running,
    Stopped,
}

#[derive(Clone, Debug)]
pub struct SessionTimer {
    state: TimerState,
    elapsed: f32,
    time_limit: f32,
    use_limit: bool,
}

impl SessionTimer {
    pub fn new() -> Self {
        SessionTimer {
            state: TimerState::Idle,
            elapsed: 0.0,
            time_limit: 0.0,
            use_limit: false,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Seconds left before expiry, floored at zero. `None` without a limit.
    pub fn remaining(&self) -> Option<f32> {
        self.use_limit.then(|| (self.time_limit - self.elapsed).max(0.0))
    }

    /// Enter the preview phase. The limit is recorded now so the HUD can
    /// show it, but time does not accrue until `start_running`.
    pub fn start_preview(&mut self, time_limit_secs: f32, use_limit: bool) {
        self.state = TimerState::Preview;
        self.elapsed = 0.0;
        self.time_limit = time_limit_secs;
        self.use_limit = use_limit;
    }

    /// Begin accruing time. Resets `elapsed`.
    pub fn start_running(&mut self, time_limit_secs: f32, use_limit: bool) {
        self.state = TimerState::Running;
        self.elapsed = 0.0;
        self.time_limit = time_limit_secs;
        self.use_limit = use_limit;
    }

    /// Resume accrual without resetting `elapsed` (preview → playing).
    pub fn resume(&mut self) {
        self.state = TimerState::Running;
    }

    /// Advance one tick. Returns true when the limit was just crossed;
    /// the timer stops itself so expiry fires at most once.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.elapsed += dt;
        if self.use_limit && self.elapsed >= self.time_limit {
            self.state = TimerState::Stopped;
            return true;
        }
        false
    }

    pub fn stop(&mut self) {
        self.state = TimerState::Stopped;
    }

    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.elapsed = 0.0;
        self.time_limit = 0.0;
        self.use_limit = false;
    }

    /// `MM:SS` clock for the HUD — remaining time when a limit is set,
    /// elapsed otherwise.
    pub fn formatted(&self) -> String {
        let secs = self.remaining().unwrap_or(self.elapsed);
        format!("{:02}:{:02}", (secs / 60.0) as u32, (secs % 60.0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accrues_only_while_running() {
        let mut t = SessionTimer::new();
        assert!(!t.tick(1.0));
        assert_eq!(t.elapsed(), 0.0);

        t.start_preview(10.0, true);
        assert!(!t.tick(1.0));
        assert_eq!(t.elapsed(), 0.0);

        t.resume();
        assert!(!t.tick(1.0));
        assert_eq!(t.elapsed(), 1.0);

        t.stop();
        assert!(!t.tick(1.0));
        assert_eq!(t.elapsed(), 1.0);
    }

    #[test]
    fn expires_exactly_once_at_limit() {
        let mut t = SessionTimer::new();
        t.start_running(3.0, true);
        assert!(!t.tick(1.0));
        assert!(!t.tick(1.0));
        assert!(t.tick(1.0));
        assert_eq!(t.state(), TimerState::Stopped);
        assert!(!t.tick(1.0));
    }

    #[test]
    fn no_limit_never_expires() {
        let mut t = SessionTimer::new();
        t.start_running(0.0, false);
        for _ in 0..1000 {
            assert!(!t.tick(1.0));
        }
        assert_eq!(t.remaining(), None);
    }

    #[test]
    fn remaining_floors_at_zero() {
        let mut t = SessionTimer::new();
        t.start_running(2.0, true);
        t.tick(5.0);
        assert_eq!(t.remaining(), Some(0.0));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut t = SessionTimer::new();
        t.start_running(30.0, true);
        t.tick(4.0);
        t.reset();
        assert_eq!(t.state(), TimerState::Idle);
        assert_eq!(t.elapsed(), 0.0);
        assert_eq!(t.remaining(), None);
    }

    #[test]
    fn formatted_clock() {
        let mut t = SessionTimer::new();
        t.start_running(180.0, true);
        assert_eq!(t.formatted(), "03:00");
        t.tick(65.0);
        assert_eq!(t.formatted(), "01:55");

        let mut u = SessionTimer::new();
        u.start_running(0.0, false);
        u.tick(61.0);
        assert_eq!(u.formatted(), "01:01");
    }
}
