use std::time::Duration;

/// Fixed-period tick source driven by elapsed simulation time.
///
/// Scenes own one `Cadence` per evaluation rate (proximity checks, session
/// timer) so those rates stay independent of the render tick rate. Dropping
/// the owner drops any pending ticks with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    period: Duration,
    accumulator: Duration,
    max_ticks_per_advance: u32,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self {
            period: if period.is_zero() {
                Duration::from_millis(1)
            } else {
                period
            },
            accumulator: Duration::ZERO,
            max_ticks_per_advance: 8,
        }
    }

    pub fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    pub fn with_max_ticks_per_advance(mut self, max_ticks: u32) -> Self {
        self.max_ticks_per_advance = max_ticks.max(1);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Adds `dt` and returns how many periods became due. Backlog beyond the
    /// per-advance cap is dropped rather than replayed.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        self.accumulator = self.accumulator.saturating_add(dt);
        let mut due = 0u32;
        while self.accumulator >= self.period && due < self.max_ticks_per_advance {
            self.accumulator -= self.period;
            due += 1;
        }
        if self.accumulator >= self.period {
            self.accumulator = Duration::ZERO;
        }
        due
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
