use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::warn;

static POISON_REPORTED: AtomicBool = AtomicBool::new(false);

/// A panicking publisher leaves the last snapshot intact; keep serving it
/// and log once per process.
fn recover<G>(operation: &'static str, poisoned: PoisonError<G>) -> G {
    if !POISON_REPORTED.swap(true, Ordering::Relaxed) {
        warn!(operation, "loop_metrics_lock_poisoned");
    }
    poisoned.into_inner()
}

/// Rates over the most recent metrics interval plus the running tick total.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub notifications_per_second: f32,
    pub total_ticks: u64,
}

/// Shared view of the host loop's latest [`LoopMetricsSnapshot`].
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self
            .latest
            .read()
            .unwrap_or_else(|poisoned| recover("read", poisoned))
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| recover("write", poisoned)) = snapshot;
    }
}

/// Rolls tick and notification counts over fixed intervals of simulation
/// time.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Duration,
    interval: Duration,
    ticks: u32,
    notifications: u32,
    total_ticks: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval_start: Duration::ZERO,
            interval,
            ticks: 0,
            notifications: 0,
            total_ticks: 0,
        }
    }

    pub(crate) fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
        self.total_ticks = self.total_ticks.saturating_add(1);
    }

    pub(crate) fn record_notifications(&mut self, count: usize) {
        self.notifications = self.notifications.saturating_add(count as u32);
    }

    pub(crate) fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Duration) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_sub(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            notifications_per_second: self.notifications as f32 / elapsed_seconds,
            total_ticks: self.total_ticks,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.notifications = 0;

        Some(snapshot)
    }
}
