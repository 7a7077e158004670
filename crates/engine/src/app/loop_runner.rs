use std::thread;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::StoreError;

use super::input::KeyTracker;
use super::metrics::MetricsAccumulator;
use super::{InputSnapshot, MetricsHandle, Notification, SceneError, SceneKey, SceneMachine};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_sim_ticks: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_sim_ticks: 60 * 60 * 5,
        }
    }
}

impl LoopConfig {
    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps.max(1) as f64)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("scene machine error: {0}")]
    Scene(#[from] SceneError),
    #[error("failed to flush session store: {0}")]
    Store(#[from] StoreError),
}

/// Supplies one input snapshot per render tick.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    KeyDown(String),
    KeyUp(String),
    GroundClick(Vec2),
    CameraForward(Vec3),
    ReleaseAll,
}

/// Replays a fixed timeline of input events; each event applies at the start
/// of its tick.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    steps: Vec<(u64, ScriptEvent)>,
    cursor: usize,
    tracker: KeyTracker,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, tick: u64, event: ScriptEvent) -> Self {
        let index = self.steps.partition_point(|(at, _)| *at <= tick);
        self.steps.insert(index, (tick, event));
        self
    }

    /// Holds `key` from `start_tick` until (not including) `end_tick`.
    pub fn hold(self, key: &str, start_tick: u64, end_tick: u64) -> Self {
        self.at(start_tick, ScriptEvent::KeyDown(key.to_string()))
            .at(end_tick, ScriptEvent::KeyUp(key.to_string()))
    }

    pub fn tap(self, key: &str, tick: u64) -> Self {
        self.hold(key, tick, tick + 1)
    }

    pub fn last_tick(&self) -> u64 {
        self.steps.last().map(|(tick, _)| *tick).unwrap_or(0)
    }

    fn apply(&mut self, event: &ScriptEvent) {
        match event {
            ScriptEvent::KeyDown(key) => {
                if !self.tracker.handle_key(key, true) {
                    warn!(key = key.as_str(), "scripted_key_unmapped");
                }
            }
            ScriptEvent::KeyUp(key) => {
                self.tracker.handle_key(key, false);
            }
            ScriptEvent::GroundClick(point) => self.tracker.handle_ground_click(*point),
            ScriptEvent::CameraForward(forward) => self.tracker.set_camera_forward(*forward),
            ScriptEvent::ReleaseAll => self.tracker.release_all(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot {
        while let Some((at, event)) = self.steps.get(self.cursor).cloned() {
            if at > tick {
                break;
            }
            self.apply(&event);
            self.cursor += 1;
        }
        self.tracker.snapshot_for_tick()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub scene_switches: u32,
    pub failed_switches: u32,
    pub notification_count: usize,
    pub final_scene: Option<SceneKey>,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Quit,
    Complete,
}

struct LoopState {
    summary: RunSummary,
    metrics: MetricsAccumulator,
}

impl LoopState {
    fn new(config: &LoopConfig) -> Self {
        Self {
            summary: RunSummary::default(),
            metrics: MetricsAccumulator::new(normalize_non_zero_duration(
                config.metrics_log_interval,
                Duration::from_secs(1),
            )),
        }
    }

    fn run_tick(
        &mut self,
        machine: &mut SceneMachine,
        input: &mut dyn InputSource,
        fixed_dt: Duration,
        metrics_handle: &MetricsHandle,
    ) -> TickOutcome {
        let tick = self.metrics.total_ticks();
        let snapshot = input.snapshot_for_tick(tick);
        if snapshot.quit_requested() {
            info!(reason = "quit_action", tick, "shutdown_requested");
            return TickOutcome::Quit;
        }

        let command = machine.update_active(fixed_dt, &snapshot);
        let notifications = machine.world_mut().drain_notifications();
        for notification in &notifications {
            log_notification(notification);
        }
        self.summary.notification_count += notifications.len();
        self.metrics.record_notifications(notifications.len());

        match machine.apply_command(command) {
            Ok(true) => {
                self.summary.scene_switches += 1;
                info!(scene = ?machine.active_scene(), tick, "scene_switched");
            }
            Ok(false) => {}
            Err(error) => {
                self.summary.failed_switches += 1;
                warn!(error = %error, tick, "scene_transition_failed");
            }
        }

        self.metrics.record_tick();
        self.summary.ticks_run = self.metrics.total_ticks();
        if let Some(snapshot) = self.metrics.maybe_snapshot(machine.world().elapsed()) {
            metrics_handle.publish(snapshot);
            debug!(
                tps = snapshot.tps,
                notifications_per_second = snapshot.notifications_per_second,
                total_ticks = snapshot.total_ticks,
                scene = ?machine.active_scene(),
                "loop_metrics"
            );
        }

        if machine.active_is_complete() {
            info!(scene = ?machine.active_scene(), tick, "scene_complete");
            return TickOutcome::Complete;
        }
        TickOutcome::Continue
    }

    fn finish(
        mut self,
        machine: &mut SceneMachine,
        completed: bool,
    ) -> Result<RunSummary, AppError> {
        self.summary.final_scene = machine.active_scene();
        self.summary.completed = completed;
        machine.shutdown_all();
        let trailing = machine.world_mut().drain_notifications();
        for notification in &trailing {
            log_notification(notification);
        }
        self.summary.notification_count += trailing.len();
        machine.world_mut().store_mut().flush()?;
        info!(
            ticks_run = self.summary.ticks_run,
            scene_switches = self.summary.scene_switches,
            failed_switches = self.summary.failed_switches,
            "shutdown"
        );
        Ok(self.summary)
    }
}

/// Steps the active scene at a fixed rate without wall-clock pacing. The
/// machine must already have an active scene.
pub fn run_headless(
    config: &LoopConfig,
    machine: &mut SceneMachine,
    input: &mut dyn InputSource,
    metrics_handle: &MetricsHandle,
) -> Result<RunSummary, AppError> {
    if machine.active_scene().is_none() {
        return Err(AppError::Scene(SceneError::NoActiveScene));
    }
    let fixed_dt = config.fixed_dt();
    info!(
        target_tps = config.target_tps.max(1),
        max_sim_ticks = config.max_sim_ticks,
        mode = "headless",
        "loop_config"
    );

    let mut state = LoopState::new(config);
    let mut completed = false;
    for _ in 0..config.max_sim_ticks {
        match state.run_tick(machine, input, fixed_dt, metrics_handle) {
            TickOutcome::Continue => {}
            TickOutcome::Quit => break,
            TickOutcome::Complete => {
                completed = true;
                break;
            }
        }
    }
    state.finish(machine, completed)
}

/// Same stepping as [`run_headless`], paced against the wall clock with the
/// accumulator/backlog policy of a windowed frame loop.
pub fn run_realtime(
    config: &LoopConfig,
    machine: &mut SceneMachine,
    input: &mut dyn InputSource,
    metrics_handle: &MetricsHandle,
) -> Result<RunSummary, AppError> {
    if machine.active_scene().is_none() {
        return Err(AppError::Scene(SceneError::NoActiveScene));
    }
    let fixed_dt = config.fixed_dt();
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        mode = "realtime",
        "loop_config"
    );

    let mut state = LoopState::new(config);
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut completed = false;

    'frames: while state.summary.ticks_run < config.max_sim_ticks {
        let now = Instant::now();
        let frame_dt = clamp_frame_delta(
            now.saturating_duration_since(last_frame_instant),
            max_frame_delta,
        );
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            match state.run_tick(machine, input, fixed_dt, metrics_handle) {
                TickOutcome::Continue => {}
                TickOutcome::Quit => break 'frames,
                TickOutcome::Complete => {
                    completed = true;
                    break 'frames;
                }
            }
        }
        accumulator = step_plan.remaining_accumulator;
        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        let spent = Instant::now().saturating_duration_since(now);
        if spent < fixed_dt {
            thread::sleep(fixed_dt - spent);
        }
    }
    state.finish(machine, completed)
}

fn log_notification(notification: &Notification) {
    if notification.name == "collectible-progressed" {
        debug!(
            name = notification.name,
            subject = ?notification.subject,
            value = ?notification.value,
            "notification"
        );
    } else {
        info!(
            name = notification.name,
            subject = ?notification.subject,
            value = ?notification.value,
            "notification"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

pub fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

pub fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
