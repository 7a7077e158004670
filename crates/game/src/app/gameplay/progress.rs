use engine::CollectibleDef;
use glam::Vec3;

use super::proximity::Proximity;
use super::reveal::reveal_direction;

/// Progress at or above `1.0 - COMPLETION_EPSILON` counts as complete, so
/// accumulated float steps land on exactly 1.0.
const COMPLETION_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProgressTuning {
    pub(crate) proximity_threshold: f32,
    pub(crate) accrual_step: f32,
    pub(crate) decay_ratio: f32,
}

impl Default for ProgressTuning {
    fn default() -> Self {
        Self {
            proximity_threshold: 2.0,
            accrual_step: 0.04,
            decay_ratio: 2.0,
        }
    }
}

impl ProgressTuning {
    pub(crate) fn decay_step(&self) -> f32 {
        self.accrual_step * self.decay_ratio
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectState {
    Idle,
    Collecting,
    Collected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ProgressOutcome {
    Unchanged,
    Progressed { from: f32, to: f32 },
    Collected,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Collectible {
    pub(crate) id: u32,
    pub(crate) position: Vec3,
    pub(crate) progress: f32,
    pub(crate) collected: bool,
    pub(crate) revealed: bool,
    pub(crate) reveal_direction: Vec3,
    pub(crate) angle_matched: bool,
    started: bool,
}

impl Collectible {
    pub(crate) fn new(id: u32, position: Vec3) -> Self {
        Self {
            id,
            position,
            progress: 0.0,
            collected: false,
            revealed: false,
            reveal_direction: reveal_direction(id),
            angle_matched: false,
            started: false,
        }
    }

    /// Authored progress at the completion threshold arrives already
    /// collected.
    pub(crate) fn from_def(def: &CollectibleDef) -> Self {
        let mut collectible = Self::new(def.id, def.position);
        let progress = def.progress.clamp(0.0, 1.0);
        if progress >= 1.0 - COMPLETION_EPSILON {
            collectible.progress = 1.0;
            collectible.collected = true;
            collectible.revealed = true;
        } else {
            collectible.progress = progress;
        }
        collectible.started = collectible.progress > 0.0;
        collectible
    }

    pub(crate) fn state(&self) -> CollectState {
        if self.collected {
            CollectState::Collected
        } else if self.progress > 0.0 {
            CollectState::Collecting
        } else {
            CollectState::Idle
        }
    }

    /// Sticky: stays true after progress decays back to zero.
    pub(crate) fn collection_started(&self) -> bool {
        self.started
    }

    /// One proximity cadence tick. Collected collectibles never change.
    pub(crate) fn apply_proximity(
        &mut self,
        proximity: Proximity,
        tuning: &ProgressTuning,
    ) -> ProgressOutcome {
        if self.collected {
            return ProgressOutcome::Unchanged;
        }

        let from = self.progress;
        let to = match proximity {
            Proximity::Near => (from + tuning.accrual_step).min(1.0),
            Proximity::Far if from > 0.0 => (from - tuning.decay_step()).max(0.0),
            Proximity::Far => from,
        };

        if proximity == Proximity::Near && to >= 1.0 - COMPLETION_EPSILON {
            self.progress = 1.0;
            self.collected = true;
            self.started = true;
            self.revealed = true;
            return ProgressOutcome::Collected;
        }

        self.progress = to.clamp(0.0, 1.0);
        if self.progress > 0.0 {
            self.started = true;
            self.revealed = true;
        }
        if self.progress == from {
            ProgressOutcome::Unchanged
        } else {
            ProgressOutcome::Progressed {
                from,
                to: self.progress,
            }
        }
    }
}
