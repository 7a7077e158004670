use glam::Vec3;

use super::progress::Collectible;
use super::proximity::planar_distance;

const REVEAL_AZIMUTH_PER_ID: f32 = 0.7;
const REVEAL_HORIZONTAL_SCALE: f32 = 0.8;
const REVEAL_ELEVATION: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RevealTuning {
    pub(crate) dot_threshold: f32,
    pub(crate) settle_delay_ms: u64,
    pub(crate) movement_epsilon: f32,
}

impl Default for RevealTuning {
    fn default() -> Self {
        Self {
            dot_threshold: 0.7,
            settle_delay_ms: 100,
            movement_epsilon: 0.01,
        }
    }
}

/// Deterministic unit direction a collectible must be viewed from.
pub(crate) fn reveal_direction(id: u32) -> Vec3 {
    let azimuth = id as f32 * REVEAL_AZIMUTH_PER_ID;
    Vec3::new(
        azimuth.sin() * REVEAL_HORIZONTAL_SCALE,
        REVEAL_ELEVATION,
        azimuth.cos() * REVEAL_HORIZONTAL_SCALE,
    )
    .normalize()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DebounceState {
    Stationary,
    Moving { last_moved_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DebounceEvent {
    None,
    StartedMoving,
    Settled,
}

/// Stationary/Moving tracker over agent positions. Settles once no planar
/// movement above the epsilon has been seen for the settle delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionDebounce {
    state: DebounceState,
    last_position: Option<Vec3>,
}

impl Default for MotionDebounce {
    fn default() -> Self {
        Self {
            state: DebounceState::Stationary,
            last_position: None,
        }
    }
}

impl MotionDebounce {
    pub(crate) fn is_moving(&self) -> bool {
        matches!(self.state, DebounceState::Moving { .. })
    }

    pub(crate) fn observe(
        &mut self,
        position: Vec3,
        now_ms: u64,
        tuning: &RevealTuning,
    ) -> DebounceEvent {
        let delta = self
            .last_position
            .map(|last| planar_distance(last, position))
            .unwrap_or(0.0);
        self.last_position = Some(position);

        if delta > tuning.movement_epsilon {
            let was_moving = self.is_moving();
            self.state = DebounceState::Moving {
                last_moved_ms: now_ms,
            };
            return if was_moving {
                DebounceEvent::None
            } else {
                DebounceEvent::StartedMoving
            };
        }

        match self.state {
            DebounceState::Moving { last_moved_ms }
                if now_ms.saturating_sub(last_moved_ms) >= tuning.settle_delay_ms =>
            {
                self.state = DebounceState::Stationary;
                DebounceEvent::Settled
            }
            _ => DebounceEvent::None,
        }
    }
}

/// Re-evaluates the viewing-angle match; returns the new `revealed` value
/// when it changed. Only an angle flip changes `revealed`, and collectibles
/// whose collection started stay revealed.
pub(crate) fn apply_view_angle(
    collectible: &mut Collectible,
    view_vector: Vec3,
    tuning: &RevealTuning,
) -> Option<bool> {
    if collectible.collected {
        return None;
    }
    let matched = view_vector.dot(collectible.reveal_direction) > tuning.dot_threshold;
    if matched == collectible.angle_matched {
        return None;
    }
    collectible.angle_matched = matched;

    let revealed = collectible.collection_started() || matched;
    if revealed == collectible.revealed {
        return None;
    }
    collectible.revealed = revealed;
    Some(revealed)
}

/// Reveals a collectible when the agent comes to rest near it or after its
/// collection started. Returns true when this call revealed it.
pub(crate) fn reveal_on_settle(
    collectible: &mut Collectible,
    agent_position: Vec3,
    proximity_threshold: f32,
) -> bool {
    if collectible.collected || collectible.revealed {
        return false;
    }
    let near = planar_distance(agent_position, collectible.position) < proximity_threshold;
    if collectible.collection_started() || near {
        collectible.revealed = true;
        return true;
    }
    false
}
