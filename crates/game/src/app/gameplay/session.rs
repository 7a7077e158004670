use std::fmt::Display;

use engine::{KeyValueStore, SceneKey};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub(crate) const CARRY_OVER_KEY: &str = "carry_over_total";
pub(crate) const SESSION_PHASE_KEY: &str = "session_phase";
pub(crate) const REMAINING_SECONDS_KEY: &str = "remaining_seconds";
pub(crate) const DEFAULT_REMAINING_SECONDS: u32 = 60;
pub(crate) const SESSION_SNAPSHOT_VERSION: u32 = 1;

type SessionResult<T> = Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SessionPhase {
    Playing,
    Finished,
}

impl SessionPhase {
    pub(crate) fn as_token(self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }

    pub(crate) fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "playing" => Some(Self::Playing),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct InventoryEntry {
    pub(crate) id: u32,
    pub(crate) timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerOutcome {
    Running { remaining_seconds: u32 },
    Finished,
    AlreadyFinished,
}

/// Timer, inventory and carry-over count shared across scene boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GameSession {
    previous_total: u32,
    inventory: Vec<InventoryEntry>,
    remaining_seconds: u32,
    phase: SessionPhase,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    pub(crate) fn new() -> Self {
        Self {
            previous_total: 0,
            inventory: Vec::new(),
            remaining_seconds: DEFAULT_REMAINING_SECONDS,
            phase: SessionPhase::Playing,
        }
    }

    pub(crate) fn restore(previous_total: u32, remaining_seconds: u32, phase: SessionPhase) -> Self {
        Self {
            previous_total,
            inventory: Vec::new(),
            remaining_seconds,
            phase,
        }
    }

    /// Scene-entry hydration. Anything missing or unreadable falls back to a
    /// fresh playing session; only a stored `playing` phase with a readable
    /// remaining time resumes the countdown.
    pub(crate) fn restore_from(store: &dyn KeyValueStore) -> Self {
        let previous_total = read_parsed::<u32>(store, CARRY_OVER_KEY).unwrap_or(0);
        let phase = store.get(SESSION_PHASE_KEY).and_then(|raw| {
            let phase = SessionPhase::from_token(&raw);
            if phase.is_none() {
                warn!(key = SESSION_PHASE_KEY, value = %raw, "session_value_unreadable");
            }
            phase
        });
        let remaining = read_parsed::<u32>(store, REMAINING_SECONDS_KEY);

        match (phase, remaining) {
            (Some(SessionPhase::Playing), Some(remaining_seconds)) => {
                Self::restore(previous_total, remaining_seconds, SessionPhase::Playing)
            }
            _ => Self::restore(
                previous_total,
                DEFAULT_REMAINING_SECONDS,
                SessionPhase::Playing,
            ),
        }
    }

    pub(crate) fn previous_total(&self) -> u32 {
        self.previous_total
    }

    pub(crate) fn inventory(&self) -> &[InventoryEntry] {
        &self.inventory
    }

    pub(crate) fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.phase == SessionPhase::Playing
    }

    pub(crate) fn has_collected(&self, id: u32) -> bool {
        self.inventory.iter().any(|entry| entry.id == id)
    }

    /// Returns false when the id is already in the inventory.
    pub(crate) fn record_collection(&mut self, id: u32, timestamp_ms: u64) -> bool {
        if self.has_collected(id) {
            return false;
        }
        self.inventory.push(InventoryEntry { id, timestamp_ms });
        true
    }

    pub(crate) fn tick(&mut self) -> TimerOutcome {
        if self.phase == SessionPhase::Finished {
            return TimerOutcome::AlreadyFinished;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = SessionPhase::Finished;
            TimerOutcome::Finished
        } else {
            TimerOutcome::Running {
                remaining_seconds: self.remaining_seconds,
            }
        }
    }

    pub(crate) fn export_carry_over(&self) -> u32 {
        self.previous_total
            .saturating_add(u32::try_from(self.inventory.len()).unwrap_or(u32::MAX))
    }

    pub(crate) fn persist_carry_over(&self, store: &mut dyn KeyValueStore) {
        store.set(CARRY_OVER_KEY, &self.export_carry_over().to_string());
    }

    pub(crate) fn persist_timer(&self, store: &mut dyn KeyValueStore) {
        store.set(SESSION_PHASE_KEY, self.phase.as_token());
        store.set(REMAINING_SECONDS_KEY, &self.remaining_seconds.to_string());
    }

    /// Writes the carry-over total, plus the timer while still playing. A
    /// finished session clears its timer keys so the next entry starts over.
    pub(crate) fn persist_into(&self, store: &mut dyn KeyValueStore) {
        self.persist_carry_over(store);
        match self.phase {
            SessionPhase::Playing => self.persist_timer(store),
            SessionPhase::Finished => {
                store.remove(SESSION_PHASE_KEY);
                store.remove(REMAINING_SECONDS_KEY);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            snapshot_version: SESSION_SNAPSHOT_VERSION,
            carry_over_total: self.export_carry_over(),
            phase: self.phase,
            remaining_seconds: self.remaining_seconds,
            inventory: self.inventory.clone(),
        }
    }
}

fn read_parsed<T: std::str::FromStr>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "session_value_unreadable");
            None
        }
    }
}

pub(crate) fn agent_position_key(scene: SceneKey) -> String {
    format!("agent_position_{}", scene.as_token())
}

pub(crate) fn load_agent_position(store: &dyn KeyValueStore, scene: SceneKey) -> Option<Vec3> {
    let key = agent_position_key(scene);
    let raw = store.get(&key)?;
    match serde_json::from_str::<Vec3>(&raw) {
        Ok(position) if position.is_finite() => Some(position),
        Ok(_) => {
            warn!(key = %key, value = %raw, "agent_position_non_finite");
            None
        }
        Err(error) => {
            warn!(key = %key, error = %error, "agent_position_unreadable");
            None
        }
    }
}

pub(crate) fn save_agent_position(store: &mut dyn KeyValueStore, scene: SceneKey, position: Vec3) {
    if !position.is_finite() {
        return;
    }
    match serde_json::to_string(&position) {
        Ok(raw) => store.set(&agent_position_key(scene), &raw),
        Err(error) => warn!(error = %error, "agent_position_encode_failed"),
    }
}

/// Portable view of a session, written by the demo shell and readable back
/// for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SessionSnapshot {
    pub(crate) snapshot_version: u32,
    pub(crate) carry_over_total: u32,
    pub(crate) phase: SessionPhase,
    pub(crate) remaining_seconds: u32,
    #[serde(default)]
    pub(crate) inventory: Vec<InventoryEntry>,
}

impl SessionSnapshot {
    pub(crate) fn to_json(&self) -> SessionResult<String> {
        serde_json::to_string_pretty(self).map_err(|error| format!("encode session json: {error}"))
    }

    /// Writes the persisted session keys so the next scene entry resumes
    /// from this snapshot. Inventory entries are already folded into the
    /// carry-over total.
    pub(crate) fn seed_store(&self, store: &mut dyn KeyValueStore) {
        GameSession::restore(self.carry_over_total, self.remaining_seconds, self.phase)
            .persist_into(store);
    }
}

pub(crate) fn parse_session_snapshot_json(raw: &str) -> SessionResult<SessionSnapshot> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let snapshot = match serde_path_to_error::deserialize::<_, SessionSnapshot>(&mut deserializer)
    {
        Ok(snapshot) => snapshot,
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            return if path.is_empty() || path == "." {
                Err(format!("parse session json: {source}"))
            } else {
                Err(format!("parse session json at {path}: {source}"))
            };
        }
    };
    validate_session_snapshot(&snapshot)?;
    Ok(snapshot)
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> String {
    format!("validation failed at {path}: expected {expected}, got {actual}")
}

fn validate_session_snapshot(snapshot: &SessionSnapshot) -> SessionResult<()> {
    if snapshot.snapshot_version != SESSION_SNAPSHOT_VERSION {
        return Err(expected_actual(
            "snapshot_version",
            SESSION_SNAPSHOT_VERSION,
            snapshot.snapshot_version,
        ));
    }
    if snapshot.phase == SessionPhase::Finished && snapshot.remaining_seconds != 0 {
        return Err(expected_actual(
            "remaining_seconds",
            "0 for a finished session",
            snapshot.remaining_seconds,
        ));
    }
    for (index, entry) in snapshot.inventory.iter().enumerate() {
        if snapshot.inventory[..index]
            .iter()
            .any(|earlier| earlier.id == entry.id)
        {
            return Err(expected_actual(
                &format!("inventory[{index}].id"),
                "unique id",
                entry.id,
            ));
        }
    }
    let inventory_len = u32::try_from(snapshot.inventory.len()).unwrap_or(u32::MAX);
    if snapshot.carry_over_total < inventory_len {
        return Err(expected_actual(
            "carry_over_total",
            format!("at least {inventory_len}"),
            snapshot.carry_over_total,
        ));
    }
    Ok(())
}
