use std::path::Path;

use engine::{KeyValueStore, LayoutError, SceneKey, SceneMachine, SceneWorld};

mod ascent;
mod bone_field;
mod demo_script;
mod events;
mod layouts;
mod motion;
mod platforming;
mod portal;
mod progress;
mod proximity;
mod reveal;
mod session;

use ascent::AscentScene;
use bone_field::BoneFieldScene;
use session::{
    GameSession, SessionPhase, CARRY_OVER_KEY, REMAINING_SECONDS_KEY, SESSION_PHASE_KEY,
    SESSION_SNAPSHOT_VERSION,
};

pub(crate) use demo_script::{bone_field_to_ascent, parse_input_script};
pub(crate) use session::{parse_session_snapshot_json, SessionSnapshot};

/// Registers both scenes, compiling their layouts from `layouts_dir` when it
/// holds them and from the built-in copies otherwise.
pub(crate) fn build_scene_machine(
    world: SceneWorld,
    layouts_dir: Option<&Path>,
) -> Result<SceneMachine, LayoutError> {
    let bone_field = layouts::load_layout(SceneKey::BoneField, layouts_dir)?;
    let ascent = layouts::load_layout(SceneKey::Ascent, layouts_dir)?;

    let mut machine = SceneMachine::new(world);
    machine.register(SceneKey::BoneField, Box::new(BoneFieldScene::new(bone_field)));
    machine.register(SceneKey::Ascent, Box::new(AscentScene::new(ascent)));
    Ok(machine)
}

/// Reads the persisted session keys back as a snapshot. Cleared timer keys
/// next to a carry-over total mean the countdown ran out.
pub(crate) fn stored_session_summary(store: &dyn KeyValueStore) -> SessionSnapshot {
    let timer_cleared =
        store.get(SESSION_PHASE_KEY).is_none() && store.get(REMAINING_SECONDS_KEY).is_none();
    let session = GameSession::restore_from(store);
    if timer_cleared && store.get(CARRY_OVER_KEY).is_some() {
        return SessionSnapshot {
            snapshot_version: SESSION_SNAPSHOT_VERSION,
            carry_over_total: session.previous_total(),
            phase: SessionPhase::Finished,
            remaining_seconds: 0,
            inventory: Vec::new(),
        };
    }
    session.snapshot()
}
