use std::time::Duration;

use engine::{
    Cadence, DebugInfoSnapshot, InputAction, InputSnapshot, KeyValueStore, Scene, SceneCommand,
    SceneKey, SceneLayout, SceneWorld,
};
use glam::Vec3;
use tracing::{debug, info};

use super::events::{GameEvent, GameEventBus};
use super::motion::{MotionController, MotionTuning, MoveIntent};
use super::portal::{PortalEdge, PortalTrigger};
use super::progress::{CollectState, Collectible, ProgressOutcome, ProgressTuning};
use super::proximity::sample_points;
use super::reveal::{apply_view_angle, reveal_on_settle, DebounceEvent, MotionDebounce, RevealTuning};
use super::session::{load_agent_position, save_agent_position, GameSession, TimerOutcome};

pub(crate) const PROXIMITY_PERIOD_MS: u64 = 50;
pub(crate) const SESSION_TIMER_PERIOD_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoneFieldTuning {
    pub(crate) progress: ProgressTuning,
    pub(crate) reveal: RevealTuning,
    pub(crate) motion: MotionTuning,
    pub(crate) proximity_period_ms: u64,
    pub(crate) timer_period_ms: u64,
    pub(crate) finish_target: SceneKey,
}

impl Default for BoneFieldTuning {
    fn default() -> Self {
        Self {
            progress: ProgressTuning::default(),
            reveal: RevealTuning::default(),
            motion: MotionTuning::default(),
            proximity_period_ms: PROXIMITY_PERIOD_MS,
            timer_period_ms: SESSION_TIMER_PERIOD_MS,
            finish_target: SceneKey::Ascent,
        }
    }
}

/// Everything rebuilt on each entry and dropped on exit.
#[derive(Debug)]
struct FieldState {
    motion: MotionController,
    collectibles: Vec<Collectible>,
    portal: Option<PortalTrigger>,
    session: GameSession,
    debounce: MotionDebounce,
    proximity_cadence: Cadence,
    timer_cadence: Cadence,
    events: GameEventBus,
}

/// Open field of collectibles with a timed session and an exit portal.
#[derive(Debug)]
pub(crate) struct BoneFieldScene {
    layout: SceneLayout,
    tuning: BoneFieldTuning,
    state: Option<FieldState>,
}

impl BoneFieldScene {
    pub(crate) fn new(layout: SceneLayout) -> Self {
        Self::with_tuning(layout, BoneFieldTuning::default())
    }

    pub(crate) fn with_tuning(layout: SceneLayout, tuning: BoneFieldTuning) -> Self {
        Self {
            layout,
            tuning,
            state: None,
        }
    }

    pub(crate) fn session(&self) -> Option<&GameSession> {
        self.state.as_ref().map(|state| &state.session)
    }

    pub(crate) fn collectibles(&self) -> &[Collectible] {
        self.state
            .as_ref()
            .map(|state| state.collectibles.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn portal_active(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|state| state.portal.as_ref())
            .is_some_and(PortalTrigger::is_active)
    }
}

impl FieldState {
    fn reveal_after_motion(&mut self, now_ms: u64, view_vector: Vec3, tuning: &BoneFieldTuning) {
        let position = self.motion.position();
        if self.debounce.observe(position, now_ms, &tuning.reveal) == DebounceEvent::Settled {
            for collectible in &mut self.collectibles {
                if reveal_on_settle(
                    collectible,
                    position,
                    tuning.progress.proximity_threshold,
                ) {
                    self.events.emit(GameEvent::CollectibleRevealed {
                        id: collectible.id,
                        revealed: true,
                    });
                }
            }
        }

        if self.debounce.is_moving() {
            return;
        }
        for collectible in &mut self.collectibles {
            if let Some(revealed) = apply_view_angle(collectible, view_vector, &tuning.reveal) {
                self.events.emit(GameEvent::CollectibleRevealed {
                    id: collectible.id,
                    revealed,
                });
            }
        }
    }

    fn proximity_tick(
        &mut self,
        now_ms: u64,
        store: &mut dyn KeyValueStore,
        tuning: &ProgressTuning,
    ) {
        let position = self.motion.position();
        if let Some(portal) = self.portal.as_mut() {
            match portal.evaluate(position) {
                PortalEdge::Entered => self.events.emit(GameEvent::PortalEntered),
                PortalEdge::Exited => self.events.emit(GameEvent::PortalExited),
                PortalEdge::None => {}
            }
        }

        if !self.session.is_playing() {
            return;
        }

        let samples = sample_points(
            position,
            self.collectibles
                .iter()
                .map(|collectible| (collectible.id, collectible.position)),
            tuning.proximity_threshold,
        );
        for (collectible, sample) in self.collectibles.iter_mut().zip(samples) {
            let was_revealed = collectible.revealed;
            match collectible.apply_proximity(sample.proximity, tuning) {
                ProgressOutcome::Unchanged => {}
                ProgressOutcome::Progressed { to, .. } => {
                    self.events.emit(GameEvent::CollectibleProgressed {
                        id: collectible.id,
                        progress: to,
                    });
                }
                ProgressOutcome::Collected => {
                    self.events.emit(GameEvent::CollectibleProgressed {
                        id: collectible.id,
                        progress: 1.0,
                    });
                    self.events
                        .emit(GameEvent::CollectibleCollected { id: collectible.id });
                    if self.session.record_collection(collectible.id, now_ms) {
                        self.session.persist_carry_over(store);
                    }
                }
            }
            if !was_revealed && collectible.revealed {
                self.events.emit(GameEvent::CollectibleRevealed {
                    id: collectible.id,
                    revealed: true,
                });
            }
        }
    }
}

impl Scene for BoneFieldScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let session = GameSession::restore_from(world.store());
        let spawn = load_agent_position(world.store(), SceneKey::BoneField)
            .unwrap_or(self.layout.agent_spawn.position);
        let collectibles: Vec<_> = self
            .layout
            .collectibles
            .iter()
            .map(Collectible::from_def)
            .collect();
        let portal = self.layout.portal.as_ref().map(PortalTrigger::from_def);

        info!(
            scene = %SceneKey::BoneField,
            collectibles = collectibles.len(),
            previous_total = session.previous_total(),
            remaining_seconds = session.remaining_seconds(),
            "session_restored"
        );

        self.state = Some(FieldState {
            motion: MotionController::new(spawn, self.tuning.motion),
            collectibles,
            portal,
            session,
            debounce: MotionDebounce::default(),
            proximity_cadence: Cadence::from_millis(self.tuning.proximity_period_ms),
            timer_cadence: Cadence::from_millis(self.tuning.timer_period_ms),
            events: GameEventBus::default(),
        });
    }

    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        let tuning = self.tuning;
        let Some(state) = self.state.as_mut() else {
            return SceneCommand::None;
        };
        let now_ms = world.elapsed_ms();

        if let Some(click) = input.ground_click() {
            state.motion.request_teleport(click);
        }
        state.motion.step(
            MoveIntent::from_input(input),
            input.pressed(InputAction::Jump),
            world.camera(),
        );

        state.reveal_after_motion(now_ms, world.camera().view_vector(), &tuning);

        for _ in 0..state.proximity_cadence.advance(fixed_dt) {
            state.proximity_tick(now_ms, world.store_mut(), &tuning.progress);
        }

        let activation = state
            .portal
            .as_ref()
            .and_then(|portal| portal.activation_target(input.pressed(InputAction::Interact)));
        if let Some(target) = activation {
            state.events.emit(GameEvent::PortalActivated { target });
            state.session.persist_into(world.store_mut());
            state.events.finish_tick(world);
            return SceneCommand::SwitchTo(target);
        }

        for _ in 0..state.timer_cadence.advance(fixed_dt) {
            match state.session.tick() {
                TimerOutcome::Running { remaining_seconds } => {
                    debug!(remaining_seconds, "session_timer");
                    state.session.persist_timer(world.store_mut());
                }
                TimerOutcome::Finished => {
                    state.events.emit(GameEvent::SessionFinished);
                    state.session.persist_into(world.store_mut());
                    state.events.finish_tick(world);
                    return SceneCommand::SwitchTo(tuning.finish_target);
                }
                TimerOutcome::AlreadyFinished => {}
            }
        }

        state.events.finish_tick(world);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        state.motion.cancel();
        save_agent_position(world.store_mut(), SceneKey::BoneField, state.motion.position());
        state.session.persist_into(world.store_mut());
        info!(
            scene = %SceneKey::BoneField,
            collected = state.session.inventory().len(),
            carry_over_total = state.session.export_carry_over(),
            "session_saved"
        );
    }

    fn debug_title(&self) -> Option<String> {
        let session = self.session()?;
        Some(format!(
            "Bone Field | {}s | {} collected",
            session.remaining_seconds(),
            session.export_carry_over()
        ))
    }

    fn debug_info_snapshot(&self) -> Option<DebugInfoSnapshot> {
        let state = self.state.as_ref()?;
        let agent = state.motion.agent();
        let counts = state.events.last_tick_counts();
        let (mut idle, mut collecting, mut collected) = (0usize, 0usize, 0usize);
        for collectible in self.collectibles() {
            match collectible.state() {
                CollectState::Idle => idle += 1,
                CollectState::Collecting => collecting += 1,
                CollectState::Collected => collected += 1,
            }
        }
        let revealed = self
            .collectibles()
            .iter()
            .filter(|collectible| collectible.revealed)
            .count();
        Some(DebugInfoSnapshot {
            agent_position: agent.position,
            agent_heading: agent.heading,
            motion_mode: agent.mode.label(),
            extra_debug_lines: vec![
                format!(
                    "session: phase={} remaining={}s carry_over={}",
                    state.session.phase().as_token(),
                    state.session.remaining_seconds(),
                    state.session.export_carry_over()
                ),
                format!(
                    "collectibles: idle={idle} collecting={collecting} collected={collected} revealed={revealed}"
                ),
                format!("portal: active={}", self.portal_active()),
                format!(
                    "last_tick_events: total={} progressed={} collected={} reveals={} portal_edges={} activations={} finished={} ascent={}",
                    counts.total,
                    counts.progressed,
                    counts.collected,
                    counts.reveal_changes,
                    counts.portal_edges,
                    counts.portal_activations,
                    counts.session_finished,
                    counts.ascent_milestones
                ),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use engine::{CollectibleDef, MemoryStore, PortalDef};

    use super::*;

    fn layout(collectibles: &[(u32, f32, f32)]) -> SceneLayout {
        SceneLayout {
            scene: SceneKey::BoneField,
            agent_spawn: Default::default(),
            collectibles: collectibles
                .iter()
                .map(|&(id, x, z)| CollectibleDef {
                    id,
                    position: Vec3::new(x, 0.0, z),
                    progress: 0.0,
                })
                .collect(),
            portal: Some(PortalDef {
                position: Vec3::new(-30.0, 0.0, 5.0),
                radius: 7.0,
                target: SceneKey::Ascent,
            }),
            platforms: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn tick(scene: &mut BoneFieldScene, world: &mut SceneWorld, input: &InputSnapshot) -> SceneCommand {
        let dt = Duration::from_millis(50);
        world.advance_clock(dt);
        scene.update(dt, input, world)
    }

    #[test]
    fn standing_on_a_bone_collects_it_and_persists_carry_over() {
        let mut world = SceneWorld::new(Box::new(MemoryStore::new()));
        let mut scene = BoneFieldScene::new(layout(&[(1, 0.5, 0.0), (2, 10.0, 10.0)]));
        scene.load(&mut world);

        for _ in 0..25 {
            assert_eq!(
                tick(&mut scene, &mut world, &InputSnapshot::empty()),
                SceneCommand::None
            );
        }
        let collectibles = scene.collectibles();
        assert!(collectibles[0].collected);
        assert_eq!(collectibles[1].progress, 0.0);
        assert_eq!(world.store().get("carry_over_total").as_deref(), Some("1"));

        let collected: Vec<_> = world
            .notifications()
            .iter()
            .filter(|n| n.name == "collectible-collected")
            .collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].subject, Some(1));
    }

    #[test]
    fn unload_drops_state_and_saves_position() {
        let mut world = SceneWorld::default();
        let mut scene = BoneFieldScene::new(layout(&[(1, 5.0, 5.0)]));
        scene.load(&mut world);
        scene.update(
            Duration::from_millis(16),
            &InputSnapshot::empty().with_ground_click(Some(glam::Vec2::new(3.0, 4.0))),
            &mut world,
        );
        scene.unload(&mut world);

        assert!(scene.session().is_none());
        assert!(scene.collectibles().is_empty());
        assert_eq!(
            load_agent_position(world.store(), SceneKey::BoneField),
            Some(Vec3::new(3.0, 0.0, 4.0))
        );
        assert_eq!(world.store().get("remaining_seconds").as_deref(), Some("60"));
    }

    #[test]
    fn debug_snapshot_reports_collect_states_and_last_tick_events() {
        let mut world = SceneWorld::default();
        let mut scene = BoneFieldScene::new(layout(&[(1, 0.5, 0.0), (2, 10.0, 10.0)]));
        scene.load(&mut world);
        tick(&mut scene, &mut world, &InputSnapshot::empty());

        let lines = scene.debug_info_snapshot().expect("loaded").extra_debug_lines;
        assert!(
            lines.iter().any(|line| line.contains("idle=1 collecting=1 collected=0")),
            "{lines:?}"
        );
        assert!(
            lines
                .iter()
                .any(|line| line.starts_with("last_tick_events:") && line.contains(" progressed=1 ")),
            "{lines:?}"
        );

        tick(&mut scene, &mut world, &InputSnapshot::empty().with_ground_click(Some(glam::Vec2::new(40.0, 40.0))));
        for _ in 0..40 {
            tick(&mut scene, &mut world, &InputSnapshot::empty());
        }
        let lines = scene.debug_info_snapshot().expect("loaded").extra_debug_lines;
        assert!(
            lines.iter().any(|line| line.contains("idle=2 collecting=0 collected=0")),
            "{lines:?}"
        );
        assert!(
            lines.iter().any(|line| line.starts_with("last_tick_events: total=0 ")),
            "{lines:?}"
        );
    }

    #[test]
    fn update_before_load_is_a_no_op() {
        let mut world = SceneWorld::default();
        let mut scene = BoneFieldScene::new(layout(&[]));
        assert_eq!(
            tick(&mut scene, &mut world, &InputSnapshot::empty()),
            SceneCommand::None
        );
        assert!(scene.debug_info_snapshot().is_none());
    }
}
