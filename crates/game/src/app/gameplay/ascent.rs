use std::f32::consts::FRAC_PI_4;
use std::time::Duration;

use engine::{
    DebugInfoSnapshot, InputAction, InputSnapshot, Scene, SceneCommand, SceneKey, SceneLayout,
    SceneWorld,
};
use glam::Vec3;
use tracing::info;

use super::events::{GameEvent, GameEventBus};
use super::motion::MoveIntent;
use super::platforming::{Platform, PlatformingController, PlatformingStep, PlatformingTuning};
use super::session::{load_agent_position, save_agent_position, GameSession};

const CAMERA_START: Vec3 = Vec3::new(50.0, 5.0, 0.0);
const CAMERA_END_X: f32 = 20.0;
const CAMERA_LOOK_AT: Vec3 = Vec3::ZERO;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AscentTuning {
    pub(crate) platforming: PlatformingTuning,
    pub(crate) intro_delay_ms: u64,
    pub(crate) camera_zoom_ms: u64,
    pub(crate) required_jumps: u32,
    pub(crate) ascension_ms: u64,
}

impl Default for AscentTuning {
    fn default() -> Self {
        Self {
            platforming: PlatformingTuning::default(),
            intro_delay_ms: 4000,
            camera_zoom_ms: 2000,
            required_jumps: 15,
            ascension_ms: 5000,
        }
    }
}

impl AscentTuning {
    pub(crate) fn intro_at_ms(&self) -> u64 {
        self.intro_delay_ms + self.camera_zoom_ms
    }
}

fn ease_in_out_quad(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

fn ratio(elapsed_ms: u64, duration_ms: u64) -> f32 {
    if duration_ms == 0 {
        return 1.0;
    }
    (elapsed_ms as f32 / duration_ms as f32).min(1.0)
}

#[derive(Debug)]
struct AscentState {
    controller: PlatformingController,
    platforms: Vec<Platform>,
    scene_time: Duration,
    camera_position: Vec3,
    carry_over_total: u32,
    intro_shown: bool,
    jump_count: u32,
    ascension_started_ms: Option<u64>,
    completed: bool,
    last_step: Option<PlatformingStep>,
    events: GameEventBus,
}

impl AscentState {
    fn scene_ms(&self) -> u64 {
        self.scene_time.as_millis() as u64
    }

    /// Forward from the current camera position to the look-at point,
    /// pitched upwards by `pitch` radians.
    fn camera_forward(&self, pitch: f32) -> Vec3 {
        let toward = CAMERA_LOOK_AT - self.camera_position;
        let planar = Vec3::new(toward.x, 0.0, toward.z)
            .try_normalize()
            .unwrap_or(Vec3::NEG_X);
        let base_elevation = toward.y.atan2(Vec3::new(toward.x, 0.0, toward.z).length());
        let elevation = base_elevation + pitch;
        planar * elevation.cos() + Vec3::Y * elevation.sin()
    }
}

/// Platform climb that ends the run: wait for the intro, count jumps, ascend.
#[derive(Debug)]
pub(crate) struct AscentScene {
    layout: SceneLayout,
    tuning: AscentTuning,
    state: Option<AscentState>,
}

impl AscentScene {
    pub(crate) fn new(layout: SceneLayout) -> Self {
        Self {
            layout,
            tuning: AscentTuning::default(),
            state: None,
        }
    }

    pub(crate) fn jump_count(&self) -> u32 {
        self.state.as_ref().map_or(0, |state| state.jump_count)
    }

    pub(crate) fn intro_shown(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.intro_shown)
    }

    pub(crate) fn is_ascending(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.ascension_started_ms.is_some())
    }
}

impl Scene for AscentScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let session = GameSession::restore_from(world.store());
        info!(
            scene = %SceneKey::Ascent,
            carry_over_total = session.previous_total(),
            remaining_seconds = session.remaining_seconds(),
            phase = session.phase().as_token(),
            "session_restored"
        );
        let spawn = load_agent_position(world.store(), SceneKey::Ascent)
            .unwrap_or(self.layout.agent_spawn.position);
        let state = AscentState {
            controller: PlatformingController::new(spawn, self.tuning.platforming),
            platforms: self.layout.platforms.iter().map(Platform::from_def).collect(),
            scene_time: Duration::ZERO,
            camera_position: CAMERA_START,
            carry_over_total: session.previous_total(),
            intro_shown: false,
            jump_count: 0,
            ascension_started_ms: None,
            last_step: None,
            completed: false,
            events: GameEventBus::default(),
        };
        world.camera_mut().set_forward(state.camera_forward(0.0));
        self.state = Some(state);
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
        state.scene_time = state.scene_time.saturating_add(fixed_dt);
        let now_ms = state.scene_ms();

        if now_ms >= tuning.intro_delay_ms {
            let zoom = ease_in_out_quad(ratio(
                now_ms - tuning.intro_delay_ms,
                tuning.camera_zoom_ms,
            ));
            state.camera_position.x = CAMERA_START.x + (CAMERA_END_X - CAMERA_START.x) * zoom;
        }
        if !state.intro_shown && now_ms >= tuning.intro_at_ms() {
            state.intro_shown = true;
            state.events.emit(GameEvent::IntroMessageShown);
        }

        let pitch = state
            .ascension_started_ms
            .map_or(0.0, |start| ratio(now_ms - start, tuning.ascension_ms) * FRAC_PI_4);
        world.camera_mut().set_forward(state.camera_forward(pitch));

        let step = state.controller.step(
            MoveIntent::from_input(input),
            input.is_down(InputAction::Jump),
            world.camera(),
            &state.platforms,
            now_ms,
        );
        if step.fell_out {
            info!(scene_ms = now_ms, "ascent_fall_reset");
        }
        state.last_step = Some(step);

        if state.intro_shown && input.pressed(InputAction::Jump) {
            state.jump_count = state.jump_count.saturating_add(1);
            state.events.emit(GameEvent::JumpCounted {
                count: state.jump_count,
            });
            if state.jump_count >= tuning.required_jumps && state.ascension_started_ms.is_none() {
                state.ascension_started_ms = Some(now_ms);
                state.events.emit(GameEvent::AscensionStarted);
            }
        }

        if let Some(start) = state.ascension_started_ms {
            if !state.completed && now_ms - start >= tuning.ascension_ms {
                state.completed = true;
                state.events.emit(GameEvent::AscensionCompleted);
            }
        }

        state.events.finish_tick(world);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        if let Some(state) = self.state.take() {
            save_agent_position(world.store_mut(), SceneKey::Ascent, state.controller.position());
        }
    }

    fn is_complete(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.completed)
    }

    fn debug_title(&self) -> Option<String> {
        let state = self.state.as_ref()?;
        Some(format!(
            "Ascent | jumps {}/{} | {} bones",
            state.jump_count, self.tuning.required_jumps, state.carry_over_total
        ))
    }

    fn debug_info_snapshot(&self) -> Option<DebugInfoSnapshot> {
        let state = self.state.as_ref()?;
        let controller = &state.controller;
        Some(DebugInfoSnapshot {
            agent_position: controller.position(),
            agent_heading: controller.heading(),
            motion_mode: if controller.on_ground() {
                "grounded"
            } else {
                "airborne"
            },
            extra_debug_lines: vec![
                format!("velocity_y: {:.3}", controller.velocity().y),
                format!(
                    "camera: ({:.1}, {:.1}, {:.1})",
                    state.camera_position.x, state.camera_position.y, state.camera_position.z
                ),
                match state.last_step {
                    Some(step) => format!(
                        "last_step: support={:?} jumped={} fell_out={} recovered={}",
                        step.support, step.jumped, step.fell_out, step.recovered
                    ),
                    None => "last_step: none".to_string(),
                },
                format!(
                    "intro_shown={} jumps={} ascending={} complete={}",
                    self.intro_shown(),
                    self.jump_count(),
                    self.is_ascending(),
                    state.completed
                ),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use engine::{AgentSpawnDef, PlatformDef};

    use super::*;

    const TICK: Duration = Duration::from_millis(50);

    fn ascent_layout() -> SceneLayout {
        SceneLayout {
            scene: SceneKey::Ascent,
            agent_spawn: AgentSpawnDef {
                position: Vec3::new(0.0, -9.0, 0.0),
            },
            collectibles: Vec::new(),
            portal: None,
            platforms: vec![PlatformDef {
                position: Vec3::new(0.0, -10.0, 0.0),
                size: Vec3::new(10.0, 0.5, 4.0),
                speed: 0.0,
                phase: 0.0,
            }],
            warnings: Vec::new(),
        }
    }

    fn idle_ticks(scene: &mut AscentScene, world: &mut SceneWorld, count: u32) {
        for _ in 0..count {
            scene.update(TICK, &InputSnapshot::empty(), world);
        }
    }

    fn press_jump(scene: &mut AscentScene, world: &mut SceneWorld) {
        let press = InputSnapshot::empty()
            .with_action_down(InputAction::Jump, true)
            .with_action_pressed(InputAction::Jump);
        scene.update(TICK, &press, world);
        scene.update(TICK, &InputSnapshot::empty(), world);
    }

    #[test]
    fn jumps_before_intro_are_not_counted() {
        let mut world = SceneWorld::default();
        let mut scene = AscentScene::new(ascent_layout());
        scene.load(&mut world);
        press_jump(&mut scene, &mut world);
        assert_eq!(scene.jump_count(), 0);

        idle_ticks(&mut scene, &mut world, 116);
        assert!(!scene.intro_shown());
        idle_ticks(&mut scene, &mut world, 2);
        assert!(scene.intro_shown());
    }

    #[test]
    fn fifteen_jumps_start_an_ascension_that_completes_after_five_seconds() {
        let mut world = SceneWorld::default();
        let mut scene = AscentScene::new(ascent_layout());
        scene.load(&mut world);
        idle_ticks(&mut scene, &mut world, 120);
        assert!(scene.intro_shown());

        for _ in 0..14 {
            press_jump(&mut scene, &mut world);
        }
        assert!(!scene.is_ascending());
        press_jump(&mut scene, &mut world);
        assert_eq!(scene.jump_count(), 15);
        assert!(scene.is_ascending());
        assert!(!scene.is_complete());

        idle_ticks(&mut scene, &mut world, 97);
        assert!(!scene.is_complete());
        idle_ticks(&mut scene, &mut world, 3);
        assert!(scene.is_complete());

        let names: Vec<_> = world.notifications().iter().map(|n| n.name).collect();
        assert_eq!(names.iter().filter(|name| **name == "jump-counted").count(), 15);
        assert_eq!(
            names.iter().filter(|name| **name == "ascension-started").count(),
            1
        );
        assert_eq!(
            names.iter().filter(|name| **name == "ascension-completed").count(),
            1
        );
    }

    #[test]
    fn camera_zooms_in_and_tilts_up_while_ascending() {
        let mut world = SceneWorld::default();
        let mut scene = AscentScene::new(ascent_layout());
        scene.load(&mut world);
        assert!(world.camera().forward().x < -0.9);

        idle_ticks(&mut scene, &mut world, 120);
        let state = scene.state.as_ref().expect("loaded");
        assert!((state.camera_position.x - CAMERA_END_X).abs() < 1e-4);
        let level_forward = world.camera().forward();

        for _ in 0..15 {
            press_jump(&mut scene, &mut world);
        }
        idle_ticks(&mut scene, &mut world, 100);
        assert!(world.camera().forward().y > level_forward.y + 0.5);
    }

    #[test]
    fn agent_rests_on_the_ground_platform() {
        let mut world = SceneWorld::default();
        let mut scene = AscentScene::new(ascent_layout());
        scene.load(&mut world);
        idle_ticks(&mut scene, &mut world, 10);
        let snapshot = scene.debug_info_snapshot().expect("loaded");
        assert!((snapshot.agent_position.y - -9.25).abs() < 1e-5);
        assert_eq!(snapshot.motion_mode, "grounded");
        assert!(
            snapshot
                .extra_debug_lines
                .iter()
                .any(|line| line.starts_with("last_step: support=Platform(")
                    && line.ends_with("fell_out=false recovered=false")),
            "{:?}",
            snapshot.extra_debug_lines
        );
    }
}
