use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use glam::{Vec2, Vec3};
use thiserror::Error;
use tracing::{info, warn};

use super::input::{ActionStates, InputAction};
use crate::store::{KeyValueStore, MemoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKey {
    BoneField,
    Repair,
    Ascent,
}

impl SceneKey {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::BoneField => "bone_field",
            Self::Repair => "repair",
            Self::Ascent => "ascent",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "bone_field" => Some(Self::BoneField),
            "repair" => Some(Self::Repair),
            "ascent" => Some(Self::Ascent),
            _ => None,
        }
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    SwitchTo(SceneKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("scene '{0}' is not registered with the scene machine")]
    NotRegistered(SceneKey),
    #[error("no scene is active")]
    NoActiveScene,
}

/// Input state for one render tick: held actions, single-tick press edges,
/// an optional ground click (planar x/z) and the camera forward vector if the
/// view changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    held: ActionStates,
    pressed: ActionStates,
    ground_click: Option<Vec2>,
    camera_forward: Option<Vec3>,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        held: ActionStates,
        pressed: ActionStates,
        ground_click: Option<Vec2>,
        camera_forward: Option<Vec3>,
    ) -> Self {
        Self {
            held,
            pressed,
            ground_click,
            camera_forward,
        }
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.held.is_down(action)
    }

    pub fn pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn quit_requested(&self) -> bool {
        self.pressed(InputAction::Quit)
    }

    pub fn ground_click(&self) -> Option<Vec2> {
        self.ground_click
    }

    pub fn camera_forward(&self) -> Option<Vec3> {
        self.camera_forward
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.held.set(action, is_down);
        self
    }

    /// Marks a press edge; the action is also reported as held.
    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.pressed.set(action, true);
        self.held.set(action, true);
        self
    }

    pub fn with_ground_click(mut self, ground_click: Option<Vec2>) -> Self {
        self.ground_click = ground_click;
        self
    }

    pub fn with_camera_forward(mut self, camera_forward: Option<Vec3>) -> Self {
        self.camera_forward = camera_forward;
        self
    }
}

/// Orientation supplied by the render collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    forward: Vec3,
}

pub const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(-17.5, 6.0, 30.0);

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            forward: (Vec3::ZERO - DEFAULT_CAMERA_POSITION).normalize(),
        }
    }
}

impl CameraRig {
    pub fn looking_along(forward: Vec3) -> Self {
        let mut rig = Self::default();
        rig.set_forward(forward);
        rig
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Ignores zero-length or non-finite vectors.
    pub fn set_forward(&mut self, forward: Vec3) -> bool {
        match forward.try_normalize() {
            Some(normalized) => {
                self.forward = normalized;
                true
            }
            None => false,
        }
    }

    /// Forward flattened onto the ground plane; `None` when looking straight
    /// up or down.
    pub fn planar_forward(&self) -> Option<Vec3> {
        Vec3::new(self.forward.x, 0.0, self.forward.z).try_normalize()
    }

    /// Direction from the viewed subject back towards the camera.
    pub fn view_vector(&self) -> Vec3 {
        -self.forward
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Notification {
    pub name: &'static str,
    pub subject: Option<u32>,
    pub value: Option<f32>,
}

impl Notification {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            subject: None,
            value: None,
        }
    }

    pub fn with_subject(mut self, subject: u32) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_value(mut self, value: f32) -> Self {
        self.value = Some(value);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugInfoSnapshot {
    pub agent_position: Vec3,
    pub agent_heading: f32,
    pub motion_mode: &'static str,
    pub extra_debug_lines: Vec<String>,
}

/// State shared by every scene the machine hosts. Scene-local state lives in
/// the scenes themselves and is rebuilt on each load.
#[derive(Debug)]
pub struct SceneWorld {
    store: Box<dyn KeyValueStore>,
    camera: CameraRig,
    elapsed: Duration,
    notifications: Vec<Notification>,
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }
}

impl SceneWorld {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            camera: CameraRig::default(),
            elapsed: Duration::ZERO,
            notifications: Vec::new(),
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn KeyValueStore {
        self.store.as_mut()
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    /// Simulation time since the machine started, independent of wall time.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    pub fn advance_clock(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt: Duration,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn is_complete(&self) -> bool {
        false
    }
    fn debug_title(&self) -> Option<String> {
        None
    }
    fn debug_info_snapshot(&self) -> Option<DebugInfoSnapshot> {
        None
    }
}

pub struct SceneMachine {
    scenes: HashMap<SceneKey, Box<dyn Scene>>,
    active_scene: Option<SceneKey>,
    world: SceneWorld,
}

impl SceneMachine {
    pub fn new(world: SceneWorld) -> Self {
        Self {
            scenes: HashMap::new(),
            active_scene: None,
            world,
        }
    }

    pub fn register(&mut self, key: SceneKey, scene: Box<dyn Scene>) {
        if self.scenes.insert(key, scene).is_some() {
            warn!(scene = %key, "scene_registration_replaced");
        }
    }

    pub fn is_registered(&self, key: SceneKey) -> bool {
        self.scenes.contains_key(&key)
    }

    pub fn active_scene(&self) -> Option<SceneKey> {
        self.active_scene
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }

    pub fn start(&mut self, key: SceneKey) -> Result<(), SceneError> {
        self.switch_to(key).map(|_| ())
    }

    pub fn update_active(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> SceneCommand {
        let Some(key) = self.active_scene else {
            return SceneCommand::None;
        };
        let Some(scene) = self.scenes.get_mut(&key) else {
            return SceneCommand::None;
        };
        if let Some(forward) = input.camera_forward() {
            self.world.camera.set_forward(forward);
        }
        self.world.advance_clock(fixed_dt);
        scene.update(fixed_dt, input, &mut self.world)
    }

    /// Returns whether the active scene changed.
    pub fn apply_command(&mut self, command: SceneCommand) -> Result<bool, SceneError> {
        match command {
            SceneCommand::None => Ok(false),
            SceneCommand::SwitchTo(next_scene) => self.switch_to(next_scene),
        }
    }

    /// Tears down the active scene and loads `next_scene` fresh. Unknown
    /// targets leave the active scene running.
    pub fn switch_to(&mut self, next_scene: SceneKey) -> Result<bool, SceneError> {
        if !self.scenes.contains_key(&next_scene) {
            return Err(SceneError::NotRegistered(next_scene));
        }
        if self.active_scene == Some(next_scene) {
            return Ok(false);
        }

        self.unload_active();
        if let Some(scene) = self.scenes.get_mut(&next_scene) {
            scene.load(&mut self.world);
        }
        self.active_scene = Some(next_scene);
        info!(scene = %next_scene, "scene_loaded");
        Ok(true)
    }

    pub fn shutdown_all(&mut self) {
        self.unload_active();
        self.active_scene = None;
    }

    pub fn active_is_complete(&self) -> bool {
        self.active_ref().is_some_and(|scene| scene.is_complete())
    }

    pub fn debug_title_active(&self) -> Option<String> {
        self.active_ref().and_then(|scene| scene.debug_title())
    }

    pub fn debug_info_snapshot_active(&self) -> Option<DebugInfoSnapshot> {
        self.active_ref().and_then(|scene| scene.debug_info_snapshot())
    }

    fn unload_active(&mut self) {
        let Some(current) = self.active_scene.take() else {
            return;
        };
        if let Some(scene) = self.scenes.get_mut(&current) {
            scene.unload(&mut self.world);
            info!(scene = %current, "scene_unloaded");
        }
    }

    fn active_ref(&self) -> Option<&dyn Scene> {
        self.active_scene
            .and_then(|key| self.scenes.get(&key))
            .map(|scene| scene.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Lifecycle {
        loads: u32,
        unloads: u32,
        updates: u32,
    }

    struct TestScene {
        lifecycle: Rc<RefCell<Lifecycle>>,
        next: Option<SceneKey>,
        counter_key: &'static str,
    }

    impl Scene for TestScene {
        fn load(&mut self, world: &mut SceneWorld) {
            self.lifecycle.borrow_mut().loads += 1;
            world.notify(Notification::named("loaded"));
        }

        fn update(
            &mut self,
            _fixed_dt: Duration,
            _input: &InputSnapshot,
            world: &mut SceneWorld,
        ) -> SceneCommand {
            self.lifecycle.borrow_mut().updates += 1;
            let count = world
                .store()
                .get(self.counter_key)
                .and_then(|raw| raw.parse::<u32>().ok())
                .unwrap_or(0);
            world
                .store_mut()
                .set(self.counter_key, &(count + 1).to_string());
            match self.next {
                Some(key) => SceneCommand::SwitchTo(key),
                None => SceneCommand::None,
            }
        }

        fn unload(&mut self, _world: &mut SceneWorld) {
            self.lifecycle.borrow_mut().unloads += 1;
        }
    }

    fn test_scene(
        next: Option<SceneKey>,
        counter_key: &'static str,
    ) -> (Box<dyn Scene>, Rc<RefCell<Lifecycle>>) {
        let lifecycle = Rc::new(RefCell::new(Lifecycle::default()));
        (
            Box::new(TestScene {
                lifecycle: Rc::clone(&lifecycle),
                next,
                counter_key,
            }),
            lifecycle,
        )
    }

    #[test]
    fn scene_key_tokens_round_trip() {
        for key in [SceneKey::BoneField, SceneKey::Repair, SceneKey::Ascent] {
            assert_eq!(SceneKey::from_token(key.as_token()), Some(key));
        }
        assert_eq!(SceneKey::from_token(" Ascent "), Some(SceneKey::Ascent));
        assert_eq!(SceneKey::from_token("lobby"), None);
    }

    #[test]
    fn switching_unloads_previous_and_loads_target() {
        let (field, field_life) = test_scene(Some(SceneKey::Ascent), "field");
        let (ascent, ascent_life) = test_scene(None, "ascent");
        let mut machine = SceneMachine::new(SceneWorld::default());
        machine.register(SceneKey::BoneField, field);
        machine.register(SceneKey::Ascent, ascent);

        machine.start(SceneKey::BoneField).expect("start");
        let command = machine.update_active(Duration::from_millis(16), &InputSnapshot::empty());
        assert_eq!(command, SceneCommand::SwitchTo(SceneKey::Ascent));
        assert_eq!(machine.apply_command(command), Ok(true));

        assert_eq!(machine.active_scene(), Some(SceneKey::Ascent));
        assert_eq!(field_life.borrow().loads, 1);
        assert_eq!(field_life.borrow().unloads, 1);
        assert_eq!(ascent_life.borrow().loads, 1);
        assert_eq!(ascent_life.borrow().unloads, 0);
    }

    #[test]
    fn store_survives_scene_transitions() {
        let (field, _) = test_scene(None, "shared");
        let (ascent, _) = test_scene(None, "shared");
        let mut machine = SceneMachine::new(SceneWorld::default());
        machine.register(SceneKey::BoneField, field);
        machine.register(SceneKey::Ascent, ascent);

        machine.start(SceneKey::BoneField).expect("start");
        let _ = machine.update_active(Duration::from_millis(16), &InputSnapshot::empty());
        machine.switch_to(SceneKey::Ascent).expect("switch");
        let _ = machine.update_active(Duration::from_millis(16), &InputSnapshot::empty());

        assert_eq!(machine.world().store().get("shared").as_deref(), Some("2"));
    }

    #[test]
    fn unknown_target_is_a_recoverable_error() {
        let (field, field_life) = test_scene(Some(SceneKey::Repair), "field");
        let mut machine = SceneMachine::new(SceneWorld::default());
        machine.register(SceneKey::BoneField, field);
        machine.start(SceneKey::BoneField).expect("start");

        let command = machine.update_active(Duration::from_millis(16), &InputSnapshot::empty());
        assert_eq!(
            machine.apply_command(command),
            Err(SceneError::NotRegistered(SceneKey::Repair))
        );
        assert_eq!(machine.active_scene(), Some(SceneKey::BoneField));
        assert_eq!(field_life.borrow().unloads, 0);

        let _ = machine.update_active(Duration::from_millis(16), &InputSnapshot::empty());
        assert_eq!(field_life.borrow().updates, 2);
    }

    #[test]
    fn switching_to_active_scene_is_a_no_op() {
        let (field, field_life) = test_scene(None, "field");
        let mut machine = SceneMachine::new(SceneWorld::default());
        machine.register(SceneKey::BoneField, field);
        machine.start(SceneKey::BoneField).expect("start");

        assert_eq!(machine.switch_to(SceneKey::BoneField), Ok(false));
        assert_eq!(field_life.borrow().loads, 1);
    }

    #[test]
    fn shutdown_unloads_active_scene_once() {
        let (field, field_life) = test_scene(None, "field");
        let mut machine = SceneMachine::new(SceneWorld::default());
        machine.register(SceneKey::BoneField, field);
        machine.start(SceneKey::BoneField).expect("start");

        machine.shutdown_all();
        machine.shutdown_all();

        assert_eq!(field_life.borrow().unloads, 1);
        assert_eq!(machine.active_scene(), None);
        assert_eq!(
            machine.update_active(Duration::from_millis(16), &InputSnapshot::empty()),
            SceneCommand::None
        );
    }

    #[test]
    fn update_applies_camera_forward_and_advances_clock() {
        let (field, _) = test_scene(None, "field");
        let mut machine = SceneMachine::new(SceneWorld::default());
        machine.register(SceneKey::BoneField, field);
        machine.start(SceneKey::BoneField).expect("start");

        let input = InputSnapshot::empty().with_camera_forward(Some(Vec3::new(0.0, 0.0, -2.0)));
        let _ = machine.update_active(Duration::from_millis(50), &input);

        assert_eq!(machine.world().camera().forward(), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(machine.world().elapsed_ms(), 50);
    }

    #[test]
    fn camera_rejects_degenerate_forward() {
        let mut rig = CameraRig::looking_along(Vec3::X);
        assert!(!rig.set_forward(Vec3::ZERO));
        assert!(!rig.set_forward(Vec3::new(f32::NAN, 0.0, 1.0)));
        assert_eq!(rig.forward(), Vec3::X);
        assert_eq!(rig.view_vector(), -Vec3::X);
    }

    #[test]
    fn planar_forward_drops_vertical_component() {
        let rig = CameraRig::looking_along(Vec3::new(0.0, -1.0, 1.0));
        let planar = rig.planar_forward().expect("planar");
        assert!((planar - Vec3::Z).length() < 1e-6);

        let straight_down = CameraRig::looking_along(Vec3::NEG_Y);
        assert_eq!(straight_down.planar_forward(), None);
    }

    #[test]
    fn notifications_drain_in_order() {
        let mut world = SceneWorld::default();
        world.notify(Notification::named("a").with_subject(1));
        world.notify(Notification::named("b").with_value(0.5));

        let drained = world.drain_notifications();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].name, "a");
        assert_eq!(drained[0].subject, Some(1));
        assert_eq!(drained[1].value, Some(0.5));
        assert!(world.notifications().is_empty());
    }
}
