use std::f32::consts::PI;

use engine::{CameraRig, InputAction, InputSnapshot};
use glam::{Vec2, Vec3};
use tracing::{debug, warn};

/// Per-render-tick constants for the walking controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionTuning {
    pub(crate) speed: f32,
    pub(crate) jump_ticks: u32,
    pub(crate) jump_height: f32,
    pub(crate) teleport_ticks: u32,
    pub(crate) teleport_arc_height: f32,
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            speed: 0.1,
            jump_ticks: 40,
            jump_height: 1.5,
            teleport_ticks: 30,
            teleport_arc_height: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MotionMode {
    Grounded,
    Jumping {
        tick: u32,
        base_y: f32,
    },
    Teleporting {
        tick: u32,
        start: Vec3,
        target: Vec3,
    },
}

impl MotionMode {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Grounded => "grounded",
            Self::Jumping { .. } => "jumping",
            Self::Teleporting { .. } => "teleporting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Agent {
    pub(crate) position: Vec3,
    pub(crate) heading: f32,
    pub(crate) mode: MotionMode,
}

impl Agent {
    pub(crate) fn at(position: Vec3) -> Self {
        Self {
            position,
            heading: 0.0,
            mode: MotionMode::Grounded,
        }
    }

    /// Height the agent returns to once any jump or teleport arc ends.
    pub(crate) fn baseline_y(&self) -> f32 {
        match self.mode {
            MotionMode::Jumping { base_y, .. } => base_y,
            MotionMode::Teleporting { target, .. } => target.y,
            MotionMode::Grounded => self.position.y,
        }
    }
}

/// Held directional actions folded into forward/right axes in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct MoveIntent {
    pub(crate) forward: f32,
    pub(crate) right: f32,
}

impl MoveIntent {
    pub(crate) fn from_input(input: &InputSnapshot) -> Self {
        let axis = |positive: InputAction, negative: InputAction| {
            let mut value = 0.0;
            if input.is_down(positive) {
                value += 1.0;
            }
            if input.is_down(negative) {
                value -= 1.0;
            }
            value
        };
        Self {
            forward: axis(InputAction::MoveForward, InputAction::MoveBack),
            right: axis(InputAction::MoveRight, InputAction::MoveLeft),
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.forward == 0.0 && self.right == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionController {
    tuning: MotionTuning,
    agent: Agent,
    last_good_position: Vec3,
    last_planar_forward: Vec3,
}

impl MotionController {
    pub(crate) fn new(spawn: Vec3, tuning: MotionTuning) -> Self {
        Self {
            tuning,
            agent: Agent::at(spawn),
            last_good_position: spawn,
            last_planar_forward: Vec3::NEG_Z,
        }
    }

    pub(crate) fn agent(&self) -> &Agent {
        &self.agent
    }

    pub(crate) fn position(&self) -> Vec3 {
        self.agent.position
    }

    /// Starts a teleport towards a ground point. Any jump in progress is
    /// abandoned and the arc starts from the jump's baseline.
    pub(crate) fn request_teleport(&mut self, target_xz: Vec2) {
        if !target_xz.is_finite() {
            warn!(x = target_xz.x, z = target_xz.y, "teleport_target_rejected");
            return;
        }
        let base_y = self.agent.baseline_y();
        if let MotionMode::Jumping { .. } = self.agent.mode {
            debug!("jump_cancelled_by_teleport");
        }
        let start = Vec3::new(self.agent.position.x, base_y, self.agent.position.z);
        let target = Vec3::new(target_xz.x, base_y, target_xz.y);
        self.agent.position = start;
        self.agent.mode = MotionMode::Teleporting {
            tick: 0,
            start,
            target,
        };
        debug!(
            from_x = start.x,
            from_z = start.z,
            to_x = target.x,
            to_z = target.z,
            "teleport_started"
        );
    }

    /// Drops any jump or teleport and settles on the baseline where the
    /// agent currently is; an interrupted teleport does not reach its target.
    pub(crate) fn cancel(&mut self) {
        let base_y = self.agent.baseline_y();
        self.agent.position.y = base_y;
        self.agent.mode = MotionMode::Grounded;
    }

    /// Advances one render tick. Returns the planar displacement produced by
    /// walking input (zero while teleporting).
    pub(crate) fn step(
        &mut self,
        intent: MoveIntent,
        jump_pressed: bool,
        camera: &CameraRig,
    ) -> Vec3 {
        if let Some(forward) = camera.planar_forward() {
            self.last_planar_forward = forward;
        }

        let displacement = if let MotionMode::Teleporting { .. } = self.agent.mode {
            self.advance_teleport();
            Vec3::ZERO
        } else {
            if jump_pressed && self.agent.mode == MotionMode::Grounded {
                self.agent.mode = MotionMode::Jumping {
                    tick: 0,
                    base_y: self.agent.position.y,
                };
                debug!(base_y = self.agent.position.y, "jump_started");
            }
            self.advance_jump();
            self.walk(intent)
        };

        self.guard_non_finite();
        displacement
    }

    fn walk(&mut self, intent: MoveIntent) -> Vec3 {
        if intent.is_idle() {
            return Vec3::ZERO;
        }
        let forward = self.last_planar_forward;
        let right = Vec3::new(-forward.z, 0.0, forward.x);
        let displacement = (forward * intent.forward + right * intent.right) * self.tuning.speed;
        self.agent.position.x += displacement.x;
        self.agent.position.z += displacement.z;
        if displacement.x != 0.0 || displacement.z != 0.0 {
            self.agent.heading = displacement.x.atan2(displacement.z);
        }
        displacement
    }

    fn advance_jump(&mut self) {
        let MotionMode::Jumping { tick, base_y } = self.agent.mode else {
            return;
        };
        let tick = tick + 1;
        let duration = self.tuning.jump_ticks.max(1);
        if tick >= duration {
            self.agent.position.y = base_y;
            self.agent.mode = MotionMode::Grounded;
            debug!("jump_completed");
            return;
        }
        let t = tick as f32 / duration as f32;
        self.agent.position.y = base_y + self.tuning.jump_height * (PI * t).sin();
        self.agent.mode = MotionMode::Jumping { tick, base_y };
    }

    fn advance_teleport(&mut self) {
        let MotionMode::Teleporting {
            tick,
            start,
            target,
        } = self.agent.mode
        else {
            return;
        };
        let tick = tick + 1;
        let duration = self.tuning.teleport_ticks.max(1);

        let travel = target - start;
        if travel.x.abs() > 0.001 || travel.z.abs() > 0.001 {
            self.agent.heading = travel.x.atan2(travel.z);
        }

        if tick >= duration {
            self.agent.position = target;
            self.agent.mode = MotionMode::Grounded;
            debug!(x = target.x, z = target.z, "teleport_completed");
            return;
        }

        let t = tick as f32 / duration as f32;
        let eased = 1.0 - (1.0 - t).powi(3);
        let planar = start + travel * eased;
        let arc = self.tuning.teleport_arc_height * (PI * t).sin();
        self.agent.position = Vec3::new(planar.x, planar.y + arc, planar.z);
        self.agent.mode = MotionMode::Teleporting {
            tick,
            start,
            target,
        };
    }

    fn guard_non_finite(&mut self) {
        if self.agent.position.is_finite() && self.agent.heading.is_finite() {
            self.last_good_position = self.agent.position;
            return;
        }
        warn!(
            reset_x = self.last_good_position.x,
            reset_y = self.last_good_position.y,
            reset_z = self.last_good_position.z,
            "agent_position_non_finite_reset"
        );
        self.agent.position = self.last_good_position;
        if !self.agent.heading.is_finite() {
            self.agent.heading = 0.0;
        }
        self.agent.mode = MotionMode::Grounded;
    }

    #[cfg(test)]
    pub(crate) fn corrupt_position_for_test(&mut self, position: Vec3) {
        self.agent.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn camera_looking_down_negative_z() -> CameraRig {
        CameraRig::looking_along(Vec3::new(0.0, -0.5, -1.0))
    }

    #[test]
    fn forward_moves_along_flattened_camera_direction() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        let intent = MoveIntent {
            forward: 1.0,
            right: 0.0,
        };
        let displacement = controller.step(intent, false, &camera_looking_down_negative_z());

        assert!(approx(displacement.z, -0.1));
        assert!(approx(controller.position().z, -0.1));
        assert!(approx(controller.position().y, 0.0));
        assert!(approx(controller.agent().heading.abs(), PI));
    }

    #[test]
    fn right_is_perpendicular_to_forward() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        let intent = MoveIntent {
            forward: 0.0,
            right: 1.0,
        };
        controller.step(intent, false, &camera_looking_down_negative_z());

        assert!(approx(controller.position().x, 0.1));
        assert!(approx(controller.position().z, 0.0));
        assert!(approx(controller.agent().heading, PI / 2.0));
    }

    #[test]
    fn idle_input_keeps_position_and_heading() {
        let mut controller = MotionController::new(Vec3::new(1.0, 0.0, 1.0), MotionTuning::default());
        let displacement = controller.step(MoveIntent::default(), false, &CameraRig::default());
        assert_eq!(displacement, Vec3::ZERO);
        assert_eq!(controller.position(), Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(controller.agent().heading, 0.0);
    }

    #[test]
    fn jump_profile_peaks_at_midpoint_and_lands_on_baseline() {
        let base = 2.0;
        let mut controller = MotionController::new(Vec3::new(0.0, base, 0.0), MotionTuning::default());
        let camera = CameraRig::default();
        assert_eq!(controller.position().y, base);

        let mut heights = Vec::new();
        for tick in 1..=40 {
            controller.step(MoveIntent::default(), tick == 1, &camera);
            heights.push(controller.position().y);
        }

        assert!(approx(heights[19], base + 1.5));
        assert_eq!(heights[39], base);
        assert_eq!(controller.agent().mode, MotionMode::Grounded);
        assert!(heights.iter().all(|y| *y >= base));
    }

    #[test]
    fn walking_continues_during_jump() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        let intent = MoveIntent {
            forward: 1.0,
            right: 0.0,
        };
        let camera = camera_looking_down_negative_z();
        controller.step(intent, true, &camera);
        for _ in 0..9 {
            controller.step(intent, false, &camera);
        }
        assert!(approx(controller.position().z, -1.0));
        assert!(controller.position().y > 0.0);
    }

    #[test]
    fn jump_press_while_airborne_is_ignored() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        let camera = CameraRig::default();
        controller.step(MoveIntent::default(), true, &camera);
        for _ in 0..10 {
            controller.step(MoveIntent::default(), true, &camera);
        }
        assert!(matches!(
            controller.agent().mode,
            MotionMode::Jumping { tick: 11, .. }
        ));
    }

    #[test]
    fn teleport_lands_exactly_on_target_after_duration() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        let camera = CameraRig::default();
        controller.request_teleport(Vec2::new(10.0, 5.0));

        let mut midway_y = 0.0;
        for tick in 1..=30 {
            controller.step(MoveIntent::default(), false, &camera);
            if tick == 15 {
                midway_y = controller.position().y;
            }
        }

        assert_eq!(controller.position(), Vec3::new(10.0, 0.0, 5.0));
        assert_eq!(controller.agent().mode, MotionMode::Grounded);
        assert!(approx(midway_y, 0.5));
        assert!(approx(controller.agent().heading, 10.0f32.atan2(5.0)));
    }

    #[test]
    fn teleport_uses_cubic_ease_out() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        controller.request_teleport(Vec2::new(30.0, 0.0));
        for _ in 0..10 {
            controller.step(MoveIntent::default(), false, &CameraRig::default());
        }
        let t: f32 = 10.0 / 30.0;
        let expected = 30.0 * (1.0 - (1.0 - t).powi(3));
        assert!(approx(controller.position().x, expected));
    }

    #[test]
    fn keys_are_ignored_while_teleporting() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        controller.request_teleport(Vec2::new(0.0, 3.0));
        let intent = MoveIntent {
            forward: 1.0,
            right: 1.0,
        };
        let displacement = controller.step(intent, true, &camera_looking_down_negative_z());
        assert_eq!(displacement, Vec3::ZERO);
        assert!(approx(controller.position().x, 0.0));
        assert!(matches!(
            controller.agent().mode,
            MotionMode::Teleporting { .. }
        ));
    }

    #[test]
    fn teleport_overrides_jump_from_its_baseline() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        let camera = CameraRig::default();
        controller.step(MoveIntent::default(), true, &camera);
        for _ in 0..10 {
            controller.step(MoveIntent::default(), false, &camera);
        }
        assert!(controller.position().y > 0.5);

        controller.request_teleport(Vec2::new(4.0, 0.0));
        assert_eq!(controller.position().y, 0.0);
        for _ in 0..30 {
            controller.step(MoveIntent::default(), false, &camera);
        }
        assert_eq!(controller.position(), Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn non_finite_position_resets_to_last_good() {
        let mut controller = MotionController::new(Vec3::new(1.0, 0.0, 2.0), MotionTuning::default());
        let camera = CameraRig::default();
        controller.step(MoveIntent::default(), false, &camera);
        controller.corrupt_position_for_test(Vec3::new(f32::NAN, 0.0, f32::INFINITY));
        controller.step(MoveIntent::default(), false, &camera);
        assert_eq!(controller.position(), Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn non_finite_teleport_target_is_rejected() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        controller.request_teleport(Vec2::new(f32::NAN, 1.0));
        assert_eq!(controller.agent().mode, MotionMode::Grounded);
    }

    #[test]
    fn cancel_settles_mid_arc() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        controller.step(MoveIntent::default(), true, &CameraRig::default());
        controller.cancel();
        assert_eq!(controller.position().y, 0.0);
        assert_eq!(controller.agent().mode, MotionMode::Grounded);
    }

    #[test]
    fn cancelled_teleport_stays_where_it_was_interrupted() {
        let mut controller = MotionController::new(Vec3::ZERO, MotionTuning::default());
        controller.request_teleport(Vec2::new(6.0, -4.0));
        for _ in 0..4 {
            controller.step(MoveIntent::default(), false, &CameraRig::default());
        }
        let mid_flight = controller.position();
        controller.cancel();

        let settled = controller.position();
        assert_eq!(controller.agent().mode, MotionMode::Grounded);
        assert_eq!(settled.y, 0.0);
        assert_eq!((settled.x, settled.z), (mid_flight.x, mid_flight.z));
        assert!(settled.x > 0.0 && settled.x < 6.0, "{settled}");
        assert!(settled.z < 0.0 && settled.z > -4.0, "{settled}");
    }
}
