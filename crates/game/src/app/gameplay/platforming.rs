use engine::{CameraRig, PlatformDef};
use glam::Vec3;
use tracing::{debug, warn};

use super::motion::MoveIntent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlatformingTuning {
    pub(crate) gravity: f32,
    pub(crate) jump_force: f32,
    pub(crate) move_speed: f32,
    pub(crate) agent_half_height: f32,
    pub(crate) landing_margin: f32,
    pub(crate) landing_below_tolerance: f32,
    pub(crate) landing_above_tolerance: f32,
    pub(crate) max_landing_velocity: f32,
    pub(crate) floor_y: f32,
    pub(crate) fall_reset_y: f32,
    pub(crate) oscillation_amplitude: f32,
}

impl Default for PlatformingTuning {
    fn default() -> Self {
        Self {
            gravity: 0.05,
            jump_force: 0.8,
            move_speed: 0.15,
            agent_half_height: 0.5,
            landing_margin: 0.5,
            landing_below_tolerance: 0.1,
            landing_above_tolerance: 0.5,
            max_landing_velocity: 0.01,
            floor_y: -10.0,
            fall_reset_y: -15.0,
            oscillation_amplitude: 2.0,
        }
    }
}

/// An axis-aligned box that bobs vertically when `speed` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Platform {
    pub(crate) base: Vec3,
    pub(crate) size: Vec3,
    pub(crate) speed: f32,
    pub(crate) phase: f32,
}

impl Platform {
    pub(crate) fn from_def(def: &PlatformDef) -> Self {
        Self {
            base: def.position,
            size: def.size,
            speed: def.speed,
            phase: def.phase,
        }
    }

    pub(crate) fn center_y_at(&self, elapsed_ms: u64, amplitude: f32) -> f32 {
        if self.speed > 0.0 {
            let angle = elapsed_ms as f64 * 0.001 * self.speed as f64 + self.phase as f64;
            self.base.y + angle.sin() as f32 * amplitude
        } else {
            self.base.y
        }
    }

    pub(crate) fn top_at(&self, elapsed_ms: u64, amplitude: f32) -> f32 {
        self.center_y_at(elapsed_ms, amplitude) + self.size.y / 2.0
    }

    fn spans(&self, position: Vec3, margin: f32) -> bool {
        let half_x = self.size.x / 2.0 + margin;
        let half_z = self.size.z / 2.0 + margin;
        (position.x - self.base.x).abs() <= half_x && (position.z - self.base.z).abs() <= half_z
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Support {
    Platform(usize),
    Floor,
    Airborne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlatformingStep {
    pub(crate) jumped: bool,
    pub(crate) support: Support,
    pub(crate) fell_out: bool,
    pub(crate) recovered: bool,
}

/// Velocity-based walker with gravity and landing on bobbing platforms.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlatformingController {
    tuning: PlatformingTuning,
    spawn: Vec3,
    position: Vec3,
    velocity: Vec3,
    heading: f32,
    on_ground: bool,
    last_good_position: Vec3,
    last_good_on_ground: bool,
}

impl PlatformingController {
    pub(crate) fn new(spawn: Vec3, tuning: PlatformingTuning) -> Self {
        Self {
            tuning,
            spawn,
            position: spawn,
            velocity: Vec3::ZERO,
            heading: 0.0,
            on_ground: true,
            last_good_position: spawn,
            last_good_on_ground: true,
        }
    }

    pub(crate) fn position(&self) -> Vec3 {
        self.position
    }

    pub(crate) fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub(crate) fn heading(&self) -> f32 {
        self.heading
    }

    pub(crate) fn on_ground(&self) -> bool {
        self.on_ground
    }

    pub(crate) fn step(
        &mut self,
        intent: MoveIntent,
        jump_held: bool,
        camera: &CameraRig,
        platforms: &[Platform],
        elapsed_ms: u64,
    ) -> PlatformingStep {
        let forward = camera.forward();
        let right = Vec3::Y.cross(forward).try_normalize().unwrap_or(Vec3::ZERO);
        let speed = self.tuning.move_speed;
        let move_x = (forward.x * intent.forward + right.x * intent.right) * speed;
        let move_z = (forward.z * intent.forward + right.z * intent.right) * speed;

        let mut jumped = false;
        if jump_held && self.on_ground {
            self.velocity.y = self.tuning.jump_force;
            self.on_ground = false;
            jumped = true;
            debug!(velocity = self.velocity.y, "platform_jump");
        }
        if !self.on_ground {
            self.velocity.y -= self.tuning.gravity;
        }

        self.position.x += move_x;
        self.position.y += self.velocity.y;
        self.position.z += move_z;
        if move_x != 0.0 || move_z != 0.0 {
            self.heading = move_x.atan2(move_z);
        }

        let support = match self.landing_height(platforms, elapsed_ms) {
            Some((index, y)) => {
                self.position.y = y;
                self.velocity.y = 0.0;
                self.on_ground = true;
                Support::Platform(index)
            }
            None if self.position.y <= self.tuning.floor_y => {
                self.position.y = self.tuning.floor_y;
                self.velocity.y = 0.0;
                self.on_ground = true;
                Support::Floor
            }
            None => {
                self.on_ground = false;
                Support::Airborne
            }
        };

        let recovered = self.guard_non_finite();
        let fell_out = !recovered && self.position.y < self.tuning.fall_reset_y;
        if fell_out {
            debug!(y = self.position.y, "platforming_fall_reset");
            self.reset_to_spawn();
        }
        self.last_good_position = self.position;
        self.last_good_on_ground = self.on_ground;

        PlatformingStep {
            jumped,
            support,
            fell_out,
            recovered,
        }
    }

    pub(crate) fn reset_to_spawn(&mut self) {
        self.position = self.spawn;
        self.velocity = Vec3::ZERO;
        self.on_ground = true;
    }

    /// Puts a non-finite agent back where the previous step left it, at
    /// rest. Returns whether a reset happened.
    fn guard_non_finite(&mut self) -> bool {
        if self.position.is_finite() && self.velocity.is_finite() && self.heading.is_finite() {
            return false;
        }
        warn!(
            reset_x = self.last_good_position.x,
            reset_y = self.last_good_position.y,
            reset_z = self.last_good_position.z,
            "platforming_position_non_finite_reset"
        );
        self.position = self.last_good_position;
        self.velocity = Vec3::ZERO;
        self.on_ground = self.last_good_on_ground;
        if !self.heading.is_finite() {
            self.heading = 0.0;
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn corrupt_position_for_test(&mut self, position: Vec3) {
        self.position = position;
    }

    fn landing_height(&self, platforms: &[Platform], elapsed_ms: u64) -> Option<(usize, f32)> {
        let tuning = &self.tuning;
        if self.velocity.y > tuning.max_landing_velocity {
            return None;
        }
        let bottom = self.position.y - tuning.agent_half_height;
        platforms.iter().enumerate().find_map(|(index, platform)| {
            if !platform.spans(self.position, tuning.landing_margin) {
                return None;
            }
            let top = platform.top_at(elapsed_ms, tuning.oscillation_amplitude);
            let in_band = bottom >= top - tuning.landing_below_tolerance
                && bottom <= top + tuning.landing_above_tolerance;
            in_band.then_some((index, top + tuning.agent_half_height))
        })
    }
}
