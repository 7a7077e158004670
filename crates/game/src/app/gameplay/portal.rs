use engine::{PortalDef, SceneKey};
use glam::Vec3;

use super::proximity::planar_distance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PortalEdge {
    None,
    Entered,
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PortalTrigger {
    pub(crate) position: Vec3,
    pub(crate) activation_radius: f32,
    pub(crate) target: SceneKey,
    active: bool,
}

impl PortalTrigger {
    pub(crate) fn new(position: Vec3, activation_radius: f32, target: SceneKey) -> Self {
        Self {
            position,
            activation_radius,
            target,
            active: false,
        }
    }

    pub(crate) fn from_def(def: &PortalDef) -> Self {
        Self::new(def.position, def.radius, def.target)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Recomputes `active` from the current distance alone.
    pub(crate) fn evaluate(&mut self, agent_position: Vec3) -> PortalEdge {
        let now_active = planar_distance(agent_position, self.position) < self.activation_radius;
        let edge = match (self.active, now_active) {
            (false, true) => PortalEdge::Entered,
            (true, false) => PortalEdge::Exited,
            _ => PortalEdge::None,
        };
        self.active = now_active;
        edge
    }

    /// The transition target for an interact press, only while active.
    pub(crate) fn activation_target(&self, interact_pressed: bool) -> Option<SceneKey> {
        (interact_pressed && self.active).then_some(self.target)
    }
}
