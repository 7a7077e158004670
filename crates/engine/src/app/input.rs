use glam::{Vec2, Vec3};

use super::scene::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    Jump,
    Interact,
    Quit,
}

const ACTION_COUNT: usize = 7;

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveForward => 0,
            InputAction::MoveBack => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Jump => 4,
            InputAction::Interact => 5,
            InputAction::Quit => 6,
        }
    }

    /// Maps browser-style key names (`KeyboardEvent.key`, case-insensitive)
    /// onto actions. WASD and the arrow keys both drive movement.
    pub fn from_key_name(name: &str) -> Option<Self> {
        let action = match name.to_ascii_lowercase().as_str() {
            "w" | "arrowup" => InputAction::MoveForward,
            "s" | "arrowdown" => InputAction::MoveBack,
            "a" | "arrowleft" => InputAction::MoveLeft,
            "d" | "arrowright" => InputAction::MoveRight,
            "x" => InputAction::Jump,
            "e" => InputAction::Interact,
            "escape" => InputAction::Quit,
            _ => return None,
        };
        Some(action)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub fn clear(&mut self) {
        self.down = [false; ACTION_COUNT];
    }
}

/// Folds raw key events into held state plus single-tick press edges.
#[derive(Debug, Default)]
pub struct KeyTracker {
    held: ActionStates,
    pressed_edges: ActionStates,
    pending_ground_click: Option<Vec2>,
    camera_forward: Option<Vec3>,
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the key name maps to no action.
    pub fn handle_key(&mut self, key_name: &str, is_pressed: bool) -> bool {
        let Some(action) = InputAction::from_key_name(key_name) else {
            return false;
        };
        self.handle_action(action, is_pressed);
        true
    }

    pub fn handle_action(&mut self, action: InputAction, is_pressed: bool) {
        if is_pressed {
            if !self.held.is_down(action) {
                self.pressed_edges.set(action, true);
            }
            self.held.set(action, true);
        } else {
            self.held.set(action, false);
        }
    }

    pub fn handle_ground_click(&mut self, point_xz: Vec2) {
        self.pending_ground_click = Some(point_xz);
    }

    pub fn set_camera_forward(&mut self, forward: Vec3) {
        self.camera_forward = Some(forward);
    }

    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.held,
            self.pressed_edges,
            self.pending_ground_click,
            self.camera_forward,
        );
        self.pressed_edges.clear();
        self.pending_ground_click = None;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasd_and_arrow_keys_map_to_actions() {
        assert_eq!(InputAction::from_key_name("w"), Some(InputAction::MoveForward));
        assert_eq!(InputAction::from_key_name("ArrowUp"), Some(InputAction::MoveForward));
        assert_eq!(InputAction::from_key_name("S"), Some(InputAction::MoveBack));
        assert_eq!(InputAction::from_key_name("arrowleft"), Some(InputAction::MoveLeft));
        assert_eq!(InputAction::from_key_name("d"), Some(InputAction::MoveRight));
        assert_eq!(InputAction::from_key_name("X"), Some(InputAction::Jump));
        assert_eq!(InputAction::from_key_name("e"), Some(InputAction::Interact));
        assert_eq!(InputAction::from_key_name("q"), None);
    }

    #[test]
    fn press_is_edge_triggered_for_single_tick() {
        let mut tracker = KeyTracker::new();
        assert!(tracker.handle_key("e", true));

        let first = tracker.snapshot_for_tick();
        let second = tracker.snapshot_for_tick();

        assert!(first.pressed(InputAction::Interact));
        assert!(first.is_down(InputAction::Interact));
        assert!(!second.pressed(InputAction::Interact));
        assert!(second.is_down(InputAction::Interact));
    }

    #[test]
    fn held_key_does_not_spam_press_edges() {
        let mut tracker = KeyTracker::new();
        tracker.handle_key("x", true);
        let _ = tracker.snapshot_for_tick();
        tracker.handle_key("x", true);
        tracker.handle_key("x", true);

        assert!(!tracker.snapshot_for_tick().pressed(InputAction::Jump));

        tracker.handle_key("x", false);
        tracker.handle_key("x", true);
        assert!(tracker.snapshot_for_tick().pressed(InputAction::Jump));
    }

    #[test]
    fn key_release_clears_held_state() {
        let mut tracker = KeyTracker::new();
        tracker.handle_key("w", true);
        assert!(tracker.snapshot_for_tick().is_down(InputAction::MoveForward));
        tracker.handle_key("w", false);
        assert!(!tracker.snapshot_for_tick().is_down(InputAction::MoveForward));
    }

    #[test]
    fn ground_click_is_delivered_once() {
        let mut tracker = KeyTracker::new();
        tracker.handle_ground_click(Vec2::new(3.0, -2.0));

        assert_eq!(
            tracker.snapshot_for_tick().ground_click(),
            Some(Vec2::new(3.0, -2.0))
        );
        assert_eq!(tracker.snapshot_for_tick().ground_click(), None);
    }

    #[test]
    fn unknown_key_is_ignored() {
        let mut tracker = KeyTracker::new();
        assert!(!tracker.handle_key("F13", true));
        let snapshot = tracker.snapshot_for_tick();
        assert!(!snapshot.is_down(InputAction::MoveForward));
    }
}
