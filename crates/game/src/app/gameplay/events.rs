use engine::{Notification, SceneKey, SceneWorld};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GameEvent {
    CollectibleProgressed { id: u32, progress: f32 },
    CollectibleCollected { id: u32 },
    CollectibleRevealed { id: u32, revealed: bool },
    PortalEntered,
    PortalExited,
    PortalActivated { target: SceneKey },
    SessionFinished,
    IntroMessageShown,
    JumpCounted { count: u32 },
    AscensionStarted,
    AscensionCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameEventKind {
    CollectibleProgressed,
    CollectibleCollected,
    CollectibleRevealed,
    PortalEntered,
    PortalExited,
    PortalActivated,
    SessionFinished,
    IntroMessageShown,
    JumpCounted,
    AscensionStarted,
    AscensionCompleted,
}

impl GameEvent {
    pub(crate) fn kind(self) -> GameEventKind {
        match self {
            Self::CollectibleProgressed { .. } => GameEventKind::CollectibleProgressed,
            Self::CollectibleCollected { .. } => GameEventKind::CollectibleCollected,
            Self::CollectibleRevealed { .. } => GameEventKind::CollectibleRevealed,
            Self::PortalEntered => GameEventKind::PortalEntered,
            Self::PortalExited => GameEventKind::PortalExited,
            Self::PortalActivated { .. } => GameEventKind::PortalActivated,
            Self::SessionFinished => GameEventKind::SessionFinished,
            Self::IntroMessageShown => GameEventKind::IntroMessageShown,
            Self::JumpCounted { .. } => GameEventKind::JumpCounted,
            Self::AscensionStarted => GameEventKind::AscensionStarted,
            Self::AscensionCompleted => GameEventKind::AscensionCompleted,
        }
    }

    pub(crate) fn to_notification(self) -> Notification {
        match self {
            Self::CollectibleProgressed { id, progress } => {
                Notification::named("collectible-progressed")
                    .with_subject(id)
                    .with_value(progress)
            }
            Self::CollectibleCollected { id } => {
                Notification::named("collectible-collected").with_subject(id)
            }
            Self::CollectibleRevealed { id, revealed } => {
                Notification::named("collectible-revealed")
                    .with_subject(id)
                    .with_value(if revealed { 1.0 } else { 0.0 })
            }
            Self::PortalEntered => Notification::named("portal-entered"),
            Self::PortalExited => Notification::named("portal-exited"),
            Self::PortalActivated { target } => {
                Notification::named(portal_activation_name(target))
            }
            Self::SessionFinished => Notification::named("session-finished"),
            Self::IntroMessageShown => Notification::named("intro-message-shown"),
            Self::JumpCounted { count } => {
                Notification::named("jump-counted").with_subject(count)
            }
            Self::AscensionStarted => Notification::named("ascension-started"),
            Self::AscensionCompleted => Notification::named("ascension-completed"),
        }
    }
}

fn portal_activation_name(target: SceneKey) -> &'static str {
    match target {
        SceneKey::BoneField => "portal-activated:bone_field",
        SceneKey::Repair => "portal-activated:repair",
        SceneKey::Ascent => "portal-activated:ascent",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct GameEventCounts {
    pub(crate) total: u32,
    pub(crate) progressed: u32,
    pub(crate) collected: u32,
    pub(crate) reveal_changes: u32,
    pub(crate) portal_edges: u32,
    pub(crate) portal_activations: u32,
    pub(crate) session_finished: u32,
    pub(crate) ascent_milestones: u32,
}

impl GameEventCounts {
    fn record(&mut self, kind: GameEventKind) {
        self.total = self.total.saturating_add(1);
        let bucket = match kind {
            GameEventKind::CollectibleProgressed => &mut self.progressed,
            GameEventKind::CollectibleCollected => &mut self.collected,
            GameEventKind::CollectibleRevealed => &mut self.reveal_changes,
            GameEventKind::PortalEntered | GameEventKind::PortalExited => &mut self.portal_edges,
            GameEventKind::PortalActivated => &mut self.portal_activations,
            GameEventKind::SessionFinished => &mut self.session_finished,
            GameEventKind::IntroMessageShown
            | GameEventKind::JumpCounted
            | GameEventKind::AscensionStarted
            | GameEventKind::AscensionCompleted => &mut self.ascent_milestones,
        };
        *bucket = bucket.saturating_add(1);
    }
}

/// Per-scene event queue; `finish_tick` forwards the tick's events to the
/// world's notification queue and keeps their counts.
#[derive(Debug, Default)]
pub(crate) struct GameEventBus {
    current_tick_events: Vec<GameEvent>,
    last_tick_counts: GameEventCounts,
}

impl GameEventBus {
    pub(crate) fn emit(&mut self, event: GameEvent) {
        match event {
            GameEvent::CollectibleProgressed { .. } | GameEvent::CollectibleRevealed { .. } => {
                debug!(event = ?event, "game_event")
            }
            _ => info!(event = ?event, "game_event"),
        }
        self.current_tick_events.push(event);
    }

    pub(crate) fn finish_tick(&mut self, world: &mut SceneWorld) {
        let mut counts = GameEventCounts::default();
        for event in self.current_tick_events.drain(..) {
            counts.record(event.kind());
            world.notify(event.to_notification());
        }
        self.last_tick_counts = counts;
    }

    pub(crate) fn last_tick_counts(&self) -> GameEventCounts {
        self.last_tick_counts
    }
}
