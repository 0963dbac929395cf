//! Quest Event Types
//!
//! World events that can change requirement state, the subscription handles
//! requirements hold to receive them, and the updates reported back upward.

use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::quest::instance::QuestId;
use crate::world::{EntityId, Position};

/// Events delivered by the world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A player changed position
    PlayerMoved {
        player: PlayerId,
        position: Position,
    },

    /// An entity died or was destroyed
    EntityDestroyed { entity: EntityId },
}

impl WorldEvent {
    pub fn player_moved(player: PlayerId, position: Position) -> Self {
        WorldEvent::PlayerMoved { player, position }
    }

    pub fn entity_destroyed(entity: EntityId) -> Self {
        WorldEvent::EntityDestroyed { entity }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            WorldEvent::PlayerMoved { .. } => EventKind::PlayerMoved,
            WorldEvent::EntityDestroyed { .. } => EventKind::EntityDestroyed,
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayerMoved,
    EntityDestroyed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlayerMoved => "player_moved",
            EventKind::EntityDestroyed => "entity_destroyed",
        }
    }
}

/// Subscription handle owned by a requirement.
///
/// Events are only routed to requirements holding a handle that accepts
/// their kind. Dropping the handle unsubscribes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    kinds: Vec<EventKind>,
}

impl Subscription {
    pub fn to(kinds: &[EventKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
        }
    }

    pub fn accepts(&self, event: &WorldEvent) -> bool {
        self.kinds.contains(&event.kind())
    }
}

/// A requirement whose state changed while handling an event
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementChange {
    pub goal_id: String,
    pub requirement_id: String,
    pub satisfied: bool,
}

/// Result of routing an event into a quest
#[derive(Debug, Clone, PartialEq)]
pub struct QuestUpdate {
    pub quest_id: QuestId,
    pub quest_name: String,
    pub changes: Vec<RequirementChange>,
    /// Readiness after the quest re-evaluated
    pub ready: bool,
}
