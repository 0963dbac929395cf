//! Requirements
//!
//! Leaf nodes of the quest tree. Each variant evaluates one condition
//! against the world and owns its satisfied flag; nothing outside the
//! variant writes that flag.

mod defeat;
mod proximity;

pub use defeat::DefeatRequirement;
pub use proximity::ProximityRequirement;

use crate::error::QuestResult;
use crate::player::PlayerId;
use crate::quest::events::{Subscription, WorldEvent};
use crate::quest::state::RequirementState;
use crate::world::{EntitySpawner, WorldView};

/// What a requirement can see while evaluating
pub struct EvalContext<'a> {
    pub world: &'a dyn WorldView,
    /// Players involved in the owning quest
    pub players: &'a [PlayerId],
}

impl<'a> EvalContext<'a> {
    pub fn new(world: &'a dyn WorldView, players: &'a [PlayerId]) -> Self {
        Self { world, players }
    }
}

/// Behaviour shared by every requirement variant
pub trait Condition {
    /// Discriminator tag used in snapshots
    fn tag(&self) -> &'static str;

    fn is_satisfied(&self) -> bool;

    fn subscription(&self) -> Option<&Subscription>;

    /// Re-evaluate against current world state. Safe to call redundantly.
    fn update(&mut self, ctx: &EvalContext<'_>);

    /// React to an event the subscription accepted
    fn handle_event(&mut self, event: &WorldEvent, ctx: &EvalContext<'_>);

    fn to_state(&self, world: &dyn WorldView) -> QuestResult<RequirementState>;

    /// Apply saved state. On error the requirement is left unchanged.
    fn load_state(
        &mut self,
        state: &RequirementState,
        spawner: &mut dyn EntitySpawner,
    ) -> QuestResult<()>;

    /// Drop the subscription
    fn release(&mut self);
}

#[derive(Debug, Clone)]
pub enum RequirementKind {
    Proximity(ProximityRequirement),
    Defeat(DefeatRequirement),
}

/// A requirement inside a goal
#[derive(Debug, Clone)]
pub struct Requirement {
    id: String,
    description: String,
    /// Owning goal (by id)
    goal_id: String,
    kind: RequirementKind,
}

impl Requirement {
    pub fn new(id: &str, description: &str, kind: RequirementKind) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            goal_id: String::new(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub(crate) fn attach(&mut self, goal_id: &str) {
        self.goal_id = goal_id.to_string();
    }

    pub fn kind(&self) -> &RequirementKind {
        &self.kind
    }

    fn condition(&self) -> &dyn Condition {
        match &self.kind {
            RequirementKind::Proximity(r) => r,
            RequirementKind::Defeat(r) => r,
        }
    }

    fn condition_mut(&mut self) -> &mut dyn Condition {
        match &mut self.kind {
            RequirementKind::Proximity(r) => r,
            RequirementKind::Defeat(r) => r,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.condition().tag()
    }

    pub fn is_satisfied(&self) -> bool {
        self.condition().is_satisfied()
    }

    pub fn is_subscribed(&self) -> bool {
        self.condition().subscription().is_some()
    }

    /// Re-evaluate; returns true if the satisfied flag changed
    pub fn update(&mut self, ctx: &EvalContext<'_>) -> bool {
        let before = self.is_satisfied();
        self.condition_mut().update(ctx);
        before != self.is_satisfied()
    }

    /// Route an event; returns true if the satisfied flag changed.
    /// Events the subscription does not accept are ignored.
    pub fn handle_event(&mut self, event: &WorldEvent, ctx: &EvalContext<'_>) -> bool {
        let accepted = self
            .condition()
            .subscription()
            .is_some_and(|s| s.accepts(event));
        if !accepted {
            return false;
        }

        let before = self.is_satisfied();
        self.condition_mut().handle_event(event, ctx);
        before != self.is_satisfied()
    }

    pub fn to_state(&self, world: &dyn WorldView) -> QuestResult<RequirementState> {
        self.condition().to_state(world)
    }

    pub fn load_state(
        &mut self,
        state: &RequirementState,
        spawner: &mut dyn EntitySpawner,
    ) -> QuestResult<()> {
        self.condition_mut().load_state(state, spawner)
    }

    pub fn release(&mut self) {
        self.condition_mut().release();
    }
}
