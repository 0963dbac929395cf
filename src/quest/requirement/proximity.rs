use serde::{Deserialize, Serialize};

use super::{Condition, EvalContext};
use crate::error::QuestResult;
use crate::player::PlayerId;
use crate::quest::codec;
use crate::quest::events::{EventKind, Subscription, WorldEvent};
use crate::quest::state::RequirementState;
use crate::world::{EntitySpawner, Position, WorldView};

fn default_range() -> f64 {
    1.0
}

#[derive(Debug, Serialize, Deserialize)]
struct ProximityState {
    destination: Position,
    #[serde(default = "default_range")]
    range: f64,
    #[serde(default)]
    satisfied: bool,
}

/// Someone from the quest must be standing near a destination.
///
/// Satisfaction follows the players: leaving the area un-satisfies it.
#[derive(Debug, Clone)]
pub struct ProximityRequirement {
    destination: Position,
    range: f64,
    satisfied: bool,
    subscription: Option<Subscription>,
}

impl ProximityRequirement {
    pub const TAG: &'static str = "posr";

    pub fn new(destination: Position, range: f64) -> Self {
        Self {
            destination,
            range,
            satisfied: false,
            subscription: Some(Subscription::to(&[EventKind::PlayerMoved])),
        }
    }

    pub fn destination(&self) -> &Position {
        &self.destination
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    fn in_range(&self, at: &Position) -> bool {
        at.distance(&self.destination)
            .is_some_and(|d| d <= self.range)
    }

    /// Evaluate using world positions, except for one player whose fresh
    /// position came with the event being handled
    fn evaluate(&mut self, ctx: &EvalContext<'_>, moved: Option<(&PlayerId, &Position)>) {
        self.satisfied = ctx.players.iter().any(|player| {
            let position = match moved {
                Some((id, at)) if id == player => Some(at.clone()),
                _ => ctx.world.player_position(player),
            };
            position.is_some_and(|at| self.in_range(&at))
        });
    }
}

impl Condition for ProximityRequirement {
    fn tag(&self) -> &'static str {
        Self::TAG
    }

    fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    fn update(&mut self, ctx: &EvalContext<'_>) {
        self.evaluate(ctx, None);
    }

    fn handle_event(&mut self, event: &WorldEvent, ctx: &EvalContext<'_>) {
        if let WorldEvent::PlayerMoved { player, position } = event {
            if ctx.players.contains(player) {
                self.evaluate(ctx, Some((player, position)));
            }
        }
    }

    fn to_state(&self, _world: &dyn WorldView) -> QuestResult<RequirementState> {
        codec::encode_requirement(
            Self::TAG,
            &ProximityState {
                destination: self.destination.clone(),
                range: self.range,
                satisfied: self.satisfied,
            },
        )
    }

    fn load_state(
        &mut self,
        state: &RequirementState,
        _spawner: &mut dyn EntitySpawner,
    ) -> QuestResult<()> {
        let saved: ProximityState = codec::decode_requirement(state, Self::TAG)?;
        self.destination = saved.destination;
        self.range = saved.range;
        self.satisfied = saved.satisfied;
        Ok(())
    }

    fn release(&mut self) {
        self.subscription = None;
    }
}
