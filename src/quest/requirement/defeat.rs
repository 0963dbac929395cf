use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Condition, EvalContext};
use crate::error::{QuestError, QuestResult};
use crate::quest::codec;
use crate::quest::events::{EventKind, Subscription, WorldEvent};
use crate::quest::state::RequirementState;
use crate::world::{EntityId, EntityProfile, EntitySpawner, WorldView};

#[derive(Debug, Serialize, Deserialize)]
struct DefeatState {
    #[serde(default)]
    satisfied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    foe: Option<EntityProfile>,
}

/// A specific entity must be defeated, by anyone.
///
/// Once satisfied this never regresses and stops listening for events. The
/// target handle may go stale at any time, so it is looked up again on every
/// update; an entity that has simply vanished is not counted as defeated.
#[derive(Debug, Clone)]
pub struct DefeatRequirement {
    target: EntityId,
    /// Last profile seen in the world, kept for snapshots
    last_known: Option<EntityProfile>,
    satisfied: bool,
    subscription: Option<Subscription>,
}

impl DefeatRequirement {
    pub const TAG: &'static str = "vr";

    pub fn new(target: EntityId) -> Self {
        Self {
            target,
            last_known: None,
            satisfied: false,
            subscription: Some(Subscription::to(&[EventKind::EntityDestroyed])),
        }
    }

    pub fn target(&self) -> &EntityId {
        &self.target
    }

    pub fn last_known(&self) -> Option<&EntityProfile> {
        self.last_known.as_ref()
    }

    fn defeat(&mut self) {
        self.satisfied = true;
        if self.subscription.take().is_some() {
            info!("Target {} defeated, unsubscribing", self.target);
        }
    }
}

impl Condition for DefeatRequirement {
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
        if self.satisfied {
            return;
        }

        match ctx.world.entity(&self.target) {
            Some(profile) if profile.is_dead() => self.defeat(),
            Some(profile) => self.last_known = Some(profile),
            None => debug!("Target {} is not present in the world", self.target),
        }
    }

    fn handle_event(&mut self, event: &WorldEvent, _ctx: &EvalContext<'_>) {
        if let WorldEvent::EntityDestroyed { entity } = event {
            if *entity == self.target {
                self.defeat();
            }
        }
    }

    fn to_state(&self, world: &dyn WorldView) -> QuestResult<RequirementState> {
        let foe = world
            .entity(&self.target)
            .or_else(|| self.last_known.clone());
        codec::encode_requirement(
            Self::TAG,
            &DefeatState {
                satisfied: self.satisfied,
                foe,
            },
        )
    }

    fn load_state(
        &mut self,
        state: &RequirementState,
        spawner: &mut dyn EntitySpawner,
    ) -> QuestResult<()> {
        let saved: DefeatState = codec::decode_requirement(state, Self::TAG)?;

        if saved.satisfied {
            self.last_known = saved.foe;
            self.defeat();
            return Ok(());
        }

        let foe = saved.foe.ok_or_else(|| {
            QuestError::malformed("'vr' requirement is unsatisfied but has no foe")
        })?;
        let stand_in = codec::spawn_stand_in(&foe, spawner)?;

        self.target = stand_in;
        self.last_known = Some(foe);
        self.satisfied = false;
        self.subscription = Some(Subscription::to(&[EventKind::EntityDestroyed]));
        Ok(())
    }

    fn release(&mut self) {
        self.subscription = None;
    }
}
