//! Goals: ordered conjunctions of requirements.

use tracing::warn;

use crate::error::QuestResult;
use crate::quest::events::{RequirementChange, WorldEvent};
use crate::quest::instance::QuestId;
use crate::quest::requirement::{EvalContext, Requirement};
use crate::quest::state::GoalState;
use crate::world::{EntitySpawner, WorldView};

#[derive(Debug, Clone)]
pub struct Goal {
    id: String,
    description: String,
    /// Owning quest (by id)
    quest_id: Option<QuestId>,
    requirements: Vec<Requirement>,
}

impl Goal {
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            quest_id: None,
            requirements: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quest_id(&self) -> Option<QuestId> {
        self.quest_id
    }

    pub(crate) fn attach(&mut self, quest_id: QuestId) {
        self.quest_id = Some(quest_id);
    }

    pub fn add_requirement(&mut self, mut requirement: Requirement) {
        requirement.attach(&self.id);
        self.requirements.push(requirement);
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// True when every requirement is satisfied (always rescanned)
    pub fn is_complete(&self) -> bool {
        self.requirements.iter().all(Requirement::is_satisfied)
    }

    /// Re-evaluate every requirement
    pub fn refresh(&mut self, ctx: &EvalContext<'_>) -> Vec<RequirementChange> {
        self.requirements
            .iter_mut()
            .filter_map(|r| if r.update(ctx) { Some(change_of(r)) } else { None })
            .collect()
    }

    /// Route an event to subscribed requirements
    pub fn handle_event(
        &mut self,
        event: &WorldEvent,
        ctx: &EvalContext<'_>,
    ) -> Vec<RequirementChange> {
        self.requirements
            .iter_mut()
            .filter_map(|r| {
                if r.handle_event(event, ctx) {
                    Some(change_of(r))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn get_state(&self, world: &dyn WorldView) -> QuestResult<GoalState> {
        self.requirements.iter().map(|r| r.to_state(world)).collect()
    }

    /// Apply saved requirement states by position. Failures are logged and
    /// skipped. Returns the number of requirements restored.
    pub fn load_state(&mut self, state: &GoalState, spawner: &mut dyn EntitySpawner) -> usize {
        if state.len() != self.requirements.len() {
            warn!(
                "Goal '{}' has {} requirements but saved state has {}",
                self.id,
                self.requirements.len(),
                state.len()
            );
        }

        let mut restored = 0;
        for (index, (requirement, saved)) in self.requirements.iter_mut().zip(state).enumerate() {
            match requirement.load_state(saved, spawner) {
                Ok(()) => restored += 1,
                Err(e) => warn!(
                    "Skipping state for requirement {} ('{}') of goal '{}': {}",
                    index,
                    requirement.id(),
                    self.id,
                    e
                ),
            }
        }
        restored
    }

    pub fn release(&mut self) {
        for requirement in &mut self.requirements {
            requirement.release();
        }
    }
}

fn change_of(requirement: &Requirement) -> RequirementChange {
    RequirementChange {
        goal_id: requirement.goal_id().to_string(),
        requirement_id: requirement.id().to_string(),
        satisfied: requirement.is_satisfied(),
    }
}
