//! Quest Template Definitions
//!
//! Templates are deserialized from TOML quest files and compiled into
//! [`QuestTemplate`]s, which instantiate fresh [`Quest`]s.

use std::path::Path;

use serde::Deserialize;

use crate::error::{QuestError, QuestResult};
use crate::quest::goal::Goal;
use crate::quest::instance::Quest;
use crate::quest::requirement::{
    DefeatRequirement, ProximityRequirement, Requirement, RequirementKind,
};
use crate::world::{EntityId, Position};

/// A quest definition loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Readiness latches once reached
    #[serde(default)]
    pub keep_state: bool,
    #[serde(default)]
    pub goals: Vec<RawGoal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGoal {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<RawRequirement>,
}

/// Raw requirement. Which fields are needed depends on `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRequirement {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub requirement_type: String,
    #[serde(default)]
    pub description: String,
    /// position: where someone must stand
    pub destination: Option<Position>,
    /// position: how close counts
    pub range: Option<f64>,
    /// vanquish: entity id of the foe
    pub target: Option<String>,
}

// ============================================================================
// Resolved Template Structures (after parsing)
// ============================================================================

/// Requirement types supported by templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementType {
    Position,
    Vanquish,
}

impl RequirementType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "position" | "proximity" | "posr" => Some(RequirementType::Position),
            "vanquish" | "defeat" | "vr" => Some(RequirementType::Vanquish),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequirementSpec {
    Position { destination: Position, range: f64 },
    Vanquish { target: EntityId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequirementTemplate {
    pub id: String,
    pub description: String,
    pub spec: RequirementSpec,
}

impl RequirementTemplate {
    fn from_raw(raw: &RawRequirement, goal_id: &str, index: usize) -> QuestResult<Self> {
        let requirement_type = RequirementType::from_str(&raw.requirement_type).ok_or_else(|| {
            QuestError::invalid_template(format!(
                "unknown requirement type '{}' at index {} of goal '{}'",
                raw.requirement_type, index, goal_id
            ))
        })?;

        let spec = match requirement_type {
            RequirementType::Position => {
                let destination = raw.destination.clone().ok_or_else(|| {
                    QuestError::invalid_template(format!(
                        "position requirement {} of goal '{}' has no destination",
                        index, goal_id
                    ))
                })?;
                let range = raw.range.unwrap_or(1.0);
                if range.is_nan() || range <= 0.0 {
                    return Err(QuestError::invalid_template(format!(
                        "position requirement {} of goal '{}' has range {}",
                        index, goal_id, range
                    )));
                }
                RequirementSpec::Position { destination, range }
            }
            RequirementType::Vanquish => {
                let target = raw.target.as_deref().ok_or_else(|| {
                    QuestError::invalid_template(format!(
                        "vanquish requirement {} of goal '{}' has no target",
                        index, goal_id
                    ))
                })?;
                RequirementSpec::Vanquish {
                    target: EntityId::new(target),
                }
            }
        };

        Ok(Self {
            id: raw
                .id
                .clone()
                .unwrap_or_else(|| format!("{}_{}", goal_id, index)),
            description: raw.description.clone(),
            spec,
        })
    }

    fn instantiate(&self) -> Requirement {
        let kind = match &self.spec {
            RequirementSpec::Position { destination, range } => {
                RequirementKind::Proximity(ProximityRequirement::new(destination.clone(), *range))
            }
            RequirementSpec::Vanquish { target } => {
                RequirementKind::Defeat(DefeatRequirement::new(target.clone()))
            }
        };
        Requirement::new(&self.id, &self.description, kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalTemplate {
    pub id: String,
    pub description: String,
    pub requirements: Vec<RequirementTemplate>,
}

/// A compiled quest definition
#[derive(Debug, Clone, PartialEq)]
pub struct QuestTemplate {
    pub name: String,
    pub description: String,
    pub keep_state: bool,
    pub goals: Vec<GoalTemplate>,
}

impl QuestTemplate {
    pub fn from_raw(raw: &RawQuest) -> QuestResult<Self> {
        if raw.name.is_empty() {
            return Err(QuestError::invalid_template("quest has no name"));
        }

        let goals = raw
            .goals
            .iter()
            .map(|goal| {
                let requirements = goal
                    .requirements
                    .iter()
                    .enumerate()
                    .map(|(i, r)| RequirementTemplate::from_raw(r, &goal.id, i))
                    .collect::<QuestResult<Vec<_>>>()?;
                Ok(GoalTemplate {
                    id: goal.id.clone(),
                    description: goal.description.clone(),
                    requirements,
                })
            })
            .collect::<QuestResult<Vec<_>>>()?;

        Ok(Self {
            name: raw.name.clone(),
            description: raw.description.clone(),
            keep_state: raw.keep_state,
            goals,
        })
    }

    pub fn from_toml_str(content: &str) -> QuestResult<Self> {
        let raw: RawQuestFile = toml::from_str(content)
            .map_err(|e| QuestError::invalid_template(e.to_string()))?;
        Self::from_raw(&raw.quest)
    }

    pub fn load(path: &Path) -> QuestResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuestError::invalid_template(format!("failed to read {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Build a fresh, unregistered quest with a new id
    pub fn instantiate(&self) -> Quest {
        let mut quest = Quest::new(&self.name, &self.description, self.keep_state);
        for goal_template in &self.goals {
            let mut goal = Goal::new(&goal_template.id, &goal_template.description);
            for requirement in &goal_template.requirements {
                goal.add_requirement(requirement.instantiate());
            }
            quest.add_goal(goal);
        }
        quest
    }
}
