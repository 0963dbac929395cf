//! Quest State Snapshots
//!
//! The persisted document for a quest: its goal/requirement tree and
//! participant identity. Per-requirement entries stay untyped here; the
//! codec checks their `type` tag and decodes them one at a time so a single
//! bad entry does not poison the whole document.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Saved state of one quest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestState {
    pub name: String,
    /// Epoch milliseconds
    pub save_time: i64,
    /// Progression cursor. Stored and carried through, not consumed.
    #[serde(default)]
    pub goal_index: i32,
    #[serde(default)]
    pub goals: Vec<GoalState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

impl QuestState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            save_time: Utc::now().timestamp_millis(),
            goal_index: 0,
            goals: Vec::new(),
            participant: None,
        }
    }
}

/// Requirement states of one goal, in goal order
pub type GoalState = Vec<RequirementState>;

/// Tagged requirement payload: `{ "type": tag, ...fields }`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementState(pub Map<String, Value>);

impl RequirementState {
    pub const TYPE_KEY: &'static str = "type";

    pub fn tag(&self) -> Option<&str> {
        self.0.get(Self::TYPE_KEY).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}
