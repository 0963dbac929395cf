//! Quest System Module
//!
//! Goal-based quests driven by world events. Quests are compiled from TOML
//! templates, react to player movement and entity deaths, and save their
//! progress as JSON snapshots when stopped.

pub mod codec;
pub mod definition;
pub mod events;
pub mod goal;
pub mod history;
pub mod instance;
pub mod manager;
pub mod requirement;
pub mod state;

pub use definition::{QuestTemplate, RequirementSpec};
pub use events::{EventKind, QuestUpdate, RequirementChange, Subscription, WorldEvent};
pub use goal::Goal;
pub use history::{History, HistoryKind, HistoryRecord};
pub use instance::{Quest, QuestId, QuestStatus};
pub use manager::{QuestManager, RestoreReport};
pub use requirement::{
    Condition, DefeatRequirement, EvalContext, ProximityRequirement, Requirement, RequirementKind,
};
pub use state::{GoalState, QuestState, RequirementState};
