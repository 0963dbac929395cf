//! Quest Manager
//!
//! A reactive quest engine for a voxel game server. Quest progress follows
//! world events, and running quests persist across restarts as JSON blobs.

pub mod config;
pub mod error;
pub mod player;
pub mod quest;
pub mod storage;
pub mod world;

pub use config::{EngineConfig, ManagerConfig};
pub use error::{QuestError, QuestResult, StorageError, WorldError};
pub use player::{Participant, ParticipantRegistry, PlayerDirectory, PlayerId};
pub use quest::{Quest, QuestId, QuestManager, QuestTemplate, WorldEvent};
pub use storage::{BlobStorage, DirectoryStorage, MemoryStorage};
pub use world::{EntityId, EntityProfile, EntitySpawner, Position, SimWorld, WorldView};
