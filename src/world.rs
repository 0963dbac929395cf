//! World Collaborators
//!
//! The engine never owns world state. It reads player positions and entity
//! profiles through [`WorldView`] and recreates stand-in entities through
//! [`EntitySpawner`]. [`SimWorld`] is a small in-memory implementation of
//! both, used by the host binary and the tests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::WorldError;
use crate::player::PlayerId;

/// A point in a named world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(world: &str, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.to_string(),
            x,
            y,
            z,
        }
    }

    /// Euclidean distance, or `None` when the points are in different worlds
    pub fn distance(&self, other: &Position) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }
}

/// Handle to a live world entity. Never assumed to still be valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Item ids worn or held by an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub chest: Option<String>,
    #[serde(default)]
    pub legs: Option<String>,
    #[serde(default)]
    pub boots: Option<String>,
    #[serde(default)]
    pub held: Option<String>,
}

/// Descriptive state of an entity: enough to spawn an equivalent one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    pub health: f64,
    pub max_health: f64,
    pub position: Position,
    #[serde(default)]
    pub equipment: Equipment,
}

impl EntityProfile {
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

/// Read access to live world state
pub trait WorldView {
    fn player_position(&self, player: &PlayerId) -> Option<Position>;

    /// Current profile of an entity, `None` once the handle is no longer valid
    fn entity(&self, id: &EntityId) -> Option<EntityProfile>;
}

/// Entity creation, used only to rebuild stand-ins from saved state
pub trait EntitySpawner {
    fn spawn(&mut self, kind: &str, at: &Position) -> Result<EntityId, WorldError>;

    /// Apply health, name and equipment from a profile to a spawned entity
    fn outfit(&mut self, id: &EntityId, profile: &EntityProfile) -> Result<(), WorldError>;

    /// Remove an entity this spawner created
    fn despawn(&mut self, id: &EntityId) -> Result<(), WorldError>;
}

/// In-memory world
#[derive(Debug, Default)]
pub struct SimWorld {
    players: HashMap<PlayerId, Position>,
    entities: HashMap<EntityId, EntityProfile>,
    /// Entity kinds that may be spawned. Empty means any kind.
    spawnable: Vec<String>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict spawning to the given kinds
    pub fn with_spawnable_kinds(kinds: &[&str]) -> Self {
        Self {
            spawnable: kinds.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn move_player(&mut self, player: &PlayerId, to: Position) {
        self.players.insert(player.clone(), to);
    }

    pub fn remove_player(&mut self, player: &PlayerId) {
        self.players.remove(player);
    }

    pub fn insert_entity(&mut self, id: EntityId, profile: EntityProfile) {
        self.entities.insert(id, profile);
    }

    /// Drop an entity to zero health without removing it
    pub fn kill_entity(&mut self, id: &EntityId) -> bool {
        match self.entities.get_mut(id) {
            Some(profile) => {
                profile.health = 0.0;
                true
            }
            None => false,
        }
    }

    pub fn remove_entity(&mut self, id: &EntityId) -> Option<EntityProfile> {
        self.entities.remove(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl WorldView for SimWorld {
    fn player_position(&self, player: &PlayerId) -> Option<Position> {
        self.players.get(player).cloned()
    }

    fn entity(&self, id: &EntityId) -> Option<EntityProfile> {
        self.entities.get(id).cloned()
    }
}

impl EntitySpawner for SimWorld {
    fn spawn(&mut self, kind: &str, at: &Position) -> Result<EntityId, WorldError> {
        if !self.spawnable.is_empty() && !self.spawnable.iter().any(|k| k == kind) {
            return Err(WorldError::UnknownKind(kind.to_string()));
        }

        let id = EntityId(format!("{}_{}", kind, Uuid::new_v4()));
        self.entities.insert(
            id.clone(),
            EntityProfile {
                kind: kind.to_string(),
                name: None,
                health: 1.0,
                max_health: 1.0,
                position: at.clone(),
                equipment: Equipment::default(),
            },
        );
        info!("Spawned {} at ({}, {}, {}) in {}", id, at.x, at.y, at.z, at.world);
        Ok(id)
    }

    fn outfit(&mut self, id: &EntityId, profile: &EntityProfile) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownEntity(id.to_string()))?;
        entity.max_health = profile.max_health;
        entity.health = profile.health;
        entity.name = profile.name.clone();
        entity.equipment = profile.equipment.clone();
        debug!("Outfitted {} as {:?}", id, profile.name);
        Ok(())
    }

    fn despawn(&mut self, id: &EntityId) -> Result<(), WorldError> {
        match self.remove_entity(id) {
            Some(_) => {
                debug!("Despawned {}", id);
                Ok(())
            }
            None => Err(WorldError::UnknownEntity(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_world() {
        let a = Position::new("overworld", 0.0, 0.0, 0.0);
        let b = Position::new("overworld", 3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), Some(5.0));
    }

    #[test]
    fn test_distance_across_worlds() {
        let a = Position::new("overworld", 0.0, 0.0, 0.0);
        let b = Position::new("nether", 0.0, 0.0, 0.0);
        assert_eq!(a.distance(&b), None);
    }

    #[test]
    fn test_spawn_and_outfit() {
        let mut world = SimWorld::with_spawnable_kinds(&["zombie"]);
        let at = Position::new("overworld", 1.0, 2.0, 3.0);

        assert_eq!(
            world.spawn("dragon", &at),
            Err(WorldError::UnknownKind("dragon".to_string()))
        );

        let id = world.spawn("zombie", &at).unwrap();
        let profile = EntityProfile {
            kind: "zombie".to_string(),
            name: Some("Warden".to_string()),
            health: 12.0,
            max_health: 40.0,
            position: at.clone(),
            equipment: Equipment {
                head: Some("iron_helmet".to_string()),
                ..Equipment::default()
            },
        };
        world.outfit(&id, &profile).unwrap();

        let live = world.entity(&id).unwrap();
        assert_eq!(live, profile);
        assert!(!live.is_dead());

        world.kill_entity(&id);
        assert!(world.entity(&id).unwrap().is_dead());

        world.despawn(&id).unwrap();
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.despawn(&id), Err(WorldError::UnknownEntity(id.to_string())));
    }
}
