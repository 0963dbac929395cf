//! Persistence Codec
//!
//! Converts quest snapshots to and from bytes, checks requirement type tags,
//! and rebuilds stand-in entities from saved profiles. Nothing else in the
//! quest tree knows the document layout or how stand-ins are spawned.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{QuestError, QuestResult};
use crate::quest::instance::QuestId;
use crate::quest::state::{QuestState, RequirementState};
use crate::world::{EntityId, EntityProfile, EntitySpawner};

pub const BLOB_EXTENSION: &str = ".json";
const BLOB_SEPARATOR: char = '_';

/// Blob name for a quest instance: `{name}_{id}.json`
pub fn blob_name(quest_name: &str, id: QuestId) -> String {
    format!("{}{}{}{}", quest_name, BLOB_SEPARATOR, id, BLOB_EXTENSION)
}

/// Template name encoded in a blob name (everything before the last `_`)
pub fn template_name_of(blob: &str) -> Option<&str> {
    let stem = blob.strip_suffix(BLOB_EXTENSION).unwrap_or(blob);
    let (name, _) = stem.rsplit_once(BLOB_SEPARATOR)?;
    (!name.is_empty()).then_some(name)
}

pub fn encode_state(state: &QuestState) -> QuestResult<Vec<u8>> {
    serde_json::to_vec_pretty(state)
        .map_err(|e| QuestError::malformed(format!("failed to encode '{}': {}", state.name, e)))
}

pub fn decode_state(bytes: &[u8]) -> QuestResult<QuestState> {
    serde_json::from_slice(bytes).map_err(|e| QuestError::malformed(e.to_string()))
}

/// Encode a variant payload under its discriminator tag
pub fn encode_requirement<T: Serialize>(tag: &str, payload: &T) -> QuestResult<RequirementState> {
    let value = serde_json::to_value(payload)
        .map_err(|e| QuestError::malformed(format!("failed to encode '{}' payload: {}", tag, e)))?;

    let Value::Object(mut fields) = value else {
        return Err(QuestError::malformed(format!(
            "'{}' payload is not a structured value",
            tag
        )));
    };
    fields.insert(
        RequirementState::TYPE_KEY.to_string(),
        Value::String(tag.to_string()),
    );
    Ok(RequirementState(fields))
}

/// Decode a variant payload, failing if the tag is missing or different
pub fn decode_requirement<T: DeserializeOwned>(
    state: &RequirementState,
    expected_tag: &str,
) -> QuestResult<T> {
    match state.tag() {
        Some(tag) if tag == expected_tag => {}
        Some(tag) => {
            return Err(QuestError::malformed(format!(
                "expected requirement type '{}', found '{}'",
                expected_tag, tag
            )));
        }
        None => {
            return Err(QuestError::malformed(format!(
                "requirement state has no type, expected '{}'",
                expected_tag
            )));
        }
    }

    let mut fields = state.0.clone();
    fields.remove(RequirementState::TYPE_KEY);
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| QuestError::malformed(format!("'{}' requirement: {}", expected_tag, e)))
}

/// Spawn an entity equivalent to a saved profile. A stand-in that cannot be
/// outfitted is despawned again.
pub fn spawn_stand_in(
    profile: &EntityProfile,
    spawner: &mut dyn EntitySpawner,
) -> QuestResult<EntityId> {
    let id = spawner.spawn(&profile.kind, &profile.position)?;
    if let Err(e) = spawner.outfit(&id, profile) {
        if let Err(cleanup) = spawner.despawn(&id) {
            warn!("Could not despawn half-built stand-in {}: {}", id, cleanup);
        }
        return Err(e.into());
    }
    info!(
        "Spawned stand-in {} for {} ({:?}, {}/{} hp)",
        id, profile.kind, profile.name, profile.health, profile.max_health
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorldError;
    use crate::world::{Position, SimWorld, WorldView};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Marker {
        range: f64,
    }

    #[test]
    fn test_blob_names() {
        let name = blob_name("Slay the Warden", QuestId(42));
        assert_eq!(name, "Slay the Warden_42.json");
        assert_eq!(template_name_of(&name), Some("Slay the Warden"));
        assert_eq!(template_name_of("deliver_apples_7.json"), Some("deliver_apples"));
        assert_eq!(template_name_of("noseparator.json"), None);
        assert_eq!(template_name_of("_7.json"), None);
    }

    #[test]
    fn test_requirement_tag_checked() {
        let state = encode_requirement("posr", &Marker { range: 2.0 }).unwrap();
        assert_eq!(state.tag(), Some("posr"));

        let decoded: Marker = decode_requirement(&state, "posr").unwrap();
        assert_eq!(decoded, Marker { range: 2.0 });

        let err = decode_requirement::<Marker>(&state, "vr").unwrap_err();
        assert!(matches!(err, QuestError::MalformedSnapshot(_)));
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let mut state = RequirementState::default();
        state
            .0
            .insert("type".to_string(), Value::String("posr".to_string()));
        let err = decode_requirement::<Marker>(&state, "posr").unwrap_err();
        assert!(matches!(err, QuestError::MalformedSnapshot(_)));

        let untagged = RequirementState::default();
        assert!(decode_requirement::<Marker>(&untagged, "posr").is_err());
    }

    #[test]
    fn test_decode_state_requires_name_and_save_time() {
        let err = decode_state(br#"{"goals": []}"#).unwrap_err();
        assert!(matches!(err, QuestError::MalformedSnapshot(_)));

        let state = decode_state(br#"{"name": "Deliver Apples", "saveTime": 1}"#).unwrap();
        assert_eq!(state.name, "Deliver Apples");
        assert_eq!(state.goal_index, 0);
        assert!(state.goals.is_empty());
        assert!(state.participant.is_none());
    }

    #[test]
    fn test_spawn_stand_in() {
        let mut world = SimWorld::new();
        let profile = EntityProfile {
            kind: "skeleton".to_string(),
            name: Some("Warden".to_string()),
            health: 7.5,
            max_health: 20.0,
            position: Position::new("overworld", 5.0, 64.0, 5.0),
            equipment: Default::default(),
        };

        let id = spawn_stand_in(&profile, &mut world).unwrap();
        assert_eq!(world.entity(&id), Some(profile));
    }

    /// Spawns into a `SimWorld` but refuses to outfit anything
    struct BareSpawner(SimWorld);

    impl EntitySpawner for BareSpawner {
        fn spawn(&mut self, kind: &str, at: &Position) -> Result<EntityId, WorldError> {
            self.0.spawn(kind, at)
        }

        fn outfit(&mut self, id: &EntityId, _profile: &EntityProfile) -> Result<(), WorldError> {
            Err(WorldError::UnknownEntity(id.to_string()))
        }

        fn despawn(&mut self, id: &EntityId) -> Result<(), WorldError> {
            self.0.despawn(id)
        }
    }

    #[test]
    fn test_failed_outfit_despawns_stand_in() {
        let mut spawner = BareSpawner(SimWorld::new());
        let profile = EntityProfile {
            kind: "skeleton".to_string(),
            name: None,
            health: 3.0,
            max_health: 20.0,
            position: Position::new("overworld", 0.0, 64.0, 0.0),
            equipment: Default::default(),
        };

        let err = spawn_stand_in(&profile, &mut spawner).unwrap_err();
        assert!(matches!(err, QuestError::Spawn(WorldError::UnknownEntity(_))));
        assert_eq!(spawner.0.entity_count(), 0);
    }
}
