//! Quest Manager
//!
//! Holds quest templates and the running quest set, restores saved state
//! at startup, routes world events, and stops or halts everything at
//! shutdown.

use tracing::{error, info, warn};

use crate::config::ManagerConfig;
use crate::error::{QuestError, QuestResult};
use crate::player::ParticipantRegistry;
use crate::quest::codec;
use crate::quest::definition::QuestTemplate;
use crate::quest::events::{QuestUpdate, WorldEvent};
use crate::quest::instance::{Quest, QuestId};
use crate::storage::BlobStorage;
use crate::world::{EntitySpawner, WorldView};

/// Outcome of a startup restore
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Quests rebuilt from saved state
    pub restored: Vec<QuestId>,
    /// Blobs that could not be restored, with the reason
    pub skipped: Vec<(String, QuestError)>,
}

pub struct QuestManager {
    name: String,
    templates: Vec<QuestTemplate>,
    running: Vec<Quest>,
    storage: Box<dyn BlobStorage>,
    players: Box<dyn ParticipantRegistry>,
}

impl QuestManager {
    pub fn new(
        name: &str,
        templates: Vec<QuestTemplate>,
        storage: Box<dyn BlobStorage>,
        players: Box<dyn ParticipantRegistry>,
    ) -> Self {
        Self {
            name: name.to_string(),
            templates,
            running: Vec::new(),
            storage,
            players,
        }
    }

    /// Build a manager from config, loading each listed template from
    /// `<quest_dir>/<name>.toml`. Missing or invalid templates are skipped.
    pub fn from_config(
        config: &ManagerConfig,
        storage: Box<dyn BlobStorage>,
        players: Box<dyn ParticipantRegistry>,
    ) -> Self {
        let mut templates = Vec::new();

        for quest_name in &config.quests {
            let path = config.template_path(quest_name);
            if !path.is_file() {
                warn!("Unable to locate quest template: {:?}", path);
                continue;
            }

            match QuestTemplate::load(&path) {
                Ok(template) => {
                    if template.name != *quest_name {
                        warn!(
                            "Template {:?} is named '{}', expected '{}'",
                            path, template.name, quest_name
                        );
                    }
                    info!("Loaded quest template: {}", template.name);
                    templates.push(template);
                }
                Err(e) => warn!("Failed to load quest template {:?}: {}", path, e),
            }
        }

        info!("{} loaded {} quest templates", config.name, templates.len());
        Self::new(&config.name, templates, storage, players)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn templates(&self) -> &[QuestTemplate] {
        &self.templates
    }

    /// Look up a template by name
    pub fn template(&self, name: &str) -> Option<&QuestTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn running_quests(&self) -> &[Quest] {
        &self.running
    }

    pub fn quest(&self, id: QuestId) -> Option<&Quest> {
        self.running.iter().find(|q| q.id() == id)
    }

    pub fn quest_mut(&mut self, id: QuestId) -> Option<&mut Quest> {
        self.running.iter_mut().find(|q| q.id() == id)
    }

    pub fn registry(&self) -> &dyn ParticipantRegistry {
        self.players.as_ref()
    }

    /// Start tracking a quest
    pub fn register_quest(&mut self, mut quest: Quest) -> QuestId {
        quest.start();
        let id = quest.id();
        self.running.push(quest);
        id
    }

    /// Instantiate a template and register the new quest
    pub fn start_quest(&mut self, template_name: &str) -> QuestResult<QuestId> {
        let quest = self
            .template(template_name)
            .ok_or_else(|| QuestError::TemplateNotFound(template_name.to_string()))?
            .instantiate();
        Ok(self.register_quest(quest))
    }

    /// Rebuild quests from every saved state blob.
    ///
    /// Each blob is handled on its own: a missing template, unreadable
    /// blob or decode failure skips that blob only. Blobs stay in storage;
    /// a restored quest replaces its blob once it saves again.
    pub fn restore(&mut self, spawner: &mut dyn EntitySpawner) -> RestoreReport {
        let mut report = RestoreReport::default();

        let blobs = match self.storage.list("") {
            Ok(blobs) => blobs,
            Err(e) => {
                error!("{} could not list saved quest state: {}", self.name, e);
                return report;
            }
        };

        if blobs.is_empty() {
            return report;
        }
        info!("{} fetching state information...", self.name);

        for blob in blobs {
            match self.restore_blob(&blob, spawner) {
                Ok(id) => report.restored.push(id),
                Err(e) => {
                    warn!("Skipping saved state {}: {}", blob, e);
                    report.skipped.push((blob, e));
                }
            }
        }

        info!(
            "{} finished: {} restored, {} skipped",
            self.name,
            report.restored.len(),
            report.skipped.len()
        );
        report
    }

    fn restore_blob(
        &mut self,
        blob: &str,
        spawner: &mut dyn EntitySpawner,
    ) -> QuestResult<QuestId> {
        let template_name = codec::template_name_of(blob)
            .ok_or_else(|| QuestError::malformed(format!("'{}' has no template name", blob)))?;
        let mut quest = self
            .template(template_name)
            .ok_or_else(|| QuestError::TemplateNotFound(template_name.to_string()))?
            .instantiate();

        let bytes = self.storage.read(blob)?;
        let state = codec::decode_state(&bytes)?;
        let restored = quest.load_state(&state, self.players.as_ref(), spawner);
        let saved: usize = state.goals.iter().map(Vec::len).sum();
        if saved > 0 && restored == 0 {
            return Err(QuestError::malformed(format!(
                "none of {} saved requirements fit template '{}'",
                saved, template_name
            )));
        }

        quest.set_origin(blob);
        Ok(self.register_quest(quest))
    }

    /// Route a world event to every running quest
    pub fn dispatch(&mut self, event: &WorldEvent, world: &dyn WorldView) -> Vec<QuestUpdate> {
        self.running
            .iter_mut()
            .filter_map(|quest| quest.handle_event(event, world))
            .collect()
    }

    /// Stop every running quest, saving state. Keeps going past failures,
    /// which are returned.
    pub fn stop_quests(&mut self, world: &dyn WorldView) -> Vec<(QuestId, QuestError)> {
        let mut failures = Vec::new();
        for mut quest in std::mem::take(&mut self.running) {
            if let Err(e) = quest.stop(world, self.players.as_ref(), self.storage.as_mut()) {
                failures.push((quest.id(), e));
            }
        }
        failures
    }

    /// Halt every running quest immediately
    pub fn halt_quests(&mut self) {
        for mut quest in std::mem::take(&mut self.running) {
            quest.halt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::player::{PlayerDirectory, PlayerId};
    use crate::quest::instance::QuestStatus;
    use crate::storage::{DirectoryStorage, MemoryStorage};
    use crate::world::{EntityId, EntityProfile, Equipment, Position, SimWorld};
    use tempfile::TempDir;

    const DELIVER_APPLES: &str = r#"
[quest]
name = "Deliver Apples"
description = "Bring apples to the market"

[[quest.goals]]
id = "deliver"

[[quest.goals.requirements]]
id = "at_market"
type = "position"
destination = { world = "overworld", x = 0.0, y = 64.0, z = 0.0 }
range = 2.0
"#;

    const SLAY_THE_WARDEN: &str = r#"
[quest]
name = "Slay the Warden"
keep_state = true

[[quest.goals]]
id = "slay"

[[quest.goals.requirements]]
id = "warden"
type = "vanquish"
target = "warden_01"
"#;

    fn templates() -> Vec<QuestTemplate> {
        vec![
            QuestTemplate::from_toml_str(DELIVER_APPLES).unwrap(),
            QuestTemplate::from_toml_str(SLAY_THE_WARDEN).unwrap(),
        ]
    }

    fn manager(storage: &MemoryStorage) -> QuestManager {
        QuestManager::new(
            "village",
            templates(),
            Box::new(storage.clone()),
            Box::new(PlayerDirectory::with_players(&["alice", "bob"])),
        )
    }

    fn warden_profile() -> EntityProfile {
        EntityProfile {
            kind: "zombie".to_string(),
            name: Some("The Warden".to_string()),
            health: 25.0,
            max_health: 40.0,
            position: Position::new("overworld", 30.0, 64.0, 30.0),
            equipment: Equipment {
                chest: Some("chainmail".to_string()),
                ..Equipment::default()
            },
        }
    }

    #[test]
    fn test_template_lookup() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        assert!(manager.template("Deliver Apples").is_some());
        assert!(manager.template("Deliver Pears").is_none());
        assert!(matches!(
            manager.start_quest("Deliver Pears"),
            Err(QuestError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_dispatch_deliver_apples() {
        let alice = PlayerId::new("alice");
        let storage = MemoryStorage::new();
        let mut world = SimWorld::new();
        let mut manager = manager(&storage);

        let id = manager.start_quest("Deliver Apples").unwrap();
        assert_eq!(manager.quest(id).unwrap().status(), QuestStatus::Running);
        manager.quest_mut(id).unwrap().add_player(alice.clone());

        world.move_player(&alice, Position::new("overworld", 10.0, 64.0, 0.0));
        assert!(!manager.quest_mut(id).unwrap().is_ready(&world));

        let near = Position::new("overworld", 1.0, 64.0, 1.0);
        world.move_player(&alice, near.clone());
        let moved = WorldEvent::player_moved(alice.clone(), near);
        let updates = manager.dispatch(&moved, &world);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].quest_id, id);
        assert!(updates[0].ready);

        let far = Position::new("overworld", 10.0, 64.0, 0.0);
        world.move_player(&alice, far.clone());
        let moved = WorldEvent::player_moved(alice.clone(), far);
        let updates = manager.dispatch(&moved, &world);
        assert!(!updates[0].ready);
        assert!(!manager.quest_mut(id).unwrap().is_ready(&world));
    }

    #[test]
    fn test_stop_and_restore() {
        let warden = EntityId::new("warden_01");
        let storage = MemoryStorage::new();
        let mut world = SimWorld::new();
        world.insert_entity(warden.clone(), warden_profile());

        let mut first = manager(&storage);
        let apples = first.start_quest("Deliver Apples").unwrap();
        let slay = first.start_quest("Slay the Warden").unwrap();
        first.quest_mut(apples).unwrap().add_player(PlayerId::new("alice"));
        first.quest_mut(slay).unwrap().add_player(PlayerId::new("alice"));
        first.quest_mut(slay).unwrap().add_player(PlayerId::new("bob"));
        assert!(!first.quest_mut(slay).unwrap().is_ready(&world));

        assert!(first.stop_quests(&world).is_empty());
        assert!(first.running_quests().is_empty());
        assert_eq!(storage.len(), 2);

        // Restart: the original warden is gone
        world.remove_entity(&warden);
        let saved_blobs = storage.list("").unwrap();
        let mut second = manager(&storage);
        let report = second.restore(&mut world);
        assert_eq!(report.restored.len(), 2);
        assert!(report.skipped.is_empty());
        assert_eq!(storage.list("").unwrap(), saved_blobs);

        let restored_slay = second
            .running_quests()
            .iter()
            .find(|q| q.name() == "Slay the Warden")
            .unwrap();
        assert_eq!(
            restored_slay.players(),
            &[PlayerId::new("alice"), PlayerId::new("bob")]
        );
        assert_eq!(world.entity_count(), 1);

        // Defeating the stand-in completes the restored quest
        let stand_in = match restored_slay.goals()[0].requirements()[0].kind() {
            crate::quest::requirement::RequirementKind::Defeat(req) => req.target().clone(),
            other => panic!("unexpected requirement {:?}", other),
        };
        assert_eq!(world.entity(&stand_in), Some(warden_profile()));

        let updates = second.dispatch(&WorldEvent::EntityDestroyed { entity: stand_in }, &world);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].ready);

        // Stopping again replaces the restored blobs
        let mut expected: Vec<String> = second
            .running_quests()
            .iter()
            .map(Quest::blob_name)
            .collect();
        expected.sort();
        assert!(second.stop_quests(&world).is_empty());
        assert_eq!(storage.list("").unwrap(), expected);
    }

    #[test]
    fn test_halt_after_restore_keeps_saved_state() {
        let storage = MemoryStorage::new();
        let mut world = SimWorld::new();

        let mut first = manager(&storage);
        let id = first.start_quest("Deliver Apples").unwrap();
        first.quest_mut(id).unwrap().add_player(PlayerId::new("alice"));
        assert!(first.stop_quests(&world).is_empty());
        let saved_blobs = storage.list("").unwrap();
        assert_eq!(saved_blobs.len(), 1);

        let mut second = manager(&storage);
        assert_eq!(second.restore(&mut world).restored.len(), 1);
        assert_eq!(second.running_quests()[0].origin(), Some(saved_blobs[0].as_str()));
        second.halt_quests();
        assert_eq!(storage.list("").unwrap(), saved_blobs);

        // A later restart still finds the same progress
        let mut third = manager(&storage);
        assert_eq!(third.restore(&mut world).restored.len(), 1);
        assert_eq!(third.running_quests()[0].players(), &[PlayerId::new("alice")]);
    }

    #[test]
    fn test_participants_survive_restart_with_open_directory() {
        let storage = MemoryStorage::new();
        let mut world = SimWorld::new();

        let mut first = manager(&storage);
        let id = first.start_quest("Deliver Apples").unwrap();
        first.quest_mut(id).unwrap().add_player(PlayerId::new("alice"));
        first.quest_mut(id).unwrap().add_player(PlayerId::new("bob"));
        assert!(first.stop_quests(&world).is_empty());

        let mut second = QuestManager::new(
            "village",
            templates(),
            Box::new(storage.clone()),
            Box::new(PlayerDirectory::accepting_all()),
        );
        assert_eq!(second.restore(&mut world).restored.len(), 1);
        let players = second.running_quests()[0].players().to_vec();
        assert_eq!(players, vec![PlayerId::new("alice"), PlayerId::new("bob")]);

        assert!(second.stop_quests(&world).is_empty());
        let blobs = storage.list("").unwrap();
        assert_eq!(blobs.len(), 1);
        let saved = codec::decode_state(&storage.read(&blobs[0]).unwrap()).unwrap();
        assert_eq!(saved.participant.as_deref(), Some("party:alice,bob"));
    }

    #[test]
    fn test_restore_rejects_state_that_fits_no_requirement() {
        const REORDERED_APPLES: &str = r#"
[quest]
name = "Deliver Apples"

[[quest.goals]]
id = "deliver"

[[quest.goals.requirements]]
id = "thief"
type = "vanquish"
target = "thief_01"

[[quest.goals.requirements]]
id = "at_market"
type = "position"
destination = { world = "overworld", x = 0.0, y = 64.0, z = 0.0 }
range = 2.0
"#;
        let storage = MemoryStorage::new();
        let world = SimWorld::new();
        let mut spawner = SimWorld::new();

        let mut first = manager(&storage);
        first.start_quest("Deliver Apples").unwrap();
        assert!(first.stop_quests(&world).is_empty());
        let saved_blobs = storage.list("").unwrap();

        let mut second = QuestManager::new(
            "village",
            vec![QuestTemplate::from_toml_str(REORDERED_APPLES).unwrap()],
            Box::new(storage.clone()),
            Box::new(PlayerDirectory::new()),
        );
        let report = second.restore(&mut spawner);

        assert!(report.restored.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0].1, QuestError::MalformedSnapshot(_)));
        assert!(second.running_quests().is_empty());
        assert_eq!(storage.list("").unwrap(), saved_blobs);
        assert_eq!(spawner.entity_count(), 0);
    }

    /// Storage that refuses writes to blobs with a given prefix
    struct FlakyStorage {
        inner: MemoryStorage,
        refuse: &'static str,
    }

    impl BlobStorage for FlakyStorage {
        fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(prefix)
        }

        fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.read(name)
        }

        fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
            if name.starts_with(self.refuse) {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "disk full",
                )));
            }
            self.inner.write(name, bytes)
        }

        fn remove(&mut self, name: &str) -> Result<(), StorageError> {
            self.inner.remove(name)
        }
    }

    #[test]
    fn test_stop_quests_continues_past_failures() {
        let warden = EntityId::new("warden_01");
        let storage = MemoryStorage::new();
        let mut world = SimWorld::new();
        world.insert_entity(warden, warden_profile());

        let mut manager = QuestManager::new(
            "village",
            templates(),
            Box::new(FlakyStorage {
                inner: storage.clone(),
                refuse: "Deliver Apples_",
            }),
            Box::new(PlayerDirectory::with_players(&["alice"])),
        );
        let apples = manager.start_quest("Deliver Apples").unwrap();
        let slay = manager.start_quest("Slay the Warden").unwrap();
        manager.quest_mut(apples).unwrap().add_player(PlayerId::new("alice"));

        let failures = manager.stop_quests(&world);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, apples);
        assert!(matches!(failures[0].1, QuestError::PersistenceWriteFailed { .. }));
        assert_eq!(storage.list("").unwrap(), vec![codec::blob_name("Slay the Warden", slay)]);
        assert!(manager.running_quests().is_empty());
    }

    #[test]
    fn test_restore_skips_unknown_template() {
        let storage = MemoryStorage::new();
        let world = SimWorld::new();
        let mut spawner = SimWorld::new();

        let mut first = manager(&storage);
        first.start_quest("Deliver Apples").unwrap();
        first.stop_quests(&world);

        let orphan = first.template("Deliver Apples").unwrap().instantiate();
        let mut handle = storage.clone();
        let mut state = orphan.get_state(&world, first.registry()).unwrap();
        state.name = "Lost Quest".to_string();
        handle
            .write("Lost Quest_12.json", &codec::encode_state(&state).unwrap())
            .unwrap();
        handle.write("Deliver Apples_99.json", b"not json").unwrap();

        let mut second = manager(&storage);
        let report = second.restore(&mut spawner);

        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().any(|(blob, e)| {
            blob == "Lost Quest_12.json" && matches!(e, QuestError::TemplateNotFound(_))
        }));
        assert!(report.skipped.iter().any(|(blob, e)| {
            blob == "Deliver Apples_99.json" && matches!(e, QuestError::MalformedSnapshot(_))
        }));
        assert_eq!(second.running_quests().len(), 1);
        // Nothing is removed by a restore
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn test_halt_quests_saves_nothing() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let id = manager.start_quest("Deliver Apples").unwrap();
        manager.quest_mut(id).unwrap().add_player(PlayerId::new("alice"));

        manager.halt_quests();
        assert!(manager.running_quests().is_empty());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_from_config_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let quest_dir = temp_dir.path().join("quests");
        std::fs::create_dir_all(&quest_dir).unwrap();
        std::fs::write(quest_dir.join("Deliver Apples.toml"), DELIVER_APPLES).unwrap();
        std::fs::write(quest_dir.join("Broken.toml"), "[quest]\n").unwrap();

        let config = ManagerConfig {
            name: "village".to_string(),
            quest_dir,
            save_dir: temp_dir.path().join("state"),
            quests: vec![
                "Deliver Apples".to_string(),
                "Broken".to_string(),
                "Missing".to_string(),
            ],
        };

        let storage = DirectoryStorage::open(&config.save_dir).unwrap();
        let mut manager = QuestManager::from_config(
            &config,
            Box::new(storage.clone()),
            Box::new(PlayerDirectory::with_players(&["alice"])),
        );
        assert_eq!(manager.templates().len(), 1);

        let world = SimWorld::new();
        let id = manager.start_quest("Deliver Apples").unwrap();
        manager.quest_mut(id).unwrap().add_player(PlayerId::new("alice"));
        assert!(manager.stop_quests(&world).is_empty());

        let blobs = storage.list("Deliver Apples_").unwrap();
        assert_eq!(blobs, vec![format!("Deliver Apples_{}.json", id)]);
        let saved = codec::decode_state(&storage.read(&blobs[0]).unwrap()).unwrap();
        assert_eq!(saved.participant.as_deref(), Some("player:alice"));
    }
}
