//! Running Quests
//!
//! A quest instance owns its goals, its involved players and its history.
//! Readiness is recomputed only by [`Quest::update`]; with `keep_state` set
//! it latches the first time it becomes true.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{QuestError, QuestResult};
use crate::player::{Participant, ParticipantRegistry, PlayerId};
use crate::quest::codec;
use crate::quest::events::{QuestUpdate, WorldEvent};
use crate::quest::goal::Goal;
use crate::quest::history::{History, HistoryKind};
use crate::quest::requirement::EvalContext;
use crate::quest::state::QuestState;
use crate::storage::BlobStorage;
use crate::world::{EntitySpawner, WorldView};

/// Per-instance quest id. Random, so only practically unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestId(pub u32);

impl QuestId {
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(0..i32::MAX as u32))
    }
}

impl std::fmt::Display for QuestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a quest instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestStatus {
    /// Instantiated but not registered with a manager
    Created,
    Running,
    /// Stopped softly, state saved
    Stopped,
    /// Halted immediately, nothing saved
    Halted,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Created => "created",
            QuestStatus::Running => "running",
            QuestStatus::Stopped => "stopped",
            QuestStatus::Halted => "halted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuestStatus::Stopped | QuestStatus::Halted)
    }
}

#[derive(Debug)]
pub struct Quest {
    id: QuestId,
    name: String,
    description: String,
    status: QuestStatus,
    /// Readiness latches once reached
    keep_state: bool,
    ready: bool,
    goals: Vec<Goal>,
    /// Involved players, in the order they joined
    players: Vec<PlayerId>,
    history: History,
    /// Blob this quest was restored from, replaced on the next save
    origin: Option<String>,
}

impl PartialEq for Quest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Quest {}

impl Quest {
    pub fn new(name: &str, description: &str, keep_state: bool) -> Self {
        Self {
            id: QuestId::generate(),
            name: name.to_string(),
            description: description.to_string(),
            status: QuestStatus::Created,
            keep_state,
            ready: false,
            goals: Vec::new(),
            players: Vec::new(),
            history: History::new(),
            origin: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_id(mut self, id: QuestId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> QuestId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> QuestStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == QuestStatus::Running
    }

    pub fn keep_state(&self) -> bool {
        self.keep_state
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn add_goal(&mut self, mut goal: Goal) {
        goal.attach(self.id);
        self.goals.push(goal);
    }

    /// Blob name this quest saves under
    pub fn blob_name(&self) -> String {
        codec::blob_name(&self.name, self.id)
    }

    /// Blob this quest was restored from, if any
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub(crate) fn set_origin(&mut self, blob: &str) {
        self.origin = Some(blob.to_string());
    }

    pub(crate) fn start(&mut self) {
        if self.status != QuestStatus::Created {
            warn!(
                "Quest {} ({}) cannot start from status {}",
                self.name,
                self.id,
                self.status.as_str()
            );
            return;
        }
        self.status = QuestStatus::Running;
        self.history.record(HistoryKind::Started, "");
        info!("Quest started: {} ({})", self.name, self.id);
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    /// Returns false if the player was already involved
    pub fn add_player(&mut self, player: PlayerId) -> bool {
        if self.players.contains(&player) {
            return false;
        }
        self.history.record(HistoryKind::PlayerAdded, player.as_str());
        self.players.push(player);
        true
    }

    pub fn remove_player(&mut self, player: &PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p != player);
        let removed = self.players.len() != before;
        if removed {
            self.history.record(HistoryKind::PlayerRemoved, player.as_str());
        }
        removed
    }

    /// The involved players as one participant: a single player, or a
    /// party led by whoever joined first
    pub fn participant(&self) -> Option<Participant> {
        match self.players.as_slice() {
            [] => None,
            [only] => Some(Participant::Player(only.clone())),
            [leader, members @ ..] => Some(Participant::Party {
                leader: leader.clone(),
                members: members.to_vec(),
            }),
        }
    }

    fn release_players(&mut self) {
        for player in std::mem::take(&mut self.players) {
            self.history.record(HistoryKind::PlayerRemoved, player.as_str());
        }
    }

    // ------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------

    /// Recompute readiness. No-op once latched.
    pub fn update(&mut self, world: &dyn WorldView) -> bool {
        if self.keep_state && self.ready {
            return true;
        }

        let was_ready = self.ready;
        let ctx = EvalContext {
            world,
            players: &self.players,
        };

        self.ready = true;
        for goal in self.goals.iter_mut() {
            goal.refresh(&ctx);
            if !goal.is_complete() {
                self.ready = false;
                break;
            }
        }

        if self.ready != was_ready {
            let kind = if self.ready {
                HistoryKind::Ready
            } else {
                HistoryKind::Unready
            };
            info!("Quest {} ({}) is now {}", self.name, self.id, kind.as_str());
            self.history.record(kind, "");
        }

        self.ready
    }

    /// Readiness, re-evaluated before answering
    pub fn is_ready(&mut self, world: &dyn WorldView) -> bool {
        self.update(world)
    }

    /// Route a world event to this quest's requirements
    pub fn handle_event(
        &mut self,
        event: &WorldEvent,
        world: &dyn WorldView,
    ) -> Option<QuestUpdate> {
        if !self.is_running() {
            return None;
        }

        let ctx = EvalContext {
            world,
            players: &self.players,
        };
        let changes: Vec<_> = self
            .goals
            .iter_mut()
            .flat_map(|goal| goal.handle_event(event, &ctx))
            .collect();

        if changes.is_empty() {
            return None;
        }

        debug!(
            "Quest {} ({}): {} requirement(s) changed on {}",
            self.name,
            self.id,
            changes.len(),
            event.event_type()
        );
        let ready = self.update(world);
        Some(QuestUpdate {
            quest_id: self.id,
            quest_name: self.name.clone(),
            changes,
            ready,
        })
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn get_state(
        &self,
        world: &dyn WorldView,
        registry: &dyn ParticipantRegistry,
    ) -> QuestResult<QuestState> {
        let mut state = QuestState::new(&self.name);

        if self.goals.is_empty() {
            return Ok(state);
        }

        state.goals = self
            .goals
            .iter()
            .map(|goal| goal.get_state(world))
            .collect::<QuestResult<_>>()?;
        state.participant = self.participant().map(|p| registry.identity_of(&p));

        Ok(state)
    }

    /// Apply saved state onto this (freshly instantiated) quest.
    ///
    /// Best effort: a name mismatch, bad requirement entries and an
    /// unresolvable participant are logged, not returned. Returns the number
    /// of requirements restored.
    pub fn load_state(
        &mut self,
        state: &QuestState,
        registry: &dyn ParticipantRegistry,
        spawner: &mut dyn EntitySpawner,
    ) -> usize {
        if state.name != self.name {
            warn!(
                "{}",
                QuestError::NameMismatch {
                    expected: self.name.clone(),
                    found: state.name.clone(),
                }
            );
        }

        if state.goals.len() != self.goals.len() {
            warn!(
                "Quest {} has {} goals but saved state has {}",
                self.name,
                self.goals.len(),
                state.goals.len()
            );
        }

        let restored: usize = self
            .goals
            .iter_mut()
            .zip(&state.goals)
            .map(|(goal, saved)| goal.load_state(saved, spawner))
            .sum();

        if let Some(identity) = &state.participant {
            match registry.resolve(identity) {
                Some(participant) => {
                    for player in participant.players() {
                        self.add_player(player);
                    }
                }
                None => warn!(
                    "{}",
                    QuestError::ParticipantUnresolved(identity.clone())
                ),
            }
        }

        self.history.record(
            HistoryKind::StateLoaded,
            format!("{} requirement(s) from {}", restored, state.save_time),
        );
        restored
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Stop softly: save state, then release every player.
    ///
    /// Players are released even when saving fails; the save error is
    /// returned afterwards. The blob this quest was restored from is only
    /// removed once the new one has been written.
    pub fn stop(
        &mut self,
        world: &dyn WorldView,
        registry: &dyn ParticipantRegistry,
        storage: &mut dyn BlobStorage,
    ) -> QuestResult<()> {
        if self.status.is_terminal() {
            warn!("Quest {} ({}) already {}", self.name, self.id, self.status.as_str());
            return Ok(());
        }

        let blob = self.blob_name();
        let saved = self.persist(&blob, world, registry, storage);
        match &saved {
            Ok(()) => {
                info!("Saved quest state: {}", blob);
                self.discard_origin(&blob, storage);
            }
            Err(e) => error!("Failed to save quest state for {} ({}): {}", self.name, self.id, e),
        }

        self.release_players();
        for goal in &mut self.goals {
            goal.release();
        }
        self.status = QuestStatus::Stopped;
        self.history.record(HistoryKind::Stopped, blob);
        saved
    }

    fn discard_origin(&mut self, saved_as: &str, storage: &mut dyn BlobStorage) {
        let Some(origin) = self.origin.take() else {
            return;
        };
        if origin == saved_as {
            return;
        }
        match storage.remove(&origin) {
            Ok(()) => debug!("Replaced {} with {}", origin, saved_as),
            Err(e) => warn!("Saved {} but could not remove {}: {}", saved_as, origin, e),
        }
    }

    fn persist(
        &self,
        blob: &str,
        world: &dyn WorldView,
        registry: &dyn ParticipantRegistry,
        storage: &mut dyn BlobStorage,
    ) -> QuestResult<()> {
        let state = self.get_state(world, registry)?;
        let bytes = codec::encode_state(&state)?;
        storage
            .write(blob, &bytes)
            .map_err(|source| QuestError::PersistenceWriteFailed {
                blob: blob.to_string(),
                source,
            })
    }

    /// Stop immediately. Nothing is saved.
    pub fn halt(&mut self) {
        if self.status.is_terminal() {
            warn!("Quest {} ({}) already {}", self.name, self.id, self.status.as_str());
            return;
        }

        self.release_players();
        for goal in &mut self.goals {
            goal.release();
        }
        self.status = QuestStatus::Halted;
        self.history.record(HistoryKind::Halted, "");
        info!("Quest halted: {} ({})", self.name, self.id);
    }
}
