//! Players, parties and the participant registry.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Stable player identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is taking part in a quest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    Player(PlayerId),
    Party {
        leader: PlayerId,
        members: Vec<PlayerId>,
    },
}

impl Participant {
    /// All players, leader first
    pub fn players(&self) -> Vec<PlayerId> {
        match self {
            Participant::Player(id) => vec![id.clone()],
            Participant::Party { leader, members } => {
                let mut all = Vec::with_capacity(members.len() + 1);
                all.push(leader.clone());
                all.extend(members.iter().filter(|m| *m != leader).cloned());
                all
            }
        }
    }
}

/// Resolves participant identity strings back to live participants
pub trait ParticipantRegistry {
    fn resolve(&self, identity: &str) -> Option<Participant>;

    fn identity_of(&self, participant: &Participant) -> String;
}

const PLAYER_PREFIX: &str = "player:";
const PARTY_PREFIX: &str = "party:";

/// In-memory registry of known players.
///
/// Identities look like `player:alice` or `party:alice,bob,carol` (leader
/// first). Resolution fails if any named player is not known, unless the
/// directory accepts every well-formed id.
#[derive(Debug, Clone, Default)]
pub struct PlayerDirectory {
    known: HashSet<PlayerId>,
    accept_all: bool,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_players(ids: &[&str]) -> Self {
        Self {
            known: ids.iter().map(|id| PlayerId::new(id)).collect(),
            accept_all: false,
        }
    }

    /// Resolve any well-formed identity, for hosts that do not track who is
    /// online when saved state is restored
    pub fn accepting_all() -> Self {
        Self {
            known: HashSet::new(),
            accept_all: true,
        }
    }

    pub fn register(&mut self, id: PlayerId) {
        self.known.insert(id);
    }

    pub fn forget(&mut self, id: &PlayerId) {
        self.known.remove(id);
    }

    fn lookup(&self, id: &str) -> Option<PlayerId> {
        if id.is_empty() || id.contains(',') {
            return None;
        }
        let id = PlayerId::new(id);
        (self.accept_all || self.known.contains(&id)).then_some(id)
    }
}

impl ParticipantRegistry for PlayerDirectory {
    fn resolve(&self, identity: &str) -> Option<Participant> {
        if let Some(id) = identity.strip_prefix(PLAYER_PREFIX) {
            return self.lookup(id).map(Participant::Player);
        }

        let names = identity.strip_prefix(PARTY_PREFIX)?;
        let mut players = names
            .split(',')
            .filter(|n| !n.is_empty())
            .map(|n| self.lookup(n))
            .collect::<Option<Vec<_>>>()?
            .into_iter();
        let leader = players.next()?;
        Some(Participant::Party {
            leader,
            members: players.collect(),
        })
    }

    fn identity_of(&self, participant: &Participant) -> String {
        match participant {
            Participant::Player(id) => format!("{}{}", PLAYER_PREFIX, id),
            Participant::Party { .. } => {
                let names: Vec<String> =
                    participant.players().iter().map(|p| p.0.clone()).collect();
                format!("{}{}", PARTY_PREFIX, names.join(","))
            }
        }
    }
}
