//! Error types for the quest engine and its collaborators.

use thiserror::Error;

/// Errors raised by blob storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob '{0}' not found")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the world collaborator (spawning, outfitting)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorldError {
    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),

    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
}

/// Errors raised by quests, the codec and the manager
#[derive(Debug, Error)]
pub enum QuestError {
    /// Snapshot structure or discriminator tag did not match what was expected
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("quest template '{0}' not found")]
    TemplateNotFound(String),

    #[error("participant '{0}' could not be resolved")]
    ParticipantUnresolved(String),

    #[error("failed to persist quest state to '{blob}': {source}")]
    PersistenceWriteFailed {
        blob: String,
        #[source]
        source: StorageError,
    },

    #[error("state for '{found}' loaded into quest '{expected}'")]
    NameMismatch { expected: String, found: String },

    #[error("invalid quest template: {0}")]
    InvalidTemplate(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn stand-in: {0}")]
    Spawn(#[from] WorldError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuestError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSnapshot(msg.into())
    }

    pub fn invalid_template(msg: impl Into<String>) -> Self {
        Self::InvalidTemplate(msg.into())
    }
}

pub type QuestResult<T> = Result<T, QuestError>;
