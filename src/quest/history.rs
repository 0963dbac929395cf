//! Append-only record of quest lifecycle transitions.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Started,
    Ready,
    Unready,
    StateLoaded,
    PlayerAdded,
    PlayerRemoved,
    Stopped,
    Halted,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Started => "started",
            HistoryKind::Ready => "ready",
            HistoryKind::Unready => "unready",
            HistoryKind::StateLoaded => "state_loaded",
            HistoryKind::PlayerAdded => "player_added",
            HistoryKind::PlayerRemoved => "player_removed",
            HistoryKind::Stopped => "stopped",
            HistoryKind::Halted => "halted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub at: DateTime<Utc>,
    pub kind: HistoryKind,
    pub detail: String,
}

/// Transition log owned by a single quest. Only the quest appends to it.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, kind: HistoryKind, detail: impl Into<String>) {
        self.records.push(HistoryRecord {
            at: Utc::now(),
            kind,
            detail: detail.into(),
        });
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    pub fn count(&self, kind: HistoryKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
