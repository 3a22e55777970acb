//! # Coordinator History
//!
//! The coordinator's own record of a run: the instruction it received, each
//! delegation it made and the result that came back for it. Results are
//! bound to their delegation by call id.

use serde::{Deserialize, Serialize};

use crate::workers::WorkerKind;

/// One entry in the coordinator's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// Task received from the caller
    Instruction { text: String },
    /// Task handed to a worker
    Delegation {
        call_id: String,
        worker: WorkerKind,
        task: String,
    },
    /// Worker output returned for a delegation
    DelegationResult {
        call_id: String,
        worker: WorkerKind,
        content: String,
    },
    /// Coordinator-side note (plan, repair)
    Note { text: String },
}

/// Delegation waiting for its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelegation {
    pub call_id: String,
    pub worker: WorkerKind,
    /// Position of the worker in the lineup
    pub index: usize,
}

/// Append-only history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// The delegation entry recorded under a call id
    pub fn delegation(&self, call_id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(
            |entry| matches!(entry, HistoryEntry::Delegation { call_id: id, .. } if id == call_id),
        )
    }

    /// Result content recorded for a call id
    pub fn result_for(&self, call_id: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            HistoryEntry::DelegationResult {
                call_id: id,
                content,
                ..
            } if id == call_id => Some(content.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_call_id() {
        let mut history = History::default();
        history.push(HistoryEntry::Instruction {
            text: "dog walking app".into(),
        });
        history.push(HistoryEntry::Delegation {
            call_id: "call-1".into(),
            worker: WorkerKind::Searcher,
            task: "find sources".into(),
        });
        history.push(HistoryEntry::DelegationResult {
            call_id: "call-1".into(),
            worker: WorkerKind::Searcher,
            content: "https://a.example".into(),
        });

        assert_eq!(history.len(), 3);
        assert!(history.delegation("call-1").is_some());
        assert!(history.delegation("call-2").is_none());
        assert_eq!(history.result_for("call-1"), Some("https://a.example"));
    }

    #[test]
    fn test_entries_serialize_tagged() {
        let entry = HistoryEntry::Note {
            text: "plan ready".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "note");
    }
}
