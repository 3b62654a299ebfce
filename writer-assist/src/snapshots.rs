//! Most-recent-N in-memory document snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::DocRange;
use std::collections::VecDeque;

use crate::document::HostDocument;
use crate::offsets::replace_range;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    pub label: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SnapshotHistory {
    limit: usize,
    /// Newest first
    snapshots: VecDeque<DocumentSnapshot>,
}

impl SnapshotHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            snapshots: VecDeque::new(),
        }
    }

    /// Record the document's current text. Returns `None` when it matches the
    /// newest snapshot.
    pub fn capture(
        &mut self,
        doc: &dyn HostDocument,
        label: impl Into<String>,
    ) -> Option<&DocumentSnapshot> {
        let content = doc.text_between(DocRange::new(0, doc.len()))?;
        if self.latest().is_some_and(|latest| latest.content == content) {
            tracing::debug!("Snapshot skipped; content unchanged");
            return None;
        }

        self.snapshots.push_front(DocumentSnapshot {
            id: ulid::Ulid::new().to_string(),
            label: label.into(),
            content,
            created_at: Utc::now(),
        });
        if self.snapshots.len() > self.limit {
            self.snapshots.pop_back();
        }
        self.snapshots.front()
    }

    pub fn latest(&self) -> Option<&DocumentSnapshot> {
        self.snapshots.front()
    }

    pub fn get(&self, id: &str) -> Option<&DocumentSnapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn list(&self) -> impl Iterator<Item = &DocumentSnapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Replace the whole document with a snapshot's content.
    pub fn restore(&self, id: &str, doc: &mut dyn HostDocument) -> bool {
        let Some(snapshot) = self.get(id) else {
            return false;
        };
        let whole = DocRange::new(0, doc.len());
        let restored = replace_range(doc, whole, &snapshot.content).is_some();
        if restored {
            tracing::info!(
                snapshot_id = %snapshot.id,
                label = %snapshot.label,
                "Snapshot restored"
            );
        }
        restored
    }
}
