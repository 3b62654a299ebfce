//! Lightweight confirmation notices with an optional undo payload.
//!
//! At most one notice is visible. Showing a new one replaces the old one,
//! and each expires a fixed interval after it was shown. Times are passed in
//! so callers (and tests on a paused clock) control expiry.

use shared_types::{DocRange, Suggestion};
use std::time::Duration;
use tokio::time::Instant;

use crate::document::DocChange;
use crate::offsets::{rebase_enclosing, rebase_range};

/// Enough to reverse one applied edit
#[derive(Debug, Clone, PartialEq)]
pub struct UndoAction {
    /// Where the inserted text now sits
    pub range: DocRange,
    /// Text the edit replaced
    pub previous_text: String,
    /// The applied suggestion, restored to the collection on undo
    pub suggestion: Option<Suggestion>,
    /// Its former position in the collection
    pub position: usize,
}

impl UndoAction {
    /// Follow an edit made after the apply. Returns `false` when the edit
    /// touched the applied text, which can then no longer be reverted.
    pub fn rebase(&mut self, change: &DocChange) -> bool {
        let Some(range) = rebase_range(self.range, change) else {
            return false;
        };
        self.range = range;
        if let Some(suggestion) = self.suggestion.as_mut() {
            suggestion.target_range = suggestion
                .target_range
                .and_then(|target| rebase_enclosing(target, change));
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
    pub undo: Option<UndoAction>,
    pub shown_at: Instant,
    pub expires_at: Instant,
}

impl Notice {
    pub fn has_undo(&self) -> bool {
        self.undo.is_some()
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
pub struct NoticeCenter {
    ttl: Duration,
    current: Option<Notice>,
    next_id: u64,
}

impl NoticeCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            current: None,
            next_id: 1,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn show(
        &mut self,
        message: impl Into<String>,
        undo: Option<UndoAction>,
        now: Instant,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let message = message.into();
        if let Some(previous) = self.current.as_ref() {
            tracing::debug!(replaced = previous.id, id, "Notice replaced");
        }
        self.current = Some(Notice {
            id,
            message,
            undo,
            shown_at: now,
            expires_at: now + self.ttl,
        });
        id
    }

    pub fn visible(&self, now: Instant) -> Option<&Notice> {
        self.current.as_ref().filter(|notice| notice.is_live(now))
    }

    /// Drop the notice once its interval has passed. Returns whether one was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.current.as_ref() {
            Some(notice) if !notice.is_live(now) => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn dismiss(&mut self) -> Option<Notice> {
        self.current.take()
    }

    /// Keep a pending undo aligned with the document. An edit over the applied
    /// text drops the undo; the notice itself stays up.
    pub fn rebase_undo(&mut self, change: &DocChange) {
        let Some(notice) = self.current.as_mut() else {
            return;
        };
        let Some(undo) = notice.undo.as_mut() else {
            return;
        };
        if !undo.rebase(change) {
            tracing::debug!(
                notice_id = notice.id,
                from = change.replaced.from,
                to = change.replaced.to,
                "Edit overlaps applied text; undo dropped"
            );
            notice.undo = None;
        }
    }

    /// Consume the undo payload of the visible notice. The notice goes with it.
    pub fn take_undo(&mut self, now: Instant) -> Option<UndoAction> {
        self.expire(now);
        let undo = self.current.as_mut()?.undo.take()?;
        self.current = None;
        Some(undo)
    }
}
