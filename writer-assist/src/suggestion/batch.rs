//! "Apply all" over a group of suggestions.
//!
//! Steps run strictly in sequence: each apply, document mutation included,
//! completes before its progress report and before the next step begins. A
//! rejected step is skipped and left in the collection.

use serde_json::json;
use shared_types::{ActionKind, BatchProgress, SuggestionId, EVENT_BATCH_APPLY};
use tracing::{info, warn};

use super::controller::{AppliedEdit, SuggestionController};
use super::SuggestionError;
use crate::document::HostDocument;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: Vec<AppliedEdit>,
    pub skipped: Vec<(SuggestionId, SuggestionError)>,
    pub total: usize,
}

impl BatchReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl SuggestionController {
    /// Apply `ids` in order, reporting `{current, total}` after every step and
    /// pausing for the configured step delay between steps.
    pub async fn apply_all<F>(
        &self,
        ids: &[SuggestionId],
        doc: &mut dyn HostDocument,
        mut on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(BatchProgress),
    {
        let total = ids.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        for (index, id) in ids.iter().enumerate() {
            match self.apply(id, doc) {
                Ok(applied) => report.applied.push(applied),
                Err(e) => {
                    warn!(suggestion_id = %id, error = %e, "Batch step skipped");
                    report.skipped.push((id.clone(), e));
                }
            }
            on_progress(BatchProgress {
                current: index + 1,
                total,
            });

            if index + 1 < total && !self.batch_step_delay.is_zero() {
                tokio::time::sleep(self.batch_step_delay).await;
            }
        }

        if total > 0 {
            self.show_notice(format!(
                "Applied {} of {} suggestions",
                report.applied.len(),
                total
            ));
        }
        self.emit_batch(&report);
        info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            total,
            "Batch apply finished"
        );
        report
    }

    /// Apply every suggestion of one action group, in collection order.
    pub async fn apply_group<F>(
        &self,
        kind: ActionKind,
        doc: &mut dyn HostDocument,
        on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(BatchProgress),
    {
        let ids = self.with_board(|board| board.ids_by_action(kind));
        self.apply_all(&ids, doc, on_progress).await
    }

    fn emit_batch(&self, report: &BatchReport) {
        let skipped: Vec<&str> = report.skipped.iter().map(|(id, _)| id.as_str()).collect();
        self.emit(
            EVENT_BATCH_APPLY,
            None,
            json!({
                "total": report.total,
                "applied": report.applied.len(),
                "skipped": skipped,
            }),
        );
    }
}
