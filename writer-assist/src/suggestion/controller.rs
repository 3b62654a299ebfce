//! Drives the suggestion board against its collaborators: the generator, the
//! host document, the notice center and telemetry.
//!
//! No lock is held across a generation await, so a dismiss or a newer
//! regenerate can land while a request is outstanding.

use serde_json::json;
use shared_types::{
    DocRange, Suggestion, SuggestionId, TelemetryEvent, EVENT_SUGGESTION_APPLY,
    EVENT_SUGGESTION_APPLY_TOKEN, EVENT_SUGGESTION_GENERATE, EVENT_SUGGESTION_IGNORE,
    EVENT_SUGGESTION_REGENERATE, EVENT_SUGGESTION_UNDO,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::generator::{FallbackGenerator, GenerationError, SuggestionGenerator};
use super::{
    GenerateMode, GeneratedText, GenerationOutcome, SuggestionBoard, SuggestionError,
};
use crate::config::AssistConfig;
use crate::document::{DocChange, HostDocument};
use crate::notice::{Notice, NoticeCenter, UndoAction};
use crate::offsets::{rebase_enclosing, replace_range};
use crate::telemetry::{NoopTelemetry, TelemetrySink};

/// Receives "do not show again" notifications
pub trait DismissListener: Send + Sync {
    fn suggestion_dismissed(&self, doc_id: &str, suggestion: &Suggestion);
}

/// Result of a successful apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    pub suggestion_id: SuggestionId,
    pub change: DocChange,
    /// Where the inserted text now sits
    pub inserted: DocRange,
    pub partial: bool,
}

pub struct SuggestionController {
    doc_id: String,
    board: Mutex<SuggestionBoard>,
    generator: Arc<dyn SuggestionGenerator>,
    fallback: Option<Arc<dyn SuggestionGenerator>>,
    telemetry: Arc<dyn TelemetrySink>,
    notices: Mutex<NoticeCenter>,
    dismiss_listener: Option<Arc<dyn DismissListener>>,
    pub(crate) batch_step_delay: Duration,
}

impl std::fmt::Debug for SuggestionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionController")
            .field("doc_id", &self.doc_id)
            .field("suggestions", &self.board().len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl SuggestionController {
    pub fn new(
        doc_id: impl Into<String>,
        config: &AssistConfig,
        generator: Arc<dyn SuggestionGenerator>,
    ) -> Self {
        let doc_id = doc_id.into();
        let fallback: Option<Arc<dyn SuggestionGenerator>> = if config.fallback_enabled {
            Some(Arc::new(FallbackGenerator))
        } else {
            None
        };
        Self {
            board: Mutex::new(SuggestionBoard::from_config(doc_id.clone(), config)),
            doc_id,
            generator,
            fallback,
            telemetry: Arc::new(NoopTelemetry),
            notices: Mutex::new(NoticeCenter::new(config.notice_ttl())),
            dismiss_listener: None,
            batch_step_delay: config.batch_step_delay(),
        }
    }

    pub fn with_fallback(mut self, fallback: Option<Arc<dyn SuggestionGenerator>>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_dismiss_listener(mut self, listener: Arc<dyn DismissListener>) -> Self {
        self.dismiss_listener = Some(listener);
        self
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    fn board(&self) -> MutexGuard<'_, SuggestionBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notices(&self) -> MutexGuard<'_, NoticeCenter> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read access to the collection.
    pub fn with_board<R>(&self, f: impl FnOnce(&SuggestionBoard) -> R) -> R {
        f(&self.board())
    }

    /// Version navigation and other direct board edits.
    pub fn with_board_mut<R>(&self, f: impl FnOnce(&mut SuggestionBoard) -> R) -> R {
        f(&mut self.board())
    }

    pub fn add(&self, suggestion: Suggestion) {
        self.board().insert(suggestion);
    }

    pub fn get(&self, id: &SuggestionId) -> Option<Suggestion> {
        self.board().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<SuggestionId> {
        self.board().ids()
    }

    pub fn len(&self) -> usize {
        self.board().len()
    }

    pub fn is_empty(&self) -> bool {
        self.board().is_empty()
    }

    pub(crate) fn emit(&self, name: &str, id: Option<&SuggestionId>, payload: serde_json::Value) {
        let mut event = TelemetryEvent::new(name, self.doc_id.clone()).with_payload(payload);
        if let Some(id) = id {
            event = event.for_suggestion(id);
        }
        self.telemetry.emit(event);
    }

    /// Generate (or regenerate) a version. The primary generator's failure is
    /// replaced by the local fallback when one is configured.
    pub async fn generate(
        &self,
        id: &SuggestionId,
        mode: GenerateMode,
        tone_hint: Option<String>,
    ) -> Result<GenerationOutcome, SuggestionError> {
        let ticket = self.board().begin_generation(id, mode, tone_hint)?;
        let event = match mode {
            GenerateMode::Request => EVENT_SUGGESTION_GENERATE,
            GenerateMode::Regenerate => EVENT_SUGGESTION_REGENERATE,
        };
        self.emit(
            event,
            Some(id),
            json!({ "token": ticket.token, "action": ticket.request.action_kind.as_str() }),
        );

        let primary = match self.generator.generate(&ticket.request).await {
            Ok(text) if text.trim().is_empty() => Err(GenerationError::EmptyResponse),
            Ok(text) => Ok(GeneratedText::model(text)),
            Err(e) => Err(e),
        };

        let result = match (primary, self.fallback.as_ref()) {
            (Err(error), Some(fallback)) => {
                warn!(
                    suggestion_id = %id,
                    error = %error,
                    "Generation failed; using local fallback"
                );
                match fallback.generate(&ticket.request).await {
                    Ok(text) => Ok(GeneratedText::fallback(text)),
                    Err(fallback_error) => {
                        warn!(
                            suggestion_id = %id,
                            error = %fallback_error,
                            "Fallback generation failed"
                        );
                        Err(error)
                    }
                }
            }
            (result, _) => result,
        };

        Ok(self.board().finish_generation(&ticket, result))
    }

    /// Apply the selected version over its target range. A suggestion without
    /// one (never anchored, or overlapped by a later edit) is left alone with
    /// `NoTargetRange`; [`apply_with`](Self::apply_with) places such text.
    pub fn apply(
        &self,
        id: &SuggestionId,
        doc: &mut dyn HostDocument,
    ) -> Result<AppliedEdit, SuggestionError> {
        let plan = self.board().plan_apply(id)?;
        let Some(range) = plan.target_range else {
            return Err(SuggestionError::NoTargetRange(id.clone()));
        };
        let previous_text = doc.text_between(range).unwrap_or_default();
        let Some(change) = replace_range(doc, range, &plan.text) else {
            return Err(SuggestionError::ApplyRejected(id.clone()));
        };
        Ok(self.finish_apply(id, change, previous_text, false, plan.version_index))
    }

    /// Apply with caller-supplied insertion semantics. The callback performs the
    /// edit and reports it, or returns `None` to reject.
    pub fn apply_with<F>(
        &self,
        id: &SuggestionId,
        doc: &mut dyn HostDocument,
        insert: F,
    ) -> Result<AppliedEdit, SuggestionError>
    where
        F: FnOnce(&mut dyn HostDocument, &str) -> Option<DocChange>,
    {
        let plan = self.board().plan_apply(id)?;
        let before = doc.text_between(DocRange::new(0, doc.len())).unwrap_or_default();
        let Some(change) = insert(doc, &plan.text) else {
            return Err(SuggestionError::ApplyRejected(id.clone()));
        };
        let previous_text = before
            .chars()
            .skip(change.replaced.from)
            .take(change.replaced.len())
            .collect();
        Ok(self.finish_apply(id, change, previous_text, false, plan.version_index))
    }

    /// Apply only the hunk of one clicked diff part.
    pub fn apply_token(
        &self,
        id: &SuggestionId,
        part_index: usize,
        doc: &mut dyn HostDocument,
    ) -> Result<AppliedEdit, SuggestionError> {
        let (edit, version_index) = {
            let board = self.board();
            let edit = board.plan_token_apply(id, part_index)?;
            (edit, board.selected_index(id).unwrap_or(0))
        };
        let previous_text = doc.text_between(edit.range).unwrap_or_default();
        let Some(change) = replace_range(doc, edit.range, &edit.text) else {
            return Err(SuggestionError::ApplyRejected(id.clone()));
        };
        Ok(self.finish_apply(id, change, previous_text, true, version_index))
    }

    fn finish_apply(
        &self,
        id: &SuggestionId,
        change: DocChange,
        previous_text: String,
        partial: bool,
        version_index: usize,
    ) -> AppliedEdit {
        let inserted = DocRange::new(
            change.replaced.from,
            change.replaced.from + change.inserted_len,
        );
        let removed = {
            let mut board = self.board();
            let removed = board.remove(id);
            board.rebase(&change);
            removed
        };

        // The stored target follows the edit so later rebases and the undo
        // itself can map it back.
        let undo = removed.map(|(position, mut suggestion)| {
            suggestion.target_range = suggestion
                .target_range
                .and_then(|target| rebase_enclosing(target, &change));
            UndoAction {
                range: inserted,
                previous_text,
                suggestion: Some(suggestion),
                position,
            }
        });
        self.notices()
            .show("Suggestion applied", undo, Instant::now());

        let event = if partial {
            EVENT_SUGGESTION_APPLY_TOKEN
        } else {
            EVENT_SUGGESTION_APPLY
        };
        self.emit(
            event,
            Some(id),
            json!({
                "partial": partial,
                "version_index": version_index,
                "from": change.replaced.from,
                "to": change.replaced.to,
                "inserted_len": change.inserted_len,
            }),
        );
        info!(suggestion_id = %id, partial, from = change.replaced.from, "Suggestion applied");

        AppliedEdit {
            suggestion_id: id.clone(),
            change,
            inserted,
            partial,
        }
    }

    /// Reverse the most recent apply while its notice is still visible. The
    /// suggestion returns to its former position with its history intact.
    pub fn undo_last(
        &self,
        doc: &mut dyn HostDocument,
    ) -> Result<Option<SuggestionId>, SuggestionError> {
        let undo = self
            .notices()
            .take_undo(Instant::now())
            .ok_or(SuggestionError::NothingToUndo)?;
        let Some(change) = replace_range(doc, undo.range, &undo.previous_text) else {
            return Err(SuggestionError::UndoRejected);
        };
        let id = {
            let mut board = self.board();
            board.rebase(&change);
            undo.suggestion.map(|mut suggestion| {
                suggestion.target_range = suggestion
                    .target_range
                    .and_then(|target| rebase_enclosing(target, &change));
                let id = suggestion.id.clone();
                board.insert_at(undo.position, suggestion);
                id
            })
        };

        self.emit(EVENT_SUGGESTION_UNDO, id.as_ref(), serde_json::Value::Null);
        info!(suggestion_id = ?id.as_ref().map(|id| id.as_str()), "Apply undone");
        Ok(id)
    }

    /// Remove from the collection from any state. Any in-flight generation is
    /// dropped when it resolves.
    pub fn dismiss(&self, id: &SuggestionId) -> Result<Suggestion, SuggestionError> {
        let (_, suggestion) = self
            .board()
            .remove(id)
            .ok_or_else(|| SuggestionError::NotFound(id.clone()))?;
        if let Some(listener) = self.dismiss_listener.as_ref() {
            listener.suggestion_dismissed(&self.doc_id, &suggestion);
        }
        self.emit(
            EVENT_SUGGESTION_IGNORE,
            Some(id),
            json!({ "action": suggestion.action_kind.as_str() }),
        );
        info!(suggestion_id = %id, "Suggestion dismissed");
        Ok(suggestion)
    }

    /// Host change hook for edits made outside this controller. Target ranges
    /// and any pending undo follow the edit.
    pub fn document_changed(&self, change: &DocChange) {
        self.board().rebase(change);
        self.notices().rebase_undo(change);
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notices().visible(Instant::now()).cloned()
    }

    pub fn show_notice(&self, message: impl Into<String>) {
        self.notices().show(message, None, Instant::now());
    }

    pub fn dismiss_notice(&self) {
        self.notices().dismiss();
    }
}
