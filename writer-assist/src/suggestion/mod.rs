//! Suggestion lifecycle.
//!
//! [`SuggestionBoard`] is the synchronous state machine over the active
//! collection: `idle -> generating -> {ready, error}`, `ready -> generating`
//! on regenerate, and removal on apply or dismiss. Each suggestion carries a
//! monotonically increasing request token; a generation result is accepted
//! only when its ticket still holds the latest token when it resolves.
//!
//! [`SuggestionController`] drives the board against the async generator, the
//! host document and the notice/telemetry collaborators.

pub mod batch;
pub mod controller;
pub mod generator;

pub use batch::BatchReport;
pub use controller::{AppliedEdit, DismissListener, SuggestionController};
pub use generator::{FallbackGenerator, GenerationError, GenerationRequest, SuggestionGenerator};

use shared_types::{
    ActionKind, DiffPart, DocRange, GenerationStatus, Suggestion, SuggestionId, SuggestionVersion,
    VersionSource,
};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::AssistConfig;
use crate::diff::diff_or_fallback;
use crate::document::DocChange;
use crate::offsets::{plan_token_edit, rebase_range, TokenEdit};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SuggestionError {
    #[error("suggestion {0} not found")]
    NotFound(SuggestionId),
    #[error("suggestion {id} is not ready (status {status:?})")]
    NotReady {
        id: SuggestionId,
        status: GenerationStatus,
    },
    #[error("generation already in flight for suggestion {0}")]
    GenerationInFlight(SuggestionId),
    #[error("suggestion {0} has no target range")]
    NoTargetRange(SuggestionId),
    #[error("diff part {index} of suggestion {id} has nothing to apply")]
    NothingToApply { id: SuggestionId, index: usize },
    #[error("document rejected the edit for suggestion {0}")]
    ApplyRejected(SuggestionId),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("document rejected the undo")]
    UndoRejected,
}

/// How a generation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateMode {
    /// Rejected while another generation is in flight
    Request,
    /// Supersedes any in-flight generation
    Regenerate,
}

/// Captured at request time, handed back when the result arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub suggestion_id: SuggestionId,
    pub token: u64,
    pub mode: GenerateMode,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub source: VersionSource,
}

impl GeneratedText {
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: VersionSource::Model,
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: VersionSource::Fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Ready {
        source: VersionSource,
        version_count: usize,
    },
    Failed {
        error: GenerationError,
    },
    /// A newer request was issued; this result was discarded
    Stale { token: u64, latest: u64 },
    /// The suggestion left the collection before the result arrived
    Dismissed,
}

/// What a full apply will write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPlan {
    pub suggestion_id: SuggestionId,
    pub target_range: Option<DocRange>,
    pub text: String,
    pub version_index: usize,
    pub source: VersionSource,
}

#[derive(Debug)]
struct Entry {
    suggestion: Suggestion,
    selected: usize,
    latest_token: u64,
    in_flight: Option<u64>,
}

#[derive(Debug)]
pub struct SuggestionBoard {
    doc_id: String,
    version_limit: usize,
    max_diff_cells: usize,
    entries: Vec<Entry>,
    /// Last token issued to each removed suggestion
    retired_tokens: HashMap<SuggestionId, u64>,
}

impl SuggestionBoard {
    pub fn new(doc_id: impl Into<String>, version_limit: usize, max_diff_cells: usize) -> Self {
        Self {
            doc_id: doc_id.into(),
            version_limit: version_limit.max(1),
            max_diff_cells,
            entries: Vec::new(),
            retired_tokens: HashMap::new(),
        }
    }

    pub fn from_config(doc_id: impl Into<String>, config: &AssistConfig) -> Self {
        Self::new(doc_id, config.version_limit, config.max_diff_cells)
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add to the end of the collection, replacing any entry with the same id.
    pub fn insert(&mut self, suggestion: Suggestion) {
        let position = self.position(&suggestion.id).unwrap_or(self.entries.len());
        self.insert_at(position, suggestion);
    }

    /// Tokens keep counting across replacement and removal, so a ticket
    /// issued for an earlier incarnation of the id can never match again.
    pub(crate) fn insert_at(&mut self, position: usize, mut suggestion: Suggestion) {
        suggestion.versions.truncate(self.version_limit);

        let existing = self.position(&suggestion.id);
        let previous = match existing {
            Some(index) => Some(self.entries[index].latest_token),
            None => self.retired_tokens.remove(&suggestion.id),
        };
        let entry = Entry {
            suggestion,
            selected: 0,
            latest_token: previous.map_or(0, |token| token + 1),
            in_flight: None,
        };
        match existing {
            Some(index) => self.entries[index] = entry,
            None => {
                let position = position.min(self.entries.len());
                self.entries.insert(position, entry);
            }
        }
    }

    /// Latest token issued for `id`, including removed suggestions.
    pub fn latest_token(&self, id: &SuggestionId) -> Option<u64> {
        self.entry(id)
            .ok()
            .map(|entry| entry.latest_token)
            .or_else(|| self.retired_tokens.get(id).copied())
    }

    pub fn contains(&self, id: &SuggestionId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &SuggestionId) -> Option<&Suggestion> {
        self.entry(id).ok().map(|entry| &entry.suggestion)
    }

    pub fn ids(&self) -> Vec<SuggestionId> {
        self.entries
            .iter()
            .map(|entry| entry.suggestion.id.clone())
            .collect()
    }

    pub fn suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.entries.iter().map(|entry| &entry.suggestion)
    }

    /// Ids of one action group in collection order
    pub fn ids_by_action(&self, kind: ActionKind) -> Vec<SuggestionId> {
        self.suggestions()
            .filter(|s| s.action_kind == kind)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Highest impact first; ties keep collection order.
    pub fn sorted_by_impact(&self) -> Vec<&Suggestion> {
        let mut sorted: Vec<&Suggestion> = self.suggestions().collect();
        sorted.sort_by(|a, b| b.estimated_impact.cmp(&a.estimated_impact));
        sorted
    }

    pub fn status(&self, id: &SuggestionId) -> Option<GenerationStatus> {
        self.get(id).map(|s| s.generation_status)
    }

    pub fn is_generating(&self, id: &SuggestionId) -> bool {
        self.entry(id)
            .map(|entry| entry.in_flight.is_some())
            .unwrap_or(false)
    }

    pub fn begin_generation(
        &mut self,
        id: &SuggestionId,
        mode: GenerateMode,
        tone_hint: Option<String>,
    ) -> Result<GenerationTicket, SuggestionError> {
        let entry = self.entry_mut(id)?;
        if mode == GenerateMode::Request && entry.in_flight.is_some() {
            debug!(suggestion_id = %id, "Generation request ignored; one is already in flight");
            return Err(SuggestionError::GenerationInFlight(id.clone()));
        }
        if let Some(previous) = entry.in_flight {
            debug!(
                suggestion_id = %id,
                superseded = previous,
                "Regenerate supersedes in-flight request"
            );
        }

        entry.latest_token += 1;
        entry.in_flight = Some(entry.latest_token);
        entry.suggestion.generation_status = GenerationStatus::Generating;

        let request = GenerationRequest::new(
            entry.suggestion.original_text.clone(),
            entry.suggestion.action_kind,
        )
        .with_tone(tone_hint);

        debug!(suggestion_id = %id, token = entry.latest_token, ?mode, "Generation started");
        Ok(GenerationTicket {
            suggestion_id: id.clone(),
            token: entry.latest_token,
            mode,
            request,
        })
    }

    pub fn finish_generation(
        &mut self,
        ticket: &GenerationTicket,
        result: Result<GeneratedText, GenerationError>,
    ) -> GenerationOutcome {
        let version_limit = self.version_limit;
        let Ok(entry) = self.entry_mut(&ticket.suggestion_id) else {
            debug!(
                suggestion_id = %ticket.suggestion_id,
                "Generation result for departed suggestion dropped"
            );
            return GenerationOutcome::Dismissed;
        };

        if ticket.token != entry.latest_token {
            debug!(
                suggestion_id = %ticket.suggestion_id,
                token = ticket.token,
                latest = entry.latest_token,
                "Stale generation result discarded"
            );
            return GenerationOutcome::Stale {
                token: ticket.token,
                latest: entry.latest_token,
            };
        }
        entry.in_flight = None;

        let result = result.and_then(|generated| {
            if generated.text.trim().is_empty() {
                Err(GenerationError::EmptyResponse)
            } else {
                Ok(generated)
            }
        });

        match result {
            Ok(generated) => {
                let suggestion = &mut entry.suggestion;
                suggestion
                    .versions
                    .insert(0, SuggestionVersion::new(generated.text, generated.source));
                suggestion.versions.truncate(version_limit);
                suggestion.generation_status = GenerationStatus::Ready;
                suggestion.last_error = None;
                entry.selected = 0;
                debug!(
                    suggestion_id = %ticket.suggestion_id,
                    token = ticket.token,
                    versions = suggestion.versions.len(),
                    "Generation ready"
                );
                GenerationOutcome::Ready {
                    source: generated.source,
                    version_count: suggestion.versions.len(),
                }
            }
            Err(error) => {
                warn!(suggestion_id = %ticket.suggestion_id, error = %error, "Generation failed");
                entry.suggestion.generation_status = GenerationStatus::Error;
                entry.suggestion.last_error = Some(error.to_string());
                GenerationOutcome::Failed { error }
            }
        }
    }

    /// Select a version, clamped to the history. Index 0 is the newest.
    pub fn select_version(
        &mut self,
        id: &SuggestionId,
        index: usize,
    ) -> Result<usize, SuggestionError> {
        let entry = self.entry_mut(id)?;
        let last = entry.suggestion.versions.len().saturating_sub(1);
        entry.selected = index.min(last);
        Ok(entry.selected)
    }

    /// Move one step through history without wrapping.
    pub fn step_version(
        &mut self,
        id: &SuggestionId,
        older: bool,
    ) -> Result<usize, SuggestionError> {
        let current = self.entry(id)?.selected;
        let target = if older {
            current.saturating_add(1)
        } else {
            current.saturating_sub(1)
        };
        self.select_version(id, target)
    }

    pub fn selected_index(&self, id: &SuggestionId) -> Option<usize> {
        self.entry(id).ok().map(|entry| entry.selected)
    }

    pub fn selected_version(&self, id: &SuggestionId) -> Option<&SuggestionVersion> {
        let entry = self.entry(id).ok()?;
        entry.suggestion.versions.get(entry.selected)
    }

    /// Diff of the original text against the selected version.
    pub fn diff(&self, id: &SuggestionId) -> Option<Vec<DiffPart>> {
        let suggestion = self.get(id)?;
        let version = self.selected_version(id)?;
        Some(diff_or_fallback(
            &suggestion.original_text,
            &version.text,
            self.max_diff_cells,
        ))
    }

    pub fn plan_apply(&self, id: &SuggestionId) -> Result<ApplyPlan, SuggestionError> {
        let entry = self.ready_entry(id)?;
        let version = entry
            .suggestion
            .versions
            .get(entry.selected)
            .ok_or_else(|| SuggestionError::NotReady {
                id: id.clone(),
                status: entry.suggestion.generation_status,
            })?;
        Ok(ApplyPlan {
            suggestion_id: id.clone(),
            target_range: entry.suggestion.target_range,
            text: version.text.clone(),
            version_index: entry.selected,
            source: version.source,
        })
    }

    /// Plan the narrow edit for clicking one diff part of the selected version.
    pub fn plan_token_apply(
        &self,
        id: &SuggestionId,
        part_index: usize,
    ) -> Result<TokenEdit, SuggestionError> {
        let plan = self.plan_apply(id)?;
        let Some(target) = plan.target_range else {
            return Err(SuggestionError::NoTargetRange(id.clone()));
        };
        let original = &self.entry(id)?.suggestion.original_text;
        let parts = diff_or_fallback(original, &plan.text, self.max_diff_cells);
        plan_token_edit(original, target, &plan.text, &parts, part_index).ok_or(
            SuggestionError::NothingToApply {
                id: id.clone(),
                index: part_index,
            },
        )
    }

    /// Take a suggestion out of the collection, returning its former position.
    pub fn remove(&mut self, id: &SuggestionId) -> Option<(usize, Suggestion)> {
        let position = self.position(id)?;
        let entry = self.entries.remove(position);
        self.retired_tokens.insert(id.clone(), entry.latest_token);
        Some((position, entry.suggestion))
    }

    /// Keep target ranges aligned with the document after an edit.
    pub fn rebase(&mut self, change: &DocChange) {
        for entry in self.entries.iter_mut() {
            let Some(range) = entry.suggestion.target_range else {
                continue;
            };
            let rebased = rebase_range(range, change);
            if rebased.is_none() {
                debug!(
                    suggestion_id = %entry.suggestion.id,
                    from = range.from,
                    to = range.to,
                    "Target range overlapped by edit; falling back to caller insertion"
                );
            }
            entry.suggestion.target_range = rebased;
        }
    }

    fn position(&self, id: &SuggestionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| &entry.suggestion.id == id)
    }

    fn entry(&self, id: &SuggestionId) -> Result<&Entry, SuggestionError> {
        self.entries
            .iter()
            .find(|entry| &entry.suggestion.id == id)
            .ok_or_else(|| SuggestionError::NotFound(id.clone()))
    }

    fn entry_mut(&mut self, id: &SuggestionId) -> Result<&mut Entry, SuggestionError> {
        self.entries
            .iter_mut()
            .find(|entry| &entry.suggestion.id == id)
            .ok_or_else(|| SuggestionError::NotFound(id.clone()))
    }

    fn ready_entry(&self, id: &SuggestionId) -> Result<&Entry, SuggestionError> {
        let entry = self.entry(id)?;
        if entry.suggestion.generation_status != GenerationStatus::Ready {
            return Err(SuggestionError::NotReady {
                id: id.clone(),
                status: entry.suggestion.generation_status,
            });
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Impact;

    fn board_with(suggestion: Suggestion) -> (SuggestionBoard, SuggestionId) {
        let id = suggestion.id.clone();
        let mut board = SuggestionBoard::new("doc-1", 5, 10_000);
        board.insert(suggestion);
        (board, id)
    }

    fn tighten() -> Suggestion {
        Suggestion::new("Tighten", "Trim filler", ActionKind::Tighten, "has significantly")
            .with_id("s-1")
            .with_target_range(DocRange::new(12, 29))
    }

    fn generate(board: &mut SuggestionBoard, id: &SuggestionId, text: &str) -> GenerationOutcome {
        let ticket = board
            .begin_generation(id, GenerateMode::Regenerate, None)
            .unwrap();
        board.finish_generation(&ticket, Ok(GeneratedText::model(text)))
    }

    #[test]
    fn test_generation_moves_to_ready() {
        let (mut board, id) = board_with(tighten());
        assert_eq!(board.status(&id), Some(GenerationStatus::Idle));

        let ticket = board.begin_generation(&id, GenerateMode::Request, None).unwrap();
        assert_eq!(board.status(&id), Some(GenerationStatus::Generating));
        assert_eq!(ticket.request.original_text, "has significantly");

        let outcome = board.finish_generation(&ticket, Ok(GeneratedText::model("has had impact")));
        assert_eq!(
            outcome,
            GenerationOutcome::Ready {
                source: VersionSource::Model,
                version_count: 1
            }
        );
        assert_eq!(board.status(&id), Some(GenerationStatus::Ready));
        assert!(!board.is_generating(&id));
    }

    #[test]
    fn test_version_history_is_capped_newest_first() {
        let (mut board, id) = board_with(tighten());
        for n in 1..=6 {
            generate(&mut board, &id, &format!("version {n}"));
        }
        let texts: Vec<&str> = board
            .get(&id)
            .unwrap()
            .versions
            .iter()
            .map(|v| v.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec!["version 6", "version 5", "version 4", "version 3", "version 2"]
        );
    }

    #[test]
    fn test_request_rejected_while_in_flight() {
        let (mut board, id) = board_with(tighten());
        board.begin_generation(&id, GenerateMode::Request, None).unwrap();
        assert_eq!(
            board.begin_generation(&id, GenerateMode::Request, None),
            Err(SuggestionError::GenerationInFlight(id.clone()))
        );
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let (mut board, id) = board_with(tighten());
        let r1 = board.begin_generation(&id, GenerateMode::Request, None).unwrap();
        let r2 = board.begin_generation(&id, GenerateMode::Regenerate, None).unwrap();

        board.finish_generation(&r2, Ok(GeneratedText::model("from r2")));
        let late = board.finish_generation(&r1, Ok(GeneratedText::model("from r1")));

        assert_eq!(
            late,
            GenerationOutcome::Stale {
                token: 1,
                latest: 2
            }
        );
        let versions = &board.get(&id).unwrap().versions;
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].text, "from r2");
    }

    #[test]
    fn test_tokens_survive_removal_and_replacement() {
        let (mut board, id) = board_with(tighten());
        let early = board.begin_generation(&id, GenerateMode::Request, None).unwrap();
        assert_eq!(early.token, 1);

        let (position, suggestion) = board.remove(&id).unwrap();
        assert_eq!(board.latest_token(&id), Some(1));
        board.insert_at(position, suggestion);
        let next = board.begin_generation(&id, GenerateMode::Request, None).unwrap();
        assert_eq!(next.token, 3);
        assert_eq!(
            board.finish_generation(&early, Ok(GeneratedText::model("old"))),
            GenerationOutcome::Stale {
                token: 1,
                latest: 3
            }
        );

        // Replacing the record in place never lowers the counter.
        board.insert(tighten());
        assert_eq!(board.latest_token(&id), Some(4));
        assert!(matches!(
            board.finish_generation(&next, Ok(GeneratedText::model("older"))),
            GenerationOutcome::Stale {
                token: 3,
                latest: 4
            }
        ));
        assert!(board.get(&id).unwrap().versions.is_empty());
    }

    #[test]
    fn test_failure_keeps_history() {
        let (mut board, id) = board_with(tighten());
        generate(&mut board, &id, "kept version");

        let ticket = board.begin_generation(&id, GenerateMode::Regenerate, None).unwrap();
        let outcome = board.finish_generation(&ticket, Err(GenerationError::Status(503)));

        assert!(matches!(outcome, GenerationOutcome::Failed { .. }));
        let suggestion = board.get(&id).unwrap();
        assert_eq!(suggestion.generation_status, GenerationStatus::Error);
        assert_eq!(suggestion.versions[0].text, "kept version");
        assert!(suggestion.last_error.as_deref().unwrap().contains("503"));
    }

    #[test]
    fn test_whitespace_response_is_a_failure() {
        let (mut board, id) = board_with(tighten());
        let ticket = board.begin_generation(&id, GenerateMode::Request, None).unwrap();
        let outcome = board.finish_generation(&ticket, Ok(GeneratedText::model("  \n")));
        assert_eq!(
            outcome,
            GenerationOutcome::Failed {
                error: GenerationError::EmptyResponse
            }
        );
    }

    #[test]
    fn test_result_after_removal_is_dropped() {
        let (mut board, id) = board_with(tighten());
        let ticket = board.begin_generation(&id, GenerateMode::Request, None).unwrap();
        board.remove(&id);
        assert_eq!(
            board.finish_generation(&ticket, Ok(GeneratedText::model("late"))),
            GenerationOutcome::Dismissed
        );
    }

    #[test]
    fn test_version_navigation_clamps() {
        let (mut board, id) = board_with(tighten());
        for n in 1..=3 {
            generate(&mut board, &id, &format!("v{n}"));
        }
        assert_eq!(board.select_version(&id, 10), Ok(2));
        assert_eq!(board.selected_version(&id).unwrap().text, "v1");
        assert_eq!(board.step_version(&id, true), Ok(2));
        assert_eq!(board.step_version(&id, false), Ok(1));
        assert_eq!(board.step_version(&id, false), Ok(0));
        assert_eq!(board.step_version(&id, false), Ok(0));
    }

    #[test]
    fn test_apply_requires_ready() {
        let (mut board, id) = board_with(tighten());
        assert!(matches!(
            board.plan_apply(&id),
            Err(SuggestionError::NotReady { .. })
        ));
        generate(&mut board, &id, "has had a significant impact");
        let plan = board.plan_apply(&id).unwrap();
        assert_eq!(plan.text, "has had a significant impact");
        assert_eq!(plan.target_range, Some(DocRange::new(12, 29)));
    }

    #[test]
    fn test_token_plan_narrows_range() {
        let (mut board, id) = board_with(tighten());
        generate(&mut board, &id, "has had a significant impact");
        let edit = board.plan_token_apply(&id, 2).unwrap();
        assert_eq!(edit.range, DocRange::new(16, 29));
        assert_eq!(
            board.plan_token_apply(&id, 0),
            Err(SuggestionError::NothingToApply {
                id: id.clone(),
                index: 0
            })
        );
    }

    #[test]
    fn test_rebase_shifts_and_drops_ranges() {
        let mut board = SuggestionBoard::new("doc-1", 5, 10_000);
        board.insert(tighten());
        board.insert(
            Suggestion::new("Cite", "Add source", ActionKind::Cite, "claim")
                .with_id("s-2")
                .with_target_range(DocRange::new(40, 45)),
        );

        board.rebase(&DocChange {
            replaced: DocRange::new(20, 30),
            inserted_len: 4,
        });

        assert_eq!(board.get(&"s-1".into()).unwrap().target_range, None);
        assert_eq!(
            board.get(&"s-2".into()).unwrap().target_range,
            Some(DocRange::new(34, 39))
        );
    }

    #[test]
    fn test_grouping_and_impact_order() {
        let mut board = SuggestionBoard::new("doc-1", 5, 10_000);
        board.insert(tighten().with_impact(Impact::Low));
        board.insert(
            Suggestion::new("Cite", "", ActionKind::Cite, "a")
                .with_id("s-2")
                .with_impact(Impact::High),
        );
        board.insert(
            Suggestion::new("Tighten", "", ActionKind::Tighten, "b")
                .with_id("s-3")
                .with_impact(Impact::Medium),
        );

        assert_eq!(
            board.ids_by_action(ActionKind::Tighten),
            vec![SuggestionId::from("s-1"), SuggestionId::from("s-3")]
        );
        let order: Vec<&str> = board
            .sorted_by_impact()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(order, vec!["s-2", "s-3", "s-1"]);
    }
}
