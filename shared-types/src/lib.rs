//! Shared types between the assist core and the writing surface
//!
//! These types are used by both:
//! - the `writer-assist` state machines (native Rust)
//! - the screens that render suggestions and panels (TypeScript bindings)
//!
//! Serializable with serde for JSON over the screen bridge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier for a suggestion within one document session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct SuggestionId(pub String);

impl SuggestionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SuggestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SuggestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Suggestions
// ============================================================================

/// What kind of edit a suggestion proposes. Never changes after creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum ActionKind {
    Rewrite,
    Paraphrase,
    Summarize,
    Tighten,
    Cite,
    Expand,
    Tone,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Rewrite => "rewrite",
            ActionKind::Paraphrase => "paraphrase",
            ActionKind::Summarize => "summarize",
            ActionKind::Tighten => "tighten",
            ActionKind::Cite => "cite",
            ActionKind::Expand => "expand",
            ActionKind::Tone => "tone",
        }
    }
}

/// Sort/priority hint only
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum Impact {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Generating,
    Ready,
    Error,
}

/// Where a version's text came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum VersionSource {
    #[default]
    Model,
    Fallback,
}

/// Half-open `[from, to)` span in document offsets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct DocRange {
    pub from: usize,
    pub to: usize,
}

impl DocRange {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn caret(at: usize) -> Self {
        Self { from: at, to: at }
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }
}

/// One generated candidate. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct SuggestionVersion {
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub source: VersionSource,
}

impl SuggestionVersion {
    pub fn new(text: impl Into<String>, source: VersionSource) -> Self {
        Self {
            text: text.into(),
            created_at: Utc::now(),
            source,
        }
    }
}

/// One recommendation surfaced to the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct Suggestion {
    pub id: SuggestionId,
    pub title: String,
    pub summary: String,
    pub action_kind: ActionKind,
    /// Exact source span the suggestion targets
    pub original_text: String,
    pub target_range: Option<DocRange>,
    pub estimated_impact: Impact,
    /// Newest first, capped by the board's version limit
    pub versions: Vec<SuggestionVersion>,
    pub generation_status: GenerationStatus,
    /// Message from the most recent failed generation, cleared on success
    pub last_error: Option<String>,
}

impl Suggestion {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        action_kind: ActionKind,
        original_text: impl Into<String>,
    ) -> Self {
        Self {
            id: SuggestionId::new(),
            title: title.into(),
            summary: summary.into(),
            action_kind,
            original_text: original_text.into(),
            target_range: None,
            estimated_impact: Impact::default(),
            versions: Vec::new(),
            generation_status: GenerationStatus::Idle,
            last_error: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<SuggestionId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_target_range(mut self, range: DocRange) -> Self {
        self.target_range = Some(range);
        self
    }

    pub fn with_impact(mut self, impact: Impact) -> Self {
        self.estimated_impact = impact;
        self
    }

    /// Seed with an already generated version (e.g. delivered with the listing)
    pub fn with_version(mut self, text: impl Into<String>) -> Self {
        self.versions.insert(0, SuggestionVersion::new(text, VersionSource::Model));
        self.generation_status = GenerationStatus::Ready;
        self
    }

    pub fn latest_version(&self) -> Option<&SuggestionVersion> {
        self.versions.first()
    }
}

impl From<String> for SuggestionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Diff
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum DiffKind {
    Unchanged,
    Added,
    Removed,
}

/// Contiguous run of words sharing one diff kind. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct DiffPart {
    pub text: String,
    pub kind: DiffKind,
}

impl DiffPart {
    pub fn unchanged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: DiffKind::Unchanged,
        }
    }

    pub fn added(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: DiffKind::Added,
        }
    }

    pub fn removed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: DiffKind::Removed,
        }
    }
}

// ============================================================================
// UI State
// ============================================================================

/// Top-level, mutually exclusive floating surfaces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum PanelName {
    Sidebar,
    Profile,
    Score,
    SuggestionList,
    Goals,
}

impl PanelName {
    pub fn as_str(self) -> &'static str {
        match self {
            PanelName::Sidebar => "sidebar",
            PanelName::Profile => "profile",
            PanelName::Score => "score",
            PanelName::SuggestionList => "suggestion_list",
            PanelName::Goals => "goals",
        }
    }
}

/// `active_panel == None` means no panel is open
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct PanelState {
    pub active_panel: Option<PanelName>,
    /// Only meaningful while `active_panel == Some(Score)`
    pub is_sub_popup_open: bool,
}

/// Preferred side of the anchor for a popover
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum Placement {
    #[default]
    Top,
    Bottom,
}

/// Progress report emitted after every batch step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
}

// ============================================================================
// Telemetry
// ============================================================================

/// Fire-and-forget analytics event
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct TelemetryEvent {
    /// Event name (e.g., "suggestion.apply", "popover.open")
    pub name: String,
    pub doc_id: String,
    pub suggestion_id: Option<SuggestionId>,
    #[ts(type = "unknown")]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc_id: doc_id.into(),
            suggestion_id: None,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn for_suggestion(mut self, id: &SuggestionId) -> Self {
        self.suggestion_id = Some(id.clone());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Event names
pub const EVENT_SUGGESTION_GENERATE: &str = "suggestion.generate";
pub const EVENT_SUGGESTION_REGENERATE: &str = "suggestion.regenerate";
pub const EVENT_SUGGESTION_APPLY: &str = "suggestion.apply";
pub const EVENT_SUGGESTION_APPLY_TOKEN: &str = "suggestion.apply_token";
pub const EVENT_SUGGESTION_IGNORE: &str = "suggestion.ignore";
pub const EVENT_SUGGESTION_UNDO: &str = "suggestion.undo";
pub const EVENT_POPOVER_OPEN: &str = "popover.open";
pub const EVENT_POPOVER_CLOSE: &str = "popover.close";
pub const EVENT_PANEL_OPEN: &str = "panel.open";
pub const EVENT_BATCH_APPLY: &str = "batch.apply";

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ts_rs::Config;

    #[test]
    fn test_suggestion_id_generation() {
        let id1 = SuggestionId::new();
        let id2 = SuggestionId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.0.len(), 26); // ULID length
    }

    #[test]
    fn test_suggestion_serialization() {
        let suggestion = Suggestion::new(
            "Tighten",
            "Remove filler",
            ActionKind::Tighten,
            "this is really very long",
        )
        .with_target_range(DocRange::new(4, 28))
        .with_version("this is long");

        let json = serde_json::to_string(&suggestion).unwrap();
        let deserialized: Suggestion = serde_json::from_str(&json).unwrap();

        assert_eq!(suggestion, deserialized);
        assert_eq!(deserialized.generation_status, GenerationStatus::Ready);
        assert!(json.contains("\"action_kind\":\"tighten\""));
    }

    #[test]
    fn test_diff_kind_serialization() {
        let json = serde_json::to_string(&DiffPart::removed("old")).unwrap();
        assert_eq!(json, r#"{"text":"old","kind":"removed"}"#);
    }

    #[test]
    fn test_panel_state_default_is_closed() {
        let state = PanelState::default();
        assert_eq!(state.active_panel, None);
        assert!(!state.is_sub_popup_open);

        let json = serde_json::to_string(&PanelName::SuggestionList).unwrap();
        assert_eq!(json, "\"suggestion_list\"");
    }

    #[test]
    fn test_impact_orders_by_priority() {
        let mut impacts = vec![Impact::High, Impact::Low, Impact::Medium];
        impacts.sort();
        assert_eq!(impacts, vec![Impact::Low, Impact::Medium, Impact::High]);
    }

    #[test]
    fn test_doc_range_len() {
        assert_eq!(DocRange::new(3, 10).len(), 7);
        assert!(DocRange::caret(5).is_empty());
        assert_eq!(DocRange::new(9, 2).len(), 0);
    }

    #[test]
    fn export_types() {
        // The export_to attribute in each type's #[ts] macro specifies the output file
        let config = Config::default();
        SuggestionId::export(&config).unwrap();
        ActionKind::export(&config).unwrap();
        Impact::export(&config).unwrap();
        GenerationStatus::export(&config).unwrap();
        VersionSource::export(&config).unwrap();
        DocRange::export(&config).unwrap();
        SuggestionVersion::export(&config).unwrap();
        Suggestion::export(&config).unwrap();
        DiffKind::export(&config).unwrap();
        DiffPart::export(&config).unwrap();
        PanelName::export(&config).unwrap();
        PanelState::export(&config).unwrap();
        Placement::export(&config).unwrap();
        BatchProgress::export(&config).unwrap();
        TelemetryEvent::export(&config).unwrap();
    }
}
