//! Suggestion lifecycle and floating-UI core for the writing surface.
//!
//! - [`diff`]: word-level diff between original and suggested text
//! - [`offsets`]: hit points and diff tokens to document offsets
//! - [`suggestion`]: the suggestion state machine, apply/undo and batch apply
//! - [`popover`]: the single anchored popover session
//! - [`panels`]: exclusive top-level panels

pub mod config;
pub mod diff;
pub mod document;
pub mod notice;
pub mod offsets;
pub mod panels;
pub mod popover;
pub mod remote;
pub mod snapshots;
pub mod suggestion;
pub mod telemetry;

pub use config::{AssistConfig, ConfigError};
pub use diff::{compute_diff, diff_or_fallback, DiffError};
pub use document::{DocChange, DocumentError, HostDocument, MemoryDocument};
pub use panels::PanelCoordinator;
pub use popover::{Anchor, PopoverManager, PopoverOptions};
pub use suggestion::{
    GenerateMode, GenerationOutcome, SuggestionBoard, SuggestionController, SuggestionError,
};
