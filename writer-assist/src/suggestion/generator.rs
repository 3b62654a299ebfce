//! Generation collaborators: the async seam to the AI rewrite service and the
//! deterministic local substitute used when it fails.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use shared_types::ActionKind;

/// One call to the rewrite collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub original_text: String,
    pub action_kind: ActionKind,
    pub tone_hint: Option<String>,
}

impl GenerationRequest {
    pub fn new(original_text: impl Into<String>, action_kind: ActionKind) -> Self {
        Self {
            original_text: original_text.into(),
            action_kind,
            tone_hint: None,
        }
    }

    pub fn with_tone(mut self, tone_hint: Option<String>) -> Self {
        self.tone_hint = tone_hint;
        self
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation service returned status {0}")]
    Status(u16),
    #[error("generation returned empty text")]
    EmptyResponse,
    #[error("generation timed out after {0}ms")]
    Timeout(u64),
    #[error("failed to parse generation response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

static FILLER_WORDS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(really|very|just|actually|basically|quite|simply|literally|that)\b\s*")
        .ok()
});

const EXPAND_SENTENCE: &str = "This point deserves a concrete example to make it land.";

/// Canned, deterministic rewrites keyed by action kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn rewrite(&self, request: &GenerationRequest) -> String {
        let text = request.original_text.trim();
        if text.is_empty() {
            return String::new();
        }
        match request.action_kind {
            ActionKind::Tighten => {
                let tightened = match FILLER_WORDS.as_ref() {
                    Some(re) => re.replace_all(text, "").to_string(),
                    None => text.to_string(),
                };
                let collapsed = collapse_whitespace(&tightened);
                if collapsed.is_empty() {
                    text.to_string()
                } else {
                    collapsed
                }
            }
            ActionKind::Summarize => first_sentence(text),
            ActionKind::Expand => {
                format!("{} {}", with_terminal_punctuation(text), EXPAND_SENTENCE)
            }
            ActionKind::Paraphrase => format!("In other words, {}", lowercase_first(text)),
            ActionKind::Rewrite => with_terminal_punctuation(&capitalize_first(text)),
            ActionKind::Cite => format!("{} [citation needed]", text),
            ActionKind::Tone => {
                let prefix = match request.tone_hint.as_deref().map(str::to_lowercase).as_deref() {
                    Some("formal") => "Respectfully,",
                    Some("friendly") => "Just a heads-up:",
                    Some("confident") => "Clearly,",
                    _ => "To put it plainly,",
                };
                format!("{} {}", prefix, lowercase_first(text))
            }
        }
    }
}

#[async_trait]
impl SuggestionGenerator for FallbackGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let text = self.rewrite(request);
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_sentence(text: &str) -> String {
    match text.find(['.', '!', '?']) {
        Some(end) => text[..=end].to_string(),
        None => text.to_string(),
    }
}

fn with_terminal_punctuation(text: &str) -> String {
    if text.ends_with(['.', '!', '?']) {
        text.to_string()
    } else {
        format!("{text}.")
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(kind: ActionKind, text: &str) -> String {
        FallbackGenerator.rewrite(&GenerationRequest::new(text, kind))
    }

    #[test]
    fn test_tighten_drops_filler() {
        assert_eq!(
            rewrite(ActionKind::Tighten, "This is really very important"),
            "This is important"
        );
    }

    #[test]
    fn test_summarize_keeps_first_sentence() {
        assert_eq!(
            rewrite(ActionKind::Summarize, "First point. Second point! Third?"),
            "First point."
        );
    }

    #[test]
    fn test_rewrite_capitalizes_and_punctuates() {
        assert_eq!(
            rewrite(ActionKind::Rewrite, "results improved"),
            "Results improved."
        );
    }

    #[test]
    fn test_tone_uses_hint() {
        let request = GenerationRequest::new("We disagree", ActionKind::Tone)
            .with_tone(Some("Formal".to_string()));
        assert_eq!(
            FallbackGenerator.rewrite(&request),
            "Respectfully, we disagree"
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let request = GenerationRequest::new("the data shows growth", ActionKind::Expand);
        assert_eq!(
            FallbackGenerator.rewrite(&request),
            FallbackGenerator.rewrite(&request)
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let result = FallbackGenerator
            .generate(&GenerationRequest::new("   ", ActionKind::Cite))
            .await;
        assert_eq!(result, Err(GenerationError::EmptyResponse));
    }
}
