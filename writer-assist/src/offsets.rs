//! Maps hit-test points and diff tokens onto document offsets, and performs
//! the select-then-insert replacement the suggestion surfaces rely on.

use shared_types::{DiffKind, DiffPart, DocRange};
use tracing::{debug, warn};

use crate::document::{DocChange, HostDocument, NodeId};

/// Resolve a DOM-style hit point (node plus offset inside it) to a document
/// offset. `None` when the node is unknown, not editable, or the local offset
/// runs past the node.
pub fn point_to_document_offset(
    doc: &dyn HostDocument,
    node: NodeId,
    local_offset: usize,
) -> Option<usize> {
    let Some(text_node) = doc.text_node(node) else {
        debug!(node = node.0, "Hit point outside any known text node");
        return None;
    };
    if !text_node.editable || local_offset > text_node.len {
        debug!(
            node = node.0,
            local_offset,
            len = text_node.len,
            editable = text_node.editable,
            "Hit point not addressable"
        );
        return None;
    }
    Some(text_node.start + local_offset)
}

/// Select `range`, insert `text`, then park the caret right after the
/// inserted text. On failure the document and the selection are left as they
/// were and `None` is returned.
pub fn replace_range(doc: &mut dyn HostDocument, range: DocRange, text: &str) -> Option<DocChange> {
    let previous = doc.selection();
    if let Err(e) = doc.set_selection(range) {
        warn!(from = range.from, to = range.to, error = %e, "Cannot select replacement range");
        return None;
    }
    match doc.replace_range(range, text) {
        Ok(change) => {
            let caret = range.from + text.chars().count();
            if let Err(e) = doc.set_selection(DocRange::caret(caret)) {
                debug!(caret, error = %e, "Caret placement after replace failed");
            }
            Some(change)
        }
        Err(e) => {
            warn!(from = range.from, to = range.to, error = %e, "Document rejected replacement");
            let _ = doc.set_selection(previous);
            None
        }
    }
}

/// Bool form of [`replace_range`] for callers that only need success.
pub fn try_replace(doc: &mut dyn HostDocument, range: DocRange, text: &str) -> bool {
    replace_range(doc, range, text).is_some()
}

/// Move a range across a completed edit. Ranges overlapping the edit are no
/// longer addressable and yield `None`.
pub fn rebase_range(range: DocRange, change: &DocChange) -> Option<DocRange> {
    let edit = change.replaced;
    if range.to <= edit.from {
        return Some(range);
    }
    if range.from >= edit.to {
        let shift = |offset: usize| offset - edit.len() + change.inserted_len;
        return Some(DocRange::new(shift(range.from), shift(range.to)));
    }
    None
}

/// Move a range across an edit that may sit inside it. An edit contained in
/// `range` grows or shrinks it; any other overlap yields `None`.
pub fn rebase_enclosing(range: DocRange, change: &DocChange) -> Option<DocRange> {
    let edit = change.replaced;
    if range.from <= edit.from && edit.to <= range.to {
        return Some(DocRange::new(
            range.from,
            range.to - edit.len() + change.inserted_len,
        ));
    }
    rebase_range(range, change)
}

/// A concrete replacement derived from one clicked diff token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEdit {
    pub range: DocRange,
    pub text: String,
    /// The token could not be located and the whole target is replaced.
    pub widened: bool,
}

/// Plan the edit for clicking `parts[index]`.
///
/// A removed part and the added part right after it form one hunk; clicking
/// either applies the hunk. The removed words are located inside `original`
/// with a forward search starting where the preceding parts end, matching
/// any whitespace between words. When the
/// token cannot be found the edit widens to the full `target` with the full
/// `revised` text. Unchanged parts and out-of-range indices yield `None`.
pub fn plan_token_edit(
    original: &str,
    target: DocRange,
    revised: &str,
    parts: &[DiffPart],
    index: usize,
) -> Option<TokenEdit> {
    let part = parts.get(index)?;
    let (start, removed, added) = match part.kind {
        DiffKind::Unchanged => return None,
        DiffKind::Removed => {
            let added = parts
                .get(index + 1)
                .filter(|next| next.kind == DiffKind::Added)
                .map(|next| next.text.as_str());
            (index, Some(part.text.as_str()), added)
        }
        DiffKind::Added => match index.checked_sub(1).and_then(|i| parts.get(i)) {
            Some(prev) if prev.kind == DiffKind::Removed => {
                (index - 1, Some(prev.text.as_str()), Some(part.text.as_str()))
            }
            _ => (index, None, Some(part.text.as_str())),
        },
    };

    let widened = || {
        warn!(index, "Diff token not found in original; widening to full target");
        TokenEdit {
            range: target,
            text: revised.to_string(),
            widened: true,
        }
    };

    let local = match removed {
        Some(removed) => {
            let hint = original_prefix_len(&parts[..start]);
            let Some(mut span) = find_words(original, removed, hint) else {
                return Some(widened());
            };
            if added.is_none() {
                span = absorb_one_space(original, span);
            }
            (span, added.unwrap_or_default().to_string())
        }
        None => {
            let added = added.unwrap_or_default();
            match start.checked_sub(1).and_then(|i| parts.get(i)) {
                Some(prev) => {
                    let hint = original_prefix_len(&parts[..start - 1]);
                    let Some((_, at)) = find_words(original, &prev.text, hint) else {
                        return Some(widened());
                    };
                    ((at, at), format!(" {added}"))
                }
                None => ((0, 0), format!("{added} ")),
            }
        }
    };

    let ((byte_from, byte_to), text) = local;
    let from = target.from + original[..byte_from].chars().count();
    let to = from + original[byte_from..byte_to].chars().count();
    Some(TokenEdit {
        range: DocRange::new(from, to),
        text,
        widened: false,
    })
}

/// Byte length of the original-side text of `parts`, plus the separating
/// space when non-empty. Never past the real position because parts collapse
/// whitespace runs.
fn original_prefix_len(parts: &[DiffPart]) -> usize {
    let len: usize = parts
        .iter()
        .filter(|part| part.kind != DiffKind::Added)
        .map(|part| part.text.len() + 1)
        .sum();
    len
}

/// Byte span of the first occurrence at or after `hint` of the words of
/// `run`, in order, separated by any non-empty whitespace.
fn find_words(haystack: &str, run: &str, hint: usize) -> Option<(usize, usize)> {
    let mut words = run.split_whitespace();
    let first = words.next()?;
    let rest: Vec<&str> = words.collect();

    let mut start = hint.min(haystack.len());
    while !haystack.is_char_boundary(start) {
        start -= 1;
    }
    while let Some(pos) = haystack[start..].find(first) {
        let from = start + pos;
        if let Some(to) = follow_words(haystack, from + first.len(), &rest) {
            return Some((from, to));
        }
        start = from + first.len();
    }
    None
}

fn follow_words(haystack: &str, mut at: usize, words: &[&str]) -> Option<usize> {
    for word in words {
        let tail = &haystack[at..];
        let trimmed = tail.trim_start();
        if trimmed.len() == tail.len() || !trimmed.starts_with(word) {
            return None;
        }
        at += tail.len() - trimmed.len() + word.len();
    }
    Some(at)
}

/// Deleting a word should take one neighbouring space with it.
fn absorb_one_space(text: &str, (from, to): (usize, usize)) -> (usize, usize) {
    if text[..from].ends_with(' ') {
        (from - 1, to)
    } else if text[to..].starts_with(' ') {
        (from, to + 1)
    } else {
        (from, to)
    }
}
