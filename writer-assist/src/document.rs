//! Host document engine interface and an in-memory implementation.
//!
//! Offsets are document offsets, not byte indices. [`MemoryDocument`] uses
//! char positions as its offset space.

use shared_types::DocRange;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("range {from}..{to} is outside document of length {len}")]
    OutOfBounds { from: usize, to: usize, len: usize },
    #[error("range start {from} is after end {to}")]
    Inverted { from: usize, to: usize },
    #[error("document is read-only")]
    ReadOnly,
    #[error("range {from}..{to} touches a locked region")]
    Locked { from: usize, to: usize },
}

/// Identifier of a rendered text node on the writing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Where a rendered text node sits in document offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextNode {
    pub start: usize,
    pub len: usize,
    pub editable: bool,
}

/// One completed mutation, in pre-edit coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocChange {
    pub replaced: DocRange,
    pub inserted_len: usize,
}

impl DocChange {
    pub fn delta(&self) -> isize {
        self.inserted_len as isize - self.replaced.len() as isize
    }
}

/// What the assist core needs from the rich-text engine.
pub trait HostDocument {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn selection(&self) -> DocRange;

    fn set_selection(&mut self, range: DocRange) -> Result<(), DocumentError>;

    /// Plain text over a range, `None` when the range is not addressable.
    fn text_between(&self, range: DocRange) -> Option<String>;

    /// Atomic replace. On error the document must be unmodified.
    fn replace_range(&mut self, range: DocRange, text: &str) -> Result<DocChange, DocumentError>;

    fn focus(&mut self);

    /// Position query for hit-testing.
    fn text_node(&self, node: NodeId) -> Option<TextNode>;
}

type ChangeListener = Box<dyn FnMut(&DocChange) + Send>;

#[derive(Default)]
pub struct MemoryDocument {
    chars: Vec<char>,
    selection: DocRange,
    focused: bool,
    read_only: bool,
    locked: Vec<DocRange>,
    nodes: HashMap<NodeId, TextNode>,
    listeners: Vec<ChangeListener>,
    revision: u64,
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("len", &self.chars.len())
            .field("selection", &self.selection)
            .field("revision", &self.revision)
            .finish()
    }
}

impl MemoryDocument {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            ..Default::default()
        }
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Reject any edit touching `range` (protected regions, collaborator locks).
    pub fn lock_range(&mut self, range: DocRange) {
        self.locked.push(range);
    }

    pub fn register_text_node(&mut self, node: NodeId, text_node: TextNode) {
        self.nodes.insert(node, text_node);
    }

    /// Change-notification hook, fired after every successful mutation.
    pub fn on_change(&mut self, listener: impl FnMut(&DocChange) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Char offset of the first occurrence of `needle`.
    pub fn find(&self, needle: &str) -> Option<DocRange> {
        let text = self.text();
        let byte = text.find(needle)?;
        let from = text[..byte].chars().count();
        Some(DocRange::new(from, from + needle.chars().count()))
    }

    fn check_range(&self, range: DocRange) -> Result<(), DocumentError> {
        if range.from > range.to {
            return Err(DocumentError::Inverted {
                from: range.from,
                to: range.to,
            });
        }
        if range.to > self.chars.len() {
            return Err(DocumentError::OutOfBounds {
                from: range.from,
                to: range.to,
                len: self.chars.len(),
            });
        }
        Ok(())
    }
}

impl HostDocument for MemoryDocument {
    fn len(&self) -> usize {
        self.chars.len()
    }

    fn selection(&self) -> DocRange {
        self.selection
    }

    fn set_selection(&mut self, range: DocRange) -> Result<(), DocumentError> {
        self.check_range(range)?;
        self.selection = range;
        Ok(())
    }

    fn text_between(&self, range: DocRange) -> Option<String> {
        self.check_range(range).ok()?;
        Some(self.chars[range.from..range.to].iter().collect())
    }

    fn replace_range(&mut self, range: DocRange, text: &str) -> Result<DocChange, DocumentError> {
        self.check_range(range)?;
        if self.read_only {
            return Err(DocumentError::ReadOnly);
        }
        let touches_lock = self
            .locked
            .iter()
            .any(|lock| range.from < lock.to && lock.from < range.to.max(range.from + 1));
        if touches_lock {
            return Err(DocumentError::Locked {
                from: range.from,
                to: range.to,
            });
        }

        let inserted: Vec<char> = text.chars().collect();
        let change = DocChange {
            replaced: range,
            inserted_len: inserted.len(),
        };
        self.chars.splice(range.from..range.to, inserted);
        self.revision += 1;

        for listener in self.listeners.iter_mut() {
            listener(&change);
        }
        Ok(change)
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn text_node(&self, node: NodeId) -> Option<TextNode> {
        self.nodes.get(&node).copied()
    }
}
