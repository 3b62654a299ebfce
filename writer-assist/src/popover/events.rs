//! Global listener registration and the UI events the popover reacts to.

use super::geometry::ElementId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PointerDown,
    KeyDown,
    Scroll,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Document/window-level listener registration
pub trait EventTarget {
    /// `capture` registers in the capture phase so ancestor scrolls are seen.
    fn add_listener(&mut self, kind: ListenerKind, capture: bool) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// `target` is `None` when the hit element is unknown to the surface
    PointerDown { target: Option<ElementId> },
    KeyDown { key: String },
    Scroll,
    Resize,
}

impl UiEvent {
    pub fn escape() -> Self {
        UiEvent::KeyDown {
            key: "Escape".to_string(),
        }
    }

    pub fn click(target: ElementId) -> Self {
        UiEvent::PointerDown {
            target: Some(target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: ListenerId,
    pub kind: ListenerKind,
    pub capture: bool,
}

/// Records registrations; the host surface mirrors it onto real listeners.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    active: Vec<Registration>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[Registration] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_registered(&self, kind: ListenerKind) -> bool {
        self.active.iter().any(|r| r.kind == kind)
    }

    pub fn is_capture(&self, kind: ListenerKind) -> bool {
        self.active.iter().any(|r| r.kind == kind && r.capture)
    }
}

impl EventTarget for ListenerRegistry {
    fn add_listener(&mut self, kind: ListenerKind, capture: bool) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.active.push(Registration { id, kind, capture });
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.active.retain(|r| r.id != id);
    }
}
