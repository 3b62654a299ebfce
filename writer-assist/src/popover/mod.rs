//! Anchored popover manager.
//!
//! One owned manager per surface holds at most one session. Opening replaces
//! whatever was open; global listeners exist exactly while a session does.

pub mod events;
pub mod geometry;

pub use events::{EventTarget, ListenerId, ListenerKind, ListenerRegistry, UiEvent};
pub use geometry::{
    compute_position, Anchor, ComputedPosition, ElementId, FixedLayout, LayoutProbe, Rect, Size,
};

use serde_json::json;
use shared_types::{Placement, TelemetryEvent, EVENT_POPOVER_CLOSE, EVENT_POPOVER_OPEN};
use std::sync::Arc;
use tracing::debug;

use crate::config::AssistConfig;
use crate::telemetry::{NoopTelemetry, TelemetrySink};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopoverOptions {
    pub placement: Placement,
    /// Gap between anchor and content, in px
    pub offset: f64,
    pub close_on_outside_click: bool,
    /// Content can take clicks and focus without closing
    pub is_interactive: bool,
    /// Used until the content element is attached and measurable
    pub size_hint: Option<Size>,
}

impl Default for PopoverOptions {
    fn default() -> Self {
        Self {
            placement: Placement::Top,
            offset: 8.0,
            close_on_outside_click: true,
            is_interactive: true,
            size_hint: None,
        }
    }
}

impl PopoverOptions {
    pub fn from_config(config: &AssistConfig) -> Self {
        Self {
            offset: config.popover_offset,
            ..Self::default()
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub fn transient(mut self) -> Self {
        self.is_interactive = false;
        self
    }

    pub fn sticky(mut self) -> Self {
        self.close_on_outside_click = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Explicit,
    Replaced,
    Escape,
    OutsideClick,
    ContentClick,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Explicit => "explicit",
            CloseReason::Replaced => "replaced",
            CloseReason::Escape => "escape",
            CloseReason::OutsideClick => "outside_click",
            CloseReason::ContentClick => "content_click",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventOutcome {
    Ignored,
    Repositioned(ComputedPosition),
    /// Measurement failed; the last position stays
    Stale,
    Closed(CloseReason),
}

#[derive(Debug)]
struct Session<C> {
    id: SessionId,
    anchor: Anchor,
    content: C,
    options: PopoverOptions,
    content_element: Option<ElementId>,
    position: Option<ComputedPosition>,
    listeners: Vec<ListenerId>,
}

pub struct PopoverManager<C, T: EventTarget = ListenerRegistry> {
    target: T,
    margin: f64,
    session: Option<Session<C>>,
    next_session: u64,
    telemetry: Arc<dyn TelemetrySink>,
    doc_id: String,
}

impl<C, T: EventTarget> PopoverManager<C, T> {
    pub fn new(target: T, viewport_margin: f64) -> Self {
        Self {
            target,
            margin: viewport_margin,
            session: None,
            next_session: 0,
            telemetry: Arc::new(NoopTelemetry),
            doc_id: String::new(),
        }
    }

    pub fn from_config(target: T, config: &AssistConfig) -> Self {
        Self::new(target, config.viewport_margin)
    }

    pub fn with_telemetry(
        mut self,
        telemetry: Arc<dyn TelemetrySink>,
        doc_id: impl Into<String>,
    ) -> Self {
        self.telemetry = telemetry;
        self.doc_id = doc_id.into();
        self
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.session.as_ref().map(|s| s.anchor)
    }

    pub fn content(&self) -> Option<&C> {
        self.session.as_ref().map(|s| &s.content)
    }

    pub fn content_mut(&mut self) -> Option<&mut C> {
        self.session.as_mut().map(|s| &mut s.content)
    }

    pub fn options(&self) -> Option<PopoverOptions> {
        self.session.as_ref().map(|s| s.options)
    }

    pub fn position(&self) -> Option<ComputedPosition> {
        self.session.as_ref().and_then(|s| s.position)
    }

    /// Open a session, closing any current one first.
    pub fn open(
        &mut self,
        anchor: Anchor,
        content: C,
        options: PopoverOptions,
        probe: &dyn LayoutProbe,
    ) -> SessionId {
        if self.session.is_some() {
            self.close_with(CloseReason::Replaced);
        }

        self.next_session += 1;
        let id = SessionId(self.next_session);
        let listeners = vec![
            self.target.add_listener(ListenerKind::PointerDown, false),
            self.target.add_listener(ListenerKind::KeyDown, false),
            self.target.add_listener(ListenerKind::Scroll, true),
            self.target.add_listener(ListenerKind::Resize, false),
        ];
        self.session = Some(Session {
            id,
            anchor,
            content,
            options,
            content_element: None,
            position: None,
            listeners,
        });
        let position = self.reposition(probe);

        self.telemetry.emit(
            TelemetryEvent::new(EVENT_POPOVER_OPEN, self.doc_id.clone()).with_payload(json!({
                "session": id.0,
                "anchor": anchor.kind(),
                "placement": position.map(|p| p.placement),
            })),
        );
        debug!(session = id.0, anchor = anchor.kind(), "Popover opened");
        id
    }

    /// Bind the rendered content element so it can be measured and hit-tested.
    pub fn attach_content(
        &mut self,
        element: ElementId,
        probe: &dyn LayoutProbe,
    ) -> Option<ComputedPosition> {
        self.session.as_mut()?.content_element = Some(element);
        self.reposition(probe)
    }

    pub fn close(&mut self) -> Option<C> {
        self.close_with(CloseReason::Explicit)
    }

    /// Close only if `id` is still the open session.
    pub fn close_session(&mut self, id: SessionId) -> Option<C> {
        if self.session_id() == Some(id) {
            self.close()
        } else {
            None
        }
    }

    fn close_with(&mut self, reason: CloseReason) -> Option<C> {
        let session = self.session.take()?;
        for listener in session.listeners {
            self.target.remove_listener(listener);
        }
        self.telemetry.emit(
            TelemetryEvent::new(EVENT_POPOVER_CLOSE, self.doc_id.clone())
                .with_payload(json!({ "session": session.id.0, "reason": reason.as_str() })),
        );
        debug!(session = session.id.0, reason = reason.as_str(), "Popover closed");
        Some(session.content)
    }

    /// Re-measure and recompute. A detached anchor leaves the previous
    /// position in place and returns `None`.
    pub fn reposition(&mut self, probe: &dyn LayoutProbe) -> Option<ComputedPosition> {
        let margin = self.margin;
        let session = self.session.as_mut()?;
        let Some(anchor_rect) = session.anchor.bounding_rect(probe) else {
            debug!(
                session = session.id.0,
                anchor = session.anchor.kind(),
                "Anchor not measurable; skipping reposition"
            );
            return None;
        };
        let content = session
            .content_element
            .and_then(|element| probe.element_rect(element))
            .map(|rect| rect.size())
            .or(session.options.size_hint)
            .unwrap_or_default();

        let position = compute_position(
            anchor_rect,
            content,
            probe.viewport(),
            session.options.placement,
            session.options.offset,
            margin,
        );
        session.position = Some(position);
        Some(position)
    }

    pub fn handle_event(&mut self, event: &UiEvent, probe: &dyn LayoutProbe) -> EventOutcome {
        let Some(session) = self.session.as_ref() else {
            return EventOutcome::Ignored;
        };

        match event {
            UiEvent::KeyDown { key } if key == "Escape" => self.close_outcome(CloseReason::Escape),
            UiEvent::KeyDown { .. } => EventOutcome::Ignored,
            UiEvent::PointerDown { target } => {
                let inside = |container: Option<ElementId>| match (container, *target) {
                    (Some(container), Some(target)) => probe.contains(container, target),
                    _ => false,
                };
                if inside(session.anchor.element()) {
                    EventOutcome::Ignored
                } else if inside(session.content_element) {
                    if session.options.is_interactive {
                        EventOutcome::Ignored
                    } else {
                        self.close_outcome(CloseReason::ContentClick)
                    }
                } else if session.options.close_on_outside_click {
                    self.close_outcome(CloseReason::OutsideClick)
                } else {
                    EventOutcome::Ignored
                }
            }
            UiEvent::Scroll | UiEvent::Resize => match self.reposition(probe) {
                Some(position) => EventOutcome::Repositioned(position),
                None => EventOutcome::Stale,
            },
        }
    }

    fn close_outcome(&mut self, reason: CloseReason) -> EventOutcome {
        self.close_with(reason);
        EventOutcome::Closed(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemoryTelemetry;

    const ANCHOR: ElementId = ElementId(1);
    const CONTENT: ElementId = ElementId(2);
    const CONTENT_BUTTON: ElementId = ElementId(3);
    const ELSEWHERE: ElementId = ElementId(9);

    fn layout() -> FixedLayout {
        let mut layout = FixedLayout::new(Size::new(1000.0, 800.0));
        layout.set_element(ANCHOR, Rect::new(400.0, 300.0, 100.0, 20.0));
        layout.set_element(CONTENT, Rect::new(0.0, 0.0, 200.0, 60.0));
        layout.set_element(CONTENT_BUTTON, Rect::new(0.0, 0.0, 20.0, 20.0));
        layout.set_parent(CONTENT_BUTTON, CONTENT);
        layout
    }

    fn open(options: PopoverOptions) -> (PopoverManager<&'static str>, FixedLayout) {
        let layout = layout();
        let mut manager = PopoverManager::new(ListenerRegistry::new(), 10.0);
        manager.open(Anchor::Element(ANCHOR), "card", options, &layout);
        manager.attach_content(CONTENT, &layout);
        (manager, layout)
    }

    #[test]
    fn test_open_registers_listeners_and_positions() {
        let (manager, _) = open(PopoverOptions::default());
        assert!(manager.is_open());
        assert_eq!(manager.target().len(), 4);
        assert!(manager.target().is_capture(ListenerKind::Scroll));
        assert!(!manager.target().is_capture(ListenerKind::PointerDown));

        let position = manager.position().unwrap();
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.top, 232.0);
        assert_eq!(position.left, 350.0);
    }

    #[test]
    fn test_opening_replaces_previous_session() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let layout = layout();
        let mut manager = PopoverManager::new(ListenerRegistry::new(), 10.0)
            .with_telemetry(telemetry.clone(), "doc-1");

        let first = manager.open(
            Anchor::Element(ANCHOR),
            "first",
            PopoverOptions::default(),
            &layout,
        );
        let second = manager.open(
            Anchor::Rect(Rect::new(0.0, 400.0, 10.0, 10.0)),
            "second",
            PopoverOptions::default(),
            &layout,
        );

        assert_ne!(first, second);
        assert_eq!(manager.content(), Some(&"second"));
        assert_eq!(manager.target().len(), 4);
        assert_eq!(manager.close_session(first), None);
        assert!(manager.is_open());
        assert_eq!(
            telemetry.names(),
            vec!["popover.open", "popover.close", "popover.open"]
        );
        assert_eq!(telemetry.events()[1].payload["reason"], "replaced");
    }

    #[test]
    fn test_close_tears_down_listeners() {
        let (mut manager, _) = open(PopoverOptions::default());
        assert_eq!(manager.close(), Some("card"));
        assert!(manager.target().is_empty());
        assert!(manager.position().is_none());
        assert_eq!(manager.close(), None);
    }

    #[test]
    fn test_escape_closes_even_when_sticky() {
        let (mut manager, layout) = open(PopoverOptions::default().sticky());
        assert_eq!(
            manager.handle_event(&UiEvent::KeyDown { key: "a".into() }, &layout),
            EventOutcome::Ignored
        );
        assert_eq!(
            manager.handle_event(&UiEvent::escape(), &layout),
            EventOutcome::Closed(CloseReason::Escape)
        );
        assert!(manager.target().is_empty());
    }

    #[test]
    fn test_pointer_down_rules() {
        let (mut manager, layout) = open(PopoverOptions::default());
        assert_eq!(
            manager.handle_event(&UiEvent::click(ANCHOR), &layout),
            EventOutcome::Ignored
        );
        assert_eq!(
            manager.handle_event(&UiEvent::click(CONTENT_BUTTON), &layout),
            EventOutcome::Ignored
        );
        assert_eq!(
            manager.handle_event(&UiEvent::click(ELSEWHERE), &layout),
            EventOutcome::Closed(CloseReason::OutsideClick)
        );

        let (mut sticky, layout) = open(PopoverOptions::default().sticky());
        assert_eq!(
            sticky.handle_event(&UiEvent::PointerDown { target: None }, &layout),
            EventOutcome::Ignored
        );
        assert!(sticky.is_open());

        let (mut transient, layout) = open(PopoverOptions::default().transient());
        assert_eq!(
            transient.handle_event(&UiEvent::click(CONTENT_BUTTON), &layout),
            EventOutcome::Closed(CloseReason::ContentClick)
        );
    }

    #[test]
    fn test_scroll_repositions_and_detached_anchor_is_stale() {
        let (mut manager, mut layout) = open(PopoverOptions::default());
        layout.scroll_to(100.0);
        match manager.handle_event(&UiEvent::Scroll, &layout) {
            EventOutcome::Repositioned(position) => assert_eq!(position.top, 132.0),
            other => panic!("expected reposition, got {other:?}"),
        }

        layout.detach(ANCHOR);
        assert_eq!(
            manager.handle_event(&UiEvent::Resize, &layout),
            EventOutcome::Stale
        );
        assert_eq!(manager.position().unwrap().top, 132.0);
        assert!(manager.is_open());
    }
}
