//! Anchors, measurement, and the placement algorithm.
//!
//! All rectangles are in viewport coordinates (what a bounding-rect query
//! returns), so scrolling moves anchors rather than the viewport.

use shared_types::{DocRange, Placement};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Handle to a rendered element on the writing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// What a popover is positioned against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    Element(ElementId),
    TextRange(DocRange),
    Rect(Rect),
}

impl Anchor {
    /// Current bounding rectangle. `None` when the anchor is detached or not
    /// measurable.
    pub fn bounding_rect(&self, probe: &dyn LayoutProbe) -> Option<Rect> {
        match self {
            Anchor::Element(element) => probe.element_rect(*element),
            Anchor::TextRange(range) => probe.range_rect(*range),
            Anchor::Rect(rect) => Some(*rect),
        }
    }

    pub fn element(&self) -> Option<ElementId> {
        match self {
            Anchor::Element(element) => Some(*element),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Anchor::Element(_) => "element",
            Anchor::TextRange(_) => "text_range",
            Anchor::Rect(_) => "rect",
        }
    }
}

/// Measurement API of the host surface
pub trait LayoutProbe {
    /// `None` once the element is detached.
    fn element_rect(&self, element: ElementId) -> Option<Rect>;

    fn range_rect(&self, range: DocRange) -> Option<Rect>;

    fn viewport(&self) -> Size;

    /// Whether `target` is `container` itself or one of its descendants.
    fn contains(&self, container: ElementId, target: ElementId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedPosition {
    pub top: f64,
    pub left: f64,
    /// Side actually used after flipping
    pub placement: Placement,
}

/// Place `content` next to `anchor`.
///
/// The preferred side is used when the content fits there with `margin` to
/// spare; otherwise the other side, and when neither fits, whichever has more
/// room. Horizontally the content is centered on the anchor and clamped so
/// both edges stay `margin` inside the viewport. Content wider than the
/// viewport pins to the left margin.
pub fn compute_position(
    anchor: Rect,
    content: Size,
    viewport: Size,
    preferred: Placement,
    offset: f64,
    margin: f64,
) -> ComputedPosition {
    let top_above = anchor.y - offset - content.height;
    let top_below = anchor.bottom() + offset;
    let fits_above = top_above >= margin;
    let fits_below = top_below + content.height <= viewport.height - margin;

    let placement = match preferred {
        Placement::Top if fits_above => Placement::Top,
        Placement::Bottom if fits_below => Placement::Bottom,
        Placement::Top if fits_below => Placement::Bottom,
        Placement::Bottom if fits_above => Placement::Top,
        _ => {
            let room_above = anchor.y - margin;
            let room_below = viewport.height - anchor.bottom() - margin;
            if room_above > room_below {
                Placement::Top
            } else if room_below > room_above {
                Placement::Bottom
            } else {
                preferred
            }
        }
    };

    let top = match placement {
        Placement::Top => top_above,
        Placement::Bottom => top_below,
    };

    let centered = anchor.center_x() - content.width / 2.0;
    let max_left = viewport.width - content.width - margin;
    let left = if max_left < margin {
        margin
    } else {
        centered.clamp(margin, max_left)
    };

    ComputedPosition {
        top,
        left,
        placement,
    }
}

/// Static layout table, for tests and headless drivers.
#[derive(Debug, Clone, Default)]
pub struct FixedLayout {
    viewport: Size,
    scroll_y: f64,
    elements: HashMap<ElementId, Rect>,
    parents: HashMap<ElementId, ElementId>,
    ranges: HashMap<DocRange, Rect>,
}

impl FixedLayout {
    pub fn new(viewport: Size) -> Self {
        Self {
            viewport,
            ..Default::default()
        }
    }

    /// Register an element at its unscrolled position.
    pub fn set_element(&mut self, element: ElementId, rect: Rect) {
        self.elements.insert(element, rect);
    }

    pub fn set_parent(&mut self, child: ElementId, parent: ElementId) {
        self.parents.insert(child, parent);
    }

    pub fn set_range_rect(&mut self, range: DocRange, rect: Rect) {
        self.ranges.insert(range, rect);
    }

    pub fn detach(&mut self, element: ElementId) {
        self.elements.remove(&element);
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn scroll_to(&mut self, scroll_y: f64) {
        self.scroll_y = scroll_y;
    }
}

impl LayoutProbe for FixedLayout {
    fn element_rect(&self, element: ElementId) -> Option<Rect> {
        self.elements
            .get(&element)
            .map(|rect| rect.translated(0.0, -self.scroll_y))
    }

    fn range_rect(&self, range: DocRange) -> Option<Rect> {
        self.ranges
            .get(&range)
            .map(|rect| rect.translated(0.0, -self.scroll_y))
    }

    fn viewport(&self) -> Size {
        self.viewport
    }

    fn contains(&self, container: ElementId, target: ElementId) -> bool {
        let mut current = Some(target);
        // Bounded walk in case of a cyclic parent table.
        for _ in 0..=self.parents.len() {
            match current {
                Some(element) if element == container => return true,
                Some(element) => current = self.parents.get(&element).copied(),
                None => return false,
            }
        }
        false
    }
}
