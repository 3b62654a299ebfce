//! Exclusive top-level panels.
//!
//! The coordinator stores a single `Option<PanelName>`, so two panels can
//! never be active at once. The score sub-popup flag is cleared on every
//! change of the active panel.

use serde_json::json;
use shared_types::{PanelName, PanelState, TelemetryEvent, EVENT_PANEL_OPEN};
use std::sync::Arc;
use tracing::debug;

use crate::telemetry::{NoopTelemetry, TelemetrySink};

pub struct PanelCoordinator {
    state: PanelState,
    telemetry: Arc<dyn TelemetrySink>,
    doc_id: String,
}

impl Default for PanelCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PanelCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelCoordinator")
            .field("state", &self.state)
            .finish()
    }
}

impl PanelCoordinator {
    pub fn new() -> Self {
        Self {
            state: PanelState::default(),
            telemetry: Arc::new(NoopTelemetry),
            doc_id: String::new(),
        }
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

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn active(&self) -> Option<PanelName> {
        self.state.active_panel
    }

    pub fn is_open(&self, name: PanelName) -> bool {
        self.state.active_panel == Some(name)
    }

    pub fn is_sub_popup_open(&self) -> bool {
        self.state.is_sub_popup_open
    }

    /// Make `name` the only active panel. Re-opening the active panel only
    /// resets the sub-popup.
    pub fn open_panel(&mut self, name: PanelName) {
        let previous = self.state.active_panel;
        self.set_active(Some(name));
        if previous != Some(name) {
            self.telemetry.emit(
                TelemetryEvent::new(EVENT_PANEL_OPEN, self.doc_id.clone()).with_payload(json!({
                    "panel": name.as_str(),
                    "replaced": previous.map(PanelName::as_str),
                })),
            );
        }
    }

    /// No-op unless `name` is the active panel.
    pub fn close_panel(&mut self, name: PanelName) {
        if self.is_open(name) {
            self.set_active(None);
        }
    }

    pub fn close_all_panels(&mut self) {
        self.set_active(None);
    }

    /// Close whatever is active unless it is `name`.
    pub fn close_all_except(&mut self, name: PanelName) {
        if !self.is_open(name) {
            self.set_active(None);
        }
    }

    pub fn toggle_panel(&mut self, name: PanelName) {
        if self.is_open(name) {
            self.close_panel(name);
        } else {
            self.open_panel(name);
        }
    }

    /// Only takes effect while the score panel is active.
    pub fn open_score_sub_popup(&mut self) -> bool {
        if self.is_open(PanelName::Score) {
            self.state.is_sub_popup_open = true;
        }
        self.state.is_sub_popup_open
    }

    pub fn close_score_sub_popup(&mut self) {
        self.state.is_sub_popup_open = false;
    }

    fn set_active(&mut self, active: Option<PanelName>) {
        if self.state.active_panel != active {
            debug!(
                from = ?self.state.active_panel.map(PanelName::as_str),
                to = ?active.map(PanelName::as_str),
                "Active panel changed"
            );
        }
        self.state = PanelState {
            active_panel: active,
            is_sub_popup_open: false,
        };
    }
}
