//! Records kept in the request history.

use serde::Serialize;

use crate::panels::PanelOutput;

/// A finished request as shown in the toolbar UI.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    /// Output of the per-request panels, in registration order.
    pub panels: Vec<PanelOutput>,
    /// Output of the global panels, in registration order.
    pub global_panels: Vec<PanelOutput>,
    /// Set when the request ended in a captured exception.
    pub traceback_id: Option<String>,
}

/// Short form of a record for listings.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    pub id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub traceback_id: Option<String>,
}

impl RequestRecord {
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id.clone(),
            method: self.method.clone(),
            path: self.path.clone(),
            status: self.status,
            traceback_id: self.traceback_id.clone(),
        }
    }

    pub fn panel(&self, dom_id: &str) -> Option<&PanelOutput> {
        self.panels
            .iter()
            .chain(self.global_panels.iter())
            .find(|p| p.dom_id == dom_id)
    }
}
