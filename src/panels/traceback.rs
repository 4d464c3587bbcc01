//! Link to the traceback captured for a failed request.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ToolbarResult;
use crate::http::diagnostics::Diagnostics;
use crate::panels::{render_panel, Panel, PanelOutput};
use crate::ui::templates::Templates;

pub const PANEL_ID: &str = "traceback";

#[derive(Debug, Serialize)]
struct TracebackData {
    traceback_id: Option<String>,
    summary: Option<String>,
}

#[derive(Default)]
pub struct TracebackPanel {
    diagnostics: Mutex<Option<Diagnostics>>,
}

impl TracebackPanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> TracebackData {
        let diagnostics = self.diagnostics.lock();
        TracebackData {
            traceback_id: diagnostics.as_ref().and_then(Diagnostics::traceback_id),
            summary: diagnostics.as_ref().and_then(Diagnostics::traceback_summary),
        }
    }
}

#[async_trait]
impl Panel for TracebackPanel {
    fn id(&self) -> &'static str {
        PANEL_ID
    }

    fn title(&self) -> &'static str {
        "Traceback"
    }

    fn has_content(&self) -> bool {
        self.data().traceback_id.is_some()
    }

    fn observe(&self, request: &Request<Body>) {
        *self.diagnostics.lock() = request.extensions().get::<Diagnostics>().cloned();
    }

    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput> {
        render_panel(self, templates, "panels/traceback.html", &self.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_captured_traceback() {
        let diagnostics = Diagnostics::new();
        let mut request = Request::new(Body::empty());
        request.extensions_mut().insert(diagnostics.clone());

        let panel = TracebackPanel::new();
        panel.observe(&request);
        assert!(!panel.has_content());

        diagnostics.set_traceback("f00d", "panic: boom");
        let templates = Templates::new("/_debugtoolbar").unwrap();
        let output = panel.render(&templates).unwrap();
        assert!(output.has_content);
        assert!(output.content.contains("panic: boom"));
        assert!(output.content.contains("f00d"));
    }
}
