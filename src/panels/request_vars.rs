//! Request variables: method, URI, query, peer and handler diagnostics.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Query;
use axum::http::Request;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ToolbarResult;
use crate::http::diagnostics::Diagnostics;
use crate::panels::{render_panel, Panel, PanelOutput, RequestInfo};
use crate::ui::templates::Templates;

pub const PANEL_ID: &str = "request_vars";

#[derive(Debug, Clone, Default, Serialize)]
struct RequestVars {
    method: String,
    uri: String,
    peer: Option<String>,
    query: Vec<(String, String)>,
    diagnostics: Vec<(String, String)>,
}

#[derive(Default)]
pub struct RequestVarsPanel {
    vars: Mutex<RequestVars>,
    diagnostics: Mutex<Option<Diagnostics>>,
}

impl RequestVarsPanel {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Decoded query pairs, in order. Malformed query strings yield nothing.
fn query_pairs(request: &Request<Body>) -> Vec<(String, String)> {
    Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(pairs)| pairs)
        .unwrap_or_default()
}

#[async_trait]
impl Panel for RequestVarsPanel {
    fn id(&self) -> &'static str {
        PANEL_ID
    }

    fn title(&self) -> &'static str {
        "Request Vars"
    }

    fn nav_subtitle(&self) -> String {
        self.vars.lock().method.clone()
    }

    fn observe(&self, request: &Request<Body>) {
        let info = RequestInfo::from_request(request);
        *self.vars.lock() = RequestVars {
            method: info.method.to_string(),
            uri: info.uri.to_string(),
            peer: info.peer.map(|addr| addr.to_string()),
            query: query_pairs(request),
            diagnostics: Vec::new(),
        };
        *self.diagnostics.lock() = request.extensions().get::<Diagnostics>().cloned();
    }

    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput> {
        // values attached by the handler are read as late as possible
        let diagnostics = self
            .diagnostics
            .lock()
            .as_ref()
            .map(Diagnostics::render)
            .unwrap_or_default();
        let vars = {
            let mut vars = self.vars.lock();
            vars.diagnostics = diagnostics;
            vars.clone()
        };
        render_panel(self, templates, "panels/request_vars.html", &vars)
    }
}
