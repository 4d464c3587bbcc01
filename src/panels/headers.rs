//! Request and response headers.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ToolbarResult;
use crate::panels::{header_pairs, render_panel, Panel, PanelOutput, RequestInfo, ResponseInfo};
use crate::ui::templates::Templates;

pub const PANEL_ID: &str = "headers";

#[derive(Debug, Default, Serialize)]
struct HeadersData {
    request_headers: Vec<(String, String)>,
    response_headers: Vec<(String, String)>,
}

#[derive(Default)]
pub struct HeadersPanel {
    data: Mutex<HeadersData>,
}

impl HeadersPanel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Panel for HeadersPanel {
    fn id(&self) -> &'static str {
        PANEL_ID
    }

    fn title(&self) -> &'static str {
        "HTTP Headers"
    }

    fn nav_title(&self) -> &'static str {
        "Headers"
    }

    fn observe(&self, request: &Request<Body>) {
        self.data.lock().request_headers = header_pairs(request.headers());
    }

    async fn process_response(&self, _request: &RequestInfo, response: &ResponseInfo) -> ToolbarResult<()> {
        self.data.lock().response_headers = header_pairs(&response.headers);
        Ok(())
    }

    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput> {
        let data = self.data.lock();
        render_panel(self, templates, "panels/headers.html", &*data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};

    #[tokio::test]
    async fn test_collects_both_sides() {
        let panel = HeadersPanel::new();
        let request = Request::builder()
            .header("x-trace", "abc")
            .body(Body::empty())
            .unwrap();
        panel.observe(&request);

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/html".parse().unwrap());
        let response = ResponseInfo {
            status: StatusCode::OK,
            headers,
        };
        panel
            .process_response(&RequestInfo::from_request(&request), &response)
            .await
            .unwrap();

        let templates = Templates::new("/_debugtoolbar").unwrap();
        let output = panel.render(&templates).unwrap();
        assert_eq!(output.dom_id, "headers");
        assert!(output.content.contains("x-trace"));
        assert!(output.content.contains("content-type"));
        assert_eq!(output.data["request_headers"][0][1], "abc");
    }
}
