use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tera::Context;

use crate::error::ToolbarError;
use crate::history::RequestSummary;
use crate::state::ToolbarState;
use crate::traceback::Frame;
use crate::ui::templates::{HISTORY_TEMPLATE, REQUEST_TEMPLATE, TOOLBAR_CSS};

#[derive(Serialize)]
pub struct FrameSource<'a> {
    pub traceback_id: &'a str,
    pub frame: &'a Frame,
    /// Whole source file, when it can still be read.
    pub source: Option<String>,
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("{what} not found")).into_response()
}

pub async fn index(State(state): State<ToolbarState>) -> Result<Html<String>, ToolbarError> {
    let requests: Vec<RequestSummary> = state
        .requests()
        .recent(state.config().max_visible_requests)
        .into_iter()
        .map(|(_, record)| record.summary())
        .collect();

    let mut context = Context::new();
    context.insert("requests", &requests);
    Ok(Html(state.templates().render(HISTORY_TEMPLATE, &context)?))
}

pub async fn request_page(State(state): State<ToolbarState>, Path(id): Path<String>) -> Response {
    let Some(record) = state.requests().get(&id) else {
        return not_found("Request");
    };
    let mut context = Context::new();
    context.insert("record", record.as_ref());
    match state.templates().render(REQUEST_TEMPLATE, &context) {
        Ok(html) => Html(html).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn exception_page(State(state): State<ToolbarState>, Path(id): Path<String>) -> Response {
    let Some(traceback) = state.exceptions().get(&id) else {
        return not_found("Traceback");
    };
    match traceback.render_full(state.templates()) {
        Ok(html) => Html(html).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn frame_source(
    State(state): State<ToolbarState>,
    Path((id, index)): Path<(String, usize)>,
) -> Response {
    let Some(traceback) = state.exceptions().get(&id) else {
        return not_found("Traceback");
    };
    let Some(frame) = traceback.frame(index) else {
        return not_found("Frame");
    };

    let source = match &frame.file {
        Some(file) => tokio::fs::read_to_string(file).await.ok(),
        None => None,
    };
    Json(FrameSource {
        traceback_id: &traceback.id,
        frame,
        source,
    })
    .into_response()
}

pub async fn api_requests(State(state): State<ToolbarState>) -> Json<Vec<RequestSummary>> {
    let requests = state.requests();
    Json(
        requests
            .recent(requests.len())
            .into_iter()
            .map(|(_, record)| record.summary())
            .collect(),
    )
}

pub async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], TOOLBAR_CSS)
}
