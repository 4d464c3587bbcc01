//! HTML injection of the floating toolbar button.

use axum::body::Body;
use axum::http::{header, HeaderMap};
use axum::response::Response;
use http_body_util::BodyExt;

use crate::error::{ToolbarError, ToolbarResult};

/// Content types the toolbar is injected into.
pub const HTML_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

const BODY_CLOSE: &[u8] = b"</body>";

/// True when the `Content-Type` names an HTML-family type.
pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|essence| {
            let essence = essence.trim();
            HTML_TYPES.iter().any(|t| essence.eq_ignore_ascii_case(t))
        })
        .unwrap_or(false)
}

/// True when the body is sent with a `Content-Encoding` other than `identity`.
pub fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| !coding.trim().eq_ignore_ascii_case("identity"))
}

/// HTML sent as plain bytes; compressed bodies cannot be spliced.
pub fn is_injectable(headers: &HeaderMap) -> bool {
    is_html(headers) && !is_encoded(headers)
}

/// Insert `fragment` before the last `</body>` (any case), or append it.
pub fn inject_markup(body: &[u8], fragment: &[u8]) -> Vec<u8> {
    let position = body
        .windows(BODY_CLOSE.len())
        .rposition(|window| window.eq_ignore_ascii_case(BODY_CLOSE))
        .unwrap_or(body.len());

    let mut out = Vec::with_capacity(body.len() + fragment.len());
    out.extend_from_slice(&body[..position]);
    out.extend_from_slice(fragment);
    out.extend_from_slice(&body[position..]);
    out
}

/// Rewrite an HTML response body with `fragment` injected.
///
/// Non-HTML and content-encoded responses are returned untouched.
pub async fn inject_response(response: Response, fragment: &str) -> ToolbarResult<Response> {
    if !is_injectable(response.headers()) {
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| ToolbarError::Body(e.to_string()))?
        .to_bytes();

    let injected = inject_markup(&bytes, fragment.as_bytes());
    parts.headers.remove(header::CONTENT_LENGTH);
    Ok(Response::from_parts(parts, Body::from(injected)))
}
