//! Interception middleware.
//!
//! # Responsibilities
//! - Decide whether the toolbar engages on a request
//! - Run the wrapped handler once, catching panics
//! - Classify the outcome and turn redirects and failures into toolbar pages
//! - Record finished requests and inject the toolbar button
//!
//! # Data Flow
//! ```text
//! request ──▶ engagement rules ──(bypass)──────────────────────────▶ handler
//!                  │
//!                  ▼
//!   Toolbar::from_set → observe → wrap → ContextSwitcher::run(handler)
//!                  │
//!                  ▼
//!   Outcome::classify ─┬─ Response  → (redirect page) → finalize → record → inject
//!                      ├─ Redirect  → redirect page   → finalize → record → inject
//!                      ├─ Terminal  → propagate
//!                      └─ Failure   → traceback page  → finalize → record → inject
//! ```
//!
//! # Design Decisions
//! - Two adapters share one `handle`: a tower layer and an axum `from_fn`
//! - Nothing is stored when the request future is dropped mid-flight

use std::future::Future;
use std::net::SocketAddr;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use tower::{Layer, Service};
use uuid::Uuid;

use crate::error::{BoxError, ToolbarError, ToolbarResult};
use crate::history::RequestRecord;
use crate::http::diagnostics::Diagnostics;
use crate::http::outcome::{error_response, is_redirect, Outcome, Raised, RedirectContext};
use crate::observability::metrics;
use crate::panels::{RequestInfo, ResponseInfo};
use crate::state::ToolbarState;
use crate::toolbar::{ContextSwitcher, Handler, Toolbar};
use crate::traceback::{CaptureOptions, ExceptionInfo, Traceback};
use crate::ui::templates::{Templates, REDIRECT_TEMPLATE};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Run one request through the toolbar.
///
/// `next` is called at most once. Failures that are not intercepted come
/// back as [`Raised`], unchanged.
pub async fn handle(state: &ToolbarState, mut request: Request, next: Handler) -> Result<Response, Raised> {
    let config = state.config();
    let policy = state.policy();
    let path = request.uri().path().to_string();

    // 1. Disabled, toolbar UI or excluded prefix: delegate untouched
    if !config.enabled || policy.is_excluded(&path) {
        return next(request).await.map_err(Raised::Error);
    }

    // 2. Host check against the transport peer
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    if !policy.peer_allowed(peer) {
        tracing::debug!(path = %path, peer = ?peer, "Peer not allowed, toolbar bypassed");
        return next(request).await.map_err(Raised::Error);
    }

    // 3. Per-request toolbar and diagnostics side channel
    let request_id = Uuid::new_v4().simple().to_string();
    let diagnostics = Diagnostics::new();
    diagnostics.set_request_id(&request_id);
    request.extensions_mut().insert(diagnostics.clone());
    let request_info = RequestInfo::from_request(&request);

    let toolbar = Toolbar::from_set(state.panels());
    toolbar.observe(&request);
    let mut switcher = ContextSwitcher::new();
    let handler = toolbar.wrap(next, &mut switcher);

    // 4. Run the handler once; a panic in any wrapper is caught too
    let result = AssertUnwindSafe(switcher.run(async move { handler(request).await }))
        .catch_unwind()
        .await;

    let exchange = Exchange {
        state,
        toolbar,
        request: request_info,
        request_id,
        diagnostics,
    };

    // 5. Classify and answer
    match Outcome::classify(result) {
        Outcome::Response(response) => {
            let (response, outcome) = match redirect_location(&response) {
                Some(location) if config.intercept_redirects => {
                    let status = response.status();
                    (intercept_redirect(state.templates(), location, status, response), "redirect")
                }
                _ => (response, "response"),
            };
            metrics::record_request(outcome);
            Ok(exchange.complete(response, None).await)
        }
        Outcome::Redirect(redirect) => match redirect.location.clone() {
            Some(location) if config.intercept_redirects => {
                let status = redirect.status;
                let page = intercept_redirect(state.templates(), location, status, redirect.into_response());
                metrics::record_request("redirect");
                Ok(exchange.complete(page, None).await)
            }
            _ => {
                metrics::record_request("propagated");
                Err(Raised::Error(Box::new(redirect)))
            }
        },
        Outcome::Terminal(error) => {
            metrics::record_request("propagated");
            Err(Raised::Error(error))
        }
        Outcome::Failure { info, origin } => {
            if !config.intercept_exc {
                tracing::debug!(path = %path, exception = %info.message, "Exception interception disabled");
                metrics::record_request("propagated");
                return origin.reraise();
            }
            metrics::record_request("exception");
            Ok(exchange.exception(info).await)
        }
    }
}

/// Everything needed to finish an engaged request.
struct Exchange<'a> {
    state: &'a ToolbarState,
    toolbar: Toolbar,
    request: RequestInfo,
    request_id: String,
    diagnostics: Diagnostics,
}

impl Exchange<'_> {
    /// Capture the failure and answer with the traceback page.
    async fn exception(self, info: ExceptionInfo) -> Response {
        let config = self.state.config();
        let options = CaptureOptions {
            skip: config.skip_frames,
            show_hidden_frames: config.show_hidden_frames,
        };
        let traceback = Traceback::capture(info, options, Some(&self.diagnostics), Some(&self.request_id));
        let summary = traceback.summary();

        tracing::error!(
            request_id = %self.request_id,
            path = %self.request.path(),
            traceback_id = %traceback.id,
            frames = traceback.frames.len(),
            exception = %summary,
            "Exception captured"
        );
        metrics::record_exception();

        let traceback = self.state.exceptions().put(traceback.id.clone(), traceback);
        self.diagnostics.set_traceback(&traceback.id, &summary);

        let html = traceback.render_full(self.state.templates()).unwrap_or_else(|e| {
            tracing::warn!(traceback_id = %traceback.id, error = %e, "Traceback page failed to render");
            format!("<html><body><pre>{}</pre></body></html>", tera::escape_html(&summary))
        });
        let response = (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)],
            html,
        )
            .into_response();

        self.complete(response, Some(traceback.id.clone())).await
    }

    /// Finalize the panels, store the record and inject the toolbar.
    async fn complete(mut self, response: Response, traceback_id: Option<String>) -> Response {
        let state = self.state;
        let config = state.config();
        let response_info = ResponseInfo::from_response(&response);
        let (panels, global_panels) = self
            .toolbar
            .finalize(&self.request, &response_info, state.templates())
            .await;

        let failed = traceback_id.is_some();
        let path = self.request.path().to_string();
        if !failed && !state.policy().should_record(&path) {
            return response;
        }

        state.requests().put(
            self.request_id.clone(),
            RequestRecord {
                id: self.request_id.clone(),
                method: self.request.method.to_string(),
                path: path.clone(),
                status: response_info.status.as_u16(),
                panels,
                global_panels,
                traceback_id,
            },
        );
        tracing::debug!(
            request_id = %self.request_id,
            path = %path,
            status = response_info.status.as_u16(),
            "Request recorded"
        );

        if config.show_on_exc_only && !failed {
            return response;
        }
        match self
            .toolbar
            .inject(response, state.templates(), config, &self.request_id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id = %self.request_id, error = %e, "Toolbar injection failed");
                e.into_response()
            }
        }
    }
}

/// `Location` of a redirect-status response.
fn redirect_location(response: &Response) -> Option<String> {
    if !is_redirect(response.status()) {
        return None;
    }
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// The redirect confirmation page, or `original` if it cannot be rendered.
fn intercept_redirect(templates: &Templates, location: String, status: StatusCode, original: Response) -> Response {
    match redirect_page(templates, location, status) {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(error = %e, "Redirect page failed to render, passing redirect through");
            original
        }
    }
}

/// 200 page linking to the redirect target instead of following it.
pub fn redirect_page(templates: &Templates, location: String, status: StatusCode) -> ToolbarResult<Response> {
    let mut context = tera::Context::new();
    context.insert("redirect_to", &location);
    context.insert("redirect_code", &status.as_u16());
    let html = templates.render(REDIRECT_TEMPLATE, &context)?;

    let mut response = (StatusCode::OK, [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], html).into_response();
    response.extensions_mut().insert(RedirectContext {
        redirect_to: location,
        redirect_code: status.as_u16(),
    });
    Ok(response)
}

/// Tower layer installing the toolbar around a service.
///
/// The wrapped service's errors become `BoxError`; pair it with
/// `HandleErrorLayer::new(handle_error)` when layering an axum `Router`.
#[derive(Clone, Debug)]
pub struct DebugToolbarLayer {
    state: ToolbarState,
}

impl DebugToolbarLayer {
    pub fn new(state: ToolbarState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for DebugToolbarLayer {
    type Service = DebugToolbarService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DebugToolbarService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DebugToolbarService<S> {
    inner: S,
    state: ToolbarState,
}

impl<S> Service<Request<Body>> for DebugToolbarService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // the clone may not be ready; keep the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let state = self.state.clone();

        Box::pin(async move {
            let next: Handler = Box::new(move |request| {
                Box::pin(async move { inner.call(request).await.map_err(Into::into) })
            });
            match handle(&state, request, next).await {
                Ok(response) => Ok(response),
                Err(Raised::Error(error)) => Err(error),
                Err(Raised::Panic(payload)) => resume_unwind(payload),
            }
        })
    }
}

/// `axum::middleware::from_fn` adapter.
///
/// Reads the [`ToolbarState`] from the request extensions; install it with
/// `Extension(state)` outside this middleware.
pub async fn debug_toolbar_middleware(request: Request, next: Next) -> Response {
    let Some(state) = request.extensions().get::<ToolbarState>().cloned() else {
        return ToolbarError::NotInitialized.into_response();
    };

    let handler: Handler = Box::new(move |request| Box::pin(async move { Ok(next.run(request).await) }));
    match handle(&state, request, handler).await {
        Ok(response) => response,
        Err(Raised::Error(error)) => error_response(error),
        Err(Raised::Panic(payload)) => resume_unwind(payload),
    }
}
