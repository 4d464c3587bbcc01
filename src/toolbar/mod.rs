//! Per-request toolbar controller.
//!
//! # Responsibilities
//! - Own the panel instances for one request
//! - Compose the panels' handler wrappers into one callable
//! - Finalize every panel once the handler settled, isolating failures
//! - Inject the toolbar button into HTML responses
//!
//! # Design Decisions
//! - Wrappers are folded from the last panel to the first, so the first
//!   registered panel is outermost and its "before" logic runs first
//! - A failing panel is dropped from the output; the response never changes
//!   because of a panel

pub mod inject;
pub mod switcher;

pub use inject::{inject_markup, is_html, is_injectable, HTML_TYPES};
pub use switcher::{ContextSwitcher, Switched};

use std::panic::{self, AssertUnwindSafe};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tera::Context;

use crate::config::ToolbarConfig;
use crate::error::{BoxError, ToolbarResult};
use crate::panels::{Panel, PanelOutput, PanelSet, RequestInfo, ResponseInfo};
use crate::traceback::capture::{payload_message, take_panic};
use crate::ui::templates::{Templates, TOOLBAR_TEMPLATE};

/// Future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, Result<Response, BoxError>>;

/// The downstream handler. `FnOnce` so it can only ever be called once.
pub type Handler = Box<dyn FnOnce(Request<Body>) -> HandlerFuture + Send>;

/// Panels engaged for one request.
pub struct Toolbar {
    panels: Vec<Box<dyn Panel>>,
    global_panels: Vec<Box<dyn Panel>>,
    status: Option<StatusCode>,
}

impl Toolbar {
    pub fn new(panels: Vec<Box<dyn Panel>>, global_panels: Vec<Box<dyn Panel>>) -> Self {
        Self {
            panels,
            global_panels,
            status: None,
        }
    }

    /// Fresh panel instances from the resolved factories.
    pub fn from_set(set: &PanelSet) -> Self {
        let (panels, global_panels) = set.instantiate();
        Self::new(panels, global_panels)
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    /// Status of the finalized response.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Let every request panel look at the request, in registration order.
    pub fn observe(&self, request: &Request<Body>) {
        for panel in &self.panels {
            panel.observe(request);
        }
    }

    /// Wrap `handler` with every request panel.
    ///
    /// Each panel registers its switch hooks on its own switcher; those are
    /// merged into `switcher` in registration order.
    pub fn wrap(&self, handler: Handler, switcher: &mut ContextSwitcher) -> Handler {
        let mut handler = handler;
        let mut hooks = Vec::with_capacity(self.panels.len());
        for panel in self.panels.iter().rev() {
            let mut local = ContextSwitcher::new();
            handler = panel.wrap_handler(handler, &mut local);
            hooks.push(local);
        }
        for local in hooks.into_iter().rev() {
            switcher.extend(local);
        }
        handler
    }

    /// Run `process_response` and `render` on every panel, request panels
    /// first. Returns `(request outputs, global outputs)`.
    pub async fn finalize(
        &mut self,
        request: &RequestInfo,
        response: &ResponseInfo,
        templates: &Templates,
    ) -> (Vec<PanelOutput>, Vec<PanelOutput>) {
        self.status = Some(response.status);

        let mut outputs = Vec::with_capacity(self.panels.len());
        for panel in &self.panels {
            if let Some(output) = finalize_panel(panel.as_ref(), request, response, templates).await {
                outputs.push(output);
            }
        }

        let mut global_outputs = Vec::with_capacity(self.global_panels.len());
        for panel in &self.global_panels {
            if let Some(output) = finalize_panel(panel.as_ref(), request, response, templates).await {
                global_outputs.push(output);
            }
        }

        (outputs, global_outputs)
    }

    /// Insert the toolbar button for `request_id` into an HTML response.
    pub async fn inject(
        &self,
        response: Response,
        templates: &Templates,
        config: &ToolbarConfig,
        request_id: &str,
    ) -> ToolbarResult<Response> {
        if !is_injectable(response.headers()) {
            return Ok(response);
        }
        let fragment = render_fragment(templates, config, request_id)?;
        inject::inject_response(response, &fragment).await
    }
}

/// The markup injected into HTML pages.
pub fn render_fragment(templates: &Templates, config: &ToolbarConfig, request_id: &str) -> ToolbarResult<String> {
    let mut context = Context::new();
    context.insert("css_path", &config.css_path());
    context.insert("toolbar_url", &config.toolbar_url(request_id));
    context.insert("button_style", &config.button_style);
    templates.render(TOOLBAR_TEMPLATE, &context)
}

async fn finalize_panel(
    panel: &dyn Panel,
    request: &RequestInfo,
    response: &ResponseInfo,
    templates: &Templates,
) -> Option<PanelOutput> {
    let processed = AssertUnwindSafe(panel.process_response(request, response))
        .catch_unwind()
        .await;
    match processed {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(panel = panel.id(), error = %e, "Panel failed to process response");
            return None;
        }
        Err(payload) => {
            // the hook recorded this panic too; it must not leak into a later capture
            take_panic();
            tracing::warn!(
                panel = panel.id(),
                panic = %payload_message(payload.as_ref()),
                "Panel panicked while processing response"
            );
            return None;
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(|| panel.render(templates))) {
        Ok(Ok(output)) => Some(output),
        Ok(Err(e)) => {
            tracing::warn!(panel = panel.id(), error = %e, "Panel failed to render");
            None
        }
        Err(payload) => {
            take_panic();
            tracing::warn!(
                panel = panel.id(),
                panic = %payload_message(payload.as_ref()),
                "Panel panicked while rendering"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolbarError;
    use async_trait::async_trait;
    use axum::http::HeaderMap;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Copy, PartialEq)]
    enum Fail {
        Never,
        Error,
        Panic,
    }

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: Fail,
    }

    #[async_trait]
    impl Panel for Recording {
        fn id(&self) -> &'static str {
            self.name
        }

        fn title(&self) -> &'static str {
            self.name
        }

        fn observe(&self, _request: &Request<Body>) {
            self.log.lock().push(format!("observe:{}", self.name));
        }

        fn wrap_handler(&self, handler: Handler, switcher: &mut ContextSwitcher) -> Handler {
            let name = self.name;
            let hook_log = self.log.clone();
            switcher.on_switch_in(move || hook_log.lock().push(format!("in:{name}")));

            let log = self.log.clone();
            Box::new(move |request| {
                log.lock().push(format!("before:{name}"));
                Box::pin(async move {
                    let result = handler(request).await;
                    log.lock().push(format!("after:{name}"));
                    result
                })
            })
        }

        async fn process_response(&self, _request: &RequestInfo, _response: &ResponseInfo) -> ToolbarResult<()> {
            self.log.lock().push(format!("finalize:{}", self.name));
            match self.fail {
                Fail::Never => Ok(()),
                Fail::Error => Err(ToolbarError::Panel {
                    panel: self.name,
                    message: "broken".to_string(),
                }),
                Fail::Panic => panic!("panel {} exploded", self.name),
            }
        }

        fn render(&self, _templates: &Templates) -> ToolbarResult<PanelOutput> {
            Ok(PanelOutput {
                dom_id: self.name.to_string(),
                title: self.name.to_string(),
                nav_title: self.name.to_string(),
                nav_subtitle: String::new(),
                has_content: true,
                content: String::new(),
                data: serde_json::Value::Null,
            })
        }
    }

    fn toolbar(names: &[(&'static str, Fail)], log: &Arc<Mutex<Vec<String>>>) -> Toolbar {
        let panels = names
            .iter()
            .map(|&(name, fail)| {
                Box::new(Recording {
                    name,
                    log: log.clone(),
                    fail,
                }) as Box<dyn Panel>
            })
            .collect();
        Toolbar::new(panels, Vec::new())
    }

    fn request_info() -> RequestInfo {
        RequestInfo::from_request(&Request::new(Body::empty()))
    }

    fn ok_handler(log: Arc<Mutex<Vec<String>>>) -> Handler {
        Box::new(move |_request| {
            Box::pin(async move {
                log.lock().push("handler".to_string());
                Ok(Response::new(Body::from("ok")))
            })
        })
    }

    #[tokio::test]
    async fn test_first_panel_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let toolbar = toolbar(&[("a", Fail::Never), ("b", Fail::Never), ("c", Fail::Never)], &log);

        let request = Request::new(Body::empty());
        toolbar.observe(&request);
        let mut switcher = ContextSwitcher::new();
        let handler = toolbar.wrap(ok_handler(log.clone()), &mut switcher);
        let response = switcher.run(async move { handler(request).await }).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            *log.lock(),
            vec![
                "observe:a", "observe:b", "observe:c", "in:a", "in:b", "in:c", "before:a", "before:b",
                "before:c", "handler", "after:c", "after:b", "after:a",
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_panels_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut toolbar = toolbar(&[("a", Fail::Error), ("b", Fail::Panic), ("c", Fail::Never)], &log);
        let templates = Templates::new("/_debugtoolbar").unwrap();
        let response = ResponseInfo {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        };

        let (outputs, globals) = toolbar.finalize(&request_info(), &response, &templates).await;

        let ids: Vec<&str> = outputs.iter().map(|o| o.dom_id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        assert!(globals.is_empty());
        assert_eq!(*log.lock(), vec!["finalize:a", "finalize:b", "finalize:c"]);
        assert_eq!(toolbar.status(), Some(StatusCode::OK));
        assert!(take_panic().is_none());
    }

    #[tokio::test]
    async fn test_inject_uses_toolbar_url() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let toolbar = toolbar(&[], &log);
        let templates = Templates::new("/_debugtoolbar").unwrap();
        let config = ToolbarConfig::default();
        let response = Response::builder()
            .header("content-type", "text/html")
            .body(Body::from("<html><body></body></html>"))
            .unwrap();

        let response = toolbar.inject(response, &templates, &config, "abc").await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("pDebug"));
        assert!(body.contains("&#x2F;_debugtoolbar&#x2F;requests&#x2F;abc"));
        assert!(body.ends_with("</body></html>"));
    }
}
