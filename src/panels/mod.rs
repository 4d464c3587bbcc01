//! Diagnostic panels.
//!
//! # Responsibilities
//! - Define the capability set every panel provides ([`Panel`])
//! - Resolve configured panel names into factories once, at startup
//! - Provide the built-in panels
//!
//! # Data Flow
//! ```text
//! config names ──▶ PanelRegistry::resolve ──▶ PanelSet (factories, ordered)
//!                                                │ one instance per request
//!                                                ▼
//!   observe(request) → wrap_handler(handler) → process_response → render
//! ```
//!
//! # Design Decisions
//! - Panels are plain trait objects; the core never names a concrete panel
//! - Panel instances live for one request, so per-request state needs no keying
//! - Unknown names fail at startup rather than on the first request

pub mod headers;
pub mod logging;
pub mod request_vars;
pub mod settings;
pub mod timer;
pub mod traceback;
pub mod versions;

pub use headers::HeadersPanel;
pub use logging::{LogCollector, LogRecord, LoggingPanel};
pub use request_vars::RequestVarsPanel;
pub use settings::SettingsPanel;
pub use timer::TimerPanel;
pub use traceback::TracebackPanel;
pub use versions::VersionsPanel;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::Response;
use serde::Serialize;
use tera::Context;

use crate::config::{ConfigError, ToolbarConfig};
use crate::error::ToolbarResult;
use crate::toolbar::{ContextSwitcher, Handler};
use crate::ui::templates::Templates;

/// A pluggable diagnostic collector.
///
/// A fresh instance is created for every request the toolbar engages on.
#[async_trait]
pub trait Panel: Send + Sync {
    /// Stable id, also used as the DOM id on the toolbar page.
    fn id(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn nav_title(&self) -> &'static str {
        self.title()
    }

    fn nav_subtitle(&self) -> String {
        String::new()
    }

    fn has_content(&self) -> bool {
        true
    }

    /// Look at the request before the handler runs.
    fn observe(&self, _request: &Request<Body>) {}

    /// Wrap the downstream handler. The returned handler must call the
    /// given one exactly once.
    fn wrap_handler(&self, handler: Handler, _switcher: &mut ContextSwitcher) -> Handler {
        handler
    }

    /// Record response-side data once the handler has settled.
    async fn process_response(
        &self,
        _request: &RequestInfo,
        _response: &ResponseInfo,
    ) -> ToolbarResult<()> {
        Ok(())
    }

    /// Produce the panel's output for the toolbar page.
    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput>;
}

/// Rendered panel, stored with the request record.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PanelOutput {
    pub dom_id: String,
    pub title: String,
    pub nav_title: String,
    pub nav_subtitle: String,
    pub has_content: bool,
    /// HTML fragment shown in the panel section.
    pub content: String,
    /// Raw panel data, exposed through the JSON API.
    pub data: serde_json::Value,
}

/// Render `template` with `data` and wrap it with the panel's metadata.
pub fn render_panel<P, D>(panel: &P, templates: &Templates, template: &str, data: &D) -> ToolbarResult<PanelOutput>
where
    P: Panel + ?Sized,
    D: Serialize,
{
    let context = Context::from_serialize(data)?;
    let content = templates.render(template, &context)?;
    Ok(PanelOutput {
        dom_id: panel.id().to_string(),
        title: panel.title().to_string(),
        nav_title: panel.nav_title().to_string(),
        nav_subtitle: panel.nav_subtitle(),
        has_content: panel.has_content(),
        content,
        data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
    })
}

/// Request metadata that outlives the request itself.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
}

impl RequestInfo {
    pub fn from_request(request: &Request<Body>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            peer: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// Response metadata handed to `process_response`.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseInfo {
    pub fn from_response(response: &Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
        }
    }

    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Render a header map as ordered `(name, value)` pairs.
pub fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Builds one panel instance per request.
pub type PanelFactory = Arc<dyn Fn() -> Box<dyn Panel> + Send + Sync>;

/// Name → factory table, consulted once when the toolbar state is built.
#[derive(Clone, Default)]
pub struct PanelRegistry {
    factories: HashMap<String, PanelFactory>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in panel.
    pub fn with_builtins(config: Arc<ToolbarConfig>, logs: LogCollector) -> Self {
        let mut registry = Self::new();
        registry.register(headers::PANEL_ID, || Box::new(HeadersPanel::new()));
        registry.register(request_vars::PANEL_ID, || Box::new(RequestVarsPanel::new()));
        registry.register(timer::PANEL_ID, || Box::new(TimerPanel::new()));
        registry.register(logging::PANEL_ID, move || Box::new(LoggingPanel::new(logs.clone())));
        registry.register(traceback::PANEL_ID, || Box::new(TracebackPanel::new()));
        registry.register(settings::PANEL_ID, move || Box::new(SettingsPanel::new(config.clone())));
        registry.register(versions::PANEL_ID, || Box::new(VersionsPanel::new()));
        registry
    }

    /// Register (or replace) a factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Panel> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Take over every factory of `other`, replacing same-named ones.
    pub fn merge(&mut self, other: PanelRegistry) {
        self.factories.extend(other.factories);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Look up every name, preserving order.
    pub fn resolve<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<Vec<PanelFactory>, ConfigError> {
        names
            .into_iter()
            .map(|name| {
                self.factories
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownPanel(name.to_string()))
            })
            .collect()
    }
}

/// The resolved, ordered panel factories for one configuration.
#[derive(Clone, Default)]
pub struct PanelSet {
    pub request: Vec<PanelFactory>,
    pub global: Vec<PanelFactory>,
}

impl PanelSet {
    pub fn resolve(registry: &PanelRegistry, config: &ToolbarConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            request: registry.resolve(config.request_panels())?,
            global: registry.resolve(config.global_panels.iter().map(String::as_str))?,
        })
    }

    pub fn instantiate(&self) -> (Vec<Box<dyn Panel>>, Vec<Box<dyn Panel>>) {
        (
            self.request.iter().map(|factory| factory()).collect(),
            self.global.iter().map(|factory| factory()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve_default_config() {
        let config = Arc::new(ToolbarConfig::default());
        let registry = PanelRegistry::with_builtins(config.clone(), LogCollector::new());
        let set = PanelSet::resolve(&registry, &config).unwrap();

        assert_eq!(set.request.len(), 5);
        assert_eq!(set.global.len(), 2);

        let (request, global) = set.instantiate();
        let ids: Vec<&str> = request.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["headers", "request_vars", "timer", "logging", "traceback"]);
        assert_eq!(global[0].id(), "settings");
    }

    #[test]
    fn test_unknown_panel_is_rejected() {
        let config = ToolbarConfig {
            extra_panels: vec!["sql".to_string()],
            ..Default::default()
        };
        let registry = PanelRegistry::with_builtins(Arc::new(config.clone()), LogCollector::new());
        let err = PanelSet::resolve(&registry, &config).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownPanel(name) if name == "sql"));
    }

    #[test]
    fn test_header_pairs_keep_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-a", "1".parse().unwrap());
        headers.insert("x-b", "2".parse().unwrap());
        let pairs = header_pairs(&headers);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&("x-a".to_string(), "1".to_string())));
    }
}
