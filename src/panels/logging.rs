//! `tracing` events emitted while the handler ran.
//!
//! # Design Decisions
//! - The panel instruments the handler with a span tagged with a capture key
//! - [`LogCaptureLayer`] routes every event inside such a span to the buffer
//!   of that key; events outside a capture span are ignored
//! - Without the layer installed the panel simply shows no records

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Instrument, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::error::ToolbarResult;
use crate::panels::{render_panel, Panel, PanelOutput, RequestInfo, ResponseInfo};
use crate::toolbar::{ContextSwitcher, Handler};
use crate::ui::templates::Templates;

pub const PANEL_ID: &str = "logging";

/// Name of the span the panel wraps the handler in.
pub const CAPTURE_SPAN: &str = "debug_toolbar.capture";

const CAPTURE_FIELD: &str = "capture";

/// One captured `tracing` event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogRecord {
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

/// Shared buffers of in-flight captures, keyed by capture key.
#[derive(Clone, Default)]
pub struct LogCollector {
    buffers: Arc<DashMap<u64, Vec<LogRecord>>>,
    next_key: Arc<AtomicU64>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The subscriber layer feeding this collector.
    pub fn layer(&self) -> LogCaptureLayer {
        LogCaptureLayer {
            buffers: self.buffers.clone(),
        }
    }

    /// Open a new capture buffer.
    pub fn begin(&self) -> u64 {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.buffers.insert(key, Vec::new());
        key
    }

    /// Close a capture and return what it collected.
    pub fn take(&self, key: u64) -> Vec<LogRecord> {
        self.buffers.remove(&key).map(|(_, records)| records).unwrap_or_default()
    }

    /// Number of captures still open.
    pub fn open_captures(&self) -> usize {
        self.buffers.len()
    }
}

impl fmt::Debug for LogCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogCollector")
            .field("open_captures", &self.open_captures())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct CaptureKey(u64);

/// `tracing_subscriber` layer that copies events into capture buffers.
pub struct LogCaptureLayer {
    buffers: Arc<DashMap<u64, Vec<LogRecord>>>,
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != CAPTURE_SPAN {
            return;
        }
        let mut visitor = KeyVisitor(None);
        attrs.record(&mut visitor);
        if let (Some(key), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(CaptureKey(key));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(scope) = ctx.event_scope(event) else {
            return;
        };
        for span in scope {
            let key = span.extensions().get::<CaptureKey>().copied();
            if let Some(CaptureKey(key)) = key {
                if let Some(mut buffer) = self.buffers.get_mut(&key) {
                    buffer.push(record_event(event));
                }
                return;
            }
        }
    }
}

fn record_event(event: &Event<'_>) -> LogRecord {
    let mut visitor = EventVisitor::default();
    event.record(&mut visitor);
    let metadata = event.metadata();
    LogRecord {
        level: metadata.level().to_string(),
        target: metadata.target().to_string(),
        message: visitor.message,
        fields: visitor.fields,
    }
}

struct KeyVisitor(Option<u64>);

impl Visit for KeyVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == CAPTURE_FIELD {
            self.0 = Some(value);
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message.push_str(&format!("{:?}", value));
        } else {
            self.fields.push((field.name().to_string(), format!("{:?}", value)));
        }
    }
}

#[derive(Debug, Serialize)]
struct LoggingData<'a> {
    records: &'a [LogRecord],
}

pub struct LoggingPanel {
    collector: LogCollector,
    key: Mutex<Option<u64>>,
    records: Mutex<Vec<LogRecord>>,
}

impl LoggingPanel {
    pub fn new(collector: LogCollector) -> Self {
        Self {
            collector,
            key: Mutex::new(None),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl Panel for LoggingPanel {
    fn id(&self) -> &'static str {
        PANEL_ID
    }

    fn title(&self) -> &'static str {
        "Log Messages"
    }

    fn nav_title(&self) -> &'static str {
        "Logging"
    }

    fn nav_subtitle(&self) -> String {
        format!("{} events", self.records.lock().len())
    }

    fn wrap_handler(&self, handler: Handler, _switcher: &mut ContextSwitcher) -> Handler {
        let key = self.collector.begin();
        *self.key.lock() = Some(key);
        let span = tracing::info_span!(CAPTURE_SPAN, capture = key);
        Box::new(move |request| Box::pin(handler(request).instrument(span)))
    }

    async fn process_response(&self, _request: &RequestInfo, _response: &ResponseInfo) -> ToolbarResult<()> {
        if let Some(key) = self.key.lock().take() {
            *self.records.lock() = self.collector.take(key);
        }
        Ok(())
    }

    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput> {
        let records = self.records();
        render_panel(self, templates, "panels/logging.html", &LoggingData { records: &records })
    }
}

impl Drop for LoggingPanel {
    fn drop(&mut self) {
        // cancelled requests never reach process_response
        if let Some(key) = self.key.get_mut().take() {
            self.collector.take(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::response::Response;
    use tracing_subscriber::layer::SubscriberExt;

    fn response_info() -> ResponseInfo {
        ResponseInfo {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn test_captures_only_handler_events() {
        let collector = LogCollector::new();
        let subscriber = tracing_subscriber::registry().with(collector.layer());
        let _guard = tracing::subscriber::set_default(subscriber);

        let panel = LoggingPanel::new(collector.clone());
        let handler: Handler = Box::new(|_request| {
            Box::pin(async {
                tracing::warn!(user_id = 7, "slow query");
                Ok(Response::new(Body::empty()))
            })
        });
        let handler = panel.wrap_handler(handler, &mut ContextSwitcher::new());

        tracing::info!("outside the handler");
        handler(Request::new(Body::empty())).await.unwrap();
        tracing::info!("after the handler");

        let request = RequestInfo::from_request(&Request::new(Body::empty()));
        panel.process_response(&request, &response_info()).await.unwrap();

        let records = panel.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, "WARN");
        assert_eq!(records[0].message, "slow query");
        assert_eq!(records[0].fields, vec![("user_id".to_string(), "7".to_string())]);
        assert_eq!(collector.open_captures(), 0);

        let templates = Templates::new("/_debugtoolbar").unwrap();
        let output = panel.render(&templates).unwrap();
        assert_eq!(output.nav_subtitle, "1 events");
        assert!(output.content.contains("slow query"));
    }

    #[test]
    fn test_dropped_panel_releases_buffer() {
        let collector = LogCollector::new();
        {
            let panel = LoggingPanel::new(collector.clone());
            let handler: Handler = Box::new(|_request| Box::pin(async { Ok(Response::new(Body::empty())) }));
            let _wrapped = panel.wrap_handler(handler, &mut ContextSwitcher::new());
            assert_eq!(collector.open_captures(), 1);
        }
        assert_eq!(collector.open_captures(), 0);
    }

    #[test]
    fn test_concurrent_captures_are_separate() {
        let collector = LogCollector::new();
        let a = collector.begin();
        let b = collector.begin();
        assert_ne!(a, b);
        assert!(collector.take(a).is_empty());
        assert_eq!(collector.open_captures(), 1);
        collector.take(b);
    }
}
