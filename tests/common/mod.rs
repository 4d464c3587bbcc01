//! Shared utilities for the middleware and end-to-end tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use debug_toolbar::panels::{Panel, PanelOutput, RequestInfo, ResponseInfo};
use debug_toolbar::toolbar::{ContextSwitcher, Handler};
use debug_toolbar::ui::Templates;
use debug_toolbar::{ToolbarConfig, ToolbarError, ToolbarResult, ToolbarState};

pub const LOCAL_PEER: &str = "127.0.0.1:50000";

/// GET request from the local peer.
pub fn get(path: &str) -> Request<Body> {
    from_peer(path, LOCAL_PEER)
}

/// GET request with an explicit transport peer.
pub fn from_peer(path: &str, peer: &str) -> Request<Body> {
    let mut request = Request::builder().uri(path).body(Body::empty()).unwrap();
    let peer: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

pub fn state(config: ToolbarConfig) -> ToolbarState {
    ToolbarState::new(config).unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Counts handler invocations.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a [`MockPanel`] misbehaves in `process_response`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    None,
    Error,
    Panic,
}

/// Panel that logs every call it receives into a shared event list.
pub struct MockPanel {
    name: &'static str,
    events: Arc<Mutex<Vec<String>>>,
    failure: Failure,
}

impl MockPanel {
    pub fn new(name: &'static str, events: Arc<Mutex<Vec<String>>>, failure: Failure) -> Self {
        Self { name, events, failure }
    }

    fn push(&self, event: &str) {
        self.events.lock().push(format!("{event}:{}", self.name));
    }
}

#[async_trait]
impl Panel for MockPanel {
    fn id(&self) -> &'static str {
        self.name
    }

    fn title(&self) -> &'static str {
        "Mock"
    }

    fn observe(&self, _request: &Request<Body>) {
        self.push("observe");
    }

    fn wrap_handler(&self, handler: Handler, _switcher: &mut ContextSwitcher) -> Handler {
        let name = self.name;
        let events = self.events.clone();
        Box::new(move |request| {
            events.lock().push(format!("before:{name}"));
            Box::pin(async move {
                let result = handler(request).await;
                events.lock().push(format!("after:{name}"));
                result
            })
        })
    }

    async fn process_response(&self, _request: &RequestInfo, _response: &ResponseInfo) -> ToolbarResult<()> {
        self.push("finalize");
        match self.failure {
            Failure::None => Ok(()),
            Failure::Error => Err(ToolbarError::Panel {
                panel: self.name,
                message: "mock failure".to_string(),
            }),
            Failure::Panic => panic!("mock panel {} panicked", self.name),
        }
    }

    fn render(&self, _templates: &Templates) -> ToolbarResult<PanelOutput> {
        self.push("render");
        Ok(PanelOutput {
            dom_id: self.name.to_string(),
            title: "Mock".to_string(),
            nav_title: "Mock".to_string(),
            nav_subtitle: String::new(),
            has_content: true,
            content: format!("<p>{}</p>", self.name),
            data: serde_json::Value::Null,
        })
    }
}

/// Names usable as panel ids for `count` mock panels.
pub fn mock_names(count: usize) -> Vec<&'static str> {
    ["mock0", "mock1", "mock2", "mock3", "mock4", "mock5", "mock6", "mock7"][..count].to_vec()
}

/// State whose request panels are exactly the given mock panels.
pub fn state_with_mocks(
    config: ToolbarConfig,
    panels: &[(&'static str, Failure)],
    events: &Arc<Mutex<Vec<String>>>,
) -> ToolbarState {
    let config = ToolbarConfig {
        panels: panels.iter().map(|(name, _)| name.to_string()).collect(),
        ..config
    };
    let mut builder = ToolbarState::builder(config);
    for &(name, failure) in panels {
        let events = events.clone();
        builder = builder.register_panel(name, move || Box::new(MockPanel::new(name, events.clone(), failure)));
    }
    builder.build().unwrap()
}

/// Bind an ephemeral port on localhost.
pub async fn local_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}
