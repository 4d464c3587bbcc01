//! Debug toolbar demo server.
//!
//! Serves a small axum application wrapped by the toolbar, with the toolbar
//! UI mounted at `path_prefix`.
//!
//! ```text
//! GET /           HTML page (toolbar injected)
//! GET /redirect   302 to / (intercepted)
//! GET /panic      handler panic (traceback page)
//! GET /error      HandlerError (traceback page)
//! GET /forbidden  HttpException 403 (propagated)
//! GET /json       JSON body (no injection)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use debug_toolbar::config::load_config;
use debug_toolbar::observability::logging::init_tracing;
use debug_toolbar::{
    handle_error, ui, DebugToolbarLayer, Diagnostics, HandlerError, HttpException, LogCollector, ToolbarConfig,
    ToolbarState,
};

#[derive(Debug, Parser)]
#[command(name = "debug-toolbar", version, about = "Debug toolbar demo server")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:6543")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let collector = LogCollector::new();
    init_tracing(None, Some(&collector))?;

    tracing::info!("debug-toolbar v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ToolbarConfig::default(),
    };
    let state = ToolbarState::builder(config).log_collector(collector).build()?;

    tracing::info!(
        root_path = %state.config().root_path(),
        intercept_exc = state.config().intercept_exc,
        intercept_redirects = state.config().intercept_redirects,
        "Configuration loaded"
    );

    let app = ui::attach(demo_routes(&state), &state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(cli.bind).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        toolbar = %format!("http://{}{}", local_addr, state.config().root_path()),
        "Listening for connections"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_routes(state: &ToolbarState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/redirect", get(|| async { Redirect::to("/") }))
        .route("/panic", get(panics))
        .route("/error", get(fails))
        .route("/forbidden", get(forbidden))
        .route("/json", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_error))
                .layer(DebugToolbarLayer::new(state.clone())),
        )
}

async fn home(diagnostics: Diagnostics) -> Html<&'static str> {
    diagnostics.insert("greeting", "hello");
    tracing::info!(page = "home", "Rendering home page");
    Html(
        "<!doctype html><html><head><title>Demo</title></head><body>\
         <h1>debug-toolbar demo</h1>\
         <ul><li><a href=\"/redirect\">redirect</a></li><li><a href=\"/panic\">panic</a></li>\
         <li><a href=\"/error\">error</a></li><li><a href=\"/forbidden\">forbidden</a></li>\
         <li><a href=\"/json\">json</a></li></ul></body></html>",
    )
}

async fn panics(diagnostics: Diagnostics) -> Html<String> {
    let items: Vec<u32> = vec![1, 2, 3];
    diagnostics.insert("items", items.clone());
    let index = items.len() + 2;
    Html(format!("{}", items[index]))
}

async fn fails(diagnostics: Diagnostics) -> Result<Html<String>, HandlerError> {
    diagnostics.insert("input", "forty-two");
    let value: u32 = "forty-two".parse()?;
    Ok(Html(value.to_string()))
}

async fn forbidden() -> impl IntoResponse {
    HttpException::new(StatusCode::FORBIDDEN, "members only")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutdown signal received");
}
