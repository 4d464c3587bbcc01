//! Handler timing.
//!
//! Wall time is measured around the wrapped handler. Active time only counts
//! the intervals where the handler future was being polled, using the
//! context switcher hooks; the difference is time spent waiting. Both are
//! settled when the handler future is dropped, so a panicking handler still
//! reports its timing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ToolbarResult;
use crate::panels::{render_panel, Panel, PanelOutput};
use crate::toolbar::{ContextSwitcher, Handler};
use crate::ui::templates::Templates;

pub const PANEL_ID: &str = "timer";

#[derive(Debug, Default)]
struct Timing {
    wall: Option<Duration>,
    poll_started: Option<Instant>,
    active: Duration,
    polls: u32,
}

#[derive(Debug, Serialize)]
struct TimerData {
    wall_ms: f64,
    active_ms: f64,
    idle_ms: f64,
    polls: u32,
}

#[derive(Default)]
pub struct TimerPanel {
    timing: Arc<Mutex<Timing>>,
}

impl TimerPanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> TimerData {
        let timing = self.timing.lock();
        let wall = timing.wall.unwrap_or_default();
        let active = timing.active.min(wall);
        TimerData {
            wall_ms: millis(wall),
            active_ms: millis(active),
            idle_ms: millis(wall.saturating_sub(active)),
            polls: timing.polls,
        }
    }
}

/// Stops the wall clock when the wrapped handler future goes away, whether
/// it completed, panicked or was cancelled.
struct Stopwatch {
    timing: Arc<Mutex<Timing>>,
    started: Instant,
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        let mut timing = self.timing.lock();
        timing.wall = Some(self.started.elapsed());
        // a poll that unwound never reached the switch-out hook
        if let Some(start) = timing.poll_started.take() {
            timing.active += start.elapsed();
            timing.polls += 1;
        }
    }
}

fn millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1_000_000.0).round() / 1_000.0
}

#[async_trait]
impl Panel for TimerPanel {
    fn id(&self) -> &'static str {
        PANEL_ID
    }

    fn title(&self) -> &'static str {
        "Time"
    }

    fn nav_subtitle(&self) -> String {
        format!("{:.2} ms", self.data().wall_ms)
    }

    fn wrap_handler(&self, handler: Handler, switcher: &mut ContextSwitcher) -> Handler {
        let timing = self.timing.clone();
        switcher.on_switch_in(move || timing.lock().poll_started = Some(Instant::now()));

        let timing = self.timing.clone();
        switcher.on_switch_out(move || {
            let mut timing = timing.lock();
            if let Some(start) = timing.poll_started.take() {
                timing.active += start.elapsed();
                timing.polls += 1;
            }
        });

        let timing = self.timing.clone();
        Box::new(move |request| {
            let stopwatch = Stopwatch {
                timing,
                started: Instant::now(),
            };
            Box::pin(async move {
                let _stopwatch = stopwatch;
                handler(request).await
            })
        })
    }

    fn render(&self, templates: &Templates) -> ToolbarResult<PanelOutput> {
        render_panel(self, templates, "panels/timer.html", &self.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;

    #[tokio::test]
    async fn test_idle_time_excludes_sleep() {
        let panel = TimerPanel::new();
        let mut switcher = ContextSwitcher::new();
        let handler: Handler = Box::new(|_request| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(Response::new(Body::empty()))
            })
        });
        let handler = panel.wrap_handler(handler, &mut switcher);

        switcher
            .run(async move { handler(Request::new(Body::empty())).await })
            .await
            .unwrap();

        let data = panel.data();
        assert!(data.polls >= 2, "sleep must suspend at least once");
        assert!(data.wall_ms >= 30.0);
        assert!(data.active_ms < data.wall_ms);
        assert!(data.idle_ms >= 20.0);

        let templates = Templates::new("/_debugtoolbar").unwrap();
        let output = panel.render(&templates).unwrap();
        assert!(output.nav_subtitle.ends_with(" ms"));
        assert!(output.content.contains("Polls"));
    }

    #[tokio::test]
    async fn test_panicking_handler_keeps_timing() {
        use futures_util::FutureExt;
        use std::panic::AssertUnwindSafe;

        let panel = TimerPanel::new();
        let mut switcher = ContextSwitcher::new();
        let handler: Handler = Box::new(|_request| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                panic!("handler failed");
            })
        });
        let handler = panel.wrap_handler(handler, &mut switcher);

        let outcome = AssertUnwindSafe(switcher.run(async move { handler(Request::new(Body::empty())).await }))
            .catch_unwind()
            .await;
        assert!(outcome.is_err());

        let data = panel.data();
        assert!(data.wall_ms >= 20.0, "wall time recorded: {}", data.wall_ms);
        assert!(data.active_ms > 0.0);
        assert!(data.polls >= 2);
    }

    #[test]
    fn test_unwrapped_panel_renders_zeroes() {
        let panel = TimerPanel::new();
        let data = panel.data();
        assert_eq!(data.polls, 0);
        assert_eq!(data.wall_ms, 0.0);
    }
}
