//! Stack frame extraction.
//!
//! Turns the text of a `std::backtrace::Backtrace` into structured frames,
//! marks library frames as hidden and attaches source excerpts.

use std::fs;

use serde::Serialize;

/// Lines of source shown above and below the frame's line.
pub const CONTEXT_LINES: usize = 5;

// Frames from these paths are runtime, framework or toolbar plumbing.
const HIDDEN_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "test::",
    "tokio::",
    "futures::",
    "futures_util::",
    "futures_core::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
    "tower::",
    "tower_layer::",
    "tower_service::",
    "tower_http::",
    "axum::",
    "axum_core::",
    "hyper::",
    "hyper_util::",
    "http_body_util::",
    "pin_project_lite::",
    "debug_toolbar::http::",
    "debug_toolbar::toolbar::",
    "debug_toolbar::traceback::",
    "debug_toolbar::panels::",
    "rust_begin_unwind",
    "rust_panic",
    "__rust",
    "__libc",
    "_start",
    "start_thread",
    "clone",
    "clone3",
    "BaseThreadInitThunk",
    "RtlUserThreadStart",
];

// Frames between the raise site and the point the stack was recorded:
// backtrace collection, the panic runtime and `HandlerError` construction.
const CAPTURE_PREFIXES: &[&str] = &[
    "std::backtrace",
    "backtrace::",
    "std::panicking::",
    "std::rt::",
    "std::sys::backtrace::",
    "std::sys_common::backtrace::",
    "core::panicking::",
    "rust_begin_unwind",
    "__rustc::rust_begin_unwind",
    "alloc::boxed::Box",
    "debug_toolbar::traceback::capture::",
    "debug_toolbar::http::outcome::HandlerError",
];

/// The middleware entry point; frames outside it belong to the server.
const CAPTURE_POINT: &str = "debug_toolbar::http::middleware::handle";

const UNKNOWN_FRAME: &str = "<unknown>";

/// One frame as read from the backtrace, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl RawFrame {
    pub fn new(function: impl Into<String>, file: Option<&str>, line: Option<u32>) -> Self {
        Self {
            function: function.into(),
            file: file.map(str::to_string),
            line,
        }
    }

    pub fn is_hidden(&self) -> bool {
        if self.function == UNKNOWN_FRAME {
            return true;
        }
        let path = type_path(&self.function);
        path.starts_with("fn(") || matches_any(path, HIDDEN_PREFIXES)
    }

    fn is_capture_machinery(&self) -> bool {
        matches_any(type_path(&self.function), CAPTURE_PREFIXES)
    }

    fn is_capture_point(&self) -> bool {
        let path = type_path(&self.function);
        path == CAPTURE_POINT
            || path
                .strip_prefix(CAPTURE_POINT)
                .is_some_and(|rest| rest.starts_with("::"))
    }
}

fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix) || path == prefix.trim_end_matches("::"))
}

/// Path a frame belongs to. Trait impl frames print as `<X as Trait>::method`
/// or `<X>::method`; those are classified by `X`.
fn type_path(function: &str) -> &str {
    let Some(inner) = function.strip_prefix('<') else {
        return function;
    };
    let end = inner
        .find(|c: char| c == ' ' || c == '<' || c == '>')
        .unwrap_or(inner.len());
    &inner[..end]
}

/// Frames between the capture point and the raise site, innermost first.
///
/// Leading capture machinery is dropped, and so is everything from the
/// innermost middleware entry frame outwards. Backtraces recorded outside
/// the middleware keep their outer frames.
pub fn failure_window(raw: Vec<RawFrame>) -> Vec<RawFrame> {
    let start = raw
        .iter()
        .position(|frame| !frame.is_capture_machinery())
        .unwrap_or(raw.len());
    let end = raw[start..]
        .iter()
        .position(RawFrame::is_capture_point)
        .map_or(raw.len(), |offset| start + offset);

    raw.into_iter().take(end).skip(start).collect()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceLine {
    pub lineno: u32,
    pub code: String,
    pub current: bool,
}

/// A captured frame, owned by exactly one traceback.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Position inside the traceback, outermost frame first.
    pub index: usize,
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub hidden: bool,
    pub source: Vec<SourceLine>,
    /// Rendered local state as `(name, text)` pairs.
    pub locals: Vec<(String, String)>,
}

impl Frame {
    pub fn location(&self) -> String {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            (Some(file), None) => file.clone(),
            _ => "<unknown>".to_string(),
        }
    }
}

/// Parse the `Display` output of a backtrace, innermost frame first.
///
/// Disabled or unsupported backtraces yield no frames.
pub fn parse_backtrace(text: &str) -> Vec<RawFrame> {
    let mut frames: Vec<RawFrame> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, line) = split_location(location);
                frame.file = Some(file);
                frame.line = line;
            }
            continue;
        }

        let symbol = match trimmed.split_once(": ") {
            Some((index, rest)) if index.chars().all(|c| c.is_ascii_digit()) => rest,
            // Inlined frames are printed without an index.
            _ if line.starts_with(' ') && !frames.is_empty() => trimmed,
            _ => continue,
        };

        frames.push(RawFrame {
            function: strip_hash(symbol).to_string(),
            file: None,
            line: None,
        });
    }

    frames
}

fn split_location(location: &str) -> (String, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();

    match (rest, middle, last) {
        (Some(file), Some(line), Some(_col)) if line.parse::<u32>().is_ok() => {
            (file.to_string(), line.parse().ok())
        }
        _ => match location.rsplit_once(':') {
            Some((file, line)) if line.parse::<u32>().is_ok() => (file.to_string(), line.parse().ok()),
            _ => (location.to_string(), None),
        },
    }
}

// Mangled symbols end in `::h` plus 16 hex digits.
fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((name, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => name,
        _ => symbol,
    }
}

/// Read up to [`CONTEXT_LINES`] lines around `line` from `file`.
///
/// Missing or unreadable files give an empty excerpt.
pub fn source_excerpt(file: &str, line: u32) -> Vec<SourceLine> {
    let Ok(content) = fs::read_to_string(file) else {
        return Vec::new();
    };
    excerpt_from(&content, line, CONTEXT_LINES)
}

pub fn excerpt_from(content: &str, line: u32, context: usize) -> Vec<SourceLine> {
    let target = line as usize;
    if target == 0 {
        return Vec::new();
    }
    let first = target.saturating_sub(context).max(1);
    let last = target + context;

    content
        .lines()
        .enumerate()
        .map(|(i, code)| (i + 1, code))
        .filter(|(lineno, _)| (first..=last).contains(lineno))
        .map(|(lineno, code)| SourceLine {
            lineno: lineno as u32,
            code: code.to_string(),
            current: lineno == target,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "   0: std::backtrace::Backtrace::force_capture
             at /rustc/abc/library/std/src/backtrace.rs:312:13
   1: demo::handlers::load_user::h0123456789abcdef
             at ./src/handlers.rs:42:9
      demo::handlers::inner_helper
             at ./src/handlers.rs:17:5
   2: tokio::runtime::task::harness::poll_future
   3: main
             at C:\\work\\demo\\src\\main.rs:7:1
";

    #[test]
    fn test_parse_backtrace() {
        let frames = parse_backtrace(SAMPLE);
        assert_eq!(frames.len(), 5);

        assert_eq!(frames[1].function, "demo::handlers::load_user");
        assert_eq!(frames[1].file.as_deref(), Some("./src/handlers.rs"));
        assert_eq!(frames[1].line, Some(42));

        assert_eq!(frames[2].function, "demo::handlers::inner_helper");
        assert_eq!(frames[2].line, Some(17));

        assert_eq!(frames[3].file, None);
        assert_eq!(frames[4].file.as_deref(), Some("C:\\work\\demo\\src\\main.rs"));
        assert_eq!(frames[4].line, Some(7));
    }

    #[test]
    fn test_disabled_backtrace_has_no_frames() {
        assert!(parse_backtrace("disabled backtrace").is_empty());
        assert!(parse_backtrace("unsupported backtrace").is_empty());
    }

    #[test]
    fn test_hidden_frames() {
        assert!(RawFrame::new("std::panicking::begin_panic", None, None).is_hidden());
        let boxed = "<tower::util::BoxService<T,U,E> as tower_service::Service<T>>::call";
        assert!(RawFrame::new(boxed, None, None).is_hidden());
        assert!(RawFrame::new("rust_begin_unwind", None, None).is_hidden());
        assert!(!RawFrame::new("demo::handlers::load_user", None, None).is_hidden());
        assert!(!RawFrame::new("main", None, None).is_hidden());
    }

    #[test]
    fn test_impl_and_unknown_frames_hidden() {
        assert!(RawFrame::new("<unknown>", None, None).is_hidden());
        assert!(RawFrame::new("<fn() as core::ops::function::FnOnce<()>>::call_once", None, None).is_hidden());
        assert!(RawFrame::new(
            "<tracing::instrument::Instrumented<T> as core::future::future::Future>::poll",
            None,
            None
        )
        .is_hidden());
        assert!(RawFrame::new("<std::sys::thread::unix::Thread>::new::thread_start", None, None).is_hidden());
        assert!(RawFrame::new("test::run_test::{closure#1}", None, None).is_hidden());
        assert!(!RawFrame::new("<demo::Store as demo::Repo>::load", None, None).is_hidden());
    }

    #[test]
    fn test_failure_window() {
        let raw: Vec<RawFrame> = [
            "std::backtrace::Backtrace::force_capture",
            "debug_toolbar::traceback::capture::install_panic_hook::{{closure}}",
            "<alloc::boxed::Box<F,A> as core::ops::function::Fn<Args>>::call",
            "std::panicking::rust_panic_with_hook",
            "core::panicking::panic_fmt",
            "demo::raise",
            "demo::handler::{{closure}}",
            "<futures_util::future::future::catch_unwind::CatchUnwind<Fut> as core::future::future::Future>::poll",
            "debug_toolbar::http::middleware::handle::{{closure}}",
            "debug_toolbar::http::middleware::handle_error",
            "test::run_test",
        ]
        .into_iter()
        .map(|name| RawFrame::new(name, None, None))
        .collect();

        let window: Vec<String> = failure_window(raw).into_iter().map(|f| f.function).collect();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0], "demo::raise");
        assert!(window[2].starts_with("<futures_util::"));
    }

    #[test]
    fn test_failure_window_without_middleware() {
        let raw = vec![
            RawFrame::new("core::panicking::panic", None, None),
            RawFrame::new("demo::raise", None, None),
            RawFrame::new("main", None, None),
        ];
        assert_eq!(failure_window(raw).len(), 2);
    }

    #[test]
    fn test_excerpt_window() {
        let content: String = (1..=20).map(|i| format!("line {i}\n")).collect();
        let excerpt = excerpt_from(&content, 3, 2);
        let numbers: Vec<u32> = excerpt.iter().map(|l| l.lineno).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(excerpt[2].current);
        assert_eq!(excerpt[2].code, "line 3");
    }

    #[test]
    fn test_missing_source_file() {
        assert!(source_excerpt("/definitely/not/here.rs", 10).is_empty());
    }
}
