//! Traceback capture and rendering.
//!
//! # Responsibilities
//! - Snapshot the stack of a failed request into an immutable [`Traceback`]
//! - Attach source excerpts and the request's diagnostic values
//! - Render the full exception page, memoized per traceback
//!
//! # Design Decisions
//! - Frames are ordered outermost first; the raise site is the last frame
//! - Only frames below the middleware entry point are kept
//! - `skip` drops outermost frames before hidden frames are filtered
//! - Nothing in a captured traceback changes after `capture` returns

pub mod capture;
pub mod frames;

pub use capture::{install_panic_hook, take_panic, PanicCapture};
pub use frames::{failure_window, parse_backtrace, Frame, RawFrame, SourceLine};

use std::error::Error as StdError;
use std::sync::OnceLock;

use serde::Serialize;
use tera::Context;
use uuid::Uuid;

use crate::error::ToolbarResult;
use crate::http::diagnostics::Diagnostics;
use crate::ui::templates::{Templates, EXCEPTION_TEMPLATE};

/// The failure being captured, independent of how it was raised.
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    pub exception_type: String,
    pub message: String,
    /// `source()` chain of an error, outermost cause first.
    pub causes: Vec<String>,
    /// Where a panic was raised.
    pub location: Option<String>,
    /// Backtrace text, innermost frame first.
    pub backtrace: Option<String>,
    pub from_panic: bool,
}

impl ExceptionInfo {
    pub fn from_panic(capture: PanicCapture) -> Self {
        Self {
            exception_type: "panic".to_string(),
            message: capture.message,
            causes: Vec::new(),
            location: capture.location,
            backtrace: Some(capture.backtrace),
            from_panic: true,
        }
    }

    /// Panic without a hook capture (hook replaced by the application).
    pub fn from_panic_message(message: String) -> Self {
        Self {
            exception_type: "panic".to_string(),
            message,
            causes: Vec::new(),
            location: None,
            backtrace: None,
            from_panic: true,
        }
    }

    pub fn from_error(
        exception_type: impl Into<String>,
        error: &(dyn StdError + 'static),
        backtrace: Option<String>,
    ) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            exception_type: exception_type.into(),
            message: error.to_string(),
            causes,
            location: None,
            backtrace,
            from_panic: false,
        }
    }
}

/// Frame selection for [`Traceback::capture`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    pub skip: usize,
    pub show_hidden_frames: bool,
}

/// Immutable snapshot of a failure. Safe to share between tasks.
#[derive(Debug, Serialize)]
pub struct Traceback {
    pub id: String,
    pub exception_type: String,
    pub message: String,
    pub causes: Vec<String>,
    pub location: Option<String>,
    pub frames: Vec<Frame>,
    pub request_id: Option<String>,
    pub from_panic: bool,
    #[serde(skip)]
    rendered: OnceLock<String>,
}

impl Traceback {
    /// Capture a traceback from a failure.
    ///
    /// The innermost frame carries the request's diagnostic values as its
    /// locals.
    pub fn capture(
        info: ExceptionInfo,
        options: CaptureOptions,
        diagnostics: Option<&Diagnostics>,
        request_id: Option<&str>,
    ) -> Self {
        let mut raw = info
            .backtrace
            .as_deref()
            .map(|text| failure_window(parse_backtrace(text)))
            .unwrap_or_default();
        raw.reverse();

        let mut frames = select_frames(raw, options);
        if let (Some(last), Some(diagnostics)) = (frames.last_mut(), diagnostics) {
            last.locals = diagnostics.render();
        }

        Self {
            id: Uuid::new_v4().simple().to_string(),
            exception_type: info.exception_type,
            message: info.message,
            causes: info.causes,
            location: info.location,
            frames,
            request_id: request_id.map(str::to_string),
            from_panic: info.from_panic,
            rendered: OnceLock::new(),
        }
    }

    /// One-line summary, as used in logs.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.exception_type, self.message)
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Render the full exception page. Later calls return the cached text.
    pub fn render_full(&self, templates: &Templates) -> ToolbarResult<String> {
        if let Some(html) = self.rendered.get() {
            return Ok(html.clone());
        }
        let mut context = Context::new();
        context.insert("traceback", self);
        let html = templates.render(EXCEPTION_TEMPLATE, &context)?;
        Ok(self.rendered.get_or_init(|| html).clone())
    }
}

/// Skip, filter and number raw frames (outermost first) and load source.
pub fn select_frames(raw: Vec<RawFrame>, options: CaptureOptions) -> Vec<Frame> {
    raw.into_iter()
        .skip(options.skip)
        .filter(|frame| options.show_hidden_frames || !frame.is_hidden())
        .enumerate()
        .map(|(index, raw)| {
            let hidden = raw.is_hidden();
            let source = match (&raw.file, raw.line) {
                (Some(file), Some(line)) if !hidden => frames::source_excerpt(file, line),
                _ => Vec::new(),
            };
            Frame {
                index,
                function: raw.function,
                file: raw.file,
                line: raw.line,
                hidden,
                source,
                locals: Vec::new(),
            }
        })
        .collect()
}
