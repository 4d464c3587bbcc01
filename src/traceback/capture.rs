//! Panic capture.
//!
//! A panic unwinds the stack before `catch_unwind` returns, so the backtrace
//! has to be taken inside the panic hook. The hook parks it in a thread-local
//! slot; the middleware collects it on the same thread right after catching
//! the unwind.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

/// What the panic hook saw.
#[derive(Debug, Clone)]
pub struct PanicCapture {
    pub message: String,
    pub location: Option<String>,
    pub backtrace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicCapture>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Install the capturing panic hook once per process.
///
/// The previously installed hook still runs afterwards, so the usual panic
/// message keeps reaching stderr.
pub fn install_panic_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let capture = PanicCapture {
                message: payload_message(info.payload()),
                location: info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(capture));
            previous(info);
        }));
        tracing::debug!("Debug toolbar panic hook installed");
    });
}

/// Take the capture recorded by the most recent panic on this thread.
pub fn take_panic() -> Option<PanicCapture> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// Text of a panic payload (`&str` or `String`), or a placeholder.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
