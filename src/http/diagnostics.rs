//! Per-request diagnostic side channel.
//!
//! The middleware inserts a [`Diagnostics`] handle into the request
//! extensions. Handlers take `Diagnostics` as an extractor and attach
//! values; panels and the traceback page read them back. When the toolbar is
//! bypassed the extractor hands out a detached handle, so handlers behave the
//! same with the toolbar on or off.

use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use parking_lot::Mutex;

/// Rendered values longer than this are shortened.
pub const MAX_VALUE_LEN: usize = 512;

/// Shown in place of a value whose `Debug` impl panicked.
pub const UNREPRESENTABLE: &str = "<unrepresentable>";

type Value = Arc<dyn fmt::Debug + Send + Sync>;

/// Shared key/value store attached to one request.
#[derive(Clone, Default)]
pub struct Diagnostics {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    values: Vec<(String, Value)>,
    request_id: Option<String>,
    traceback_id: Option<String>,
    traceback_summary: Option<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a value. A value under the same key is replaced in place.
    pub fn insert<T>(&self, key: impl Into<String>, value: T)
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        let key = key.into();
        let value: Value = Arc::new(value);
        let mut inner = self.inner.lock();
        match inner.values.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => inner.values.push((key, value)),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().values.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }

    /// Render every value with its `Debug` impl, in insertion order.
    ///
    /// A value that panics while formatting renders as [`UNREPRESENTABLE`].
    pub fn render(&self) -> Vec<(String, String)> {
        let values: Vec<(String, Value)> = self.inner.lock().values.clone();
        values
            .into_iter()
            .map(|(key, value)| (key, render_value(value.as_ref())))
            .collect()
    }

    pub fn request_id(&self) -> Option<String> {
        self.inner.lock().request_id.clone()
    }

    pub fn traceback_id(&self) -> Option<String> {
        self.inner.lock().traceback_id.clone()
    }

    pub(crate) fn set_request_id(&self, id: &str) {
        self.inner.lock().request_id = Some(id.to_string());
    }

    /// One-line summary of the captured traceback, if any.
    pub fn traceback_summary(&self) -> Option<String> {
        self.inner.lock().traceback_summary.clone()
    }

    pub(crate) fn set_traceback(&self, id: &str, summary: &str) {
        let mut inner = self.inner.lock();
        inner.traceback_id = Some(id.to_string());
        inner.traceback_summary = Some(summary.to_string());
    }
}

impl<S> FromRequestParts<S> for Diagnostics
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Diagnostics>().cloned().unwrap_or_default())
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("keys", &self.keys())
            .field("traceback_id", &self.traceback_id())
            .finish()
    }
}

/// Best-effort `Debug` rendering that never panics.
pub fn render_value(value: &(dyn fmt::Debug + Send + Sync)) -> String {
    match panic::catch_unwind(AssertUnwindSafe(|| format!("{:?}", value))) {
        Ok(text) => shorten(text, MAX_VALUE_LEN),
        Err(_) => UNREPRESENTABLE.to_string(),
    }
}

pub(crate) fn shorten(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("...");
    text
}
