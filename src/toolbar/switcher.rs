//! Context switch tracking around the handler future.
//!
//! Panels register hooks that fire whenever the handler's future is entered
//! (polled) or left (returns from a poll). This is how time spent inside the
//! handler is separated from time spent waiting on I/O.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Ordered switch-in / switch-out hooks for one request.
#[derive(Clone, Default)]
pub struct ContextSwitcher {
    switch_in: Vec<Hook>,
    switch_out: Vec<Hook>,
}

impl ContextSwitcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` right before every poll of the handler.
    pub fn on_switch_in(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.switch_in.push(Arc::new(hook));
    }

    /// Run `hook` right after every poll of the handler, including the last.
    pub fn on_switch_out(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.switch_out.push(Arc::new(hook));
    }

    /// Append another switcher's hooks after this one's.
    pub fn extend(&mut self, other: ContextSwitcher) {
        self.switch_in.extend(other.switch_in);
        self.switch_out.extend(other.switch_out);
    }

    pub fn hook_count(&self) -> usize {
        self.switch_in.len() + self.switch_out.len()
    }

    /// Drive `future` with the registered hooks.
    ///
    /// Dropping the returned future drops `future` with it.
    pub fn run<F: Future>(self, future: F) -> Switched<F> {
        Switched {
            inner: future,
            switch_in: self.switch_in,
            switch_out: self.switch_out,
            done: false,
        }
    }
}

impl fmt::Debug for ContextSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSwitcher")
            .field("switch_in", &self.switch_in.len())
            .field("switch_out", &self.switch_out.len())
            .finish()
    }
}

pin_project! {
    /// Future returned by [`ContextSwitcher::run`].
    #[must_use = "futures do nothing unless polled"]
    pub struct Switched<F> {
        #[pin]
        inner: F,
        switch_in: Vec<Hook>,
        switch_out: Vec<Hook>,
        done: bool,
    }
}

impl<F: Future> Future for Switched<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        assert!(!*this.done, "Switched polled after completion");

        for hook in this.switch_in.iter() {
            hook();
        }
        let poll = this.inner.poll(cx);
        for hook in this.switch_out.iter() {
            hook();
        }

        if poll.is_ready() {
            *this.done = true;
        }
        poll
    }
}
