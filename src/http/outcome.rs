//! Classification of what the wrapped handler produced.
//!
//! # Design Decisions
//! - Classification happens once, right after the handler settles
//! - A redirect raised as an error (`HttpRedirect`) and a 3xx response are
//!   distinct cases; only the middleware decides whether both are intercepted
//! - `HttpException` is the framework's own HTTP signal and is never captured

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::error::BoxError;
use crate::traceback::capture::{payload_message, take_panic};
use crate::traceback::ExceptionInfo;

/// Status codes treated as redirects.
pub const REDIRECT_CODES: &[u16] = &[300, 301, 302, 303, 305, 307, 308];

pub fn is_redirect(status: StatusCode) -> bool {
    REDIRECT_CODES.contains(&status.as_u16())
}

/// Redirect raised as control flow.
#[derive(Debug, Clone, Error)]
#[error("redirect {status} to {}", .location.as_deref().unwrap_or("<no location>"))]
pub struct HttpRedirect {
    pub status: StatusCode,
    pub location: Option<String>,
}

impl HttpRedirect {
    pub fn new(status: StatusCode, location: Option<String>) -> Self {
        Self { status, location }
    }

    pub fn found(location: impl Into<String>) -> Self {
        Self::new(StatusCode::FOUND, Some(location.into()))
    }

    pub fn see_other(location: impl Into<String>) -> Self {
        Self::new(StatusCode::SEE_OTHER, Some(location.into()))
    }

    pub fn temporary(location: impl Into<String>) -> Self {
        Self::new(StatusCode::TEMPORARY_REDIRECT, Some(location.into()))
    }

    pub fn permanent(location: impl Into<String>) -> Self {
        Self::new(StatusCode::PERMANENT_REDIRECT, Some(location.into()))
    }
}

impl IntoResponse for HttpRedirect {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        if let Some(location) = self.location.as_deref().and_then(|l| HeaderValue::from_str(l).ok()) {
            response.headers_mut().insert(header::LOCATION, location);
        }
        response
    }
}

/// An HTTP error the application raises on purpose (403, 404, ...).
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HttpException {
    pub status: StatusCode,
    pub message: String,
}

impl HttpException {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for HttpException {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Application error with the backtrace of where it was created.
///
/// Converts from any error with `?`. Returned from an axum handler it
/// becomes a plain 500 that the toolbar recognizes as a failure.
pub struct HandlerError {
    inner: BoxError,
    type_name: &'static str,
    backtrace: Backtrace,
}

impl HandlerError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
            type_name: short_type_name(std::any::type_name::<E>()),
            backtrace: Backtrace::force_capture(),
        }
    }

    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(Message(message.to_string()))
    }

    /// Name of the wrapped error type, without its module path.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    pub fn exception_info(&self) -> ExceptionInfo {
        ExceptionInfo::from_error(self.type_name, self.inner(), Some(self.backtrace.to_string()))
    }
}

impl<E> From<E> for HandlerError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("type", &self.type_name)
            .field("error", &self.inner)
            .finish()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<HandlerError> for BoxError {
    fn from(error: HandlerError) -> Self {
        Box::new(Captured(error))
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        response.extensions_mut().insert(FailureInfo(self.exception_info()));
        response
    }
}

/// A [`HandlerError`] travelling as a `BoxError`.
#[derive(Debug)]
struct Captured(HandlerError);

impl fmt::Display for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for Captured {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.inner().source()
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Marks a response produced from a [`HandlerError`].
#[derive(Debug, Clone)]
pub struct FailureInfo(pub ExceptionInfo);

/// Attached to redirect confirmation pages.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectContext {
    pub redirect_to: String,
    pub redirect_code: u16,
}

/// What the handler produced, classified once.
pub enum Outcome {
    /// Any response that is not a failure. Redirect statuses included.
    Response(Response),
    /// An `HttpRedirect` error.
    Redirect(HttpRedirect),
    /// An `HttpException` error. Always propagated.
    Terminal(BoxError),
    /// A panic, any other error, or a response built from a `HandlerError`.
    Failure { info: ExceptionInfo, origin: Origin },
}

/// The original form of a failure, kept to re-raise it unchanged.
pub enum Origin {
    Panic(Box<dyn Any + Send>),
    Error(BoxError),
    Response(Response),
}

/// A failure that leaves the middleware.
pub enum Raised {
    Error(BoxError),
    Panic(Box<dyn Any + Send>),
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raised::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Raised::Panic(payload) => f.debug_tuple("Panic").field(&payload_message(payload.as_ref())).finish(),
        }
    }
}

impl Origin {
    /// Hand the failure back untouched.
    pub fn reraise(self) -> Result<Response, Raised> {
        match self {
            Origin::Panic(payload) => Err(Raised::Panic(payload)),
            Origin::Error(error) => Err(Raised::Error(error)),
            Origin::Response(response) => Ok(response),
        }
    }
}

impl Outcome {
    /// Classify the result of running the handler under `catch_unwind`.
    pub fn classify(result: Result<Result<Response, BoxError>, Box<dyn Any + Send>>) -> Self {
        match result {
            Err(payload) => {
                let info = match take_panic() {
                    Some(capture) => ExceptionInfo::from_panic(capture),
                    None => ExceptionInfo::from_panic_message(payload_message(payload.as_ref())),
                };
                Outcome::Failure {
                    info,
                    origin: Origin::Panic(payload),
                }
            }
            Ok(Ok(mut response)) => match response.extensions_mut().remove::<FailureInfo>() {
                Some(FailureInfo(info)) => Outcome::Failure {
                    info,
                    origin: Origin::Response(response),
                },
                None => Outcome::Response(response),
            },
            Ok(Err(error)) => Self::classify_error(error),
        }
    }

    fn classify_error(error: BoxError) -> Self {
        let error = match error.downcast::<HttpRedirect>() {
            Ok(redirect) => return Outcome::Redirect(*redirect),
            Err(error) => error,
        };
        if error.is::<HttpException>() {
            return Outcome::Terminal(error);
        }
        match error.downcast::<Captured>() {
            Ok(captured) => Outcome::Failure {
                info: captured.0.exception_info(),
                origin: Origin::Error(captured),
            },
            Err(error) => Outcome::Failure {
                info: ExceptionInfo::from_error("Error", error.as_ref(), None),
                origin: Origin::Error(error),
            },
        }
    }
}

/// Turn a service error into a response, for `HandleErrorLayer`.
pub async fn handle_error(error: BoxError) -> Response {
    error_response(error)
}

pub(crate) fn error_response(error: BoxError) -> Response {
    let error = match error.downcast::<HttpRedirect>() {
        Ok(redirect) => return redirect.into_response(),
        Err(error) => error,
    };
    let error = match error.downcast::<HttpException>() {
        Ok(exception) => return exception.into_response(),
        Err(error) => error,
    };
    tracing::error!(error = %error, "Unhandled service error");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

fn short_type_name(name: &'static str) -> &'static str {
    let base = name.split('<').next().unwrap_or(name);
    match base.rfind("::") {
        Some(pos) => &name[pos + 2..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::io;

    #[test]
    fn test_redirect_codes() {
        assert!(is_redirect(StatusCode::FOUND));
        assert!(is_redirect(StatusCode::PERMANENT_REDIRECT));
        assert!(!is_redirect(StatusCode::NOT_MODIFIED));
        assert!(!is_redirect(StatusCode::OK));
    }

    #[test]
    fn test_redirect_error_is_classified_as_redirect() {
        let error: BoxError = Box::new(HttpRedirect::found("/login"));
        match Outcome::classify(Ok(Err(error))) {
            Outcome::Redirect(redirect) => {
                assert_eq!(redirect.status, StatusCode::FOUND);
                assert_eq!(redirect.location.as_deref(), Some("/login"));
            }
            _ => panic!("expected a redirect"),
        }
    }

    #[test]
    fn test_http_exception_is_terminal() {
        let error: BoxError = Box::new(HttpException::new(StatusCode::FORBIDDEN, "no"));
        assert!(matches!(Outcome::classify(Ok(Err(error))), Outcome::Terminal(_)));
    }

    #[test]
    fn test_handler_error_keeps_backtrace_and_type() {
        let error: BoxError = HandlerError::new(io::Error::new(io::ErrorKind::Other, "disk full")).into();
        match Outcome::classify(Ok(Err(error))) {
            Outcome::Failure { info, origin } => {
                assert_eq!(info.exception_type, "Error");
                assert_eq!(info.message, "disk full");
                assert!(info.backtrace.is_some());
                assert!(!info.from_panic);
                let Err(Raised::Error(error)) = origin.reraise() else {
                    panic!("expected the original error");
                };
                assert_eq!(error.to_string(), "disk full");
            }
            _ => panic!("expected a failure"),
        }
    }

    #[test]
    fn test_plain_error_has_no_backtrace() {
        let error: BoxError = "plain".into();
        match Outcome::classify(Ok(Err(error))) {
            Outcome::Failure { info, .. } => {
                assert_eq!(info.message, "plain");
                assert!(info.backtrace.is_none());
            }
            _ => panic!("expected a failure"),
        }
    }

    #[test]
    fn test_failure_response_is_recognized() {
        let response = HandlerError::msg("bad state").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match Outcome::classify(Ok(Ok(response))) {
            Outcome::Failure { info, origin } => {
                assert_eq!(info.exception_type, "Message");
                let response = origin.reraise().unwrap();
                assert!(response.extensions().get::<FailureInfo>().is_none());
            }
            _ => panic!("expected a failure"),
        }
    }

    #[test]
    fn test_panic_payload_without_hook() {
        let payload: Box<dyn Any + Send> = Box::new("kaboom");
        match Outcome::classify(Err(payload)) {
            Outcome::Failure { info, origin } => {
                assert!(info.from_panic);
                assert!(matches!(origin, Origin::Panic(_)));
            }
            _ => panic!("expected a failure"),
        }
    }

    #[test]
    fn test_plain_response_passes() {
        let response = Response::new(Body::from("ok"));
        assert!(matches!(Outcome::classify(Ok(Ok(response))), Outcome::Response(_)));
    }

    #[tokio::test]
    async fn test_handle_error_maps_framework_errors() {
        let response = handle_error(Box::new(HttpException::new(StatusCode::NOT_FOUND, "gone"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = handle_error(Box::new(HttpRedirect::see_other("/next"))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/next");

        let response = handle_error("boom".into()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("app::Wrapper<core::num::ParseIntError>"), "Wrapper<core::num::ParseIntError>");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
