//! The application's error channel.
//!
//! Every failure that ends a request's success path lands here exactly
//! once: errors returned by the middleware chain, panics inside it, and
//! transport failures reported after the response was handed off. The
//! handler only reports; the error response itself is written by the
//! dispatcher.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt::Write as _;

use http::StatusCode;
use tracing::error;

use crate::config::Config;
use crate::error::Error;

/// Something that ended a request's success path.
#[derive(Debug)]
pub enum Failure {
    Error(Error),
    /// A panic: the chain failed with something that is not an [`Error`].
    NonError(String),
}

impl Failure {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let text = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(s) => (*s).to_owned(),
                Err(_) => "<non-string panic payload>".to_owned(),
            },
        };
        Self::NonError(text)
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self { Self::Error(err) }
}

/// Receives every failure of an application.
///
/// Closures `Fn(&Failure, &Config)` implement it. The default is
/// [`DefaultErrorHandler`]; replace it with
/// [`App::on_error`](crate::App::on_error) before serving.
pub trait ErrorHandler: Send + Sync + 'static {
    fn on_error(&self, failure: &Failure, config: &Config);
}

impl<F> ErrorHandler for F
where
    F: Fn(&Failure, &Config) + Send + Sync + 'static,
{
    fn on_error(&self, failure: &Failure, config: &Config) {
        (self)(failure, config);
    }
}

/// Logs unexpected errors; stays quiet about expected ones.
///
/// - a non-error failure is a programmer error: the handler panics;
/// - 404s and exposed errors are not logged;
/// - nothing is logged when the application is `silent`;
/// - anything else is logged at `error` level, one indented line per cause.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    /// The diagnostic the handler would log, `None` when it stays quiet.
    ///
    /// # Panics
    ///
    /// Panics on [`Failure::NonError`].
    pub fn report(failure: &Failure, config: &Config) -> Option<String> {
        let err = match failure {
            Failure::Error(err) => err,
            Failure::NonError(value) => panic!("non-error thrown: {value:?}"),
        };
        if err.status() == Some(StatusCode::NOT_FOUND) || err.expose() || config.silent {
            return None;
        }
        Some(format!("\n{}\n", indent(&describe(err))))
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn on_error(&self, failure: &Failure, config: &Config) {
        if let Some(report) = Self::report(failure, config) {
            error!("{report}");
        }
    }
}

/// The error followed by its chain of causes.
pub(crate) fn describe(err: &Error) -> String {
    let mut out = err.to_string();
    let mut source = StdError::source(err);
    while let Some(cause) = source {
        // write! to String is infallible
        let _ = write!(out, "\ncaused by: {cause}");
        source = cause.source();
    }
    out
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("  {line}")).collect::<Vec<_>>().join("\n")
}
