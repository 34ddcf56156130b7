use std::error::Error;

use tracing::error;

/// Title attached to every database failure handed to an [`ErrorReporter`].
pub const ERROR_TITLE: &str = "Database Error";

/// Sink for user-visible failure reports (a desktop build would pop a dialog here).
pub trait ErrorReporter: Send + Sync {
    /// Deliver one failure. Called once per failed operation.
    fn report(&self, title: &str, message: &str);
}

/// Default reporter writing failures to the `tracing` pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, title: &str, message: &str) {
        error!(title, "{message}");
    }
}

/// Render an error followed by its chain of sources.
pub(crate) fn describe(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
