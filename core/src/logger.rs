//! Logging capability handed to `Fitting`.
//!
//! Diagnostics arrive fully formatted. A `Fitting` without a logger uses
//! `NoopLogger`, so call sites never check for one.

/// Sink for the pipeline's pre-formatted diagnostics. Must not panic.
pub trait Logger: Send + Sync {
    fn error(&self, message: &str);
    fn info(&self, message: &str);
}

/// Drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn error(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
}

/// Forwards diagnostics to `tracing` under the `pype` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, message: &str) {
        tracing::error!(target: "pype", "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "pype", "{message}");
    }
}
