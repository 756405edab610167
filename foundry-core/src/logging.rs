//! Structured logging sink.
//!
//! `Logger` is the engine's view of a log sink: six levels, optional
//! key-value fields, and a `child` method for opening a scope (Smith opens
//! one per workflow run, binding workflow and execution identity — §4.3
//! step 4a). The default implementation forwards to `tracing`.

use std::sync::Arc;

/// A single structured field attached to a log line.
pub type Field = (&'static str, String);

/// A structured log sink.
pub trait Logger: Send + Sync {
    /// Log at `trace` level.
    fn trace(&self, message: &str, fields: &[Field]);
    /// Log at `debug` level.
    fn debug(&self, message: &str, fields: &[Field]);
    /// Log at `info` level.
    fn info(&self, message: &str, fields: &[Field]);
    /// Log at `warn` level.
    fn warn(&self, message: &str, fields: &[Field]);
    /// Log at `error` level.
    fn error(&self, message: &str, fields: &[Field]);
    /// Log at `critical` level. `tracing` has no sixth level; the default
    /// implementation logs at `error` with an extra `critical = true` field.
    fn critical(&self, message: &str, fields: &[Field]);

    /// Open a scope: a new logger that prepends `fields` to every message
    /// logged through it, in addition to whatever fields the call site adds.
    fn child(&self, fields: Vec<Field>) -> Arc<dyn Logger>;
}

/// The default `Logger`, built on the `tracing` crate.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    scope: Vec<(&'static str, String)>,
}

impl TracingLogger {
    /// A logger with no bound scope fields.
    pub fn new() -> Self {
        Self { scope: Vec::new() }
    }

    fn render(&self, message: &str, fields: &[Field]) -> String {
        if self.scope.is_empty() && fields.is_empty() {
            return message.to_string();
        }
        let mut rendered = String::from(message);
        for (k, v) in self.scope.iter().chain(fields.iter()) {
            rendered.push_str(&format!(" {k}={v}"));
        }
        rendered
    }
}

impl Logger for TracingLogger {
    fn trace(&self, message: &str, fields: &[Field]) {
        tracing::trace!("{}", self.render(message, fields));
    }

    fn debug(&self, message: &str, fields: &[Field]) {
        tracing::debug!("{}", self.render(message, fields));
    }

    fn info(&self, message: &str, fields: &[Field]) {
        tracing::info!("{}", self.render(message, fields));
    }

    fn warn(&self, message: &str, fields: &[Field]) {
        tracing::warn!("{}", self.render(message, fields));
    }

    fn error(&self, message: &str, fields: &[Field]) {
        tracing::error!("{}", self.render(message, fields));
    }

    fn critical(&self, message: &str, fields: &[Field]) {
        tracing::error!(critical = true, "{}", self.render(message, fields));
    }

    fn child(&self, fields: Vec<Field>) -> Arc<dyn Logger> {
        let mut scope = self.scope.clone();
        scope.extend(fields);
        Arc::new(TracingLogger { scope })
    }
}

/// A logger that discards everything. Useful in tests that don't assert on
/// log output and don't want `tracing` noise.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn trace(&self, _message: &str, _fields: &[Field]) {}
    fn debug(&self, _message: &str, _fields: &[Field]) {}
    fn info(&self, _message: &str, _fields: &[Field]) {}
    fn warn(&self, _message: &str, _fields: &[Field]) {}
    fn error(&self, _message: &str, _fields: &[Field]) {}
    fn critical(&self, _message: &str, _fields: &[Field]) {}

    fn child(&self, _fields: Vec<Field>) -> Arc<dyn Logger> {
        Arc::new(NullLogger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_logger_child_is_also_null() {
        let logger = NullLogger;
        let child = logger.child(vec![("workflow_id", "wf-1".into())]);
        child.info("anything", &[]);
    }

    #[test]
    fn tracing_logger_child_accumulates_scope() {
        let logger = TracingLogger::new();
        let child = logger.child(vec![("workflow_id", "wf-1".into())]);
        let grandchild = child.child(vec![("execution_id", "ex-1".into())]);
        grandchild.info("hello", &[]);
    }
}
