//! Logging facilities for Trellis.
//!
//! Trellis uses the `tracing` crate for instrumentation. The libraries never
//! install a subscriber; to see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("trellis::selection=debug,trellis::cell=trace")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "trellis_core::signal";
    /// Observable value target.
    pub const PROPERTY: &str = "trellis_core::property";
    /// Selection index set and selection/focus models.
    pub const SELECTION: &str = "trellis::selection";
    /// Observable list mutations.
    pub const LIST: &str = "trellis::list";
    /// Cell update and recycle protocol.
    pub const CELL: &str = "trellis::cell";
    /// Table control (editing position, cell selection).
    pub const TABLE: &str = "trellis::table";
    /// Configuration loading.
    pub const CONFIG: &str = "trellis::config";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of batched operations such as
/// shift reconciliation.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: "trellis::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span_under_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let _span = PerfSpan::new("test_operation");
            tracing::debug!(target: targets::SELECTION, "inside span");
        });
    }
}
