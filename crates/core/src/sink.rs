/// Destination for operator-facing output (tailed log lines, per-container headers).
pub trait LogSink: Send + Sync {
    fn info(&self, line: &str);
    fn warn(&self, line: &str);
    fn blank_line(&self) {
        self.info("");
    }
}

/// Emits through `tracing` under the `shipyard::logs` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, line: &str) {
        tracing::info!(target: "shipyard::logs", "{}", line);
    }

    fn warn(&self, line: &str) {
        tracing::warn!(target: "shipyard::logs", "{}", line);
    }
}
