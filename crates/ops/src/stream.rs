use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use metrics::counter;
use shipyard_core::LogSink;
use shipyard_kubehub::{CommandRunner, RunOptions};
use tracing::debug;

use crate::line::deduplicate;

/// Lines requested when nothing has been fetched yet.
pub const DEFAULT_LINE_LIMIT: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Empty,
    HasUnprinted,
    FullyPrinted,
}

/// Incremental, duplicate-free tail of one container's logs.
///
/// Calls to `sync` on one stream must not overlap; separate streams are independent.
pub struct ContainerLogStream {
    runner: Arc<dyn CommandRunner>,
    sink: Arc<dyn LogSink>,
    pod: String,
    container: String,
    line_limit: usize,
    lines: Vec<String>,
    /// Number of leading `lines` already printed.
    printed: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

impl ContainerLogStream {
    pub fn new(runner: Arc<dyn CommandRunner>, sink: Arc<dyn LogSink>, pod: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            runner,
            sink,
            pod: pod.into(),
            container: container.into(),
            line_limit: DEFAULT_LINE_LIMIT,
            lines: Vec::new(),
            printed: 0,
            last_timestamp: None,
        }
    }

    pub fn with_line_limit(mut self, limit: usize) -> Self {
        self.line_limit = limit;
        self
    }

    pub fn container_name(&self) -> &str {
        &self.container
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Index of the last printed line, `None` before anything was printed.
    pub fn last_printed_index(&self) -> Option<usize> {
        self.printed.checked_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn state(&self) -> StreamState {
        if self.lines.is_empty() {
            StreamState::Empty
        } else if self.printed < self.lines.len() {
            StreamState::HasUnprinted
        } else {
            StreamState::FullyPrinted
        }
    }

    /// Arguments of the next fetch: bounded by the watermark once one exists,
    /// else the most recent `line_limit` lines.
    pub fn fetch_args(&self) -> Vec<String> {
        let mut args = vec![
            "logs".to_string(),
            self.pod.clone(),
            format!("--container={}", self.container),
            "--timestamps".to_string(),
        ];
        match self.last_timestamp {
            Some(ts) => args.push(format!("--since-time={}", ts.to_rfc3339_opts(SecondsFormat::Nanos, false))),
            None => args.push(format!("--tail={}", self.line_limit)),
        }
        args
    }

    /// Fetch new lines and append the ones not seen before. Returns how many
    /// were appended. A failed or empty fetch changes nothing.
    pub async fn sync(&mut self) -> usize {
        let args = self.fetch_args();
        let opts = RunOptions::default().quiet();
        let out = self.runner.run(&args, &opts).await;
        if !out.success {
            debug!(pod = %self.pod, container = %self.container, stderr = %out.stderr.trim_end(), "log fetch failed");
            return 0;
        }
        let fresh: Vec<&str> = out.stdout.lines().filter(|l| !l.is_empty()).collect();
        if fresh.is_empty() {
            return 0;
        }
        let batch = deduplicate(&fresh, self.last_timestamp);
        let kept = batch.kept.len();
        counter!("log_lines_kept_total", kept as u64);
        counter!("log_lines_deduplicated_total", batch.dropped as u64);
        debug!(pod = %self.pod, container = %self.container, kept, dropped = batch.dropped, "log lines synced");
        self.lines.extend(batch.kept);
        self.last_timestamp = batch.watermark;
        kept
    }

    /// Print lines not printed yet, optionally as `[container]  line`, and move the cursor to the end.
    pub fn print_latest(&mut self, prefix: bool) {
        for line in &self.lines[self.printed..] {
            if prefix {
                self.sink.info(&format!("[{}]  {}", self.container, line));
            } else {
                self.sink.info(line);
            }
        }
        self.printed = self.lines.len();
    }

    /// Print every buffered line. The cursor does not move.
    pub fn print_all(&self) {
        for line in &self.lines {
            self.sink.info(line);
        }
    }
}
