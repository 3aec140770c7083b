use std::sync::Arc;

use futures::future::join_all;
use shipyard_core::LogSink;
use shipyard_kubehub::CommandRunner;

use crate::stream::ContainerLogStream;

/// Log streams for every container of one pod.
pub struct PodLogs {
    pod: String,
    sink: Arc<dyn LogSink>,
    containers: Vec<ContainerLogStream>,
    already_displayed: bool,
}

impl PodLogs {
    pub fn new(runner: Arc<dyn CommandRunner>, sink: Arc<dyn LogSink>, pod: impl Into<String>, containers: &[&str]) -> Self {
        let pod = pod.into();
        let containers = containers
            .iter()
            .map(|c| ContainerLogStream::new(runner.clone(), sink.clone(), pod.clone(), *c))
            .collect();
        Self { pod, sink, containers, already_displayed: false }
    }

    pub fn with_line_limit(mut self, limit: usize) -> Self {
        self.containers = self.containers.into_iter().map(|c| c.with_line_limit(limit)).collect();
        self
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    pub fn containers(&self) -> &[ContainerLogStream] {
        &self.containers
    }

    pub fn already_displayed(&self) -> bool {
        self.already_displayed
    }

    /// Syncs all containers concurrently; returns the total lines appended.
    pub async fn sync(&mut self) -> usize {
        join_all(self.containers.iter_mut().map(|c| c.sync())).await.into_iter().sum()
    }

    /// Container prefixes are only added when the pod has more than one container.
    pub fn print_latest(&mut self) {
        let prefix = self.containers.len() > 1;
        for c in &mut self.containers {
            c.print_latest(prefix);
        }
    }

    /// Full dump with a header per container.
    pub fn print_all(&mut self) {
        for c in &self.containers {
            if c.is_empty() {
                self.sink.warn(&format!("No logs found for container '{}'", c.container_name()));
                continue;
            }
            self.sink.blank_line();
            self.sink.info(&format!("Logs from {} container '{}':", self.pod, c.container_name()));
            c.print_all();
            self.sink.blank_line();
        }
        self.already_displayed = true;
    }
}
