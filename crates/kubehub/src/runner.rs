//! The cluster command collaborator: runs `kubectl` with retries.

use std::process::Stdio;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, warn};

pub const ENV_KUBECTL: &str = "SHIPYARD_KUBECTL";

/// Serialisation requested through `--output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Wide,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Wide => "wide",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Total tries before giving up (at least one).
    pub attempts: u32,
    /// Append `--namespace`; cluster-scoped calls turn this off.
    pub use_namespace: bool,
    pub output: Option<OutputFormat>,
    /// Log each failed attempt at warn level. Expected-to-fail calls turn this off.
    pub log_failure: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { attempts: 1, use_namespace: true, output: None, log_failure: true }
    }
}

impl RunOptions {
    /// Cluster-scoped discovery call: `attempts` tries, no namespace flag.
    pub fn cluster(attempts: u32) -> Self {
        Self { attempts, use_namespace: false, ..Self::default() }
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = Some(output);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.log_failure = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), stderr: String::new(), success: true }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self { stdout: String::new(), stderr: stderr.into(), success: false }
    }
}

/// Runs a cluster control command. Implementations own retrying: a returned
/// failure is final for the caller.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[String], opts: &RunOptions) -> CommandOutput;
}

/// Human-readable command line for errors and logs.
pub fn describe(args: &[String]) -> String {
    args.join(" ")
}

#[derive(Debug, Clone)]
pub struct KubectlConfig {
    pub binary: String,
    pub namespace: Option<String>,
    pub context: Option<String>,
    /// Sleep before retry `n` is `retry_delay * n`.
    pub retry_delay: Duration,
    /// Passed through as `--request-timeout`.
    pub request_timeout: Option<String>,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            binary: std::env::var(ENV_KUBECTL).unwrap_or_else(|_| "kubectl".to_string()),
            namespace: None,
            context: None,
            retry_delay: Duration::from_secs(1),
            request_timeout: None,
        }
    }
}

/// `CommandRunner` backed by the kubectl binary.
#[derive(Debug, Clone, Default)]
pub struct Kubectl {
    cfg: KubectlConfig,
}

impl Kubectl {
    pub fn new(cfg: KubectlConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &KubectlConfig {
        &self.cfg
    }

    /// Full argument vector (without the binary).
    pub fn argv(&self, args: &[String], opts: &RunOptions) -> Vec<String> {
        let mut argv: Vec<String> = args.to_vec();
        if let Some(ctx) = &self.cfg.context {
            argv.push(format!("--context={}", ctx));
        }
        if opts.use_namespace {
            if let Some(ns) = &self.cfg.namespace {
                argv.push(format!("--namespace={}", ns));
            }
        }
        if let Some(out) = opts.output {
            argv.push(format!("--output={}", out.as_str()));
        }
        if let Some(t) = &self.cfg.request_timeout {
            argv.push(format!("--request-timeout={}", t));
        }
        argv
    }

    async fn run_once(&self, argv: &[String]) -> CommandOutput {
        let res = tokio::process::Command::new(&self.cfg.binary)
            .args(argv)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        match res {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                success: out.status.success(),
            },
            Err(e) => CommandOutput::failed(format!("failed to spawn {}: {}", self.cfg.binary, e)),
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for Kubectl {
    async fn run(&self, args: &[String], opts: &RunOptions) -> CommandOutput {
        let argv = self.argv(args, opts);
        let cmd = format!("{} {}", self.cfg.binary, describe(&argv));
        let attempts = opts.attempts.max(1);
        let mut last = CommandOutput::default();
        for attempt in 1..=attempts {
            let t0 = Instant::now();
            last = self.run_once(&argv).await;
            counter!("kubectl_runs_total", 1u64);
            histogram!("kubectl_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
            if last.success {
                debug!(cmd = %cmd, attempt, elapsed_ms = t0.elapsed().as_millis() as u64, "kubectl ok");
                return last;
            }
            counter!("kubectl_failures_total", 1u64);
            if opts.log_failure {
                warn!(cmd = %cmd, attempt, attempts, stderr = %last.stderr.trim_end(), "kubectl command failed");
            } else {
                debug!(cmd = %cmd, attempt, attempts, stderr = %last.stderr.trim_end(), "kubectl command failed");
            }
            if attempt < attempts {
                tokio::time::sleep(self.cfg.retry_delay * attempt).await;
            }
        }
        last
    }
}
