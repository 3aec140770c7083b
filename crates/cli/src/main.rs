use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use shipyard_core::{CrdContext, DiscoveryConfig, StrategyChoice, TracingSink, VersionOverrides};
use shipyard_kubehub::{ClusterDiscovery, CommandRunner, Kubectl, KubectlConfig, OutputFormat, RunOptions};
use shipyard_ops::{cancel_pair, follow, PodLogs};
use tokio::signal;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "shipyardctl", version, about = "Shipyard CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace
    #[arg(long = "ns", global = true, default_value = "default")]
    namespace: String,

    /// kubeconfig context (default: current context)
    #[arg(long = "context", global = true)]
    context: Option<String>,

    /// Discovery strategy: auto, path or tabular (overrides SHIPYARD_DISCOVERY_STRATEGY)
    #[arg(long = "strategy", global = true)]
    strategy: Option<String>,

    /// YAML/JSON file of kind -> version overrides (overrides SHIPYARD_VERSION_OVERRIDES)
    #[arg(long = "version-overrides", global = true)]
    version_overrides: Option<String>,

    /// kubectl --request-timeout value, e.g. 30s
    #[arg(long = "request-timeout", global = true)]
    request_timeout: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List served resource kinds
    Resources {
        /// Cluster-scoped instead of namespaced resources
        #[arg(long = "cluster", action = ArgAction::SetTrue)]
        cluster: bool,
    },
    /// List API groups and their versions
    Versions,
    /// List prunable group/version/kind identifiers
    Prunable {
        /// Cluster-scoped instead of namespaced resources
        #[arg(long = "cluster", action = ArgAction::SetTrue)]
        cluster: bool,
    },
    /// List CustomResourceDefinitions
    Crds {
        /// Only CRDs annotated shipyard.dev/prunable=true
        #[arg(long = "prunable", action = ArgAction::SetTrue)]
        prunable: bool,
    },
    /// Print (and optionally follow) a pod's container logs
    Logs {
        pod: String,
        /// Container names (default: all containers of the pod)
        #[arg(short = 'c', long = "container")]
        containers: Vec<String>,
        /// Keep polling for new lines until Ctrl-C
        #[arg(short = 'f', long = "follow", action = ArgAction::SetTrue)]
        follow: bool,
        /// Lines requested on the first fetch
        #[arg(long = "tail", default_value_t = shipyard_ops::DEFAULT_LINE_LIMIT)]
        tail: usize,
        /// Poll interval in milliseconds
        #[arg(long = "interval-ms", default_value_t = 2000)]
        interval_ms: u64,
    },
}

fn init_tracing() {
    let env = std::env::var("SHIPYARD_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("SHIPYARD_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid SHIPYARD_METRICS_ADDR; expected host:port");
        }
    }
}

/// Context name for CRD wrappers: the explicit flag, else the kubeconfig's current context.
fn context_name(explicit: Option<&str>) -> String {
    if let Some(c) = explicit {
        return c.to_string();
    }
    match kube::config::Kubeconfig::read() {
        Ok(cfg) => cfg.current_context.unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "no kubeconfig; context name left empty");
            String::new()
        }
    }
}

fn discovery_config(cli: &Cli) -> Result<DiscoveryConfig> {
    let mut cfg = DiscoveryConfig::from_env().context("loading discovery config from environment")?;
    if let Some(s) = &cli.strategy {
        cfg.strategy = StrategyChoice::parse_from(s, "--strategy")?;
    }
    if let Some(path) = &cli.version_overrides {
        cfg.version_overrides = VersionOverrides::from_path(path)?;
    }
    Ok(cfg)
}

/// Container names from the pod spec (init containers first).
async fn pod_containers(runner: &dyn CommandRunner, pod: &str) -> Result<Vec<String>> {
    let args = vec!["get".to_string(), "pod".to_string(), pod.to_string()];
    let out = runner.run(&args, &RunOptions::default().output(OutputFormat::Json)).await;
    if !out.success {
        return Err(anyhow!("kubectl get pod {}: {}", pod, out.stderr.trim_end()));
    }
    let doc: serde_json::Value = serde_json::from_str(&out.stdout).with_context(|| format!("decoding pod {}", pod))?;
    let names = ["/spec/initContainers", "/spec/containers"]
        .iter()
        .filter_map(|p| doc.pointer(p).and_then(|v| v.as_array()))
        .flatten()
        .filter_map(|c| c.get("name").and_then(|n| n.as_str()).map(str::to_string))
        .collect();
    Ok(names)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let kubectl = Kubectl::new(KubectlConfig {
        namespace: Some(cli.namespace.clone()),
        context: cli.context.clone(),
        request_timeout: cli.request_timeout.clone(),
        ..KubectlConfig::default()
    });
    let runner: Arc<dyn CommandRunner> = Arc::new(kubectl);
    let crd_ctx = CrdContext::new(cli.namespace.clone(), context_name(cli.context.as_deref()));
    let session = ClusterDiscovery::new(runner.clone(), discovery_config(&cli)?, crd_ctx);

    match cli.command {
        Commands::Resources { cluster } => {
            let resources = session.fetch_resources(!cluster).await?;
            match cli.output {
                Output::Human => {
                    for r in &resources {
                        let gv = match (&r.version, r.api_group.is_empty()) {
                            (Some(v), true) => v.clone(),
                            (Some(v), false) => format!("{}/{}", r.api_group, v),
                            (None, _) => r.api_group.clone(),
                        };
                        let verbs: Vec<&str> = r.verbs.iter().map(String::as_str).collect();
                        println!("{} • {} • [{}]", gv, r.kind, verbs.join(" "));
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&resources)?),
            }
        }
        Commands::Versions => {
            let index = session.fetch_group_versions().await?;
            match cli.output {
                Output::Human => {
                    for (group, versions) in index.groups() {
                        let group = if group.is_empty() { "core" } else { group };
                        println!("{} • {}", group, versions.join(", "));
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&index)?),
            }
        }
        Commands::Prunable { cluster } => {
            let ids = session.prunable_resources(!cluster).await?;
            let rendered: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            match cli.output {
                Output::Human => {
                    for id in &rendered {
                        println!("{}", id);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rendered)?),
            }
        }
        Commands::Crds { prunable } => {
            let crds = if prunable { session.prunable_crds().await? } else { session.crds().await?.iter().collect() };
            match cli.output {
                Output::Human => {
                    for crd in &crds {
                        let scope = if crd.namespaced() { "namespaced" } else { "cluster" };
                        println!("{} • {} • {} • {}", crd.name(), crd.kind(), crd.served_versions().join(","), scope);
                    }
                }
                Output::Json => {
                    let raw: Vec<&serde_json::Value> = crds.iter().map(|c| c.raw()).collect();
                    println!("{}", serde_json::to_string_pretty(&raw)?);
                }
            }
        }
        Commands::Logs { pod, containers, follow: keep_following, tail, interval_ms } => {
            let containers = if containers.is_empty() { pod_containers(runner.as_ref(), &pod).await? } else { containers };
            if containers.is_empty() {
                return Err(anyhow!("pod {} has no containers", pod));
            }
            let names: Vec<&str> = containers.iter().map(String::as_str).collect();
            let mut logs = PodLogs::new(runner.clone(), Arc::new(TracingSink), pod.clone(), &names).with_line_limit(tail);
            if keep_following {
                let (handle, rx) = cancel_pair();
                tokio::spawn(async move {
                    if signal::ctrl_c().await.is_ok() {
                        handle.cancel();
                    }
                });
                info!(pod = %pod, containers = names.len(), interval_ms, "following logs; Ctrl-C to stop");
                follow(&mut logs, Duration::from_millis(interval_ms.max(100)), rx).await;
            } else {
                logs.sync().await;
                logs.print_all();
            }
        }
    }
    Ok(())
}
