//! Reads the cluster's API surface, either from the raw discovery paths or from
//! `kubectl api-resources` tables.

use std::sync::Arc;
use std::time::Instant;

use futures::{stream, StreamExt, TryStreamExt};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use shipyard_core::table::TableParser;
use shipyard_core::{ApiResourceDescriptor, ClusterApiError, GroupVersionIndex, Operation};
use tracing::{debug, info, warn};

use crate::runner::{describe, CommandRunner, OutputFormat, RunOptions};

/// `/api/<version>` or `/apis/<group>/<version>`.
static API_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/apis?/(?:(?P<group>[^/]+)/)?(?P<version>v\d[^/]*)$").unwrap());

/// Oldest server version whose raw discovery paths are used under `Auto`.
pub const PATH_INTROSPECTION_MIN: ServerVersion = ServerVersion { major: 1, minor: 17 };

/// How the API surface is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `get --raw /` then `get --raw <path>` per group version.
    PathIntrospection,
    /// `api-resources --output=wide`.
    TabularCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
}

impl ServerVersion {
    /// Reads `serverVersion` from `kubectl version --output=json`. Minor versions
    /// like `27+` keep their leading digits.
    pub fn from_version_json(raw: &str) -> Option<Self> {
        let doc: serde_json::Value = serde_json::from_str(raw).ok()?;
        let server = doc.get("serverVersion")?;
        let num = |key: &str| -> Option<u32> {
            let s = server.get(key)?.as_str()?;
            let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        };
        Some(Self { major: num("major")?, minor: num("minor")? })
    }
}

/// Asks the server for its version; `None` when the call fails or the output is unreadable.
pub async fn detect_server_version(runner: &dyn CommandRunner, attempts: u32) -> Option<ServerVersion> {
    let args = vec!["version".to_string()];
    let out = runner.run(&args, &RunOptions::cluster(attempts).output(OutputFormat::Json).quiet()).await;
    if !out.success {
        debug!(stderr = %out.stderr.trim_end(), "server version detection failed");
        return None;
    }
    ServerVersion::from_version_json(&out.stdout)
}

/// Strategy for a detected (or undetectable) server.
pub fn strategy_for(version: Option<ServerVersion>) -> Strategy {
    match version {
        Some(v) if v >= PATH_INTROSPECTION_MIN => Strategy::PathIntrospection,
        _ => Strategy::TabularCommand,
    }
}

/// Group and version encoded in a discovery path.
pub fn parse_api_path(path: &str) -> Option<(String, String)> {
    let caps = API_PATH_RE.captures(path)?;
    let group = caps.name("group").map(|m| m.as_str().to_string()).unwrap_or_default();
    let version = caps.name("version")?.as_str().to_string();
    Some((group, version))
}

#[derive(Debug, Deserialize)]
struct RootDocument {
    #[serde(default)]
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PathDocument {
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(default)]
    name: String,
    namespaced: Option<bool>,
    verbs: Option<Vec<String>>,
    kind: Option<String>,
}

/// Resources listed in one per-path document: wrong-partition, kind-less,
/// verb-less and subresource (`pods/log`) records are dropped.
pub fn parse_path_document(
    raw: &str,
    group: &str,
    version: &str,
    namespaced: bool,
) -> Result<Vec<ApiResourceDescriptor>, serde_json::Error> {
    let doc: PathDocument = serde_json::from_str(raw)?;
    Ok(doc
        .resources
        .into_iter()
        .filter(|r| r.namespaced == Some(namespaced) && !r.name.contains('/'))
        .filter_map(|r| {
            let kind = r.kind.filter(|k| !k.is_empty())?;
            let verbs = r.verbs?;
            let mut d = ApiResourceDescriptor::new(kind, group, verbs).with_version(version).namespaced(namespaced);
            d.name = r.name;
            Some(d)
        })
        .collect())
}

/// Rows of `kubectl api-resources --output=wide`. Rows without a kind or a
/// `[...]` verb list, or whose NAMESPACED cell contradicts the requested
/// partition, are dropped. An APIVERSION column (newer kubectl) supplies both
/// group and version; the older APIGROUP column leaves the version unresolved.
pub fn parse_api_resources(raw: &str, namespaced: bool) -> Vec<ApiResourceDescriptor> {
    let table = TableParser::new().blankable(&["shortnames", "apigroup", "apiversion"]).parse(raw);
    let has_api_version = table.has_column("apiversion");
    table
        .rows
        .iter()
        .filter_map(|row| {
            let kind = row.get("kind");
            if kind.is_empty() {
                return None;
            }
            let verbs = row.get("verbs").trim().strip_prefix('[')?.strip_suffix(']')?;
            match row.get("namespaced").parse::<bool>() {
                Ok(ns) if ns != namespaced => return None,
                _ => {}
            }
            let mut d = if has_api_version {
                let (group, version) = match row.get("apiversion").split_once('/') {
                    Some((g, v)) => (g, v),
                    None => ("", row.get("apiversion")),
                };
                let d = ApiResourceDescriptor::new(kind, group, verbs.split_whitespace());
                if version.is_empty() {
                    d
                } else {
                    d.with_version(version)
                }
            } else {
                ApiResourceDescriptor::new(kind, row.get("apigroup"), verbs.split_whitespace())
            };
            d.name = row.get("name").to_string();
            Some(d.namespaced(namespaced))
        })
        .collect()
}

/// Cluster API surface reader. Every command failure is final: the runner has
/// already spent its retry budget.
#[derive(Clone)]
pub struct ApiSurfaceFetcher {
    runner: Arc<dyn CommandRunner>,
    strategy: Strategy,
    attempts: u32,
    concurrency: usize,
}

impl std::fmt::Debug for ApiSurfaceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSurfaceFetcher")
            .field("strategy", &self.strategy)
            .field("attempts", &self.attempts)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl ApiSurfaceFetcher {
    pub fn new(runner: Arc<dyn CommandRunner>, strategy: Strategy) -> Self {
        Self { runner, strategy, attempts: 5, concurrency: 8 }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    async fn run(&self, args: Vec<String>, output: Option<OutputFormat>) -> Result<String, ClusterApiError> {
        let mut opts = RunOptions::cluster(self.attempts);
        opts.output = output;
        let out = self.runner.run(&args, &opts).await;
        if out.success {
            Ok(out.stdout)
        } else {
            Err(ClusterApiError::command(Operation::Discovery, describe(&args), out.stderr))
        }
    }

    /// Resources of one scope partition, in discovery order.
    pub async fn fetch_resources(&self, namespaced: bool) -> Result<Vec<ApiResourceDescriptor>, ClusterApiError> {
        let t0 = Instant::now();
        let resources = match self.strategy {
            Strategy::PathIntrospection => self.fetch_by_paths(namespaced).await?,
            Strategy::TabularCommand => self.fetch_tabular(namespaced).await?,
        };
        counter!("discovery_resources_total", resources.len() as u64);
        info!(
            strategy = ?self.strategy,
            namespaced,
            resources = resources.len(),
            took_ms = %t0.elapsed().as_millis(),
            "api surface fetched"
        );
        Ok(resources)
    }

    /// Group -> versions from `kubectl api-versions`.
    pub async fn fetch_group_versions(&self) -> Result<GroupVersionIndex, ClusterApiError> {
        let raw = self.run(vec!["api-versions".to_string()], None).await?;
        Ok(GroupVersionIndex::from_api_versions(&raw))
    }

    /// Distinct kind names of one partition, first-seen order.
    pub async fn fetch_kinds(&self, namespaced: bool) -> Result<Vec<String>, ClusterApiError> {
        let mut kinds: Vec<String> = Vec::new();
        for d in self.fetch_resources(namespaced).await? {
            if !kinds.contains(&d.kind) {
                kinds.push(d.kind);
            }
        }
        Ok(kinds)
    }

    async fn fetch_by_paths(&self, namespaced: bool) -> Result<Vec<ApiResourceDescriptor>, ClusterApiError> {
        let args = vec!["get".to_string(), "--raw".to_string(), "/".to_string()];
        let request = describe(&args);
        let raw = self.run(args, None).await?;
        let root: RootDocument =
            serde_json::from_str(&raw).map_err(|e| ClusterApiError::decode(Operation::Discovery, request, e))?;
        let paths: Vec<(String, String, String)> = root
            .paths
            .into_iter()
            .filter(|p| p.starts_with("/api"))
            .filter_map(|p| parse_api_path(&p).map(|(g, v)| (p, g, v)))
            .collect();
        debug!(paths = paths.len(), "api paths to introspect");

        // `buffered` keeps path order so first-seen kinds are stable.
        let per_path: Vec<Vec<ApiResourceDescriptor>> = stream::iter(paths)
            .map(|(path, group, version)| async move {
                let args = vec!["get".to_string(), "--raw".to_string(), path];
                let request = describe(&args);
                let raw = self.run(args, None).await?;
                parse_path_document(&raw, &group, &version, namespaced)
                    .map_err(|e| ClusterApiError::decode(Operation::Discovery, request, e))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        Ok(per_path.into_iter().flatten().collect())
    }

    async fn fetch_tabular(&self, namespaced: bool) -> Result<Vec<ApiResourceDescriptor>, ClusterApiError> {
        let args = vec!["api-resources".to_string(), format!("--namespaced={}", namespaced)];
        let raw = self.run(args, Some(OutputFormat::Wide)).await?;
        let resources = parse_api_resources(&raw, namespaced);
        if resources.is_empty() && !raw.trim().is_empty() {
            warn!(namespaced, "api-resources output had no usable rows");
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_paths_yield_group_and_version() {
        assert_eq!(parse_api_path("/api/v1"), Some((String::new(), "v1".into())));
        assert_eq!(parse_api_path("/apis/apps/v1"), Some(("apps".into(), "v1".into())));
        assert_eq!(
            parse_api_path("/apis/autoscaling/v2beta2"),
            Some(("autoscaling".into(), "v2beta2".into()))
        );
        assert_eq!(parse_api_path("/apis/apps"), None);
        assert_eq!(parse_api_path("/apis"), None);
        assert_eq!(parse_api_path("/healthz"), None);
        assert_eq!(parse_api_path("/openapi/v2"), None);
    }

    #[test]
    fn path_document_drops_mismatched_and_incomplete_records() {
        let raw = r#"{"resources":[
            {"name":"pods","namespaced":true,"kind":"Pod","verbs":["get","delete"]},
            {"name":"pods/log","namespaced":true,"kind":"Pod","verbs":["get"]},
            {"name":"nodes","namespaced":false,"kind":"Node","verbs":["get"]},
            {"name":"bindings","namespaced":true,"kind":"Binding"},
            {"name":"mystery","namespaced":true,"verbs":["get"]}
        ]}"#;
        let out = parse_path_document(raw, "", "v1", true).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, "Pod");
        assert_eq!(out[0].name, "pods");
        assert_eq!(out[0].version.as_deref(), Some("v1"));
        assert!(out[0].supports("delete"));
        assert!(parse_path_document("not json", "", "v1", true).is_err());
    }

    #[test]
    fn tabular_row_with_blank_group() {
        let raw = "NAME SHORTNAMES APIGROUP NAMESPACED KIND VERBS\npods   po          true       Pod    [get list watch delete]\n";
        let out = parse_api_resources(raw, true);
        assert_eq!(out.len(), 1);
        let pod = &out[0];
        assert_eq!(pod.kind, "Pod");
        assert_eq!(pod.api_group, "");
        assert!(pod.namespaced);
        assert_eq!(pod.version, None);
        let verbs: Vec<_> = pod.verbs.iter().map(String::as_str).collect();
        assert_eq!(verbs, ["delete", "get", "list", "watch"]);
    }

    #[test]
    fn tabular_api_version_column_supplies_versions() {
        let raw = "\
NAME          SHORTNAMES   APIVERSION   NAMESPACED   KIND         VERBS
configmaps    cm           v1           true         ConfigMap    [create delete get list]
deployments   deploy       apps/v1      true         Deployment   [create delete get list]
nodes         no           v1           false        Node         [get list]
";
        let out = parse_api_resources(raw, true);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].api_group, "");
        assert_eq!(out[0].version.as_deref(), Some("v1"));
        assert_eq!(out[1].api_group, "apps");
        assert_eq!(out[1].version.as_deref(), Some("v1"));
    }

    #[test]
    fn tabular_rows_without_verb_list_are_dropped() {
        let raw = "NAME SHORTNAMES APIGROUP NAMESPACED KIND VERBS\nweird w x true Weird get\n";
        assert!(parse_api_resources(raw, true).is_empty());
    }

    #[test]
    fn server_version_parsing_and_strategy_choice() {
        let raw = r#"{"clientVersion":{"major":"1","minor":"28"},"serverVersion":{"major":"1","minor":"27+"}}"#;
        let v = ServerVersion::from_version_json(raw);
        assert_eq!(v, Some(ServerVersion { major: 1, minor: 27 }));
        assert_eq!(strategy_for(v), Strategy::PathIntrospection);
        assert_eq!(strategy_for(Some(ServerVersion { major: 1, minor: 16 })), Strategy::TabularCommand);
        assert_eq!(strategy_for(None), Strategy::TabularCommand);
        assert_eq!(ServerVersion::from_version_json(r#"{"clientVersion":{}}"#), None);
    }
}
