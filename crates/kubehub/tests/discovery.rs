mod common;

use std::sync::Arc;

use common::*;
use shipyard_core::{ClusterApiError, CrdContext, DiscoveryConfig, Operation, StrategyChoice};
use shipyard_kubehub::{ApiSurfaceFetcher, ClusterDiscovery, Strategy};

fn config(strategy: StrategyChoice) -> DiscoveryConfig {
    DiscoveryConfig { strategy, ..DiscoveryConfig::default() }
}

fn session(runner: Arc<ScriptedRunner>, strategy: StrategyChoice) -> ClusterDiscovery {
    ClusterDiscovery::new(runner, config(strategy), CrdContext::new("default", "test"))
}

fn ids(list: &[shipyard_core::PrunableResourceId]) -> Vec<String> {
    list.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn path_strategy_prunes_namespaced_kinds_in_fetch_order() {
    let runner = Arc::new(path_cluster());
    let d = session(runner.clone(), StrategyChoice::PathIntrospection);
    let out = d.prunable_resources(true).await.unwrap();
    assert_eq!(ids(&out), ["v1/Pod", "v1/ConfigMap", "v1/Event", "apps/v1/Deployment"]);
    // Versions come from the paths; no group-version listing needed.
    assert_eq!(runner.count("api-versions"), 0);
    assert!(runner.options().iter().all(|o| o.attempts == 5 && !o.use_namespace));
}

#[tokio::test]
async fn path_strategy_cluster_scope_applies_extended_exclusions() {
    let runner = Arc::new(path_cluster());
    let d = session(runner, StrategyChoice::PathIntrospection);
    let out = d.prunable_resources(false).await.unwrap();
    assert_eq!(ids(&out), ["v1/PersistentVolume"]);
}

#[tokio::test]
async fn excluded_kinds_never_surface() {
    for strategy in [StrategyChoice::PathIntrospection, StrategyChoice::TabularCommand] {
        let runner = Arc::new(
            path_cluster()
                .ok("api-resources --namespaced=true", API_RESOURCES_NAMESPACED)
                .ok("api-versions", API_VERSIONS),
        );
        let d = session(runner, strategy);
        for namespaced in [true, false] {
            let Ok(out) = d.prunable_resources(namespaced).await else { continue };
            for id in &out {
                assert!(!["Namespace", "Node", "ControllerRevision"].contains(&id.kind.as_str()), "{}", id);
            }
        }
    }
}

#[tokio::test]
async fn cross_group_kind_collision_keeps_first_group_only() {
    // Known limitation: events.k8s.io/v1 Event is shadowed by the core Event.
    let runner = Arc::new(path_cluster());
    let d = session(runner, StrategyChoice::PathIntrospection);
    let out = d.prunable_resources(true).await.unwrap();
    let events: Vec<_> = out.iter().filter(|id| id.kind == "Event").collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].group, "");
}

#[tokio::test]
async fn tabular_strategy_resolves_versions_from_group_listing() {
    let runner = Arc::new(tabular_cluster());
    let d = session(runner.clone(), StrategyChoice::TabularCommand);
    let out = d.prunable_resources(true).await.unwrap();
    assert_eq!(
        ids(&out),
        ["core/v1/ConfigMap", "core/v1/Pod", "apps/v1/Deployment", "batch/v1beta1/CronJob", "batch/v1/Job"]
    );
    assert_eq!(runner.count("api-versions"), 1);
}

#[tokio::test]
async fn prune_targets_are_recomputed_per_call() {
    let runner = Arc::new(tabular_cluster());
    let d = session(runner.clone(), StrategyChoice::TabularCommand);
    d.prunable_resources(true).await.unwrap();
    d.prunable_resources(true).await.unwrap();
    assert_eq!(runner.count("api-resources --namespaced=true"), 2);
    assert_eq!(runner.count("api-versions"), 2);
}

#[tokio::test]
async fn raw_root_failure_is_fatal_not_empty() {
    let runner = Arc::new(ScriptedRunner::new().fail("get --raw /", "the server has asked for the client to provide credentials"));
    let fetcher = ApiSurfaceFetcher::new(runner.clone(), Strategy::PathIntrospection);
    let err = fetcher.fetch_resources(true).await.unwrap_err();
    assert!(matches!(err, ClusterApiError::Command { .. }));
    assert_eq!(err.operation(), Operation::Discovery);
    assert_eq!(err.stderr(), Some("the server has asked for the client to provide credentials"));
    assert!(err.to_string().contains("get --raw /"));
    assert_eq!(runner.calls(), ["get --raw /"]);

    let d = session(runner, StrategyChoice::PathIntrospection);
    let err = d.prunable_resources(true).await.unwrap_err();
    assert_eq!(err.operation(), Operation::Pruning);
}

#[tokio::test]
async fn single_path_failure_aborts_the_whole_fetch() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .ok("get --raw /", ROOT_PATHS)
            .ok("get --raw /api/v1", CORE_V1)
            .fail("get --raw /apis/apps/v1", "etcdserver: request timed out")
            .ok("get --raw /apis/events.k8s.io/v1", EVENTS_V1),
    );
    let fetcher = ApiSurfaceFetcher::new(runner, Strategy::PathIntrospection).with_concurrency(1);
    let err = fetcher.fetch_resources(true).await.unwrap_err();
    assert!(err.to_string().contains("/apis/apps/v1"), "{}", err);
}

#[tokio::test]
async fn malformed_path_document_is_a_decode_error() {
    let runner = Arc::new(ScriptedRunner::new().ok("get --raw /", "<html>proxy error</html>"));
    let fetcher = ApiSurfaceFetcher::new(runner, Strategy::PathIntrospection);
    let err = fetcher.fetch_resources(true).await.unwrap_err();
    assert!(matches!(err, ClusterApiError::Decode { .. }));
}

#[tokio::test]
async fn auto_strategy_detects_once_and_falls_back_to_tabular() {
    let runner = Arc::new(
        tabular_cluster().ok("version", r#"{"serverVersion":{"major":"1","minor":"16"}}"#),
    );
    let d = session(runner.clone(), StrategyChoice::Auto);
    assert_eq!(d.fetcher().await.strategy(), Strategy::TabularCommand);
    d.prunable_resources(true).await.unwrap();
    d.prunable_resources(true).await.unwrap();
    assert_eq!(runner.count("version"), 1);
    assert_eq!(runner.count("get --raw /"), 0);
}

#[tokio::test]
async fn auto_strategy_uses_paths_on_recent_servers() {
    let runner = Arc::new(path_cluster().ok("version", r#"{"serverVersion":{"major":"1","minor":"29"}}"#));
    let d = session(runner, StrategyChoice::Auto);
    assert_eq!(d.fetcher().await.strategy(), Strategy::PathIntrospection);
    let kinds = d.fetch_kinds(false).await.unwrap();
    assert_eq!(kinds, ["Namespace", "Node", "NodeProxyOptions", "PersistentVolume"]);
}

#[tokio::test]
async fn auto_strategy_without_version_uses_tabular() {
    let runner = Arc::new(tabular_cluster());
    let d = session(runner, StrategyChoice::Auto);
    assert_eq!(d.fetcher().await.strategy(), Strategy::TabularCommand);
}

#[tokio::test]
async fn group_versions_treat_bare_v1_as_core() {
    let runner = Arc::new(tabular_cluster());
    let d = session(runner, StrategyChoice::TabularCommand);
    let index = d.fetch_group_versions().await.unwrap();
    assert_eq!(index.versions("core"), ["v1".to_string()]);
    assert_eq!(index.versions(""), ["v1".to_string()]);
    assert_eq!(index.versions("batch"), ["v1".to_string(), "v1beta1".to_string()]);
    assert!(index.versions("v1").is_empty());
}
