use std::sync::Arc;

use shipyard_core::{
    ApiResourceDescriptor, ClusterApiError, CrdContext, CustomResourceDefinition, DiscoveryConfig, GroupVersionIndex,
    PrunableResourceId, StrategyChoice,
};
use tokio::sync::OnceCell;
use tracing::info;

use crate::crds::CustomResourceDiscovery;
use crate::fetcher::{detect_server_version, strategy_for, ApiSurfaceFetcher, Strategy};
use crate::prune::PruneTargetResolver;
use crate::runner::CommandRunner;
use crate::versions::VersionResolver;

/// One discovery session against a cluster context. The fetch strategy and the
/// CRD list are settled on first use; resource and prune queries hit the
/// cluster every time.
pub struct ClusterDiscovery {
    runner: Arc<dyn CommandRunner>,
    config: DiscoveryConfig,
    resolver: VersionResolver,
    fetcher: OnceCell<ApiSurfaceFetcher>,
    crds: CustomResourceDiscovery,
}

impl ClusterDiscovery {
    pub fn new(runner: Arc<dyn CommandRunner>, config: DiscoveryConfig, crd_ctx: CrdContext) -> Self {
        let resolver = VersionResolver::new(config.version_overrides.clone());
        let crds = CustomResourceDiscovery::new(runner.clone(), crd_ctx).with_attempts(config.attempts);
        Self { runner, config, resolver, fetcher: OnceCell::new(), crds }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub async fn fetcher(&self) -> &ApiSurfaceFetcher {
        self.fetcher
            .get_or_init(|| async {
                let strategy = match self.config.strategy {
                    StrategyChoice::PathIntrospection => Strategy::PathIntrospection,
                    StrategyChoice::TabularCommand => Strategy::TabularCommand,
                    StrategyChoice::Auto => {
                        let version = detect_server_version(self.runner.as_ref(), self.config.attempts).await;
                        let strategy = strategy_for(version);
                        info!(server = ?version, strategy = ?strategy, "discovery strategy selected");
                        strategy
                    }
                };
                ApiSurfaceFetcher::new(self.runner.clone(), strategy)
                    .with_attempts(self.config.attempts)
                    .with_concurrency(self.config.path_concurrency)
            })
            .await
    }

    pub async fn fetch_resources(&self, namespaced: bool) -> Result<Vec<ApiResourceDescriptor>, ClusterApiError> {
        self.fetcher().await.fetch_resources(namespaced).await
    }

    pub async fn fetch_group_versions(&self) -> Result<GroupVersionIndex, ClusterApiError> {
        self.fetcher().await.fetch_group_versions().await
    }

    /// Kind names of cluster-scoped (`false`) or namespaced (`true`) resources.
    pub async fn fetch_kinds(&self, namespaced: bool) -> Result<Vec<String>, ClusterApiError> {
        self.fetcher().await.fetch_kinds(namespaced).await
    }

    pub async fn prunable_resources(&self, namespaced: bool) -> Result<Vec<PrunableResourceId>, ClusterApiError> {
        let fetcher = self.fetcher().await;
        PruneTargetResolver::new(fetcher, &self.resolver, &self.config).prunable_resources(namespaced).await
    }

    pub async fn crds(&self) -> Result<&[CustomResourceDefinition], ClusterApiError> {
        self.crds.crds().await
    }

    pub async fn prunable_crds(&self) -> Result<Vec<&CustomResourceDefinition>, ClusterApiError> {
        self.crds.prunable_crds().await
    }
}
