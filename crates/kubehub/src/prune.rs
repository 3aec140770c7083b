//! Deletable kinds of a scope partition, as `group/version/kind` identifiers.

use std::collections::HashSet;

use metrics::counter;
use shipyard_core::{ApiResourceDescriptor, ClusterApiError, DiscoveryConfig, GroupVersionIndex, Operation, PrunableResourceId, CORE_GROUP};
use tracing::{debug, info};

use crate::fetcher::{ApiSurfaceFetcher, Strategy};
use crate::versions::VersionResolver;

/// First descriptor per kind wins, in fetch order. A kind served by two groups
/// keeps only the first group's entry.
pub fn dedupe_by_kind(descriptors: Vec<ApiResourceDescriptor>) -> Vec<ApiResourceDescriptor> {
    let mut seen = HashSet::new();
    descriptors.into_iter().filter(|d| seen.insert(d.kind.clone())).collect()
}

/// Identifier for one descriptor. Descriptors carrying a version are joined as
/// is; the rest use `core` for the legacy group and take the resolver's pick
/// among the index versions for their group.
pub fn prune_id(
    d: &ApiResourceDescriptor,
    index: Option<&GroupVersionIndex>,
    resolver: &VersionResolver,
) -> Option<PrunableResourceId> {
    if let Some(version) = &d.version {
        return Some(PrunableResourceId::new(d.api_group.clone(), version.clone(), d.kind.clone()));
    }
    let group = if d.is_core_group() { CORE_GROUP } else { d.api_group.as_str() };
    let versions: &[String] = index.map(|i| i.versions(group)).unwrap_or(&[]);
    let version = resolver.resolve(versions, &d.kind)?;
    Some(PrunableResourceId::new(group, version, d.kind.clone()))
}

pub struct PruneTargetResolver<'a> {
    fetcher: &'a ApiSurfaceFetcher,
    resolver: &'a VersionResolver,
    config: &'a DiscoveryConfig,
}

impl<'a> PruneTargetResolver<'a> {
    pub fn new(fetcher: &'a ApiSurfaceFetcher, resolver: &'a VersionResolver, config: &'a DiscoveryConfig) -> Self {
        Self { fetcher, resolver, config }
    }

    /// Recomputed on every call. Any command failure aborts the whole call.
    pub async fn prunable_resources(&self, namespaced: bool) -> Result<Vec<PrunableResourceId>, ClusterApiError> {
        let fetched = self.fetcher.fetch_resources(namespaced).await.map_err(|e| e.during(Operation::Pruning))?;
        let extended = self.fetcher.strategy() == Strategy::PathIntrospection;
        let candidates: Vec<ApiResourceDescriptor> = dedupe_by_kind(fetched)
            .into_iter()
            .filter(|d| d.supports("delete"))
            .filter(|d| !self.config.is_excluded(&d.kind, extended))
            .collect();

        let index = if candidates.iter().any(|d| d.version.is_none()) {
            Some(self.fetcher.fetch_group_versions().await.map_err(|e| e.during(Operation::Pruning))?)
        } else {
            None
        };

        let mut out = Vec::with_capacity(candidates.len());
        for d in &candidates {
            match prune_id(d, index.as_ref(), self.resolver) {
                Some(id) => out.push(id),
                None => debug!(kind = %d.kind, group = %d.api_group, "no version for prunable kind; skipped"),
            }
        }
        counter!("prune_targets_total", out.len() as u64);
        info!(namespaced, targets = out.len(), "prune targets resolved");
        Ok(out)
    }
}
