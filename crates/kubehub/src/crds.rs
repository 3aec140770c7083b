use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as Json;
use shipyard_core::{ClusterApiError, CrdContext, CustomResourceDefinition, Operation};
use tokio::sync::OnceCell;
use tracing::info;

use crate::runner::{describe, CommandRunner, OutputFormat, RunOptions};

#[derive(Debug, Deserialize)]
struct CrdList {
    #[serde(default)]
    items: Vec<Json>,
}

/// CRDs of the cluster, listed once and reused for the lifetime of this value.
/// A failed listing is not cached; the next call retries.
pub struct CustomResourceDiscovery {
    runner: Arc<dyn CommandRunner>,
    ctx: CrdContext,
    attempts: u32,
    cache: OnceCell<Vec<CustomResourceDefinition>>,
}

impl CustomResourceDiscovery {
    pub fn new(runner: Arc<dyn CommandRunner>, ctx: CrdContext) -> Self {
        Self { runner, ctx, attempts: 5, cache: OnceCell::new() }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub async fn crds(&self) -> Result<&[CustomResourceDefinition], ClusterApiError> {
        self.cache.get_or_try_init(|| self.list()).await.map(Vec::as_slice)
    }

    /// CRDs annotated as prunable.
    pub async fn prunable_crds(&self) -> Result<Vec<&CustomResourceDefinition>, ClusterApiError> {
        Ok(self.crds().await?.iter().filter(|c| c.prunable()).collect())
    }

    async fn list(&self) -> Result<Vec<CustomResourceDefinition>, ClusterApiError> {
        let args = vec!["get".to_string(), "CustomResourceDefinition".to_string()];
        let request = describe(&args);
        let opts = RunOptions::cluster(self.attempts).output(OutputFormat::Json);
        let out = self.runner.run(&args, &opts).await;
        if !out.success {
            return Err(ClusterApiError::command(Operation::CrdListing, request, out.stderr));
        }
        let list: CrdList =
            serde_json::from_str(&out.stdout).map_err(|e| ClusterApiError::decode(Operation::CrdListing, request, e))?;
        let crds: Vec<_> = list.items.into_iter().map(|raw| CustomResourceDefinition::new(raw, self.ctx.clone())).collect();
        info!(count = crds.len(), "custom resource definitions listed");
        Ok(crds)
    }
}
