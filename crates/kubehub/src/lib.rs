//! Shipyard kubehub: kubectl runner, API surface discovery, prune targets and CRD listing.

#![forbid(unsafe_code)]

pub mod crds;
pub mod discovery;
pub mod fetcher;
pub mod prune;
pub mod runner;
pub mod versions;

pub use crds::CustomResourceDiscovery;
pub use discovery::ClusterDiscovery;
pub use fetcher::{ApiSurfaceFetcher, ServerVersion, Strategy};
pub use prune::PruneTargetResolver;
pub use runner::{CommandOutput, CommandRunner, Kubectl, KubectlConfig, OutputFormat, RunOptions};
pub use versions::VersionResolver;
