//! Shipyard core types: discovered API surface, prune identifiers, errors and configuration.

#![forbid(unsafe_code)]

pub mod config;
pub mod crd;
pub mod error;
pub mod resource;
pub mod sink;
pub mod table;

pub use config::{DiscoveryConfig, StrategyChoice, VersionOverrides};
pub use crd::{CrdContext, CustomResourceDefinition};
pub use error::{ClusterApiError, ConfigError, Operation};
pub use resource::{ApiResourceDescriptor, GroupVersionIndex, PrunableResourceId, CORE_GROUP};
pub use sink::{LogSink, TracingSink};

pub mod prelude {
    pub use super::{
        ApiResourceDescriptor, ClusterApiError, CustomResourceDefinition, DiscoveryConfig, GroupVersionIndex, LogSink,
        Operation, PrunableResourceId,
    };
}
