//! Wrapper for one CustomResourceDefinition found in the cluster.

use std::fmt;
use std::sync::Arc;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1 as apiextv1;
use serde_json::Value as Json;

use crate::sink::{LogSink, TracingSink};

/// Annotation marking a CRD's instances as eligible for pruning.
pub const PRUNABLE_ANNOTATION: &str = "shipyard.dev/prunable";

/// Ambient configuration handed to every wrapper unchanged.
#[derive(Clone)]
pub struct CrdContext {
    pub namespace: String,
    pub context: String,
    pub sink: Arc<dyn LogSink>,
    pub tags: Vec<String>,
}

impl CrdContext {
    pub fn new(namespace: impl Into<String>, context: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), context: context.into(), sink: Arc::new(TracingSink), tags: Vec::new() }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

impl fmt::Debug for CrdContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrdContext")
            .field("namespace", &self.namespace)
            .field("context", &self.context)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Keeps the raw definition verbatim; typed accessors read from a parsed copy
/// when the body matches the `apiextensions.k8s.io/v1` schema.
#[derive(Clone, Debug)]
pub struct CustomResourceDefinition {
    raw: Json,
    typed: Option<apiextv1::CustomResourceDefinition>,
    ctx: CrdContext,
}

impl CustomResourceDefinition {
    /// Pure function of its inputs.
    pub fn new(raw: Json, ctx: CrdContext) -> Self {
        let typed = serde_json::from_value(raw.clone()).ok();
        Self { raw, typed, ctx }
    }

    pub fn raw(&self) -> &Json {
        &self.raw
    }

    pub fn context(&self) -> &CrdContext {
        &self.ctx
    }

    pub fn name(&self) -> &str {
        self.raw.pointer("/metadata/name").and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn group(&self) -> &str {
        match &self.typed {
            Some(crd) => &crd.spec.group,
            None => self.raw.pointer("/spec/group").and_then(|v| v.as_str()).unwrap_or(""),
        }
    }

    pub fn kind(&self) -> &str {
        match &self.typed {
            Some(crd) => &crd.spec.names.kind,
            None => self.raw.pointer("/spec/names/kind").and_then(|v| v.as_str()).unwrap_or(""),
        }
    }

    pub fn namespaced(&self) -> bool {
        let scope = match &self.typed {
            Some(crd) => crd.spec.scope.as_str(),
            None => self.raw.pointer("/spec/scope").and_then(|v| v.as_str()).unwrap_or("Namespaced"),
        };
        scope == "Namespaced"
    }

    /// Served version names in declaration order.
    pub fn served_versions(&self) -> Vec<String> {
        match &self.typed {
            Some(crd) => crd.spec.versions.iter().filter(|v| v.served).map(|v| v.name.clone()).collect(),
            None => self
                .raw
                .pointer("/spec/versions")
                .and_then(|v| v.as_array())
                .map(|vs| {
                    vs.iter()
                        .filter(|v| v.get("served").and_then(|b| b.as_bool()).unwrap_or(false))
                        .filter_map(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn prunable(&self) -> bool {
        self.raw
            .pointer("/metadata/annotations")
            .and_then(|a| a.get(PRUNABLE_ANNOTATION))
            .and_then(|v| v.as_str())
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}
