//! Normalised view of the cluster API surface.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name the legacy (empty-string) group is addressed by in prune identifiers.
pub const CORE_GROUP: &str = "core";

/// One resource kind as reported by the cluster.
///
/// `version` is `None` when the discovery source does not report one
/// (the tabular `api-resources` output); it is resolved later from the
/// group's known versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResourceDescriptor {
    /// Plural resource name (`pods`), empty when the source omits it.
    #[serde(default)]
    pub name: String,
    pub kind: String,
    /// Empty for the legacy group.
    #[serde(default)]
    pub api_group: String,
    #[serde(default)]
    pub version: Option<String>,
    pub namespaced: bool,
    pub verbs: BTreeSet<String>,
}

impl ApiResourceDescriptor {
    pub fn new(kind: impl Into<String>, api_group: impl Into<String>, verbs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: String::new(),
            kind: kind.into(),
            api_group: api_group.into(),
            version: None,
            namespaced: false,
            verbs: verbs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    /// Exact membership check on the verb list.
    pub fn supports(&self, verb: &str) -> bool {
        self.verbs.contains(verb)
    }

    pub fn is_core_group(&self) -> bool {
        is_core(&self.api_group)
    }
}

fn is_core(group: &str) -> bool {
    let g = group.trim();
    g.is_empty() || g == CORE_GROUP
}

/// `group/version/kind` identifier of a deletable kind. Empty segments are omitted when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrunableResourceId {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl PrunableResourceId {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }
}

impl fmt::Display for PrunableResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in [self.group.as_str(), self.version.as_str(), self.kind.as_str()] {
            if seg.is_empty() {
                continue;
            }
            if !first {
                f.write_str("/")?;
            }
            f.write_str(seg)?;
            first = false;
        }
        Ok(())
    }
}

/// API group name -> versions observed for it, in first-seen order.
///
/// The legacy group is stored under the empty string; lookups by `""` and
/// `"core"` are equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionIndex {
    groups: BTreeMap<String, Vec<String>>,
}

impl GroupVersionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `kubectl api-versions` output: one `group/version` per line, the
    /// legacy group rendered as a bare `v1`.
    pub fn from_api_versions(raw: &str) -> Self {
        let mut index = Self::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once('/') {
                Some((group, version)) => index.insert(group, version),
                None => index.insert("", line),
            }
        }
        index
    }

    pub fn insert(&mut self, group: &str, version: &str) {
        let key = if is_core(group) { String::new() } else { group.to_string() };
        let versions = self.groups.entry(key).or_default();
        if !versions.iter().any(|v| v == version) {
            versions.push(version.to_string());
        }
    }

    pub fn versions(&self, group: &str) -> &[String] {
        let key = if is_core(group) { "" } else { group };
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups.iter().map(|(g, v)| (g.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
