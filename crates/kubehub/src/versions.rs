//! Picks the preferred API version for a kind.

use once_cell::sync::Lazy;
use regex::Regex;
use shipyard_core::VersionOverrides;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v(\d+)(alpha|beta)?(\d+)?$").unwrap());

/// Sort key: (major, stability, minor). Stability ranks alpha < beta < stable.
fn rank(version: &str) -> Option<(u64, u8, u64)> {
    let caps = VERSION_RE.captures(version)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let stability = match caps.get(2).map(|m| m.as_str()) {
        Some("alpha") => 0,
        Some("beta") => 1,
        _ => 2,
    };
    let minor = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    Some((major, stability, minor))
}

/// Highest version in the list; strings that do not look like `vN[alpha|betaM]` are ignored.
pub fn latest<S: AsRef<str>>(versions: &[S]) -> Option<&str> {
    versions
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|v| rank(v).map(|r| (r, v)))
        .max_by_key(|(r, _)| *r)
        .map(|(_, v)| v)
}

#[derive(Debug, Clone, Default)]
pub struct VersionResolver {
    overrides: VersionOverrides,
}

impl VersionResolver {
    pub fn new(overrides: VersionOverrides) -> Self {
        Self { overrides }
    }

    /// Override for `kind` if one exists (even when the list lacks it or is
    /// empty), else the latest of `versions`. `None` when nothing qualifies.
    pub fn resolve<S: AsRef<str>>(&self, versions: &[S], kind: &str) -> Option<String> {
        if let Some(v) = self.overrides.get(kind) {
            return Some(v.to_string());
        }
        latest(versions).map(str::to_string)
    }
}
