use std::fmt;

use thiserror::Error;

/// Which caller-facing operation a cluster-API failure aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Discovery,
    Pruning,
    CrdListing,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Discovery => "discovery",
            Operation::Pruning => "pruning",
            Operation::CrdListing => "CRD listing",
        })
    }
}

/// Fatal cluster-API error. The command runner has already exhausted its
/// retries by the time one of these is built.
#[derive(Debug, Error)]
pub enum ClusterApiError {
    #[error("{operation} failed: {request}: {stderr}")]
    Command { operation: Operation, request: String, stderr: String },
    #[error("{operation} failed: {request} returned an unexpected document: {source}")]
    Decode {
        operation: Operation,
        request: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClusterApiError {
    pub fn command(operation: Operation, request: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Command { operation, request: request.into(), stderr: stderr.into().trim_end().to_string() }
    }

    pub fn decode(operation: Operation, request: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode { operation, request: request.into(), source }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Command { operation, .. } | Self::Decode { operation, .. } => *operation,
        }
    }

    /// Re-tag the error with the operation that was in flight (discovery done on behalf of pruning).
    pub fn during(mut self, op: Operation) -> Self {
        match &mut self {
            Self::Command { operation, .. } | Self::Decode { operation, .. } => *operation = op,
        }
        self
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Command { stderr, .. } => Some(stderr),
            Self::Decode { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_operation_request_and_stderr() {
        let e = ClusterApiError::command(Operation::Discovery, "get --raw /", "Unable to connect to the server\n");
        assert_eq!(e.to_string(), "discovery failed: get --raw /: Unable to connect to the server");
        let e = e.during(Operation::Pruning);
        assert_eq!(e.operation(), Operation::Pruning);
        assert!(e.to_string().starts_with("pruning failed"));
        assert_eq!(e.stderr(), Some("Unable to connect to the server"));
    }
}
