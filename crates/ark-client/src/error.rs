//! Error taxonomy for ark container calls

use std::fmt;

use crate::models::Operation;

/// Why a call never reached the container or did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    Timeout,
    Dns,
    Cancelled,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionRefused => "connection_refused",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`crate::ArkClient`] operations.
///
/// An uninstall of a module that is already absent is not an error; it is
/// reported as [`crate::UninstallOutcome::NotInstalled`].
#[derive(Debug, thiserror::Error)]
pub enum ArkError {
    /// The request never reached the container or did not complete
    #[error("{method} \"{url}\": {diagnostic}")]
    Transport {
        kind: TransportErrorKind,
        method: &'static str,
        url: String,
        diagnostic: String,
    },

    /// The container answered with a body that is not a response envelope
    #[error("{operation} failed: unable to decode response: {reason}")]
    Decode { operation: Operation, reason: String },

    /// The container answered and reported a non-success code
    #[error("{operation} failed: {message}")]
    RemoteOperation { operation: Operation, message: String },

    /// The exec tunnel process could not be started or exited abnormally
    #[error("{operation} failed: exec tunnel `{command}` {reason}")]
    TunnelExec {
        operation: Operation,
        command: String,
        reason: String,
        stderr: String,
    },

    /// The exec tunnel ran but its output did not carry the success token
    #[error("{operation} status query failed")]
    TunnelRejected {
        operation: Operation,
        stdout: String,
        stderr: String,
    },

    #[error("{operation} is not supported for {route} targets")]
    UnsupportedRoute {
        operation: Operation,
        route: &'static str,
    },

    #[error("invalid target container: {0}")]
    InvalidCoordinate(String),

    #[error("failed to create HTTP client: {0}")]
    ClientSetup(String),
}

impl ArkError {
    pub(crate) fn cancelled(method: &'static str, url: impl Into<String>) -> Self {
        ArkError::Transport {
            kind: TransportErrorKind::Cancelled,
            method,
            url: url.into(),
            diagnostic: "request cancelled".to_string(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ArkError::Transport { kind, .. } => kind.as_str(),
            ArkError::Decode { .. } => "decode",
            ArkError::RemoteOperation { .. } => "remote",
            ArkError::TunnelExec { .. } => "tunnel_exec",
            ArkError::TunnelRejected { .. } => "tunnel_rejected",
            ArkError::UnsupportedRoute { .. } => "unsupported",
            ArkError::InvalidCoordinate(_) => "invalid_coordinate",
            ArkError::ClientSetup(_) => "client_setup",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ArkError::Transport {
                kind: TransportErrorKind::Cancelled,
                ..
            }
        )
    }

    /// Raw subprocess output carried by tunnel errors, one entry per line
    pub fn subprocess_output(&self) -> Vec<String> {
        match self {
            ArkError::TunnelExec { stderr, .. } => stderr.lines().map(str::to_string).collect(),
            ArkError::TunnelRejected { stdout, stderr, .. } => stdout
                .lines()
                .chain(stderr.lines())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}
