//! Error types surfaced by the service lifecycle and its collaborators.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while managing the lifecycle of a `podman system service`
/// process.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The `podman system service` command only exists on Linux hosts.
    /// Detected before any process is spawned.
    #[error("the `podman system service` command is available only on Linux systems, not on {os}")]
    PlatformUnsupported { os: String },

    /// The service did not answer a ping before the readiness deadline.
    /// The process may still be alive.
    #[error("service did not become ready within {timeout:?}")]
    Timeout { timeout: Duration },

    /// The service process exited before it ever became ready.
    #[error("service process exited with code {code} before becoming ready")]
    Terminated { code: i32 },

    /// A ping failed in a way the readiness loop does not tolerate.
    #[error(transparent)]
    Ping(#[from] ProbeError),

    /// A podman invocation finished with a non-zero exit status.
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Outcome classification for a single liveness probe.
///
/// Only [`ProbeError::Unreachable`] is recoverable, and only inside the
/// readiness loop; everything else ends the wait immediately.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The endpoint did not accept the connection or dropped it. Expected
    /// while the service is still starting up.
    #[error("API service at {uri} is not reachable: {source}")]
    Unreachable {
        uri: String,
        #[source]
        source: io::Error,
    },

    /// The URI cannot be probed at all, e.g. an unsupported scheme.
    #[error("cannot probe service URI {uri}: {reason}")]
    Address { uri: String, reason: String },

    /// The endpoint answered with something that is not HTTP.
    #[error("malformed ping response from {uri}: {reason}")]
    Protocol { uri: String, reason: String },
}

/// A podman command line invocation that ran but reported failure.
#[derive(Debug, Error)]
#[error("`{command}` failed ({status}): {stderr}")]
pub struct CommandError {
    pub command: String,
    pub status: ExitStatus,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_mentions_deadline() {
        let err = ServiceError::Timeout {
            timeout: Duration::from_secs(2),
        };
        assert!(err.to_string().contains("2s"));
    }

    #[test]
    fn test_probe_error_converts_to_service_error() {
        let probe = ProbeError::Address {
            uri: "ftp://nope".to_string(),
            reason: "unsupported scheme".to_string(),
        };
        let err = ServiceError::from(probe);
        assert!(matches!(err, ServiceError::Ping(ProbeError::Address { .. })));
    }
}
