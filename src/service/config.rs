//! Value objects describing how a service is launched, polled and stopped.

use std::env;
use std::time::Duration;

use nix::sys::signal::Signal;
use nix::unistd;

/// The well-known rootful API socket.
pub const DEFAULT_URI: &str = "unix:///run/podman/podman.sock";

/// Interval between readiness checks unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves the conventional service URI for the current user: the system
/// socket for root, the per-user runtime socket otherwise. Callers that want
/// a different default pass their own URI instead; nothing in the lifecycle
/// core consults this implicitly.
pub fn default_uri() -> String {
    default_uri_for(
        unistd::geteuid().is_root(),
        env::var("XDG_RUNTIME_DIR").ok().as_deref(),
    )
}

fn default_uri_for(rootful: bool, runtime_dir: Option<&str>) -> String {
    match (rootful, runtime_dir) {
        (false, Some(dir)) => format!("unix://{}/podman/podman.sock", dir.trim_end_matches('/')),
        _ => DEFAULT_URI.to_string(),
    }
}

/// Describes one `podman system service` launch. Fields that are left unset
/// are omitted from the constructed argument list so that podman applies its
/// own defaults.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    uri: Option<String>,
    time: Option<u64>,
    cors: Option<String>,
    extra_args: Vec<String>,
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint the service should listen on.
    pub fn with_uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Seconds of inactivity before the service exits on its own
    /// (`--time`). Zero disables the idle exit entirely.
    pub fn with_time(mut self, seconds: u64) -> Self {
        self.time = Some(seconds);
        self
    }

    /// Cross-origin policy forwarded to the service (`--cors`).
    pub fn with_cors<S: Into<String>>(mut self, cors: S) -> Self {
        self.cors = Some(cors.into());
        self
    }

    /// Appends a verbatim argument to the launch invocation.
    pub fn with_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub(crate) fn to_args(&self) -> Vec<String> {
        let mut args = vec!["system".to_string(), "service".to_string()];
        if let Some(time) = self.time {
            args.push(format!("--time={}", time));
        }
        if let Some(cors) = &self.cors {
            args.push(format!("--cors={}", cors));
        }
        args.extend(self.extra_args.iter().cloned());
        if let Some(uri) = &self.uri {
            args.push(uri.clone());
        }
        args
    }
}

/// Bounds the readiness wait. Without a timeout the wait only ends on a
/// successful ping, a fatal probe failure or the process exiting.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    timeout: Option<Duration>,
    interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Bounds the graceful part of a shutdown. Without a timeout the stop waits
/// indefinitely for the graceful signal to take effect; production callers
/// should always bound it.
#[derive(Debug, Clone)]
pub struct StopPolicy {
    timeout: Option<Duration>,
    signal: Signal,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            signal: Signal::SIGTERM,
        }
    }
}

impl StopPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Signal used for the graceful phase. The forceful fallback is always
    /// SIGKILL.
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = signal;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }
}
