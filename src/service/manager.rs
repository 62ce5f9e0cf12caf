//! The lifecycle manager owning launch, readiness and shutdown of one
//! service process per session.

use std::env;

use crate::errors::{ProbeError, ServiceError};
use crate::probe::{HttpProber, Prober};
use crate::runner::Runner;
use crate::service::config::ServiceConfig;
use crate::service::handle::ServiceHandle;

/// Drives the start, wait-until-ready, in-use and stop phases of a
/// `podman system service` process. All process control goes through this
/// manager; callers only ever talk to the service's network endpoint.
pub struct ServiceManager {
    runner: Runner,
    prober: Box<dyn Prober>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::with_runner(Runner::new())
    }

    pub fn with_runner(runner: Runner) -> Self {
        Self {
            runner,
            prober: Box::new(HttpProber::new()),
        }
    }

    /// Replaces the liveness prober. Mainly useful for tests that script
    /// probe outcomes.
    pub fn with_prober(mut self, prober: Box<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    /// One liveness check against `uri`.
    pub fn ping(&self, uri: &str) -> Result<bool, ProbeError> {
        self.prober.ping(uri)
    }

    pub(crate) fn prober(&self) -> &dyn Prober {
        self.prober.as_ref()
    }

    /// Launches the service process described by `config` and returns
    /// immediately with its handle. The service command only exists on
    /// Linux; elsewhere this fails before anything is spawned.
    pub fn start_service(&self, config: &ServiceConfig) -> Result<ServiceHandle, ServiceError> {
        ensure_supported(env::consts::OS)?;

        let child = self.runner.spawn(&config.to_args())?;
        log::debug!("started service process {}", child.id());
        Ok(ServiceHandle::new(child))
    }
}

fn ensure_supported(os: &str) -> Result<(), ServiceError> {
    if os != "linux" {
        return Err(ServiceError::PlatformUnsupported { os: os.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_linux_is_supported() {
        assert!(ensure_supported("linux").is_ok());
        for os in &["macos", "windows", "freebsd"] {
            let err = ensure_supported(os).unwrap_err();
            assert!(matches!(err, ServiceError::PlatformUnsupported { .. }));
            assert!(err.to_string().contains(os));
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_start_service_spawns_detached() {
        let manager = ServiceManager::with_runner(Runner::new().with_path("/bin/true"));
        let mut handle = manager
            .start_service(&ServiceConfig::new().with_time(0))
            .unwrap();
        assert_eq!(handle.wait().unwrap(), 0);
    }
}
