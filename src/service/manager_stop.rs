//! Shutdown escalation.

use nix::sys::signal::Signal;

use crate::errors::ServiceError;
use crate::service::config::StopPolicy;
use crate::service::handle::ServiceHandle;
use crate::service::manager::ServiceManager;

impl ServiceManager {
    /// Stops the service process and returns its exit code.
    ///
    /// The graceful signal is sent unconditionally; it is a no-op on a
    /// process that has already exited. If the process survives the
    /// policy's grace period it is killed, after which the final reap is
    /// unbounded, a kill being assumed to always take effect.
    pub fn stop_service(
        &self,
        handle: &mut ServiceHandle,
        policy: &StopPolicy,
    ) -> Result<i32, ServiceError> {
        log::debug!(
            "stopping service process {} with {}",
            handle.pid(),
            policy.signal()
        );
        handle.kill(policy.signal())?;

        if let Some(code) = handle.wait_timeout(policy.timeout())? {
            return Ok(code);
        }

        log::warn!(
            "service process {} survived {:?}, killing it",
            handle.pid(),
            policy.timeout()
        );
        handle.kill(Signal::SIGKILL)?;
        handle.wait()
    }
}
