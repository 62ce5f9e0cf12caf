//! Scoped service sessions: acquire a ready service, guarantee release.

use crate::errors::ServiceError;
use crate::service::config::{PollPolicy, ServiceConfig, StopPolicy};
use crate::service::handle::ServiceHandle;
use crate::service::manager::ServiceManager;

impl ServiceManager {
    /// Runs `f` against a ready service and stops the service afterwards,
    /// no matter how the session ends.
    ///
    /// The service is launched with the idle exit disabled (`--time=0`);
    /// while the session lasts, the process lifetime belongs to this
    /// manager alone. If the service never becomes ready the partially
    /// started process is stopped and the readiness failure is re-raised
    /// unchanged; a failure of that cleanup is logged, never substituted
    /// for the original error. Once ready, the handle is lent to `f` and
    /// the shutdown runs both on a normal return and on an error from `f`.
    /// The handle itself kills the process when dropped, so even an unwind
    /// out of `f` cannot leak it.
    pub fn with_service<T, E, F>(
        &self,
        uri: &str,
        cors: Option<&str>,
        poll: &PollPolicy,
        stop: &StopPolicy,
        f: F,
    ) -> Result<T, E>
    where
        E: From<ServiceError>,
        F: FnOnce(&ServiceHandle) -> Result<T, E>,
    {
        let mut config = ServiceConfig::new().with_uri(uri).with_time(0);
        if let Some(cors) = cors {
            config = config.with_cors(cors);
        }

        let mut handle = self.start_service(&config).map_err(E::from)?;
        if let Err(err) = self.wait_for_service(uri, &mut handle, poll) {
            if let Err(cleanup) = self.stop_service(&mut handle, stop) {
                log::warn!(
                    "cleanup of service process {} failed: {}",
                    handle.pid(),
                    cleanup
                );
            }
            return Err(E::from(err));
        }

        let result = f(&handle);

        match self.stop_service(&mut handle, stop) {
            Ok(code) => log::debug!("service process exited with code {}", code),
            Err(err) => {
                if result.is_ok() {
                    return Err(E::from(err));
                }
                log::warn!("stopping service after a failed session also failed: {}", err);
            }
        }
        result
    }
}
