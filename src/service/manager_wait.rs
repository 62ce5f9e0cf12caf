//! Readiness polling.

use std::thread;
use std::time::Instant;

use crate::errors::{ProbeError, ServiceError};
use crate::service::config::PollPolicy;
use crate::service::handle::ServiceHandle;
use crate::service::manager::ServiceManager;

impl ServiceManager {
    /// Waits until the service behind `handle` answers a ping at `uri`.
    ///
    /// Each iteration performs three checks in a fixed order: first the
    /// deadline, then whether the process exited, then one ping. The order
    /// matters: an expired deadline is reported even when the process has
    /// also exited, and a dead process is reported instead of a ping result
    /// observed in the same iteration. Pings that fail because the endpoint
    /// is not accepting connections yet keep the loop going; every other
    /// probe failure ends the wait immediately.
    pub fn wait_for_service(
        &self,
        uri: &str,
        handle: &mut ServiceHandle,
        policy: &PollPolicy,
    ) -> Result<(), ServiceError> {
        let start = Instant::now();
        loop {
            if let Some(timeout) = policy.timeout() {
                if start.elapsed() >= timeout {
                    return Err(ServiceError::Timeout { timeout });
                }
            }

            if let Some(code) = handle.try_wait()? {
                return Err(ServiceError::Terminated { code });
            }

            match self.prober().ping(uri) {
                Ok(true) => {
                    log::debug!("service at {} is ready", uri);
                    return Ok(());
                }
                Ok(false) => {}
                Err(ProbeError::Unreachable { .. }) => {
                    log::trace!("service at {} not reachable yet", uri);
                }
                Err(err) => return Err(err.into()),
            }

            thread::sleep(policy.interval());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::process::Command;
    use std::time::Duration;

    use nix::sys::signal::Signal;

    use crate::probe::Prober;
    use crate::runner::Runner;

    use super::*;

    const URI: &str = "tcp://127.0.0.1:9999";

    /// Probe outcome per call, scripted up front. Repeats the last entry
    /// once the script is down to one.
    struct ScriptedProber {
        script: RefCell<VecDeque<Result<bool, ProbeErrorKind>>>,
    }

    #[derive(Clone, Copy)]
    enum ProbeErrorKind {
        Unreachable,
        Protocol,
    }

    impl ScriptedProber {
        fn new(script: Vec<Result<bool, ProbeErrorKind>>) -> Self {
            Self {
                script: RefCell::new(script.into_iter().collect()),
            }
        }
    }

    impl Prober for ScriptedProber {
        fn ping(&self, uri: &str) -> Result<bool, ProbeError> {
            let mut script = self.script.borrow_mut();
            let outcome = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                *script.front().expect("probe script must not be empty")
            };
            match outcome {
                Ok(ready) => Ok(ready),
                Err(ProbeErrorKind::Unreachable) => Err(ProbeError::Unreachable {
                    uri: uri.to_string(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                }),
                Err(ProbeErrorKind::Protocol) => Err(ProbeError::Protocol {
                    uri: uri.to_string(),
                    reason: "not http".to_string(),
                }),
            }
        }
    }

    /// Fails the test if the readiness loop pings at all.
    struct PanicProber;

    impl Prober for PanicProber {
        fn ping(&self, _uri: &str) -> Result<bool, ProbeError> {
            panic!("no ping may be issued once the deadline has expired");
        }
    }

    fn manager_with(prober: impl Prober + 'static) -> ServiceManager {
        ServiceManager::with_runner(Runner::new()).with_prober(Box::new(prober))
    }

    fn spawn(script: &str) -> ServiceHandle {
        ServiceHandle::new(
            Command::new("/bin/sh")
                .arg("-c")
                .arg(script)
                .spawn()
                .unwrap(),
        )
    }

    fn reap(mut handle: ServiceHandle) {
        handle.kill(Signal::SIGKILL).unwrap();
        handle.wait().unwrap();
    }

    #[test]
    fn test_zero_timeout_fails_without_pinging() {
        let manager = manager_with(PanicProber);
        let mut handle = spawn("sleep 30");
        let policy = PollPolicy::new().with_timeout(Duration::from_secs(0));

        let err = manager
            .wait_for_service(URI, &mut handle, &policy)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }));
        reap(handle);
    }

    #[test]
    fn test_dead_process_reported_with_its_exit_code() {
        let manager = manager_with(ScriptedProber::new(vec![Err(ProbeErrorKind::Unreachable)]));
        let mut handle = spawn("exit 3");
        let policy = PollPolicy::new()
            .with_timeout(Duration::from_secs(5))
            .with_interval(Duration::from_millis(10));

        let err = manager
            .wait_for_service(URI, &mut handle, &policy)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Terminated { code: 3 }));
    }

    #[test]
    fn test_ready_after_transient_unreachability() {
        let manager = manager_with(ScriptedProber::new(vec![
            Err(ProbeErrorKind::Unreachable),
            Err(ProbeErrorKind::Unreachable),
            Ok(true),
        ]));
        let mut handle = spawn("sleep 30");
        let interval = Duration::from_millis(20);
        let policy = PollPolicy::new()
            .with_timeout(Duration::from_secs(5))
            .with_interval(interval);

        let start = Instant::now();
        manager.wait_for_service(URI, &mut handle, &policy).unwrap();
        assert!(start.elapsed() >= interval * 2);
        reap(handle);
    }

    #[test]
    fn test_not_ready_responses_keep_polling() {
        let manager = manager_with(ScriptedProber::new(vec![Ok(false), Ok(false), Ok(true)]));
        let mut handle = spawn("sleep 30");
        let policy = PollPolicy::new()
            .with_timeout(Duration::from_secs(5))
            .with_interval(Duration::from_millis(5));

        manager.wait_for_service(URI, &mut handle, &policy).unwrap();
        reap(handle);
    }

    #[test]
    fn test_fatal_probe_error_ends_wait() {
        let manager = manager_with(ScriptedProber::new(vec![Err(ProbeErrorKind::Protocol)]));
        let mut handle = spawn("sleep 30");
        let policy = PollPolicy::new().with_interval(Duration::from_millis(5));

        let err = manager
            .wait_for_service(URI, &mut handle, &policy)
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Ping(ProbeError::Protocol { .. })
        ));
        reap(handle);
    }

    #[test]
    fn test_expired_deadline_beats_dead_process() {
        let manager = manager_with(PanicProber);
        let mut handle = spawn("exit 5");
        // give the child time to be long gone before the loop starts
        thread::sleep(Duration::from_millis(50));

        let policy = PollPolicy::new().with_timeout(Duration::from_secs(0));
        let err = manager
            .wait_for_service(URI, &mut handle, &policy)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { .. }));
    }
}
