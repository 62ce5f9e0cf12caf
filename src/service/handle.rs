//! Ownership of the spawned service process.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::errors::ServiceError;

/// Granularity of the bounded reap in [`ServiceHandle::wait_timeout`].
const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a running `podman system service` process.
///
/// The exit code is recorded the first time the process is reaped; all
/// later waits return the recorded value, which is what makes stopping an
/// already-exited service idempotent. A handle that is dropped while the
/// process is still running kills and reaps it, so the daemon cannot
/// outlive a panicking caller.
#[derive(Debug)]
pub struct ServiceHandle {
    child: Child,
    exit_code: Option<i32>,
}

impl ServiceHandle {
    pub(crate) fn new(child: Child) -> Self {
        Self {
            child,
            exit_code: None,
        }
    }

    pub fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    /// Exit code of the process, if it has been reaped already.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Non-blocking exit check. Returns the exit code once the process has
    /// exited, `None` while it is still running.
    pub fn try_wait(&mut self) -> Result<Option<i32>, ServiceError> {
        if let Some(code) = self.exit_code {
            return Ok(Some(code));
        }
        match self.child.try_wait()? {
            Some(status) => Ok(Some(self.record(status))),
            None => Ok(None),
        }
    }

    /// Blocks until the process exits and returns its exit code. A process
    /// killed by a signal reports the negated signal number, e.g. -9 after
    /// SIGKILL.
    pub fn wait(&mut self) -> Result<i32, ServiceError> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        let status = self.child.wait()?;
        Ok(self.record(status))
    }

    /// Reaps the process, giving up after `timeout`. `None` waits
    /// indefinitely. Returns `Ok(None)` when the deadline passed with the
    /// process still alive.
    pub fn wait_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<i32>, ServiceError> {
        let limit = match timeout {
            Some(limit) => limit,
            None => return self.wait().map(Some),
        };

        let start = Instant::now();
        loop {
            if let Some(code) = self.try_wait()? {
                return Ok(Some(code));
            }
            let elapsed = start.elapsed();
            if elapsed >= limit {
                return Ok(None);
            }
            std::thread::sleep(REAP_INTERVAL.min(limit - elapsed));
        }
    }

    /// Sends `signal` to the process. Signalling a process that has already
    /// exited is not an error.
    pub fn kill(&mut self, signal: Signal) -> Result<(), ServiceError> {
        if self.exit_code.is_some() {
            return Ok(());
        }
        match signal::kill(self.pid(), signal) {
            Ok(()) => Ok(()),
            Err(err) if err == Errno::ESRCH => Ok(()),
            Err(err) => Err(io::Error::from_raw_os_error(err as i32).into()),
        }
    }

    fn record(&mut self, status: ExitStatus) -> i32 {
        let code = status
            .code()
            .unwrap_or_else(|| -status.signal().unwrap_or(0));
        self.exit_code = Some(code);
        code
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if self.exit_code.is_none() {
            if let Ok(None) = self.child.try_wait() {
                log::warn!("service process {} dropped while running, killing", self.pid());
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
        }
    }
}
