//! Lifecycle management for the `podman system service` process: launch,
//! readiness polling, scoped use and escalating shutdown.

pub mod config;
pub mod handle;
pub mod manager;
mod manager_session;
mod manager_stop;
mod manager_wait;

pub use config::{default_uri, PollPolicy, ServiceConfig, StopPolicy, DEFAULT_URI};
pub use handle::ServiceHandle;
pub use manager::ServiceManager;
