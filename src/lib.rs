//! # Podup
//! Supervisor for the podman REST API service. Podup launches
//! `podman system service`, polls the endpoint until it is healthy, lends
//! the live process handle to the caller and guarantees a
//! graceful-then-forceful shutdown on every exit path.

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod errors;
pub mod logger;
pub mod probe;
pub mod runner;
pub mod service;
pub mod signal;
pub mod state;
