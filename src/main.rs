//! # Podup
//! Command line front end for the podup supervisor: brings the podman REST
//! API service up, keeps it healthy while in use, and takes it down again
//! with a graceful-then-forceful stop.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Clap;
use nix::sys::signal::{SigSet, Signal};

use podup::logger;
use podup::runner::Runner;
use podup::service::{default_uri, PollPolicy, ServiceManager, StopPolicy};
use podup::signal;
use podup::state::ServiceState;

#[derive(Clap, Debug)]
#[clap(version = "0.1.0")]
struct Opts {
    /// path to the podman binary
    #[clap(long, default_value = "podman")]
    podman: PathBuf,
    /// run podman through sudo
    #[clap(long)]
    privileged: bool,
    /// log to this file instead of stderr
    #[clap(short, long)]
    log: Option<PathBuf>,
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Clap, Debug)]
enum SubCommand {
    /// start the API service and keep it up until interrupted
    Up(Up),
    /// report the state of the supervised service
    Status(Status),
    /// probe a service endpoint once
    Ping(Ping),
}

#[derive(Clap, Debug)]
struct Up {
    /// endpoint to serve on; defaults to the conventional podman socket
    uri: Option<String>,
    /// cross-origin policy forwarded to the service
    #[clap(long)]
    cors: Option<String>,
    /// seconds to wait for the service to become ready
    #[clap(long, default_value = "30")]
    ready_timeout: u64,
    /// seconds to wait for a graceful exit before killing the service
    #[clap(long, default_value = "10")]
    stop_timeout: u64,
    /// signal used for the graceful stop
    #[clap(long, default_value = "TERM")]
    stop_signal: String,
    /// milliseconds between readiness checks
    #[clap(long, default_value = "100")]
    interval: u64,
    /// directory for the session state file
    #[clap(long)]
    state_dir: Option<PathBuf>,
}

#[derive(Clap, Debug)]
struct Status {
    /// directory for the session state file
    #[clap(long)]
    state_dir: Option<PathBuf>,
}

#[derive(Clap, Debug)]
struct Ping {
    /// endpoint to probe; defaults to the conventional podman socket
    uri: Option<String>,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if let Err(e) = logger::init(opts.log) {
        eprintln!("log init failed: {:?}", e);
    }

    let runner = Runner::new()
        .with_path(opts.podman)
        .with_privileged(opts.privileged);
    let manager = ServiceManager::with_runner(runner);

    match opts.subcmd {
        SubCommand::Up(up_args) => up(&manager, up_args),
        SubCommand::Status(status_args) => status(status_args),
        SubCommand::Ping(ping_args) => ping(&manager, ping_args),
    }
}

fn up(manager: &ServiceManager, args: Up) -> Result<()> {
    let uri = args.uri.unwrap_or_else(default_uri);
    let state_dir = args.state_dir.unwrap_or_else(default_state_dir);
    let poll = PollPolicy::new()
        .with_timeout(Duration::from_secs(args.ready_timeout))
        .with_interval(Duration::from_millis(args.interval));
    let stop = StopPolicy::new()
        .with_timeout(Duration::from_secs(args.stop_timeout))
        .with_signal(signal::from_str(&args.stop_signal)?);

    // block the shutdown signals before the service is spawned, so an early
    // Ctrl-C cannot slip in between launch and cleanup
    let mut sigmask = SigSet::empty();
    sigmask.add(Signal::SIGINT);
    sigmask.add(Signal::SIGTERM);
    sigmask.thread_block()?;

    let session: Result<()> =
        manager.with_service(&uri, args.cors.as_deref(), &poll, &stop, |handle| {
            ServiceState::new(handle.pid().as_raw(), &uri).save(&state_dir)?;
            println!("service ready at {} (pid {})", uri, handle.pid());

            let sig = sigmask.wait()?;
            log::debug!("received {}, shutting down", sig);

            ServiceState::remove(&state_dir)?;
            Ok(())
        });
    session?;

    println!("service stopped");
    Ok(())
}

fn status(args: Status) -> Result<()> {
    let state_dir = args.state_dir.unwrap_or_else(default_state_dir);
    let state = ServiceState::load(&state_dir)?.refresh();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn ping(manager: &ServiceManager, args: Ping) -> Result<()> {
    let uri = args.uri.unwrap_or_else(default_uri);
    if manager.ping(&uri)? {
        println!("{}: OK", uri);
        Ok(())
    } else {
        bail!("service at {} answered but is not ready", uri)
    }
}

fn default_state_dir() -> PathBuf {
    match env::var("XDG_RUNTIME_DIR") {
        Ok(dir) => PathBuf::from(dir).join("podup"),
        Err(_) => PathBuf::from("/run/podup"),
    }
}
