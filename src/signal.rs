use std::convert::TryFrom;

use anyhow::{bail, Result};
use nix::sys::signal::Signal;

/// Resolves a signal given by name or number, as accepted by the
/// `--stop-signal` command line option. Names may be given with or without
/// the `SIG` prefix, in any case.
pub fn from_str(signal: &str) -> Result<Signal> {
    let normalized = signal.trim().to_ascii_uppercase();

    if let Ok(number) = normalized.parse::<i32>() {
        return match Signal::try_from(number) {
            Ok(sig) => Ok(sig),
            Err(_) => bail!("{} is not a valid signal number", signal),
        };
    }

    let name = if normalized.starts_with("SIG") {
        normalized
    } else {
        format!("SIG{}", normalized)
    };
    for sig in Signal::iterator() {
        if sig.to_string() == name {
            return Ok(sig);
        }
    }

    bail!("{} is not a valid signal", signal)
}
