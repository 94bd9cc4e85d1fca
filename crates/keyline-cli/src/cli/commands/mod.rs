//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod profile;

use std::io::IsTerminal;

use anyhow::{Context, Result, bail};
use keyline_core::outcome::AuthOutcome;

/// Turns a finished outcome into a result; `Failed(reason)` becomes an error.
fn finished<T>(outcome: AuthOutcome<T>) -> Result<T> {
    match outcome {
        AuthOutcome::Ok(value) => Ok(value),
        AuthOutcome::Failed(reason) => bail!("{reason}"),
        AuthOutcome::Idle | AuthOutcome::Pending => bail!("Request did not complete"),
    }
}

/// Reads one line from stdin, prompting on stderr when interactive.
fn read_line(label: &str) -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("{label}: ");
    }

    let mut line = String::new();
    let read = stdin
        .read_line(&mut line)
        .with_context(|| format!("read {} from stdin", label.to_lowercase()))?;
    if read == 0 {
        bail!("{label} not provided");
    }

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
