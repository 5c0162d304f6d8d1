//! Process bootstrap: parse arguments, install logging, pick the action.

use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;
use clap::ArgMatches;
use tracing::{Level, debug};

/// Level requested with `-v` (repeatable) or `SENTINEL_LOG_LEVEL`; without
/// either, telemetry keeps its own default filter.
fn log_level(matches: &ArgMatches) -> Option<Level> {
    let count = matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);
    let index = usize::from(count).checked_sub(1)?;

    Some(
        [Level::WARN, Level::INFO, Level::DEBUG]
            .get(index)
            .copied()
            .unwrap_or(Level::TRACE),
    )
}

/// Parse the command line and get ready to run.
///
/// # Errors
/// Fails when telemetry cannot be installed or the options do not describe a
/// runnable server.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(log_level(&matches))?;
    debug!(version = env!("CARGO_PKG_VERSION"), "starting sentinel");

    dispatch::handler(&matches)
}
