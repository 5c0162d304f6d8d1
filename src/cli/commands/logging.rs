//! `-v` / `SENTINEL_LOG_LEVEL`.

use clap::{Arg, ArgAction, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order; a name's position is its `-v` count.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept a level name (any case) or a numeric verbosity up to 5.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|level: &str| -> Result<u8, String> {
        let level = level.trim();
        LEVELS
            .iter()
            .position(|name| name.eq_ignore_ascii_case(level))
            .and_then(|position| u8::try_from(position).ok())
            .or_else(|| level.parse::<u8>().ok().filter(|count| *count <= 5))
            .ok_or_else(|| {
                format!(
                    "invalid log level {level:?}, expected one of {}",
                    LEVELS.join(", ")
                )
            })
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Raise log verbosity; repeat for more (-v warn, -vv info, -vvv debug, -vvvv trace)")
            .env("SENTINEL_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
