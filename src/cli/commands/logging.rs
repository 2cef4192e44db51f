use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ENV_LOG_LEVEL: &str = "SESAME_LOG_LEVEL";

/// Accepts a count (`0`-`4`) or a level name, so `SESAME_LOG_LEVEL=debug`
/// means the same as `-vvv`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|value: &str| -> std::result::Result<u8, String> {
        let value = value.trim();
        if let Ok(count) = value.parse::<u8>() {
            return if count <= 4 {
                Ok(count)
            } else {
                Err(format!("log level out of range: {count}"))
            };
        }

        match value.to_ascii_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            other => Err(format!("unknown log level: {other}")),
        }
    })
}

/// Level for a verbosity count. Zero keeps the error-only default.
#[must_use]
pub const fn level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log verbosity on stderr; repeat or set error, warn, info, debug, trace")
            .env(ENV_LOG_LEVEL)
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_follows_count() {
        assert_eq!(level(0), None);
        assert_eq!(level(1), Some(Level::WARN));
        assert_eq!(level(3), Some(Level::DEBUG));
        assert_eq!(level(9), Some(Level::TRACE));
    }
}
