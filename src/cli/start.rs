use crate::cli::{
    actions::Action,
    commands::{self, logging},
    dispatch, telemetry,
};
use anyhow::Result;
use clap::ArgMatches;
use std::ffi::OsString;
use tracing::Level;

fn log_level(matches: &ArgMatches) -> Option<Level> {
    matches
        .get_one::<u8>(logging::ARG_VERBOSITY)
        .copied()
        .and_then(logging::level)
}

/// Parses the process arguments, installs logging and resolves the action.
///
/// # Errors
/// Returns an error if telemetry cannot be installed or the arguments do not
/// form a runnable action.
pub fn start() -> Result<Action> {
    start_from(std::env::args_os())
}

/// Same as [`start`] over explicit arguments. `--help` and `--version` print
/// and exit.
///
/// # Errors
/// See [`start`].
pub fn start_from<I, T>(args: I) -> Result<Action>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = commands::new().get_matches_from(args);

    telemetry::init(log_level(&matches))?;

    dispatch::handler(&matches)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn level_for(args: &[&str]) -> Option<Level> {
        temp_env::with_vars([(logging::ENV_LOG_LEVEL, None::<&str>)], || {
            let matches = commands::new().try_get_matches_from(args).unwrap();
            log_level(&matches)
        })
    }

    #[test]
    fn test_log_level_from_flags() {
        assert_eq!(level_for(&["sesame", "whoami"]), None);
        assert_eq!(level_for(&["sesame", "-vv", "whoami"]), Some(Level::INFO));
        assert_eq!(level_for(&["sesame", "logout", "-vvvvv"]), Some(Level::TRACE));
    }
}
