pub mod logging;
pub mod resources;
pub mod session;

use crate::config::{DEFAULT_API_BASE_URL, ENV_API_TIMEOUT, ENV_API_URL, ENV_STORAGE_PATH};
use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    value_parser, Arg, ColorChoice, Command,
};
use std::path::PathBuf;

pub const ARG_API_URL: &str = "api-url";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_STORAGE_PATH: &str = "storage-path";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("sesame")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_API_URL)
                .long("api-url")
                .help("API base URL")
                .env(ENV_API_URL)
                .default_value(DEFAULT_API_BASE_URL)
                .global(true),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long("timeout")
                .help("Request timeout in seconds")
                .env(ENV_API_TIMEOUT)
                .default_value("30")
                .value_parser(value_parser!(u64).range(1..))
                .global(true),
        )
        .arg(
            Arg::new(ARG_STORAGE_PATH)
                .long("storage-path")
                .help("Session file (default: $HOME/.sesame/session.json)")
                .env(ENV_STORAGE_PATH)
                .value_parser(value_parser!(PathBuf))
                .global(true),
        );

    let command = session::with_subcommands(command);
    let command = resources::with_subcommands(command);
    logging::with_args(command)
}
