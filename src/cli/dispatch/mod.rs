use crate::{
    cli::{
        actions::{resource, session, Action},
        commands::{ARG_API_URL, ARG_STORAGE_PATH, ARG_TIMEOUT},
        globals::GlobalArgs,
    },
    config::{default_storage_path, DEFAULT_API_BASE_URL, DEFAULT_TIMEOUT_SECONDS},
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use serde_json::Value;
use std::path::PathBuf;

fn globals(matches: &ArgMatches) -> GlobalArgs {
    GlobalArgs {
        api_url: matches
            .get_one::<String>(ARG_API_URL)
            .cloned()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        timeout: matches
            .get_one::<u64>(ARG_TIMEOUT)
            .copied()
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        storage_path: matches
            .get_one::<PathBuf>(ARG_STORAGE_PATH)
            .cloned()
            .unwrap_or_else(default_storage_path),
    }
}

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn password(matches: &ArgMatches) -> Result<SecretString> {
    required(matches, "password").map(SecretString::from)
}

fn id(matches: &ArgMatches) -> Result<i64> {
    matches
        .get_one::<i64>("id")
        .copied()
        .context("missing required argument: <id>")
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let globals = globals(matches);

    let Some((name, sub)) = matches.subcommand() else {
        return Err(anyhow!("missing subcommand"));
    };

    let session_command = match name {
        "login" => Some(session::Command::Login {
            email: required(sub, "email")?,
            password: password(sub)?,
        }),
        "logout" => Some(session::Command::Logout),
        "whoami" => Some(session::Command::WhoAmI {
            revalidate: sub.get_flag("revalidate"),
        }),
        "refresh" => Some(session::Command::Refresh),
        "register" => Some(session::Command::Register {
            name: required(sub, "name")?,
            email: required(sub, "email")?,
            password: password(sub)?,
        }),
        "profile" => Some(session::Command::Profile {
            name: sub.get_one::<String>("name").cloned(),
            email: sub.get_one::<String>("email").cloned(),
        }),
        _ => None,
    };

    if let Some(command) = session_command {
        return Ok(Action::Session(session::Args { globals, command }));
    }

    let command = match name {
        "locations" => resource::Command::Locations(location_command(sub)?),
        "request" => {
            let data = sub
                .get_one::<String>("data")
                .map(|data| serde_json::from_str::<Value>(data))
                .transpose()
                .context("--data must be valid JSON")?;
            resource::Command::Request {
                method: required(sub, "method")?.to_uppercase(),
                path: required(sub, "path")?,
                data,
            }
        }
        "upload" => resource::Command::Upload {
            path: required(sub, "path")?,
            file: sub
                .get_one::<PathBuf>("file")
                .cloned()
                .context("missing required argument: <file>")?,
        },
        other => return Err(anyhow!("unknown command: {other}")),
    };

    Ok(Action::Resource(resource::Args { globals, command }))
}

fn location_command(matches: &ArgMatches) -> Result<resource::LocationCommand> {
    let Some((name, sub)) = matches.subcommand() else {
        return Err(anyhow!("missing locations subcommand"));
    };

    Ok(match name {
        "list" => resource::LocationCommand::List,
        "get" => resource::LocationCommand::Get { id: id(sub)? },
        "create" => resource::LocationCommand::Create {
            name: required(sub, "name")?,
            area_code: required(sub, "area-code")?,
        },
        "update" => resource::LocationCommand::Update {
            id: id(sub)?,
            name: required(sub, "name")?,
            area_code: required(sub, "area-code")?,
        },
        "delete" => resource::LocationCommand::Delete { id: id(sub)? },
        other => return Err(anyhow!("unknown locations command: {other}")),
    })
}
