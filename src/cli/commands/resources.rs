use clap::{value_parser, Arg, Command};
use std::path::PathBuf;

pub const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

fn id_arg() -> Arg {
    Arg::new("id")
        .help("Location id")
        .required(true)
        .value_parser(value_parser!(i64))
}

fn name_arg() -> Arg {
    Arg::new("name")
        .short('n')
        .long("name")
        .help("Location name")
        .required(true)
}

fn area_code_arg() -> Arg {
    Arg::new("area-code")
        .short('a')
        .long("area-code")
        .help("Location area code")
        .required(true)
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new("locations")
                .about("Manage locations")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List all locations"))
                .subcommand(Command::new("get").about("Show one location").arg(id_arg()))
                .subcommand(
                    Command::new("create")
                        .about("Create a location")
                        .arg(name_arg())
                        .arg(area_code_arg()),
                )
                .subcommand(
                    Command::new("update")
                        .about("Replace a location")
                        .arg(id_arg())
                        .arg(name_arg())
                        .arg(area_code_arg()),
                )
                .subcommand(Command::new("delete").about("Delete a location").arg(id_arg())),
        )
        .subcommand(
            Command::new("request")
                .about("Send a request with the stored session")
                .arg(
                    Arg::new("method")
                        .help("HTTP method")
                        .required(true)
                        .value_parser(HTTP_METHODS)
                        .ignore_case(true),
                )
                .arg(
                    Arg::new("path")
                        .help("Path below the API base URL")
                        .required(true),
                )
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .help("JSON request body"),
                ),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload a file as multipart form data")
                .arg(
                    Arg::new("path")
                        .help("Path below the API base URL")
                        .required(true),
                )
                .arg(
                    Arg::new("file")
                        .help("File to upload")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}
