use clap::{Arg, ArgAction, Command};

pub const ENV_PASSWORD: &str = "SESAME_PASSWORD";

fn email_arg() -> Arg {
    Arg::new("email")
        .short('e')
        .long("email")
        .help("Account email")
        .required(true)
}

fn password_arg() -> Arg {
    Arg::new("password")
        .short('p')
        .long("password")
        .help("Account password")
        .env(ENV_PASSWORD)
        .hide_env_values(true)
        .required(true)
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new("login")
                .about("Log in and store the session")
                .arg(email_arg())
                .arg(password_arg()),
        )
        .subcommand(Command::new("logout").about("End the session"))
        .subcommand(
            Command::new("whoami")
                .about("Show the stored session")
                .arg(
                    Arg::new("revalidate")
                        .long("revalidate")
                        .help("Confirm the session with the server first")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("refresh").about("Exchange the token for a fresh one"))
        .subcommand(
            Command::new("register")
                .about("Create an account")
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .help("Display name")
                        .required(true),
                )
                .arg(email_arg())
                .arg(password_arg()),
        )
        .subcommand(
            Command::new("profile")
                .about("Update the profile of the logged in user")
                .arg(Arg::new("name").short('n').long("name").help("New name"))
                .arg(Arg::new("email").short('e').long("email").help("New email"))
                .arg_required_else_help(true),
        )
}
