use super::print_json;
use crate::{
    auth::Credentials,
    cli::globals::GlobalArgs,
    session::SessionSnapshot,
};
use anyhow::{bail, Result};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};

#[derive(Debug)]
pub enum Command {
    Login {
        email: String,
        password: SecretString,
    },
    Logout,
    WhoAmI {
        revalidate: bool,
    },
    Refresh,
    Register {
        name: String,
        email: String,
        password: SecretString,
    },
    Profile {
        name: Option<String>,
        email: Option<String>,
    },
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: Command,
}

/// Execute a session lifecycle command and print the resulting state.
/// # Errors
/// Returns an error if the session file cannot be used or the request fails.
pub async fn execute(args: Args) -> Result<()> {
    let context = args.globals.context()?;

    let output = match args.command {
        Command::Login { email, password } => {
            let user = context
                .auth
                .login(&Credentials::new(email, password))
                .await?;
            json!({ "authenticated": true, "user": user })
        }
        Command::Logout => {
            context.auth.logout().await?;
            summary(&context.session.snapshot())
        }
        Command::WhoAmI { revalidate } => {
            if revalidate && context.session.snapshot().is_authenticated() {
                context.auth.revalidate().await?;
            }
            summary(&context.session.snapshot())
        }
        Command::Refresh => {
            context.auth.refresh_token().await?;
            summary(&context.session.snapshot())
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let registration = context
                .auth
                .register(&json!({
                    "name": name,
                    "email": email,
                    "password": password.expose_secret(),
                }))
                .await?;
            serde_json::to_value(&registration)?
        }
        Command::Profile { name, email } => {
            let update = profile_update(name, email);
            if update.is_empty() {
                bail!("nothing to update, pass --name or --email");
            }
            let user = context.auth.update_profile(&update).await?;
            json!({ "user": user })
        }
    };

    print_json(&output)
}

fn profile_update(name: Option<String>, email: Option<String>) -> Map<String, Value> {
    let mut update = Map::new();
    if let Some(name) = name {
        update.insert("name".to_string(), Value::String(name));
    }
    if let Some(email) = email {
        update.insert("email".to_string(), Value::String(email));
    }
    update
}

fn summary(snapshot: &SessionSnapshot) -> Value {
    json!({
        "authenticated": snapshot.is_authenticated(),
        "user": snapshot.user(),
        "role": snapshot.role().map(|role| role.slug().to_string()),
        "is_admin": snapshot.is_admin(),
        "abilities": snapshot.abilities(),
        "expires_at": snapshot.expires_at(),
        "should_refresh": snapshot.should_refresh_at(Utc::now()),
        "last_error": snapshot.last_error(),
    })
}
