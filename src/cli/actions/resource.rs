use super::print_json;
use crate::{
    api::{ApiClient, ProgressCallback, RequestOptions, UploadProgress},
    cli::globals::GlobalArgs,
    resources::{Location, LocationStore},
};
use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Debug)]
pub enum LocationCommand {
    List,
    Get { id: i64 },
    Create { name: String, area_code: String },
    Update { id: i64, name: String, area_code: String },
    Delete { id: i64 },
}

#[derive(Debug)]
pub enum Command {
    Locations(LocationCommand),
    Request {
        method: String,
        path: String,
        data: Option<Value>,
    },
    Upload {
        path: String,
        file: PathBuf,
    },
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: Command,
}

/// Execute a resource command with the stored session.
/// # Errors
/// Returns an error if the session file cannot be used or the request fails.
pub async fn execute(args: Args) -> Result<()> {
    let context = args.globals.context()?;

    let output = match args.command {
        Command::Locations(command) => locations(LocationStore::new(context.api), command).await?,
        Command::Request { method, path, data } => {
            request(&context.api, &method, &path, data).await?
        }
        Command::Upload { path, file } => {
            let progress: ProgressCallback = Arc::new(|progress: UploadProgress| {
                info!(
                    "uploaded {}% ({}/{} bytes)",
                    progress.percent(),
                    progress.sent,
                    progress.total
                );
            });
            context.api.upload_file(&path, &file, Some(progress)).await?
        }
    };

    print_json(&output)
}

async fn locations(mut store: LocationStore, command: LocationCommand) -> Result<Value> {
    let value = match command {
        LocationCommand::List => serde_json::to_value(store.fetch_all().await?)?,
        LocationCommand::Get { id } => serde_json::to_value(store.get(&id).await?)?,
        LocationCommand::Create { name, area_code } => {
            serde_json::to_value(store.create(&Location::new(name, area_code)).await?)?
        }
        LocationCommand::Update {
            id,
            name,
            area_code,
        } => {
            let location = Location::new(name, area_code).with_id(id);
            serde_json::to_value(store.update(&location).await?)?
        }
        LocationCommand::Delete { id } => {
            store.delete(&id).await?;
            json!({ "deleted": id })
        }
    };
    Ok(value)
}

async fn request(api: &ApiClient, method: &str, path: &str, data: Option<Value>) -> Result<Value> {
    let options = RequestOptions::default();
    let value = match (method, data) {
        ("GET", _) => api.get(path, &options).await?,
        ("DELETE", _) => api.delete(path, &options).await?,
        ("POST", None) => api.post_empty(path, &options).await?,
        ("POST", Some(body)) => api.post(path, &body, &options).await?,
        ("PUT", body) => api.put(path, &body.unwrap_or_else(|| json!({})), &options).await?,
        ("PATCH", body) => {
            api.patch(path, &body.unwrap_or_else(|| json!({})), &options)
                .await?
        }
        (other, _) => bail!("unsupported method: {other}"),
    };
    Ok(value)
}
