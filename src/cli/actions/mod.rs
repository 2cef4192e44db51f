pub mod resource;
pub mod session;

// Internal "interpreter" for `Action`.
mod run;

use anyhow::Result;
use serde::Serialize;

#[derive(Debug)]
pub enum Action {
    Session(session::Args),
    Resource(resource::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}

/// Command output goes to stdout as pretty JSON.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
