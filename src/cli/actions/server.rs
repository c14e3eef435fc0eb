use crate::api;
use crate::cli::actions::Action;
use crate::config::Settings;
use anyhow::Result;

/// Handle the server action
/// # Errors
/// Return an error if the settings cannot be loaded or the server fails
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server { port, config } = action;

    let settings = Settings::from_path(&config)?;

    api::new(port, settings).await
}
