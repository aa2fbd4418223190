use crate::cli::actions::{Action, server};
use anyhow::Result;

/// Handle the action
///
/// # Errors
///
/// Returns an error if the selected action fails
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
    }
}
