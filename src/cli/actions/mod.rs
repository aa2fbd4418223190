pub mod run;
pub mod server;

use anyhow::Result;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to start or stops with an error
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}
