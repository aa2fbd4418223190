use anyhow::Result;
use gatehouse::cli::start;

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;
    action.execute().await?;
    Ok(())
}
