//! Print the OpenAPI document for the HTTP API.

use anyhow::Result;

fn main() -> Result<()> {
    println!("{}", gatehouse::api::openapi().to_pretty_json()?);
    Ok(())
}
