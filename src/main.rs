use anyhow::Result;
use rollcall::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
