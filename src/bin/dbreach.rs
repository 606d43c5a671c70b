use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dbreach::cli::start().await
}
