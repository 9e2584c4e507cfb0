#[tokio::main]
async fn main() -> anyhow::Result<()> {
    connmrs_cli::run().await
}
