#[tokio::main]
async fn main() -> anyhow::Result<()> {
    api_bridge::run().await
}
