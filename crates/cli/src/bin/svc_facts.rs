use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    svc_cli::main_entry().await
}
