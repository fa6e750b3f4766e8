use tracing_subscriber::{fmt, EnvFilter};

use exped_http::{config::Config, start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load()?;
    start_server(config).await
}
