use labeller_server::{serve, ServerConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        database = %config.database.display(),
        page_size = config.protocol.page_size.get(),
        contexts = ?config.contexts_file,
        "labeller starting"
    );

    serve(config).await
}
