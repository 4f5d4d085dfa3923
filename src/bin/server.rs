use clap::Parser;
use memberhub::config::Config;
use tracing_subscriber::EnvFilter;

/// memberhub server
#[derive(Debug, Parser)]
#[command(name = "memberhub", version)]
struct Cli {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(long)]
    port: Option<u16>,

    /// Identity provider base URL
    #[arg(long)]
    provider_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(provider_url) = cli.provider_url {
        config.auth.provider.base_url = provider_url;
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    memberhub::start_server_with_config(config, shutdown_rx).await?;

    // Wait for Ctrl-C, then ask the server to stop accepting connections
    tokio::signal::ctrl_c().await?;
    println!("shutdown requested, stopping server...");
    let _ = shutdown_tx.send(());
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    println!("server stopped");
    Ok(())
}
