use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rampload-target")]
#[command(about = "Sample HTTP target with fast, slow and heavy endpoints", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "RAMPLOAD_TARGET_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!("🚀 Target listening on http://{}", listener.local_addr()?);

    rampload_target::serve(listener, shutdown_signal()).await?;

    tracing::info!("👋 Target shut down");
    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C, serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
