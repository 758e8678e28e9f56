//! HTTP server for the ocean query assistant

use anyhow::Result;
use clap::Parser;
use ocean_query::api_server::{create_router, ApiState};
use ocean_query::config::Config;
use ocean_query::logging;
use ocean_query::resources::Resources;
use tracing::info;

#[derive(Parser)]
#[command(name = "server")]
#[command(about = "Serve the ocean query assistant over HTTP")]
struct Args {
    /// Bind host (overrides SERVER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides SERVER_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing(&args.log_level)?;

    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let resources = Resources::init(&config).await?;
    let state = ApiState {
        pipeline: resources.pipeline().clone(),
    };
    let app = create_router(state, &config.server);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("CORS origins: {:?}", config.server.cors_origins);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, releasing resources");
    resources.close();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, initiating graceful shutdown...");
}
