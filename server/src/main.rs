use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use server::{ServerConfig, TracingViewer, WhiteboardServer};
use server::config::{DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "whiteboard-server", about = "Shared whiteboard session server")]
struct Args {
    /// Interface to listen on
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ServerConfig::new(args.host, args.port);

    let server = match WhiteboardServer::bind(&config, Arc::new(TracingViewer)).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received ctrl-c, shutting down");
        }
        ctrl_c.cancel();
    });

    server.run(shutdown).await;
}
