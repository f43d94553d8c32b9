use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::router::Router;
use crate::server_listener::ServerListener;
use crate::server_types::RouterMsg;
use crate::viewer::EventViewer;

// A bound whiteboard server: the listener feeding connection tasks, and
// the single router task they all report to
pub struct WhiteboardServer {
    listener: TcpListener,
    queue_size: usize,
    viewer: Arc<dyn EventViewer>,
}

impl WhiteboardServer {
    pub async fn bind(config: &ServerConfig, viewer: Arc<dyn EventViewer>) -> Result<Self, ServerError> {
        let addr = config.addr();
        let listener = TcpListener::bind(addr.as_str()).await
            .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

        info!("Server starting.. {:?}", &addr);
        viewer.notice(&format!("Listening on {}", &addr));

        Ok(WhiteboardServer { listener, queue_size: config.queue_size, viewer })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|source| ServerError::Bind { addr: "listener".into(), source })
    }

    // Serve until shutdown is cancelled. Clients still connected at that
    // point are closed when the router exits
    pub async fn run(self, shutdown: CancellationToken) {
        // Setup local msg passing channel, every connection task holds a tx clone
        let (local_tx, local_rx) = mpsc::channel::<RouterMsg>(self.queue_size);

        let router = Router::new(self.viewer.clone()).spawn(local_rx, shutdown.clone());
        ServerListener::new(self.listener, local_tx).run(shutdown.clone()).await;

        if let Err(e) = router.await {
            error!("router task failed: {}", e);
        }
        self.viewer.notice("Server stopped");
    }
}
