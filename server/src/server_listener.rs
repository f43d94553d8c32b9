use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client_handler::ClientHandler;
use crate::server_types::{client_writer, ConnectionId, RouterMsg};

const COUNTER_SEED: u64 = 1;

// Accepts connections and hands each one to its own ClientHandler task.
// Owns the connection id counter, ids are never reused for the process lifetime
pub struct ServerListener {
    listener: TcpListener,
    router_tx: Sender<RouterMsg>,
    next_id: u64,
}

impl ServerListener {
    pub fn new(listener: TcpListener, router_tx: Sender<RouterMsg>) -> Self {
        ServerListener { listener, router_tx, next_id: COUNTER_SEED }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((tcp_socket, addr)) => self.accept(tcp_socket, addr),
                    // per connection failures, e.g. fd exhaustion, keep the listener up
                    Err(e) => error!("unable to accept connection: {}", e),
                },
                _ = shutdown.cancelled() => {
                    info!("Listener shutting down");
                    break;
                }
            }
        }
    }

    fn accept(&mut self, tcp_socket: TcpStream, addr: SocketAddr) {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        info!("Server received new client connection {} from {:?}", id, &addr);

        let (tcp_read, tcp_write) = tcp_socket.into_split();
        let handler = ClientHandler::new(id, tcp_read, self.router_tx.clone());
        ClientHandler::spawn(handler, client_writer(tcp_write));
    }
}
