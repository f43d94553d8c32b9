use tokio::io::AsyncRead;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use protocol::{FrameCodec, Message};

use crate::error::ServerError;
use crate::server_types::{Admission, ClientWriter, ConnectionId, RouterMsg};

// Handles server communication from client
// Essentially this models a client actor on the server side, it only reads.
// Every write to the client goes through the router, which owns the writer
pub struct ClientHandler<R> {
    id: ConnectionId,
    fr: FramedRead<R, FrameCodec>,
    router_tx: Sender<RouterMsg>,
    // cancelled by the router when it removes this client
    closer: CancellationToken,
}

impl<R> ClientHandler<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    pub fn new(id: ConnectionId, read: R, router_tx: Sender<RouterMsg>) -> Self {
        Self {
            id,
            fr: FramedRead::new(read, FrameCodec::new()),
            router_tx,
            closer: CancellationToken::new(),
        }
    }

    // Spawn tokio task to handle server socket reads from a client
    pub fn spawn(mut h: ClientHandler<R>, writer: ClientWriter) -> JoinHandle<()> {
        tokio::spawn(async move {
            // if admission is successful then only handle client reads
            match h.register(writer).await {
                Ok(Some(username)) => h.handle_read(username).await,
                Ok(None) => debug!("connection {} was not admitted", h.id),
                Err(e) => warn!("{}", e),
            }
        })
    }

    // The first record decides the connection's fate: anything but a connect
    // request closes it. Returns the admitted username
    pub async fn register(&mut self, writer: ClientWriter) -> Result<Option<String>, ServerError> {
        let request = match self.fr.next().await {
            Some(Ok(Message::Connect(request))) => request,
            Some(Ok(other)) => {
                return Err(ServerError::UnexpectedFirstFrame { id: self.id, category: other.category() })
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ServerError::ClosedBeforeConnect(self.id)),
        };

        let username = request.username.clone();
        info!("connection {} requests to join as {}", self.id, &username);

        let (reply, admission) = oneshot::channel();
        let admit = RouterMsg::Admit {
            id: self.id,
            request,
            writer,
            closer: self.closer.clone(),
            reply,
        };

        self.router_tx.send(admit).await.map_err(|_| ServerError::RouterClosed)?;

        match admission.await.map_err(|_| ServerError::RouterClosed)? {
            Admission::Admitted => Ok(Some(username)),
            Admission::Denied => Ok(None),
        }
    }

    // Loop to handle ongoing client msgs to server, until the client goes away,
    // sends something unreadable, or the router closes it
    pub async fn handle_read(&mut self, username: String) {
        loop {
            tokio::select! {
                _ = self.closer.cancelled() => {
                    debug!("connection {} closed by router", self.id);
                    break;
                }
                value = self.fr.next() => match value {
                    Some(Ok(message)) => {
                        let inbound = RouterMsg::Inbound { id: self.id, username: username.clone(), message };
                        if self.router_tx.send(inbound).await.is_err() {
                            warn!("router gone, dropping connection {}", self.id);
                            return
                        }
                    }
                    Some(Err(e)) => {
                        debug!("connection {} closing on read error: {}", self.id, e);
                        break;
                    }
                    None => {
                        info!("{} ({}) has closed connection", &username, self.id);
                        break;
                    }
                }
            }
        }

        // router decides whether this still counts as a quit
        let _ = self.router_tx.send(RouterMsg::Disconnected { id: self.id, username }).await;
    }
}
