//! Connection engine for one whiteboard participant.
//!
//! [`WhiteboardClient::connect`] opens the transport, introduces the client
//! with a connect record and splits the socket between two tasks: a read task
//! that turns server records into [`WhiteboardView`] callbacks, and a write
//! task that drains a local queue to the server. Both stop on a shared
//! cancellation token.

use std::sync::Arc;

use futures::SinkExt; // provides send on top of FramedWrite
use tokio::net::{tcp, TcpStream};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt; // provides next on top of FramedRead
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use protocol::{Connection, Draw, FrameCodec, Message, Role, ALL, SERVER};

use crate::error::ClientError;
use crate::inbound::{self, Flow, Identity};
use crate::view::WhiteboardView;

const BOUNDED_CHANNEL_SIZE: usize = 64;
const KICK_PREFIX: &str = "@kick @";
const KICKED: &str = "{} has been kicked!";
const NEW_CANVAS: &str = "A new canvas has been created.";
const USER_LEFT: &str = "*{} left*";

type FrRead = FramedRead<tcp::OwnedReadHalf, FrameCodec>;
type FrWrite = FramedWrite<tcp::OwnedWriteHalf, FrameCodec>;

pub struct WhiteboardClient {
    me: Identity,
    view: Arc<dyn WhiteboardView>,
    local_tx: Sender<Message>,
    shutdown: CancellationToken,
    read_handle: Option<JoinHandle<()>>,
    write_handle: Option<JoinHandle<()>>,
}

impl WhiteboardClient {
    pub async fn connect(addr: &str, username: &str, role: Role,
                         view: Arc<dyn WhiteboardView>) -> Result<Self, ClientError> {
        debug!("Client starting, connecting to server {:?}", addr);

        let stream = TcpStream::connect(addr).await
            .map_err(|source| ClientError::Connect { addr: addr.to_owned(), source })?;

        // split tcpstream so we can hand off to r & w tasks
        let (tcp_read, tcp_write) = stream.into_split();
        let fr = FramedRead::new(tcp_read, FrameCodec::new());
        let mut fw = FramedWrite::new(tcp_write, FrameCodec::new());

        // first record introduces us, everything else waits on the server's answer
        fw.send(Message::Connect(Connection::new(username, role))).await?;
        info!("Connected to {} as {} ({})", addr, username, role);

        let me = Identity::new(username, role);
        // a manager needs no approval
        if me.is_manager() {
            view.on_connection_status_changed(true);
        }

        let (local_tx, local_rx) = mpsc::channel::<Message>(BOUNDED_CHANNEL_SIZE);
        let shutdown = CancellationToken::new();

        let read_handle = spawn_read(fr, me.clone(), view.clone(), local_tx.clone(), shutdown.clone());
        let write_handle = spawn_write(fw, local_rx, shutdown.clone());

        Ok(WhiteboardClient {
            me,
            view,
            local_tx,
            shutdown,
            read_handle: Some(read_handle),
            write_handle: Some(write_handle),
        })
    }

    pub fn username(&self) -> &str {
        &self.me.username
    }

    pub fn role(&self) -> Role {
        self.me.role
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // resolves once the session ended, from either side
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    // Chat to everyone. A manager typing "@kick @name" also kicks name
    pub async fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        self.send(self.me.chat(Message::Chat, text, ALL)).await?;

        if self.me.is_manager() {
            if let Some(target) = text.strip_prefix(KICK_PREFIX).map(str::trim) {
                if !target.is_empty() {
                    info!("Attempting to kick {}", target);
                    let kick = self.me.chat(Message::Kick, KICKED.replace("{}", target), target);
                    self.send(kick).await?;
                }
            }
        }

        Ok(())
    }

    // the draw is always sent under this client's name
    pub async fn send_draw(&self, mut draw: Draw) -> Result<(), ClientError> {
        draw.username = self.me.username.clone();
        self.send(Message::Draw(draw)).await
    }

    // Clears the local canvas and tells everyone else to do the same
    pub async fn new_canvas(&self) -> Result<(), ClientError> {
        if !self.me.is_manager() {
            return Err(ClientError::ManagerOnly("start a new canvas"))
        }

        self.view.on_canvas_cleared();
        self.send(self.me.chat(Message::New, NEW_CANVAS, ALL)).await
    }

    // Sends the quit record, then stops both tasks
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed)
        }

        let quit = self.me.chat(Message::Quit, USER_LEFT.replace("{}", &self.me.username), SERVER);
        let sent = self.local_tx.send(quit).await;

        // the writer drains the queued quit before it honours the shutdown
        self.shutdown.cancel();
        if let Some(h) = self.write_handle.take() {
            let _ = h.await;
        }
        if let Some(h) = self.read_handle.take() {
            let _ = h.await;
        }

        info!("Session terminated by user...");
        self.view.on_connection_status_changed(false);
        sent.map_err(|_| ClientError::Closed)
    }

    async fn send(&self, message: Message) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed)
        }
        self.local_tx.send(message).await.map_err(|_| ClientError::Closed)
    }
}

impl Drop for WhiteboardClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// Spawn client tcp read tokio task, to read back server records
fn spawn_read(mut fr: FrRead, me: Identity, view: Arc<dyn WhiteboardView>,
              local_tx: Sender<Message>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("read task received shutdown, returning!");
                    return;
                }
                value = fr.next() => {
                    // the server closing after our own quit is not a failure
                    if !matches!(value, Some(Ok(_))) && shutdown.is_cancelled() {
                        return;
                    }

                    let message = match value {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            warn!("Client connection closing error: {}", e);
                            inbound::server_disconnected()
                        }
                        None => {
                            info!("Server Remote has closed");
                            inbound::server_disconnected()
                        }
                    };

                    debug!("received server record {}", message.category());

                    match inbound::dispatch(&me, view.as_ref(), message) {
                        Flow::Continue => (),
                        Flow::Reply(reply) => {
                            if local_tx.send(reply).await.is_err() {
                                break;
                            }
                        }
                        Flow::End => break,
                    }
                }
            }
        }

        shutdown.cancel();
    })
}

// Spawn client tcp write tokio task, to send queued records to server
fn spawn_write(mut fw: FrWrite, mut local_rx: Receiver<Message>,
               shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                // queued records go out before a shutdown is honoured
                biased;

                queued = local_rx.recv() => match queued {
                    Some(message) => {
                        let leaving = matches!(message, Message::Quit(_));
                        if let Err(e) = fw.send(message).await {
                            warn!("Unable to write to server: {}", e);
                            shutdown.cancel();
                            break;
                        }
                        if leaving {
                            break;
                        }
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    debug!("write task received shutdown, returning!");
                    break;
                }
            }
        }
    })
}
