use std::fmt;

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use protocol::{Connection, FrameCodec, Message};

// server type definitions

// write half of a client transport, boxed so tests can swap in in-memory pipes
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;
pub type ClientWriter = FramedWrite<BoxedWrite, FrameCodec>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// handshake outcome returned to the connection task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied,
}

// Events consumed by the router, produced by the per connection tasks
pub enum RouterMsg {
    Admit {
        id: ConnectionId,
        request: Connection,
        writer: ClientWriter,
        closer: CancellationToken,
        reply: oneshot::Sender<Admission>,
    },
    Inbound {
        id: ConnectionId,
        username: String,
        message: Message,
    },
    Disconnected {
        id: ConnectionId,
        username: String,
    },
}

impl fmt::Debug for RouterMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterMsg::Admit { id, request, .. } =>
                f.debug_struct("Admit").field("id", id).field("request", request).finish(),
            RouterMsg::Inbound { id, username, message } =>
                f.debug_struct("Inbound").field("id", id).field("username", username)
                    .field("category", &message.category()).finish(),
            RouterMsg::Disconnected { id, username } =>
                f.debug_struct("Disconnected").field("id", id).field("username", username).finish(),
        }
    }
}

pub fn client_writer<W>(w: W) -> ClientWriter
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    FramedWrite::new(Box::new(w) as BoxedWrite, FrameCodec::new())
}
