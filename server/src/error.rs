use std::io;

use protocol::CodecError;
use thiserror::Error;

use crate::server_types::ConnectionId;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unable to bind to {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("connection {0} closed before its connect request")]
    ClosedBeforeConnect(ConnectionId),

    #[error("connection {id} opened with {category} instead of connect")]
    UnexpectedFirstFrame { id: ConnectionId, category: &'static str },

    #[error("unable to read from connection: {0}")]
    Codec(#[from] CodecError),

    #[error("message router is no longer running")]
    RouterClosed,

    #[error("{username} ({id}) no longer owns its session entry")]
    StaleConnection { id: ConnectionId, username: String },

    #[error("{0} is awaiting approval, dropped its message")]
    AwaitingApproval(String),

    #[error("{username} is not allowed to send {category}")]
    Unauthorized { username: String, category: &'static str },

    #[error("{0} has no pending join request")]
    NotPending(String),

    #[error("registry invariant violated: {0}")]
    Registry(&'static str),
}
