use std::io;

use protocol::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unable to connect to server {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("unable to write to server: {0}")]
    Codec(#[from] CodecError),

    #[error("session is closed")]
    Closed,

    #[error("only the manager can {0}")]
    ManagerOnly(&'static str),
}
