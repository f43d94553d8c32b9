mod error;
mod inbound;

// ui seam
pub mod view;

// client
pub mod client;

pub use client::WhiteboardClient;
pub use error::ClientError;
pub use view::WhiteboardView;
