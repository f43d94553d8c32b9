pub mod config;
pub mod error;
pub mod viewer;

// session state
pub mod canvas_log;
pub mod registry;
mod delivery;

// tasks
pub mod router;
pub mod client_handler;
pub mod server_listener;
pub mod server;

pub mod server_types;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::WhiteboardServer;
pub use viewer::{EventViewer, TracingViewer};
