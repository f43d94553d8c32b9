//! Operator facing event log.
//!
//! The router reports every record it receives and sends through an
//! [`EventViewer`]. The default implementation writes to `tracing`, a desktop
//! console or a test recorder can stand in for it.

use protocol::Message;
use tracing::info;

pub trait EventViewer: Send + Sync {
    fn received(&self, from: &str, message: &Message);

    fn sent(&self, to: &str, message: &Message);

    fn notice(&self, text: &str) {
        info!("(Information) {}", text);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingViewer;

impl EventViewer for TracingViewer {
    fn received(&self, from: &str, message: &Message) {
        info!(from, "(Received) {}", message);
    }

    fn sent(&self, to: &str, message: &Message) {
        info!(to, "(Sent) {}", message);
    }
}
