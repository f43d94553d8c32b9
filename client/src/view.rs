//! Callbacks from the connection engine to whatever renders the whiteboard.
//!
//! Every method is called from the engine's read task, one record at a time,
//! so implementations see events in the order the server sent them. They
//! should return quickly and keep their own state behind interior mutability.

use protocol::{Chat, Draw};

pub trait WhiteboardView: Send + Sync {
    /// Full replacement of the participant list, one name per line with the
    /// manager first. Empty when the session is gone.
    fn on_user_list_changed(&self, users: &str);

    /// Chat lines plus server notices (kicks, quits, approvals, denials).
    fn on_chat_received(&self, chat: &Chat);

    fn on_draw_received(&self, draw: &Draw);

    /// Manager only. Return true to let `username` in.
    fn on_join_request(&self, username: &str) -> bool;

    fn on_connection_status_changed(&self, connected: bool);

    fn on_canvas_cleared(&self) {}
}
