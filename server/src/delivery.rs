use futures::SinkExt;
use tracing::{debug, warn};

use protocol::{CodecError, Message};

use crate::registry::Registry;
use crate::server_types::ClientWriter;

// write a single record to a client transport
pub async fn send(writer: &mut ClientWriter, msg: &Message) -> Result<(), CodecError> {
    writer.send(msg).await
}

// handles msg delivery back to clients registered in the session
impl Registry {
    // Send to one registered client, pending or active. Returns whether the
    // record was written, an absent or broken recipient is only logged
    pub async fn unicast(&mut self, username: &str, msg: &Message) -> bool {
        let viewer = self.viewer.clone();

        let handle = match self.get_mut(username) {
            Some(h) if !h.broken => h,
            Some(_) => {
                debug!("skipping send of {} to broken connection {}", msg.category(), username);
                return false
            }
            None => {
                warn!("unable to send {} to {}, not registered", msg.category(), username);
                return false
            }
        };

        match send(&mut handle.writer, msg).await {
            Ok(()) => {
                viewer.sent(username, msg);
                true
            }
            Err(e) => {
                // treated as already gone, its reader will report the quit
                warn!("unable to write to {} ({}): {}", username, handle.id, e);
                handle.broken = true;
                handle.close();
                false
            }
        }
    }

    pub async fn unicast_manager(&mut self, msg: &Message) -> bool {
        match self.manager_username().map(str::to_owned) {
            Some(manager) => self.unicast(&manager, msg).await,
            None => {
                warn!("no manager to receive {}", msg.category());
                false
            }
        }
    }

    // Send to every active client except `except`, returns the number reached.
    // Iterates over a snapshot of usernames so a failing recipient can not
    // disturb delivery to the rest
    pub async fn broadcast_except(&mut self, except: &str, msg: &Message) -> usize {
        let mut delivered = 0;

        for name in self.active_usernames() {
            if name == except { continue } // skip the send to except client

            if self.unicast(&name, msg).await {
                delivered += 1;
            }
        }

        delivered
    }

    // Send to all active clients, server authored records go through here
    pub async fn broadcast(&mut self, msg: &Message) -> usize {
        self.broadcast_except(protocol::SERVER, msg).await
    }

    // Send to every registered client, pending ones included. Used for notices
    // that end sessions, so a user still waiting on approval learns why its
    // connection closes
    pub async fn broadcast_registered(&mut self, msg: &Message) -> usize {
        let mut delivered = 0;

        for name in self.registered_usernames() {
            if self.unicast(&name, msg).await {
                delivered += 1;
            }
        }

        delivered
    }
}
