//! Authoritative directory of the connections taking part in the whiteboard
//! session.
//!
//! The registry is owned by the router task and never shared, all mutation
//! happens there one message at a time. Unicast and broadcast live in
//! [`crate::delivery`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use protocol::{Role, SERVER};

use crate::error::ServerError;
use crate::server_types::{ClientWriter, ConnectionId};
use crate::viewer::EventViewer;

const MANAGER_SUFFIX: &str = " (manager)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    // username reserved, waiting on the manager's decision
    Pending,
    Active,
}

pub struct ClientHandle {
    pub(crate) id: ConnectionId,
    pub(crate) role: Role,
    pub(crate) standing: Standing,
    pub(crate) writer: ClientWriter,
    closer: CancellationToken,
    // set after a failed write, the entry is skipped until its quit arrives
    pub(crate) broken: bool,
}

impl ClientHandle {
    pub fn new(id: ConnectionId, role: Role, writer: ClientWriter, closer: CancellationToken) -> Self {
        let standing = match role {
            Role::Manager => Standing::Active,
            Role::User => Standing::Pending,
        };

        ClientHandle { id, role, standing, writer, closer, broken: false }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    // stops the connection's reader, the write half closes when the handle drops
    pub(crate) fn close(&self) {
        self.closer.cancel();
    }
}

pub struct Registry {
    clients: HashMap<String, ClientHandle>,
    manager: Option<String>,
    pub(crate) viewer: Arc<dyn EventViewer>,
}

impl Registry {
    pub fn new(viewer: Arc<dyn EventViewer>) -> Self {
        Registry {
            clients: HashMap::new(),
            manager: None,
            viewer,
        }
    }

    // A manager may only be registered into an empty registry and users only
    // while a manager is present, keeping manager == None iff clients is empty
    pub fn register(&mut self, username: String, handle: ClientHandle) -> Result<(), ServerError> {
        if self.is_reserved(&username) {
            return Err(ServerError::Registry("username already taken"))
        }

        match handle.role {
            Role::Manager if !self.clients.is_empty() =>
                return Err(ServerError::Registry("second manager")),
            Role::User if self.manager.is_none() =>
                return Err(ServerError::Registry("user without a manager")),
            Role::Manager => self.manager = Some(username.clone()),
            Role::User => (),
        }

        info!("registered {} as {} ({:?})", &username, handle.role, handle.standing);
        self.clients.insert(username, handle);
        Ok(())
    }

    // Pending -> Active, returns false if the user had no pending request
    pub fn activate(&mut self, username: &str) -> bool {
        match self.clients.get_mut(username) {
            Some(h) if h.standing == Standing::Pending => {
                h.standing = Standing::Active;
                true
            }
            _ => false,
        }
    }

    // Idempotent, closes the transport of the removed entry
    pub fn remove(&mut self, username: &str) -> Option<ClientHandle> {
        let handle = self.clients.remove(username)?;
        handle.close();
        if self.manager.as_deref() == Some(username) {
            self.manager = None;
        }
        debug!("removed {} ({})", username, handle.id);
        Some(handle)
    }

    // drop every connection and forget the manager, ending the session
    pub fn clear(&mut self) {
        for (name, handle) in self.clients.drain() {
            debug!("closing {} ({})", name, handle.id);
            handle.close();
        }
        self.manager = None;
    }

    pub fn contains(&self, username: &str) -> bool {
        self.clients.contains_key(username)
    }

    // taken by a live or pending client, or the server's own name
    pub fn is_reserved(&self, username: &str) -> bool {
        username == SERVER || username.is_empty() || self.contains(username)
    }

    pub fn is_manager(&self, username: &str) -> bool {
        self.manager.as_deref() == Some(username)
    }

    pub fn is_pending(&self, username: &str) -> bool {
        self.clients.get(username).map_or(false, |h| h.standing == Standing::Pending)
    }

    pub fn manager_username(&self) -> Option<&str> {
        self.manager.as_deref()
    }

    pub fn manager_handle(&self) -> Option<&ClientHandle> {
        self.manager.as_ref().and_then(|m| self.clients.get(m))
    }

    pub fn get(&self, username: &str) -> Option<&ClientHandle> {
        self.clients.get(username)
    }

    pub(crate) fn get_mut(&mut self, username: &str) -> Option<&mut ClientHandle> {
        self.clients.get_mut(username)
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    // Active usernames in admission order, i.e. ascending connection id
    pub fn active_usernames(&self) -> Vec<String> {
        self.usernames_by_id(|h| h.standing == Standing::Active)
    }

    // every entry, pending ones included, in admission order
    pub fn registered_usernames(&self) -> Vec<String> {
        self.usernames_by_id(|_| true)
    }

    fn usernames_by_id(&self, keep: impl Fn(&ClientHandle) -> bool) -> Vec<String> {
        let mut entries: Vec<(&String, &ClientHandle)> = self.clients.iter()
            .filter(|(_, h)| keep(h))
            .collect();
        entries.sort_by_key(|(_, h)| h.id);
        entries.into_iter().map(|(name, _)| name.clone()).collect()
    }

    // Construct the user list text, manager first, then active users one per line
    pub fn snapshot_user_list(&self) -> String {
        let manager = match self.manager.as_deref() {
            Some(m) => m,
            None => return String::new(),
        };

        let mut lines = Vec::with_capacity(self.clients.len());
        lines.push(format!("{}{}", manager, MANAGER_SUFFIX));
        lines.extend(self.active_usernames().into_iter().filter(|name| name != manager));
        lines.join("\n")
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.clear();
    }
}
