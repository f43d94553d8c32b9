//! The message router, sole owner of the session registry and canvas log.
//!
//! Every connection task feeds one bounded queue, the router drains it and
//! handles each [`RouterMsg`] to completion before taking the next, so session
//! state needs no locking. Admission runs here too, which makes the router the
//! only writer on every client transport.

use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use protocol::{Chat, Connection, Draw, Message, Role, ALL, MANAGER, SERVER};

use crate::canvas_log::CanvasLog;
use crate::delivery;
use crate::error::ServerError;
use crate::registry::{ClientHandle, Registry};
use crate::server_types::{Admission, ClientWriter, ConnectionId, RouterMsg};
use crate::viewer::EventViewer;

const WHITEBOARD_CREATED: &str = "Whiteboard created!";
const ONLY_ONE_MANAGER: &str = "Only one manager allowed.";
const NO_ACTIVE_MANAGER: &str = "No active manager.";
const INVALID_USERNAME: &str = "Invalid username";
const JOIN_REQUEST_SENT: &str = "Join request sent to manager!";
const JOIN_REQUEST: &str = "{} is requesting to join!";
const UNABLE_TO_KICK: &str = "Unable to kick @{}";
const USER_LEFT: &str = "*{} left*";

// identity of the client a message came from, as the registry knows it
struct Sender {
    username: String,
    role: Role,
}

pub struct Router {
    registry: Registry,
    canvas: CanvasLog,
    viewer: Arc<dyn EventViewer>,
}

impl Router {
    pub fn new(viewer: Arc<dyn EventViewer>) -> Self {
        Router {
            registry: Registry::new(viewer.clone()),
            canvas: CanvasLog::new(),
            viewer,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn canvas(&self) -> &CanvasLog {
        &self.canvas
    }

    pub fn spawn(self, local_rx: Receiver<RouterMsg>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(local_rx, shutdown))
    }

    // Consume the queue until every sender is gone or shutdown fires. A failed
    // message is logged and the loop moves on
    pub async fn run(mut self, mut local_rx: Receiver<RouterMsg>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                received = local_rx.recv() => match received {
                    Some(message) => {
                        debug!("Local channel msg received {:?}", &message);
                        if let Err(e) = self.handle(message).await {
                            warn!("{}", e);
                        }
                    }
                    None => {
                        info!("No more channel senders");
                        break;
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("Router shutting down");
                    break;
                }
            }
        }

        self.registry.clear();
        self.canvas.clear();
    }

    pub async fn handle(&mut self, message: RouterMsg) -> Result<(), ServerError> {
        match message {
            RouterMsg::Admit { id, request, writer, closer, reply } => {
                let username = request.username.clone();
                let admission = self.admit(id, request, writer, closer).await?;

                // connection task vanished mid handshake, nobody will read for it
                if reply.send(admission).is_err() && admission == Admission::Admitted {
                    warn!("connection {} dropped during admission", id);
                    return self.disconnected(id, &username).await
                }
                Ok(())
            }
            RouterMsg::Inbound { id, username, message } => {
                self.viewer.received(&username, &message);
                let sender = self.sender(id, &username)?;
                self.dispatch(sender, message).await
            }
            RouterMsg::Disconnected { id, username } => self.disconnected(id, &username).await,
        }
    }

    // Handshake rules, evaluated in order
    async fn admit(&mut self, id: ConnectionId, request: Connection, mut writer: ClientWriter,
                   closer: CancellationToken) -> Result<Admission, ServerError> {
        let username = request.username.clone();
        let role = request.role();
        self.viewer.received(&username, &Message::Connect(request));

        let denial = match role {
            Role::Manager if !self.registry.is_empty() => Some(ONLY_ONE_MANAGER),
            Role::User if self.registry.manager_username().is_none() => Some(NO_ACTIVE_MANAGER),
            _ if self.registry.is_reserved(&username) => Some(INVALID_USERNAME),
            _ => None,
        };

        if let Some(reason) = denial {
            info!("denied {} ({}) as {}: {}", &username, id, role, reason);
            let deny = Message::Deny(Chat::from_server(reason, username.as_str()));
            match delivery::send(&mut writer, &deny).await {
                Ok(()) => self.viewer.sent(&username, &deny),
                Err(e) => debug!("unable to deliver denial to {}: {}", id, e),
            }
            return Ok(Admission::Denied)
        }

        self.registry.register(username.clone(), ClientHandle::new(id, role, writer, closer))?;

        match role {
            Role::Manager => {
                let created = Message::Chat(Chat::from_server(WHITEBOARD_CREATED, ALL));
                self.registry.unicast(&username, &created).await;
                self.broadcast_user_list().await;
            }
            Role::User => {
                let sent = Message::Chat(Chat::from_server(JOIN_REQUEST_SENT, username.as_str()));
                self.registry.unicast(&username, &sent).await;

                let join = Message::Join(Chat::from_server(JOIN_REQUEST.replace("{}", &username), MANAGER));
                self.registry.unicast_manager(&join).await;
            }
        }

        Ok(Admission::Admitted)
    }

    // resolve who sent a message, rejecting readers whose entry was replaced or removed
    fn sender(&self, id: ConnectionId, username: &str) -> Result<Sender, ServerError> {
        match self.registry.get(username) {
            Some(h) if h.id() == id => Ok(Sender { username: username.to_owned(), role: h.role() }),
            _ => Err(ServerError::StaleConnection { id, username: username.to_owned() }),
        }
    }

    async fn dispatch(&mut self, sender: Sender, message: Message) -> Result<(), ServerError> {
        let awaiting = self.registry.is_pending(&sender.username);
        if awaiting && !matches!(message, Message::Quit(_) | Message::Disconnect(_)) {
            return Err(ServerError::AwaitingApproval(sender.username))
        }

        match message {
            Message::Chat(_) => {
                self.registry.broadcast_except(&sender.username, &message).await;
            }
            Message::Draw(draw) => self.draw(&sender, draw).await,
            Message::Approve(chat) => {
                self.require_manager(&sender, "approve")?;
                self.approve(chat).await?;
            }
            Message::Deny(chat) => {
                self.require_manager(&sender, "deny")?;
                self.deny(chat).await?;
            }
            Message::Quit(chat) => self.quit(&sender, chat).await,
            Message::Disconnect(_) => {
                let chat = left_chat(&sender);
                self.quit(&sender, chat).await;
            }
            Message::Kick(chat) => {
                self.require_manager(&sender, "kick")?;
                self.kick(chat).await;
            }
            Message::New(chat) => {
                if self.registry.is_manager(&sender.username) {
                    self.canvas.clear();
                    self.registry.broadcast_except(&sender.username, &Message::New(chat)).await;
                } else {
                    debug!("ignoring new canvas request from {}", &sender.username);
                }
            }
            Message::Connect(_) | Message::Userlist(_) | Message::Join(_)
            | Message::ServerDisconnected(_) | Message::Unrecognized => {
                debug!("ignoring {} from {}", message.category(), &sender.username);
            }
        }

        Ok(())
    }

    fn require_manager(&self, sender: &Sender, category: &'static str) -> Result<(), ServerError> {
        if self.registry.is_manager(&sender.username) {
            Ok(())
        } else {
            Err(ServerError::Unauthorized { username: sender.username.clone(), category })
        }
    }

    // log a copy under the manager's name, forward the original
    async fn draw(&mut self, sender: &Sender, draw: Draw) {
        let manager = self.registry.manager_username().unwrap_or(SERVER);
        self.canvas.append(draw.authored_by(manager));
        self.registry.broadcast_except(&sender.username, &Message::Draw(draw)).await;
    }

    async fn approve(&mut self, chat: Chat) -> Result<(), ServerError> {
        let joining = chat.recipient.clone();
        if !self.registry.activate(&joining) {
            return Err(ServerError::NotPending(joining))
        }
        info!("{} approved, replaying {} canvas ops", &joining, self.canvas.len());

        self.registry.unicast(&joining, &Message::Approve(chat)).await;
        // send current state to user
        for op in self.canvas.iter() {
            self.registry.unicast(&joining, &Message::Draw(op.clone())).await;
        }
        self.broadcast_user_list().await;
        Ok(())
    }

    async fn deny(&mut self, chat: Chat) -> Result<(), ServerError> {
        let denied = chat.recipient.clone();
        if !self.registry.is_pending(&denied) {
            return Err(ServerError::NotPending(denied))
        }

        self.registry.unicast(&denied, &Message::Deny(chat)).await;
        self.registry.remove(&denied);
        Ok(())
    }

    async fn quit(&mut self, sender: &Sender, chat: Chat) {
        let quit = Message::Quit(chat);

        match sender.role {
            // leave request from manager, shut the session down
            Role::Manager => {
                info!("manager {} left, closing whiteboard", &sender.username);
                self.registry.remove(&sender.username);
                self.registry.broadcast(&Message::Userlist(Chat::from_server("", ALL))).await;
                // pending users are closed too, they get the quit as well
                self.registry.broadcast_registered(&quit).await;
                self.registry.clear();
                self.canvas.clear();
            }
            Role::User => {
                self.registry.remove(&sender.username);
                self.broadcast_user_list().await;
                self.registry.broadcast(&quit).await;
            }
        }
    }

    async fn kick(&mut self, chat: Chat) {
        let target = chat.recipient.clone();

        if self.registry.contains(&target) && !self.registry.is_manager(&target) && target != SERVER {
            info!("kicking {}", &target);
            // reaches the target even while it is still pending
            self.registry.broadcast_registered(&Message::Kick(chat)).await;
            self.registry.remove(&target);
            self.broadcast_user_list().await;
        } else {
            let refused = Message::Chat(Chat::from_server(UNABLE_TO_KICK.replace("{}", &target), MANAGER));
            self.registry.unicast_manager(&refused).await;
        }
    }

    // reader gone: same as the client sending quit, unless its entry is already gone
    async fn disconnected(&mut self, id: ConnectionId, username: &str) -> Result<(), ServerError> {
        let sender = match self.sender(id, username) {
            Ok(sender) => sender,
            Err(_) => {
                debug!("connection {} for {} closed after removal", id, username);
                return Ok(())
            }
        };

        let chat = left_chat(&sender);
        self.viewer.received(username, &Message::Quit(chat.clone()));
        self.quit(&sender, chat).await;
        Ok(())
    }

    async fn broadcast_user_list(&mut self) {
        let list = Message::Userlist(Chat::from_server(self.registry.snapshot_user_list(), ALL));
        self.registry.broadcast(&list).await;
    }
}

// the quit record a client sends when leaving, synthesized for dropped connections
fn left_chat(sender: &Sender) -> Chat {
    Chat::new(sender.username.as_str(), sender.role.into(), USER_LEFT.replace("{}", &sender.username), SERVER)
}
