use tracing::debug;

use protocol::{Access, Chat, Message, Role};

use crate::view::WhiteboardView;

const JOIN_SUFFIX: &str = " is requesting to join!";
const APPROVED: &str = "Connected! Welcome!";
const DENIED: &str = "Your request to connect has been denied.";
const BOT: &str = "Bot";
const CONNECTION_ERROR: &str = "Connection error with server";

// what the read task does after a record was handled
#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Reply(Message),
    End,
}

// who this client is in the session
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(username: &str, role: Role) -> Self {
        Identity { username: username.to_owned(), role }
    }

    pub fn access(&self) -> Access {
        self.role.into()
    }

    pub fn is_manager(&self) -> bool {
        self.role == Role::Manager
    }

    pub fn chat(&self, category: fn(Chat) -> Message, text: impl Into<String>,
                recipient: impl Into<String>) -> Message {
        category(Chat::new(self.username.as_str(), self.access(), text, recipient))
    }
}

// stand in record for a transport failure, never sent over the wire
pub(crate) fn server_disconnected() -> Message {
    Message::ServerDisconnected(Chat::new(BOT, Access::Bot, CONNECTION_ERROR, ""))
}

pub(crate) fn dispatch(me: &Identity, view: &dyn WhiteboardView, message: Message) -> Flow {
    match message {
        Message::Draw(draw) => view.on_draw_received(&draw),
        Message::Chat(chat) => view.on_chat_received(&chat),
        Message::Userlist(chat) => view.on_user_list_changed(&chat.chat_message),
        Message::Join(chat) => {
            if !me.is_manager() {
                debug!("ignoring join request addressed to a user");
                return Flow::Continue
            }

            let joining = chat.chat_message.strip_suffix(JOIN_SUFFIX)
                .unwrap_or(&chat.chat_message);

            let reply = if view.on_join_request(joining) {
                me.chat(Message::Approve, APPROVED, joining)
            } else {
                me.chat(Message::Deny, DENIED, joining)
            };
            return Flow::Reply(reply)
        }
        Message::Approve(chat) => {
            view.on_chat_received(&chat);
            view.on_connection_status_changed(true);
        }
        Message::Deny(chat) => {
            view.on_chat_received(&chat);
            view.on_connection_status_changed(false);
            return Flow::End
        }
        Message::Quit(chat) => {
            view.on_chat_received(&chat);
            // the whiteboard closes with its manager
            if chat.user_access == Access::Manager {
                view.on_connection_status_changed(false);
                return Flow::End
            }
        }
        Message::Kick(chat) => {
            view.on_chat_received(&chat);
            if chat.recipient == me.username {
                view.on_user_list_changed("");
                view.on_connection_status_changed(false);
                return Flow::End
            }
        }
        Message::New(chat) => {
            view.on_chat_received(&chat);
            view.on_canvas_cleared();
        }
        Message::ServerDisconnected(chat) => {
            view.on_connection_status_changed(false);
            view.on_user_list_changed("");
            view.on_chat_received(&chat);
            return Flow::End
        }
        Message::Connect(_) | Message::Disconnect(_) | Message::Unrecognized => {
            debug!("ignoring {} from server", message.category());
        }
    }

    Flow::Continue
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use protocol::{Color, Draw, ShapeKind, ALL, MANAGER, SERVER};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        approve: bool,
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn approving() -> Self {
            Recorder { approve: true, ..Default::default() }
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl WhiteboardView for Recorder {
        fn on_user_list_changed(&self, users: &str) {
            self.push(format!("users:{}", users));
        }

        fn on_chat_received(&self, chat: &Chat) {
            self.push(format!("chat:{}", chat.chat_message));
        }

        fn on_draw_received(&self, draw: &Draw) {
            self.push(format!("draw:{}", draw.username));
        }

        fn on_join_request(&self, username: &str) -> bool {
            self.push(format!("join:{}", username));
            self.approve
        }

        fn on_connection_status_changed(&self, connected: bool) {
            self.push(format!("connected:{}", connected));
        }

        fn on_canvas_cleared(&self) {
            self.push("cleared".to_owned());
        }
    }

    fn server(category: fn(Chat) -> Message, text: &str, recipient: &str) -> Message {
        category(Chat::from_server(text, recipient))
    }

    #[test]
    fn manager_answers_join_requests() {
        let alice = Identity::new("Alice", Role::Manager);
        let join = server(Message::Join, "Bob is requesting to join!", MANAGER);

        let view = Recorder::approving();
        let flow = dispatch(&alice, &view, join.clone());
        assert_eq!(flow, Flow::Reply(Message::Approve(Chat::new("Alice", Access::Manager, APPROVED, "Bob"))));

        let view = Recorder::default();
        let flow = dispatch(&alice, &view, join);
        assert_eq!(flow, Flow::Reply(Message::Deny(Chat::new("Alice", Access::Manager, DENIED, "Bob"))));
        assert_eq!(view.events(), vec!["join:Bob"]);
    }

    #[test]
    fn user_ignores_join_requests() {
        let bob = Identity::new("Bob", Role::User);
        let view = Recorder::approving();

        let flow = dispatch(&bob, &view, server(Message::Join, "Carol is requesting to join!", MANAGER));
        assert_eq!(flow, Flow::Continue);
        assert!(view.events().is_empty());
    }

    #[test]
    fn approve_and_deny_update_status() {
        let bob = Identity::new("Bob", Role::User);
        let view = Recorder::default();

        let approve = Message::Approve(Chat::new("Alice", Access::Manager, APPROVED, "Bob"));
        assert_eq!(dispatch(&bob, &view, approve), Flow::Continue);

        let deny = server(Message::Deny, "No active manager.", "Bob");
        assert_eq!(dispatch(&bob, &view, deny), Flow::End);

        assert_eq!(view.events(), vec![
            "chat:Connected! Welcome!", "connected:true",
            "chat:No active manager.", "connected:false",
        ]);
    }

    #[test]
    fn only_manager_quit_ends_session() {
        let bob = Identity::new("Bob", Role::User);
        let view = Recorder::default();

        let carol_left = Message::Quit(Chat::new("Carol", Access::User, "*Carol left*", SERVER));
        assert_eq!(dispatch(&bob, &view, carol_left), Flow::Continue);

        let alice_left = Message::Quit(Chat::new("Alice", Access::Manager, "*Alice left*", SERVER));
        assert_eq!(dispatch(&bob, &view, alice_left), Flow::End);
        assert_eq!(view.events().last().map(String::as_str), Some("connected:false"));
    }

    #[test]
    fn kick_ends_session_of_its_target_only() {
        let bob = Identity::new("Bob", Role::User);
        let view = Recorder::default();

        let kick_carol = Message::Kick(Chat::new("Alice", Access::Manager, "Carol has been kicked!", "Carol"));
        assert_eq!(dispatch(&bob, &view, kick_carol), Flow::Continue);

        let kick_bob = Message::Kick(Chat::new("Alice", Access::Manager, "Bob has been kicked!", "Bob"));
        assert_eq!(dispatch(&bob, &view, kick_bob), Flow::End);

        assert_eq!(view.events(), vec![
            "chat:Carol has been kicked!",
            "chat:Bob has been kicked!", "users:", "connected:false",
        ]);
    }

    #[test]
    fn relays_canvas_traffic() {
        let bob = Identity::new("Bob", Role::User);
        let view = Recorder::default();

        let draw = Draw::new("Alice", ShapeKind::Pen, (1, 1), (2, 2), Color(0, 0, 255));
        dispatch(&bob, &view, Message::Draw(draw));
        dispatch(&bob, &view, Message::New(Chat::new("Alice", Access::Manager, "A new canvas has been created.", ALL)));
        dispatch(&bob, &view, server(Message::Userlist, "Alice (manager)\nBob", ALL));

        assert_eq!(view.events(), vec![
            "draw:Alice",
            "chat:A new canvas has been created.", "cleared",
            "users:Alice (manager)\nBob",
        ]);
    }

    #[test]
    fn transport_failure_resets_view() {
        let bob = Identity::new("Bob", Role::User);
        let view = Recorder::default();

        assert_eq!(dispatch(&bob, &view, server_disconnected()), Flow::End);
        assert_eq!(view.events(), vec!["connected:false", "users:", "chat:Connection error with server"]);
    }
}
