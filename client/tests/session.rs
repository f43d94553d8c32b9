use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use client::{ClientError, WhiteboardClient, WhiteboardView};
use protocol::{Chat, Color, Draw, Role, ShapeKind};
use server::{ServerConfig, TracingViewer, WhiteboardServer};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Users(String),
    Chat(String),
    Draw(Draw),
    Join(String),
    Connected(bool),
    Cleared,
}

struct RecordingView {
    approve: bool,
    events: UnboundedSender<Event>,
}

impl RecordingView {
    fn new(approve: bool) -> (Arc<RecordingView>, Events) {
        let (events, rx) = mpsc::unbounded_channel();
        (Arc::new(RecordingView { approve, events }), Events(rx))
    }

    fn record(&self, event: Event) {
        let _ = self.events.send(event);
    }
}

impl WhiteboardView for RecordingView {
    fn on_user_list_changed(&self, users: &str) {
        self.record(Event::Users(users.to_owned()));
    }

    fn on_chat_received(&self, chat: &Chat) {
        self.record(Event::Chat(chat.chat_message.clone()));
    }

    fn on_draw_received(&self, draw: &Draw) {
        self.record(Event::Draw(draw.clone()));
    }

    fn on_join_request(&self, username: &str) -> bool {
        self.record(Event::Join(username.to_owned()));
        self.approve
    }

    fn on_connection_status_changed(&self, connected: bool) {
        self.record(Event::Connected(connected));
    }

    fn on_canvas_cleared(&self) {
        self.record(Event::Cleared);
    }
}

struct Events(UnboundedReceiver<Event>);

impl Events {
    async fn next(&mut self) -> Event {
        timeout(WAIT, self.0.recv()).await
            .expect("timed out waiting for a view event")
            .expect("view dropped")
    }

    // skip events until the expected one shows up
    async fn expect(&mut self, event: Event) {
        loop {
            if self.next().await == event {
                return
            }
        }
    }
}

async fn start() -> (String, CancellationToken) {
    let server = WhiteboardServer::bind(&ServerConfig::new("127.0.0.1", 0), Arc::new(TracingViewer))
        .await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let shutdown = CancellationToken::new();
    tokio::spawn(server.run(shutdown.clone()));
    (addr, shutdown)
}

fn users(list: &str) -> Event {
    Event::Users(list.to_owned())
}

fn chat(text: &str) -> Event {
    Event::Chat(text.to_owned())
}

#[tokio::test]
async fn approved_user_gets_canvas_and_chat() {
    let (addr, shutdown) = start().await;

    let (alice_view, mut alice_events) = RecordingView::new(true);
    let alice = WhiteboardClient::connect(&addr, "Alice", Role::Manager, alice_view).await.unwrap();
    alice_events.expect(Event::Connected(true)).await;
    alice_events.expect(users("Alice (manager)")).await;

    let line = Draw::new("Alice", ShapeKind::Line, (0, 0), (10, 10), Color(0, 128, 0));
    alice.send_draw(line.clone()).await.unwrap();

    let (bob_view, mut bob_events) = RecordingView::new(false);
    let bob = WhiteboardClient::connect(&addr, "Bob", Role::User, bob_view).await.unwrap();

    alice_events.expect(Event::Join("Bob".into())).await;
    bob_events.expect(chat("Join request sent to manager!")).await;
    bob_events.expect(chat("Connected! Welcome!")).await;
    assert_eq!(bob_events.next().await, Event::Connected(true));
    assert_eq!(bob_events.next().await, Event::Draw(line));
    assert_eq!(bob_events.next().await, users("Alice (manager)\nBob"));

    bob.send_chat("hello").await.unwrap();
    alice_events.expect(chat("hello")).await;

    shutdown.cancel();
}

#[tokio::test]
async fn denied_user_is_disconnected() {
    let (addr, shutdown) = start().await;

    let (alice_view, _alice_events) = RecordingView::new(false);
    let _alice = WhiteboardClient::connect(&addr, "Alice", Role::Manager, alice_view).await.unwrap();

    let (bob_view, mut bob_events) = RecordingView::new(false);
    let bob = WhiteboardClient::connect(&addr, "Bob", Role::User, bob_view).await.unwrap();

    bob_events.expect(chat("Your request to connect has been denied.")).await;
    assert_eq!(bob_events.next().await, Event::Connected(false));
    timeout(WAIT, bob.closed()).await.unwrap();
    assert!(matches!(bob.send_chat("let me in").await, Err(ClientError::Closed)));

    shutdown.cancel();
}

#[tokio::test]
async fn manager_kicks_with_chat_command() {
    let (addr, shutdown) = start().await;

    let (alice_view, mut alice_events) = RecordingView::new(true);
    let alice = WhiteboardClient::connect(&addr, "Alice", Role::Manager, alice_view).await.unwrap();

    let (bob_view, mut bob_events) = RecordingView::new(false);
    let bob = WhiteboardClient::connect(&addr, "Bob", Role::User, bob_view).await.unwrap();
    bob_events.expect(users("Alice (manager)\nBob")).await;
    alice_events.expect(users("Alice (manager)\nBob")).await;

    alice.send_chat("@kick @Bob").await.unwrap();

    bob_events.expect(chat("@kick @Bob")).await;
    bob_events.expect(chat("Bob has been kicked!")).await;
    assert_eq!(bob_events.next().await, users(""));
    assert_eq!(bob_events.next().await, Event::Connected(false));
    timeout(WAIT, bob.closed()).await.unwrap();

    alice_events.expect(users("Alice (manager)")).await;

    // kicking someone who is not there is refused
    alice.send_chat("@kick @Carol").await.unwrap();
    alice_events.expect(chat("Unable to kick @Carol")).await;

    shutdown.cancel();
}

#[tokio::test]
async fn manager_leaving_closes_users() {
    let (addr, shutdown) = start().await;

    let (alice_view, _alice_events) = RecordingView::new(true);
    let mut alice = WhiteboardClient::connect(&addr, "Alice", Role::Manager, alice_view).await.unwrap();

    let (bob_view, mut bob_events) = RecordingView::new(false);
    let bob = WhiteboardClient::connect(&addr, "Bob", Role::User, bob_view).await.unwrap();
    bob_events.expect(users("Alice (manager)\nBob")).await;

    alice.new_canvas().await.unwrap();
    bob_events.expect(chat("A new canvas has been created.")).await;
    assert_eq!(bob_events.next().await, Event::Cleared);
    assert!(matches!(bob.new_canvas().await, Err(ClientError::ManagerOnly(_))));

    alice.disconnect().await.unwrap();
    assert!(alice.is_closed());

    bob_events.expect(users("")).await;
    assert_eq!(bob_events.next().await, chat("*Alice left*"));
    assert_eq!(bob_events.next().await, Event::Connected(false));
    timeout(WAIT, bob.closed()).await.unwrap();

    shutdown.cancel();
}

#[tokio::test]
async fn lost_server_is_reported() {
    let (addr, shutdown) = start().await;

    let (alice_view, mut alice_events) = RecordingView::new(true);
    let alice = WhiteboardClient::connect(&addr, "Alice", Role::Manager, alice_view).await.unwrap();
    alice_events.expect(users("Alice (manager)")).await;

    shutdown.cancel();

    assert_eq!(alice_events.next().await, Event::Connected(false));
    assert_eq!(alice_events.next().await, users(""));
    assert_eq!(alice_events.next().await, chat("Connection error with server"));
    timeout(WAIT, alice.closed()).await.unwrap();
}

#[tokio::test]
async fn unreachable_server() {
    let (addr, shutdown) = start().await;
    shutdown.cancel();
    // give the listener a moment to drop
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (view, _events) = RecordingView::new(true);
    let result = WhiteboardClient::connect(&addr, "Alice", Role::Manager, view).await;
    assert!(matches!(result, Err(ClientError::Connect { .. })));
}
