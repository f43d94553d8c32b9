use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// username reserved for records authored by the server itself
pub const SERVER: &str = "Server";

// recipient sentinels
pub const ALL: &str = "all";
pub const MANAGER: &str = "manager";

/// Every record exchanged between clients and the server.
///
/// The `category` field on the wire selects the variant, the remaining fields are
/// those of the wrapped record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum Message {
    Connect(Connection),
    Disconnect(Connection),
    Chat(Chat),
    Userlist(Chat),
    Join(Chat),
    Approve(Chat),
    Deny(Chat),
    Quit(Chat),
    Kick(Chat),
    New(Chat),
    Draw(Draw),
    ServerDisconnected(Chat),
    // well formed record with a category nobody routes
    #[serde(other)]
    Unrecognized,
}

impl Message {
    pub fn category(&self) -> &'static str {
        match self {
            Message::Connect(_) => "connect",
            Message::Disconnect(_) => "disconnect",
            Message::Chat(_) => "chat",
            Message::Userlist(_) => "userlist",
            Message::Join(_) => "join",
            Message::Approve(_) => "approve",
            Message::Deny(_) => "deny",
            Message::Quit(_) => "quit",
            Message::Kick(_) => "kick",
            Message::New(_) => "new",
            Message::Draw(_) => "draw",
            Message::ServerDisconnected(_) => "serverDisconnected",
            Message::Unrecognized => "unrecognized",
        }
    }

    // username the record claims to come from
    pub fn username(&self) -> &str {
        match self {
            Message::Connect(c) | Message::Disconnect(c) => &c.username,
            Message::Draw(d) => &d.username,
            Message::Chat(c)
            | Message::Userlist(c)
            | Message::Join(c)
            | Message::Approve(c)
            | Message::Deny(c)
            | Message::Quit(c)
            | Message::Kick(c)
            | Message::New(c)
            | Message::ServerDisconnected(c) => &c.username,
            Message::Unrecognized => "",
        }
    }
}

// Message is logged to the operator view as its json text
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "<{} from {}>", self.category(), self.username()),
        }
    }
}

/// Access level a record is sent with. Anything other than manager or user,
/// including the empty string, is read back as `Bot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Manager,
    User,
    #[serde(other)]
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Manager,
    User,
}

impl From<Role> for Access {
    fn from(role: Role) -> Self {
        match role {
            Role::Manager => Access::Manager,
            Role::User => Access::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Manager => f.write_str("manager"),
            Role::User => f.write_str("user"),
        }
    }
}

/// Connect / disconnect request, the first frame a client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub username: String,
    pub user_access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl Connection {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Connection {
            username: username.into(),
            user_access: role.into(),
            ip_address: None,
            port: None,
        }
    }

    // only an explicit manager request is treated as one
    pub fn role(&self) -> Role {
        match self.user_access {
            Access::Manager => Role::Manager,
            _ => Role::User,
        }
    }
}

/// Chat and generic control record (join, approve, deny, quit, kick, new, userlist).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub username: String,
    pub user_access: Access,
    #[serde(default)]
    pub chat_message: String,
    #[serde(default)]
    pub recipient: String,
}

impl Chat {
    pub fn new(username: impl Into<String>, user_access: Access,
               chat_message: impl Into<String>, recipient: impl Into<String>) -> Self {
        Chat {
            username: username.into(),
            user_access,
            chat_message: chat_message.into(),
            recipient: recipient.into(),
        }
    }

    // record authored by the server, e.g. notices and user lists
    pub fn from_server(chat_message: impl Into<String>, recipient: impl Into<String>) -> Self {
        Chat::new(SERVER, Access::Bot, chat_message, recipient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    Circle,
    Triangle,
    Rectangle,
    Pen,
    Text,
}

/// One drawing primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draw {
    pub username: String,
    pub draw_type: ShapeKind,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub line_data_x: Vec<i32>,
    #[serde(default)]
    pub line_data_y: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_data: Option<String>,
}

impl Draw {
    pub fn new(username: impl Into<String>, draw_type: ShapeKind,
               (x1, y1): (i32, i32), (x2, y2): (i32, i32), color: Color) -> Self {
        Draw {
            username: username.into(),
            draw_type,
            x1, y1, x2, y2,
            color,
            line_data_x: vec![],
            line_data_y: vec![],
            text_data: None,
        }
    }

    // copy of the record attributed to another author
    pub fn authored_by(&self, username: &str) -> Self {
        Draw { username: username.to_owned(), ..self.clone() }
    }
}

/// "#RRGGBB" colour, validated on parse.
///
/// Either hex case is accepted; records are always written back in lowercase,
/// the spelling desktop clients produce. A relayed draw keeps its colour value
/// but not necessarily its original case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #RRGGBB")]
pub struct ColorParseError(String);

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_owned());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(err())
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        Ok(Color(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> String {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}
