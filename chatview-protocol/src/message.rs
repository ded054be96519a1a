//! Inbound message classification and outbound commands

use std::fmt;

use crate::tags::{parse_tags, TaggedLine};

/// Host name the server uses as the prefix of its own lines
pub const SERVER_HOST: &str = "tmi.twitch.tv";

/// Capabilities requested before authenticating
pub const CAPABILITIES: [&str; 3] = [
    "twitch.tv/tags",
    "twitch.tv/commands",
    "twitch.tv/membership",
];

/// Sender color used when the `color` tag is absent or empty
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// A chat delivery with its sender, channel and text extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Login name between the first `:` and the first `!`
    pub sender: String,
    /// Channel including its leading `#`
    pub channel: String,
    /// Trailing payload after the second `:`
    pub text: String,
    /// `display-name` tag, falling back to the sender
    pub display_name: String,
    /// `color` tag, falling back to [`DEFAULT_COLOR`]
    pub color: String,
    /// Badge names from the `badges` tag, in order
    pub badges: Vec<String>,
}

impl ChatMessage {
    /// Parse a full protocol line as a chat delivery
    pub fn parse(line: &str) -> Option<Self> {
        Self::from_tagged(&parse_tags(line))
    }

    /// Extract the chat fields from an already split line
    ///
    /// Returns `None` when any marker is missing or out of order, so a
    /// partial message is never produced.
    pub fn from_tagged(tagged: &TaggedLine) -> Option<Self> {
        let payload = tagged.message.as_str();
        if payload.is_empty() {
            return None;
        }

        let start = payload.find(':')?;
        let exclam = payload.find('!')?;
        if start >= exclam {
            return None;
        }
        let sender = &payload[start + 1..exclam];

        let text_start = exclam + 1 + payload[exclam + 1..].find(':')?;
        let text = &payload[text_start + 1..];

        let channel_start = payload.find('#')?;
        if channel_start >= text_start {
            return None;
        }
        let channel = payload[channel_start..text_start].trim_end();

        let display_name = tagged.non_empty("display-name").unwrap_or(sender);
        let color = tagged.non_empty("color").unwrap_or(DEFAULT_COLOR);

        Some(Self {
            sender: sender.to_string(),
            channel: channel.to_string(),
            text: text.to_string(),
            display_name: display_name.to_string(),
            color: color.to_string(),
            badges: tagged.badges(),
        })
    }
}

/// Kinds of inbound line the client distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Keep-alive probe; must be answered with `PONG :<token>`
    Ping { token: String },
    /// The server's view of our own user in the current channel
    UserState(TaggedLine),
    /// Numeric error reply from the server (4xx/5xx)
    ServerError(String),
    /// Any other line originating from the server itself
    Server(String),
    /// A chat delivery
    Chat(ChatMessage),
    /// A chat delivery whose markers could not be extracted
    Malformed(String),
    /// Membership notices and anything else not rendered
    Other(String),
}

impl Inbound {
    /// Classify one framed line
    pub fn classify(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix("PING") {
            let token = rest.trim_start().trim_start_matches(':');
            let token = if token.is_empty() { SERVER_HOST } else { token };
            return Self::Ping {
                token: token.to_string(),
            };
        }

        let tagged = parse_tags(line);
        let (prefix, command) = prefix_and_command(&tagged.message);

        if prefix == Some(SERVER_HOST) {
            return match command {
                "USERSTATE" => Self::UserState(tagged),
                c if is_error_numeric(c) => Self::ServerError(line.to_string()),
                _ => Self::Server(line.to_string()),
            };
        }

        if command == "PRIVMSG" {
            return match ChatMessage::from_tagged(&tagged) {
                Some(chat) => Self::Chat(chat),
                None => Self::Malformed(line.to_string()),
            };
        }

        Self::Other(line.to_string())
    }
}

/// Split `:prefix COMMAND ...` into its prefix (if any) and command word
fn prefix_and_command(payload: &str) -> (Option<&str>, &str) {
    let mut words = payload.split(' ').filter(|w| !w.is_empty());
    match payload.strip_prefix(':') {
        Some(_) => {
            let prefix = words.next().map(|p| &p[1..]);
            (prefix, words.next().unwrap_or(""))
        }
        None => (None, words.next().unwrap_or("")),
    }
}

fn is_error_numeric(command: &str) -> bool {
    command.len() == 3
        && command.bytes().all(|b| b.is_ascii_digit())
        && matches!(command.as_bytes()[0], b'4' | b'5')
}

/// Commands the client sends to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `CAP REQ :<caps>`
    CapabilityRequest(Vec<String>),
    /// `PASS <token>`
    Pass(String),
    /// `NICK <name>`
    Nick(String),
    /// `JOIN <channel>`
    Join(String),
    /// `PRIVMSG <channel> :<text>`
    Privmsg { channel: String, text: String },
    /// `PONG :<token>`
    Pong(String),
}

impl ClientCommand {
    /// The fixed capability request sent at the start of every handshake
    pub fn capability_request() -> Self {
        Self::CapabilityRequest(CAPABILITIES.iter().map(|c| c.to_string()).collect())
    }

    /// Build a chat message for `channel`
    pub fn privmsg(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Privmsg {
            channel: channel.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for ClientCommand {
    /// Wire form without the line terminator
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityRequest(caps) => write!(f, "CAP REQ :{}", caps.join(" ")),
            Self::Pass(token) => write!(f, "PASS {}", single_line(token)),
            Self::Nick(name) => write!(f, "NICK {}", single_line(name)),
            Self::Join(channel) => write!(f, "JOIN {}", single_line(channel)),
            Self::Privmsg { channel, text } => {
                write!(f, "PRIVMSG {} :{}", single_line(channel), single_line(text))
            }
            Self::Pong(token) => write!(f, "PONG :{}", single_line(token)),
        }
    }
}

/// Line terminators inside an argument would split the command
fn single_line(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains(['\r', '\n']) {
        s.replace(['\r', '\n'], " ").into()
    } else {
        s.into()
    }
}
