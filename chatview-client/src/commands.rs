//! Slash command parsing
//!
//! Parses committed lines like `/highlights add somebody user #0000ff`
//! into a [`Command`]. Execution lives with the application, which owns
//! the connection and settings the commands act on.

use std::fmt;

use crate::color::resolve_color;
use crate::config::HighlightKind;

/// Command names and descriptions, in help order
pub const COMMANDS: &[(&str, &str)] = &[
    ("help", "Displays a list of commands and their descriptions."),
    ("quit", "Quits the program."),
    ("clear", "Clears the console."),
    ("join", "Joins a channel."),
    (
        "raw",
        "Toggles showing protocol lines in raw format (may be unreadable).",
    ),
    ("badges", "Displays a list of badges."),
    ("debug", "Feeds sample protocol lines through the renderer."),
    ("set", "Sets a saved value, options: channel, channel_color"),
    (
        "highlights",
        "Displays the list of highlights, and allows you to add, remove or clear highlights.",
    ),
];

/// Canned protocol lines for `/debug`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSample {
    /// A chat line without tags
    Echo,
    /// A chat line without a sender prefix
    Priv,
    /// A fully tagged chat line
    Raw,
}

impl DebugSample {
    pub fn line(self) -> &'static str {
        match self {
            Self::Echo => ":username!username@username.tmi.twitch.tv PRIVMSG #channel :test message",
            Self::Priv => "PRIVMSG #channel :test message",
            Self::Raw => {
                "@badge-info=;badges=broadcaster/1,streamer-awards-2024/1;color=#FF69B4;\
                 display-name=gavinbot32;emotes=;first-msg=0;flags=;\
                 id=2fc5544a-2fa5-4860-96f2-6ed68c306913;mod=0;returning-chatter=0;\
                 room-id=154649067;subscriber=0;tmi-sent-ts=1749175029323;turbo=0;\
                 user-id=154649067;user-type= \
                 :gavinbot32!gavinbot32@gavinbot32.tmi.twitch.tv PRIVMSG #gavinbot32 :kek"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightAction {
    List,
    Help,
    Add {
        key: String,
        kind: HighlightKind,
        color: String,
    },
    Remove(String),
    Clear,
    Default,
}

/// Parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Clear,
    Join(String),
    ToggleRaw,
    Badges,
    Debug(DebugSample),
    SetChannel(String),
    /// Normalized `#rrggbb`
    SetChannelColor(String),
    Highlights(HighlightAction),
    /// Unknown command name
    Unknown(String),
}

/// Error parsing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Empty command
    Empty,
    /// Wrong or missing arguments; carries the usage line
    Usage(&'static str),
    InvalidColor(String),
    InvalidType(String),
    UnclosedQuote,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::Usage(usage) => write!(f, "Usage: {}", usage),
            ParseError::InvalidColor(color) => write!(f, "Invalid color: {}", color),
            ParseError::InvalidType(kind) => write!(f, "Invalid type: {}", kind),
            ParseError::UnclosedQuote => write!(f, "unclosed quote in arguments"),
        }
    }
}

impl std::error::Error for ParseError {}

const JOIN_USAGE: &str = "/join <channel>";
const DEBUG_USAGE: &str = "/debug <echo|priv|raw>";
const SET_USAGE: &str = "/set <channel|channel_color> <value>";
const SET_CHANNEL_USAGE: &str = "/set channel <channel>";
const SET_COLOR_USAGE: &str = "/set channel_color <#hexcode|color>";
const HIGHLIGHTS_USAGE: &str = "/highlights <help|add|remove|clear|default>";
const HIGHLIGHT_ADD_USAGE: &str = "/highlights add <highlight> <user|badge> <color>";
const HIGHLIGHT_REMOVE_USAGE: &str = "/highlights remove <highlight>";

/// Check if input looks like a command (starts with /)
pub fn is_command(input: &str) -> bool {
    input.starts_with('/')
}

/// Parse a command line into a [`Command`]
///
/// # Examples
///
/// ```ignore
/// let cmd = parse_command("/join somechannel").unwrap();
/// assert_eq!(cmd, Command::Join("somechannel".into()));
/// ```
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let body = input.strip_prefix('/').unwrap_or(input);
    let mut args = split_args(body)?.into_iter();
    let name = args.next().ok_or(ParseError::Empty)?;
    let args: Vec<String> = args.collect();
    let arg = |i: usize| args.get(i).map(String::as_str);

    let command = match name.as_str() {
        "help" => Command::Help,
        "quit" => Command::Quit,
        "clear" => Command::Clear,
        "raw" => Command::ToggleRaw,
        "badges" => Command::Badges,
        "join" => Command::Join(arg(0).ok_or(ParseError::Usage(JOIN_USAGE))?.to_string()),
        "debug" => Command::Debug(match arg(0) {
            Some("echo") => DebugSample::Echo,
            Some("priv") => DebugSample::Priv,
            Some("raw") => DebugSample::Raw,
            _ => return Err(ParseError::Usage(DEBUG_USAGE)),
        }),
        "set" => match arg(0) {
            Some("channel") => Command::SetChannel(
                arg(1)
                    .ok_or(ParseError::Usage(SET_CHANNEL_USAGE))?
                    .to_string(),
            ),
            Some("channel_color") => {
                let spec = arg(1).ok_or(ParseError::Usage(SET_COLOR_USAGE))?;
                Command::SetChannelColor(
                    resolve_color(spec).ok_or_else(|| ParseError::InvalidColor(spec.to_string()))?,
                )
            }
            _ => return Err(ParseError::Usage(SET_USAGE)),
        },
        "highlights" => Command::Highlights(parse_highlights(&args)?),
        _ => Command::Unknown(name),
    };
    Ok(command)
}

fn parse_highlights(args: &[String]) -> Result<HighlightAction, ParseError> {
    let Some(sub) = args.first() else {
        return Ok(HighlightAction::List);
    };

    match sub.as_str() {
        "help" => Ok(HighlightAction::Help),
        "clear" => Ok(HighlightAction::Clear),
        "default" => Ok(HighlightAction::Default),
        "remove" => args
            .get(1)
            .map(|key| HighlightAction::Remove(key.clone()))
            .ok_or(ParseError::Usage(HIGHLIGHT_REMOVE_USAGE)),
        "add" => {
            let [_, key, kind, color, ..] = args else {
                return Err(ParseError::Usage(HIGHLIGHT_ADD_USAGE));
            };
            let kind = kind
                .parse::<HighlightKind>()
                .map_err(|_| ParseError::InvalidType(kind.clone()))?;
            let color =
                resolve_color(color).ok_or_else(|| ParseError::InvalidColor(color.clone()))?;
            Ok(HighlightAction::Add {
                key: key.clone(),
                kind,
                color,
            })
        }
        _ => Err(ParseError::Usage(HIGHLIGHTS_USAGE)),
    }
}

/// Split on whitespace, keeping double-quoted runs together
///
/// Quotes are removed and `\"` inside quotes yields a literal quote.
pub fn split_args(input: &str) -> Result<Vec<String>, ParseError> {
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            return Ok(args);
        };

        let mut arg = String::new();
        if first == '"' {
            chars.next();
            loop {
                match chars.next() {
                    None => return Err(ParseError::UnclosedQuote),
                    Some('"') => break,
                    Some('\\') if chars.peek() == Some(&'"') => {
                        chars.next();
                        arg.push('"');
                    }
                    Some(c) => arg.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                arg.push(c);
            }
        }
        args.push(arg);
    }
}
