//! Turning protocol lines into terminal lines

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use chatview_protocol::{ChatMessage, Inbound};

use crate::color::Painter;
use crate::config::{BadgeStyle, Highlight, HighlightKind, UserSettings};

/// Separator between adjacent badge markers
pub const BADGE_SEPARATOR: char = '\u{2009}';

const STATUS_CONNECT: &str = "#008700";
const STATUS_DISCONNECT: &str = "#5f0000";
const SERVER_COLOR: &str = "#3f3f3f";
const SERVER_ERROR_COLOR: &str = "#ff0000";

/// The authenticated user as the server last described it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub display_name: String,
    pub color: String,
    pub badges: Vec<String>,
}

/// Everything the renderer reads, published as one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub channel_color: String,
    pub badges: BTreeMap<String, BadgeStyle>,
    pub highlights: BTreeMap<String, Highlight>,
    /// Show protocol lines verbatim instead of formatted
    pub raw: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self::from_settings(&UserSettings::default(), false)
    }
}

impl DisplaySettings {
    pub fn from_settings(settings: &UserSettings, raw: bool) -> Self {
        Self {
            channel_color: settings.channel_color.clone(),
            badges: settings.badges.clone(),
            highlights: settings.highlights.clone(),
            raw,
        }
    }

    /// Highlight color for a sender; a user entry wins over a badge entry
    pub fn highlight_for(&self, display_name: &str, badges: &[String]) -> Option<&str> {
        let matching = |key: &str, kind: HighlightKind| {
            self.highlights
                .get(key)
                .filter(|h| h.kind == kind)
                .map(|h| h.color.as_str())
        };

        matching(display_name, HighlightKind::User).or_else(|| {
            badges
                .iter()
                .filter_map(|b| matching(b, HighlightKind::Badge))
                .last()
        })
    }
}

/// Formats lines against the current settings and user snapshots
///
/// Both snapshots are swapped atomically by their writers, so a line is
/// always rendered against one consistent version of each.
#[derive(Clone)]
pub struct Renderer {
    painter: Painter,
    settings: Arc<ArcSwap<DisplaySettings>>,
    user: Arc<ArcSwap<UserState>>,
}

impl Renderer {
    pub fn new(
        painter: Painter,
        settings: Arc<ArcSwap<DisplaySettings>>,
        user: Arc<ArcSwap<UserState>>,
    ) -> Self {
        Self {
            painter,
            settings,
            user,
        }
    }

    pub fn painter(&self) -> &Painter {
        &self.painter
    }

    pub fn settings(&self) -> Arc<DisplaySettings> {
        self.settings.load_full()
    }

    /// Replace the settings snapshot
    pub fn update_settings(&self, f: impl FnOnce(&mut DisplaySettings)) {
        let mut next = DisplaySettings::clone(&self.settings.load());
        f(&mut next);
        self.settings.store(Arc::new(next));
    }

    pub fn user(&self) -> Arc<UserState> {
        self.user.load_full()
    }

    /// Badge markers for `badges`, unknown names skipped
    ///
    /// Markers are joined by a thin space and followed by a space when
    /// at least one was emitted.
    pub fn badge_markers(&self, settings: &DisplaySettings, badges: &[String]) -> String {
        let markers: Vec<String> = badges
            .iter()
            .filter_map(|name| settings.badges.get(name))
            .map(|style| self.painter.paint(&style.text, &style.color, style.background))
            .collect();

        if markers.is_empty() {
            return String::new();
        }
        let mut out = markers.join(&BADGE_SEPARATOR.to_string());
        out.push(' ');
        out
    }

    /// A chat delivery
    pub fn chat_line(&self, chat: &ChatMessage) -> String {
        let settings = self.settings.load();
        self.format_chat(
            &settings,
            &chat.channel,
            &chat.badges,
            &chat.display_name,
            &chat.color,
            &chat.text,
        )
    }

    /// Local echo of a line the user sent
    pub fn own_line(&self, channel: &str, login: &str, text: &str) -> String {
        let settings = self.settings.load();
        let user = self.user.load();
        let name = if user.display_name.is_empty() {
            login
        } else {
            user.display_name.as_str()
        };
        self.format_chat(&settings, channel, &user.badges, name, &user.color, text)
    }

    fn format_chat(
        &self,
        settings: &DisplaySettings,
        channel: &str,
        badges: &[String],
        name: &str,
        color: &str,
        text: &str,
    ) -> String {
        let channel = self.painter.fg(channel, &settings.channel_color);
        let markers = self.badge_markers(settings, badges);
        let label = self.painter.fg(&format!("{}: ", name), color);

        match settings.highlight_for(name, badges) {
            Some(highlight) => format!(
                "{} {}{}{}",
                channel,
                markers,
                self.painter.bg(&label, highlight),
                self.painter.bg(text, highlight)
            ),
            None => format!("{} {}{}{}", channel, markers, label, text),
        }
    }

    /// Terminal line for an inbound protocol line, if it is shown at all
    pub fn inbound_line(&self, line: &str, inbound: &Inbound) -> Option<String> {
        let settings = self.settings.load();
        match inbound {
            Inbound::Chat(_) if settings.raw => Some(line.to_string()),
            Inbound::Chat(chat) => Some(self.chat_line(chat)),
            Inbound::ServerError(line) if settings.raw => Some(
                self.painter
                    .fg(&format!("Server Error: {}", line), SERVER_ERROR_COLOR),
            ),
            Inbound::Server(line) if settings.raw => {
                Some(self.painter.fg(&format!("Server: {}", line), SERVER_COLOR))
            }
            Inbound::UserState(_) if settings.raw => {
                Some(self.painter.fg(&format!("Server: {}", line), SERVER_COLOR))
            }
            _ => None,
        }
    }

    pub fn connecting(&self, channel: &str) -> String {
        self.status("Connecting to ", channel, "...", STATUS_CONNECT)
    }

    pub fn connected(&self, channel: &str) -> String {
        self.status("Connected to ", channel, "!", STATUS_CONNECT)
    }

    pub fn disconnecting(&self, channel: &str) -> String {
        self.status("Disconnecting from ", channel, "...", STATUS_DISCONNECT)
    }

    pub fn reconnecting(&self) -> String {
        self.painter
            .fg("Connection lost, reconnecting...", STATUS_DISCONNECT)
    }

    fn status(&self, lead: &str, channel: &str, tail: &str, color: &str) -> String {
        let settings = self.settings.load();
        format!(
            "{}{}{}",
            self.painter.fg(lead, color),
            self.painter.fg(channel, &settings.channel_color),
            self.painter.fg(tail, color)
        )
    }
}
