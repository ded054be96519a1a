//! Message handler trait and the chat renderer handler

use std::sync::Arc;

use arc_swap::ArcSwap;

use chatview_protocol::{Inbound, TaggedLine};
use chatview_utils::ChatviewError;

use super::client::ConnectionState;
use crate::output::OutputCoordinator;
use crate::render::{Renderer, UserState};

/// Receives everything the connection reads
///
/// Called from the network task, so implementations must not block.
pub trait MessageHandler: Send + Sync {
    /// Handle one framed line and its classification
    fn handle(&self, line: &str, inbound: &Inbound);

    /// Called on every state transition
    fn on_state(&self, _state: ConnectionState, _channel: &str) {}

    /// Called when an established session drops and a reconnect follows
    fn on_connection_lost(&self, _error: &ChatviewError) {}
}

/// Simple callback-based handler
#[cfg(test)]
pub struct CallbackHandler<F>
where
    F: Fn(&str, &Inbound) + Send + Sync,
{
    callback: F,
}

#[cfg(test)]
impl<F> CallbackHandler<F>
where
    F: Fn(&str, &Inbound) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[cfg(test)]
impl<F> MessageHandler for CallbackHandler<F>
where
    F: Fn(&str, &Inbound) + Send + Sync,
{
    fn handle(&self, line: &str, inbound: &Inbound) {
        (self.callback)(line, inbound);
    }
}

/// Renders inbound traffic to the terminal and tracks our own user state
pub struct ChatHandler {
    renderer: Renderer,
    output: Arc<OutputCoordinator>,
    user: Arc<ArcSwap<UserState>>,
    login: String,
}

impl ChatHandler {
    pub fn new(
        renderer: Renderer,
        output: Arc<OutputCoordinator>,
        user: Arc<ArcSwap<UserState>>,
        login: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            output,
            user,
            login: login.into(),
        }
    }
}

impl MessageHandler for ChatHandler {
    fn handle(&self, line: &str, inbound: &Inbound) {
        if let Inbound::UserState(tagged) = inbound {
            if let Some(next) = updated_user_state(&self.user.load(), tagged, &self.login) {
                tracing::debug!(display_name = %next.display_name, "User state updated");
                self.user.store(Arc::new(next));
            }
        }

        if let Some(rendered) = self.renderer.inbound_line(line, inbound) {
            self.output.publish(rendered);
        }
    }

    fn on_state(&self, state: ConnectionState, channel: &str) {
        let line = match state {
            ConnectionState::Connecting => self.renderer.connecting(channel),
            ConnectionState::Ready => self.renderer.connected(channel),
            ConnectionState::Disconnecting => self.renderer.disconnecting(channel),
            _ => return,
        };
        self.output.publish(line);
    }

    fn on_connection_lost(&self, _error: &ChatviewError) {
        self.output.publish(self.renderer.reconnecting());
    }
}

/// New user state from a `USERSTATE` line, if it describes `login`
///
/// The color is only replaced when the line carries one.
pub fn updated_user_state(current: &UserState, tagged: &TaggedLine, login: &str) -> Option<UserState> {
    let display_name = tagged.non_empty("display-name")?;
    if !display_name.eq_ignore_ascii_case(login) {
        return None;
    }

    Some(UserState {
        display_name: display_name.to_string(),
        color: tagged
            .non_empty("color")
            .map_or_else(|| current.color.clone(), str::to_string),
        badges: tagged.badges(),
    })
}
