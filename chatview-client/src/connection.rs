//! Chat server connection management
//!
//! Provides the TCP connection to the chat server with line framing,
//! the login handshake and a supervised reconnecting read loop.

mod client;
mod handler;

pub use client::{
    normalize_channel, Connection, ConnectionSettings, Login, RetryPolicy, DEFAULT_ADDR,
};
pub use handler::ChatHandler;

#[cfg(test)]
pub use handler::CallbackHandler;
