//! chatview-protocol: Framing and parsing for the tagged chat protocol
//!
//! This crate turns the raw TCP byte stream into lines ([`LineCodec`]),
//! splits each line into its tag section and payload ([`parse_tags`]),
//! and classifies the result into the handful of message kinds the
//! client reacts to ([`Inbound`]). Outbound traffic is modelled as
//! [`ClientCommand`] values encoded by the same codec.

pub mod codec;
pub mod message;
pub mod tags;

// Re-export main types at crate root
pub use codec::{CodecError, LineCodec, MAX_BUFFER_SIZE};
pub use message::{
    ChatMessage, ClientCommand, Inbound, CAPABILITIES, DEFAULT_COLOR, SERVER_HOST,
};
pub use tags::{parse_badges, parse_tags, TaggedLine};
