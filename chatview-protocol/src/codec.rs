//! Line codec for the chat transport
//!
//! Inbound bytes are split on `\n` (a preceding `\r` is stripped).
//! Outbound [`ClientCommand`]s are written with a `\r\n` terminator.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::message::ClientCommand;

/// Maximum unterminated bytes kept before the buffer is discarded (1 MiB)
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frames the byte stream into lines and encodes outgoing commands
///
/// When more than `max_buffer` bytes accumulate without a terminator the
/// whole buffer is dropped. This is lossy on purpose: a flooding peer
/// cannot grow memory without bound, and the stream resynchronises at
/// the next terminator.
#[derive(Debug)]
pub struct LineCodec {
    /// Index to resume the terminator search from
    next_index: usize,
    max_buffer: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_buffer(MAX_BUFFER_SIZE)
    }

    /// Create a codec with a custom buffer cap
    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            next_index: 0,
            max_buffer,
        }
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let search_from = self.next_index.min(src.len());
        if let Some(offset) = src[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            self.next_index = 0;

            let mut line = src.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }

        if src.len() > self.max_buffer {
            tracing::debug!(
                bytes = src.len(),
                max = self.max_buffer,
                "Discarding unterminated input over buffer cap"
            );
            src.clear();
            self.next_index = 0;
            return Ok(None);
        }

        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            tracing::debug!(bytes = src.len(), "Dropping partial line at end of stream");
            src.clear();
        }
        self.next_index = 0;
        Ok(None)
    }
}

impl Encoder<ClientCommand> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: ClientCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_string();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PING :tmi.twitch.tv\r\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PING :tmi.twitch.tv")
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bare_lf_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"hello\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn test_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b":tmi.twitch.tv 001 me :Wel"[..]);

        // No terminator yet
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"come\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some(":tmi.twitch.tv 001 me :Welcome")
        );
    }

    #[test]
    fn test_multiple_lines_in_buffer() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"one\r\ntwo\r\nthree\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("one"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("two"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("three"));

        // Buffer should be empty now
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_terminator_split_between_reads() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"abc\r"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"a\xffb\r\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("a\u{fffd}b"));
    }

    #[test]
    fn test_overflow_clears_buffer() {
        let mut codec = LineCodec::with_max_buffer(16);
        let mut buf = BytesMut::from(&[b'x'; 17][..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());

        // Framing resumes with the next complete line
        buf.extend_from_slice(b"next\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("next"));
    }

    #[test]
    fn test_at_cap_is_kept() {
        let mut codec = LineCodec::with_max_buffer(16);
        let mut buf = BytesMut::from(&[b'x'; 16][..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_overflow_with_complete_line_still_yields_line() {
        let mut codec = LineCodec::with_max_buffer(4);
        let mut buf = BytesMut::from(&b"long line\r\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("long line"));
    }

    #[test]
    fn test_default_cap_is_one_mebibyte() {
        assert_eq!(LineCodec::default().max_buffer(), 1024 * 1024);
    }

    #[test]
    fn test_decode_eof_drops_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"done\r\npartial"[..]);

        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("done"));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(ClientCommand::Nick("me".into()), &mut buf).unwrap();
        codec
            .encode(ClientCommand::privmsg("#chan", "hi"), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], b"NICK me\r\nPRIVMSG #chan :hi\r\n");
    }

    #[tokio::test]
    async fn test_framed_read_over_stream() {
        use futures::StreamExt;
        use tokio_util::codec::FramedRead;

        let data: &[u8] = b"PING :tmi.twitch.tv\r\n:tmi.twitch.tv 001 me :Welcome\r\n";
        let mut framed = FramedRead::new(data, LineCodec::new());

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            "PING :tmi.twitch.tv"
        );
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ":tmi.twitch.tv 001 me :Welcome"
        );
        assert!(framed.next().await.is_none());
    }
}
