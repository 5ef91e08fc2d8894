//! Delimiter-terminated frame codec
//!
//! Reassembles frames from arbitrarily chunked reads. A frame is decoded only
//! once its delimiter has arrived, so chunk boundaries may fall anywhere,
//! including inside a multi-byte UTF-8 sequence.

use super::message::Message;
use super::types::{CodecError, Delimiter, FrameDecodeError, DEFAULT_MAX_FRAME_LENGTH};
use crate::telemetry::{increment, Counter};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// `tokio_util` codec turning a byte stream into [`Message`]s and back
#[derive(Debug, Clone)]
pub struct MessageCodec {
    delimiter: Delimiter,
    max_frame_length: usize,
    /// Bytes already scanned for a delimiter
    next_index: usize,
    /// Skipping the remainder of an over-long frame
    discarding: bool,
}

impl MessageCodec {
    /// Create a codec with the given delimiter and default frame limit
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            next_index: 0,
            discarding: false,
        }
    }

    /// Set the maximum payload length
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len;
        self
    }

    /// Configured delimiter
    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    fn reset(&mut self) {
        self.next_index = 0;
        self.discarding = false;
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(Delimiter::default())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let delim = self.delimiter.byte();

        loop {
            let found = buf[self.next_index..].iter().position(|b| *b == delim);

            match (self.discarding, found) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.reset();
                }
                (true, None) => {
                    buf.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let frame = buf.split_to(end + 1);
                    let payload = &frame[..end];

                    if payload.len() > self.max_frame_length {
                        let err = FrameDecodeError::TooLong(self.max_frame_length);
                        tracing::warn!(error = %err, len = payload.len(), "Dropping frame");
                        increment(Counter::FramesDropped);
                        continue;
                    }

                    match Message::decode(payload) {
                        Ok(msg) => {
                            increment(Counter::FramesDecoded);
                            return Ok(Some(msg));
                        }
                        Err(FrameDecodeError::Empty) => continue,
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                payload = %String::from_utf8_lossy(payload),
                                "Dropping malformed frame"
                            );
                            increment(Counter::FramesDropped);
                        }
                    }
                }
                (false, None) if buf.len() > self.max_frame_length => {
                    let err = FrameDecodeError::TooLong(self.max_frame_length);
                    tracing::warn!(error = %err, "Discarding frame until next delimiter");
                    increment(Counter::FramesDropped);
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(None);
                }
                (false, None) => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        if let Some(msg) = self.decode(buf)? {
            return Ok(Some(msg));
        }
        if !buf.is_empty() && !self.discarding {
            tracing::debug!(bytes = buf.len(), "Discarding partial frame at end of stream");
        }
        buf.clear();
        self.reset();
        Ok(None)
    }
}

impl Encoder<&Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let payload = msg.encode(self.delimiter)?;
        dst.reserve(payload.len() + 1);
        dst.put_slice(payload.as_bytes());
        dst.put_u8(self.delimiter.byte());
        Ok(())
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        Encoder::<&Message>::encode(self, &msg, dst)
    }
}
