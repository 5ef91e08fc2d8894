//! Framed channel protocol
//!
//! Every socket link carries UTF-8 JSON records, each terminated by a single
//! delimiter byte (default `*`). The delimiter never appears unescaped inside
//! an encoded payload.

mod codec;
mod message;
mod types;

pub use codec::MessageCodec;
pub use message::{unix_timestamp, Message, NewsItem, Order, PriceTick, Side};
pub use types::{
    CodecError, Delimiter, FrameDecodeError, InvalidDelimiter, DEFAULT_DELIMITER,
    DEFAULT_MAX_FRAME_LENGTH,
};
