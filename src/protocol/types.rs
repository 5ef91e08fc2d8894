//! Protocol types: delimiter and framing errors

use thiserror::Error;

/// Default frame delimiter
pub const DEFAULT_DELIMITER: u8 = b'*';

/// Default upper bound for a single frame payload (64 KiB)
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Bytes compact JSON can emit outside of a string literal
const JSON_RESERVED: &[u8] = b"{}[]:,\"\\-+.";

/// Single-byte frame terminator
///
/// Only bytes that compact JSON never produces outside a string literal are
/// accepted, so escaping occurrences inside strings is enough to keep the
/// delimiter out of every encoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter(u8);

impl Delimiter {
    /// Validate a delimiter byte
    pub fn new(byte: u8) -> Result<Self, InvalidDelimiter> {
        if !byte.is_ascii()
            || byte.is_ascii_alphanumeric()
            || byte == b' '
            || JSON_RESERVED.contains(&byte)
        {
            return Err(InvalidDelimiter(format!("{:?}", byte as char)));
        }
        Ok(Self(byte))
    }

    /// Parse a delimiter from its configured textual form (exactly one character)
    pub fn parse(s: &str) -> Result<Self, InvalidDelimiter> {
        match s.as_bytes() {
            [byte] => Self::new(*byte),
            _ => Err(InvalidDelimiter(s.to_string())),
        }
    }

    /// Raw delimiter byte
    pub fn byte(self) -> u8 {
        self.0
    }

    /// JSON unicode escape for the delimiter (`\u002a` for `*`)
    pub(crate) fn json_escape(self) -> String {
        format!("\\u{:04x}", self.0)
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self(DEFAULT_DELIMITER)
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0 as char)
    }
}

/// Rejected delimiter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid delimiter {0}: must be one ASCII byte never emitted by compact JSON")]
pub struct InvalidDelimiter(pub String);

/// A single frame could not be turned into a message
///
/// Always recoverable: the frame is dropped and decoding resumes at the
/// next delimiter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FrameDecodeError {
    /// Payload bytes are not UTF-8
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,
    /// Payload is blank
    #[error("Empty frame")]
    Empty,
    /// JSON payload did not match any message shape
    #[error("Malformed frame: {0}")]
    Malformed(String),
    /// Discriminator names no known message kind
    #[error("Unknown message kind: {0}")]
    UnknownKind(String),
    /// A field value is outside its allowed range
    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
    /// Frame grew past the configured maximum before a delimiter arrived
    #[error("Frame exceeds maximum length of {0} bytes")]
    TooLong(usize),
}

/// Fatal codec errors (the link is torn down)
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Message could not be serialized
    #[error("Encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
