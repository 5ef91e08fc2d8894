//! Wire message model and payload encoding

use super::types::{CodecError, Delimiter, FrameDecodeError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Seconds since the Unix epoch with microsecond resolution
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Trading side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Latest traded price for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    #[serde(alias = "sym")]
    pub symbol: String,
    #[serde(alias = "px")]
    pub price: f64,
    #[serde(default = "unix_timestamp")]
    pub timestamp: f64,
}

/// Market-wide sentiment score in `[0, 100]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub sentiment: u8,
    #[serde(default = "unix_timestamp")]
    pub timestamp: f64,
}

/// Order emitted by the signal engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(alias = "sym")]
    pub symbol: String,
    pub side: Side,
    pub qty: u32,
    #[serde(alias = "px")]
    pub price: f64,
    #[serde(default)]
    pub sentiment: u8,
    #[serde(default = "unix_timestamp")]
    pub timestamp: f64,
}

/// A self-describing record carried in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Message {
    Price(PriceTick),
    News(NewsItem),
    Order(Order),
}

const KINDS: [&str; 3] = ["price", "news", "order"];

impl Message {
    /// Build a price message stamped with the current time
    pub fn price(symbol: impl Into<String>, price: f64) -> Self {
        Message::Price(PriceTick {
            symbol: symbol.into(),
            price,
            timestamp: unix_timestamp(),
        })
    }

    /// Build a news message stamped with the current time
    pub fn news(sentiment: u8) -> Self {
        Message::News(NewsItem {
            sentiment,
            timestamp: unix_timestamp(),
        })
    }

    /// Discriminator as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Price(_) => "price",
            Message::News(_) => "news",
            Message::Order(_) => "order",
        }
    }

    /// Encode to compact JSON with every delimiter byte escaped
    pub fn encode(&self, delimiter: Delimiter) -> Result<String, CodecError> {
        let json = serde_json::to_string(self)?;
        let delim = delimiter.byte() as char;
        if json.contains(delim) {
            // The delimiter can only occur inside string literals here.
            return Ok(json.replace(delim, &delimiter.json_escape()));
        }
        Ok(json)
    }

    /// Decode one frame payload (delimiter already stripped)
    ///
    /// Accepts the JSON form with either a `kind` or `type` discriminator,
    /// plus the compact `SYMBOL,price` and `NEWS,sentiment` forms.
    pub fn decode(payload: &[u8]) -> Result<Self, FrameDecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| FrameDecodeError::InvalidUtf8)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(FrameDecodeError::Empty);
        }

        let msg = if text.starts_with('{') {
            Self::decode_json(text)?
        } else {
            Self::decode_compact(text)?
        };
        msg.validate()?;
        Ok(msg)
    }

    fn decode_json(text: &str) -> Result<Self, FrameDecodeError> {
        let mut value: Value =
            serde_json::from_str(text).map_err(|e| FrameDecodeError::Malformed(e.to_string()))?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| FrameDecodeError::Malformed("payload is not an object".into()))?;

        if !obj.contains_key("kind") {
            if let Some(kind) = obj.remove("type") {
                obj.insert("kind".to_string(), kind);
            }
        }

        let kind = match obj.get("kind") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => return Err(FrameDecodeError::UnknownKind(other.to_string())),
            None => return Err(FrameDecodeError::Malformed("missing kind".into())),
        };
        if !KINDS.contains(&kind.as_str()) {
            return Err(FrameDecodeError::UnknownKind(kind));
        }

        serde_json::from_value(value).map_err(|e| FrameDecodeError::Malformed(e.to_string()))
    }

    fn decode_compact(text: &str) -> Result<Self, FrameDecodeError> {
        let (left, right) = text
            .split_once(',')
            .ok_or_else(|| FrameDecodeError::Malformed(format!("unrecognised payload: {text}")))?;
        let (left, right) = (left.trim(), right.trim());

        if left.eq_ignore_ascii_case("news") {
            let sentiment: i64 = right.parse().map_err(|_| FrameDecodeError::OutOfRange {
                field: "sentiment",
                value: right.to_string(),
            })?;
            let sentiment = u8::try_from(sentiment).map_err(|_| FrameDecodeError::OutOfRange {
                field: "sentiment",
                value: right.to_string(),
            })?;
            return Ok(Message::news(sentiment));
        }

        if left.is_empty() {
            return Err(FrameDecodeError::Malformed("empty symbol".into()));
        }
        let price: f64 = right
            .parse()
            .map_err(|_| FrameDecodeError::Malformed(format!("bad price: {right}")))?;
        Ok(Message::price(left, price))
    }

    fn validate(&self) -> Result<(), FrameDecodeError> {
        let (symbol, price, sentiment) = match self {
            Message::Price(t) => (Some(&t.symbol), Some(t.price), None),
            Message::News(n) => (None, None, Some(n.sentiment)),
            Message::Order(o) => (Some(&o.symbol), Some(o.price), Some(o.sentiment)),
        };

        if let Some(symbol) = symbol {
            if symbol.trim().is_empty() {
                return Err(FrameDecodeError::Malformed("empty symbol".into()));
            }
        }
        if let Some(price) = price {
            if !price.is_finite() {
                return Err(FrameDecodeError::OutOfRange {
                    field: "price",
                    value: price.to_string(),
                });
            }
        }
        if let Some(sentiment) = sentiment {
            if sentiment > 100 {
                return Err(FrameDecodeError::OutOfRange {
                    field: "sentiment",
                    value: sentiment.to_string(),
                });
            }
        }
        Ok(())
    }
}
