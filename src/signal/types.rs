//! Signal types

use crate::protocol::Side;
use serde::{Deserialize, Serialize};

/// Directional inference from one data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Trade side implied by the signal, if any
    pub fn side(self) -> Option<Side> {
        match self {
            Signal::Buy => Some(Side::Buy),
            Signal::Sell => Some(Side::Sell),
            Signal::Hold => None,
        }
    }
}

/// Last trade direction taken for a symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    #[default]
    Flat,
    Long,
    Short,
}

impl Position {
    /// Whether acting on `side` would change the position
    pub fn accepts(self, side: Side) -> bool {
        match side {
            Side::Buy => self != Position::Long,
            Side::Sell => self != Position::Short,
        }
    }

    /// Position after a confirmed trade on `side`
    pub fn after(side: Side) -> Self {
        match side {
            Side::Buy => Position::Long,
            Side::Sell => Position::Short,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Flat => write!(f, "FLAT"),
            Position::Long => write!(f, "LONG"),
            Position::Short => write!(f, "SHORT"),
        }
    }
}

/// Crossover signal; equal averages give `Hold`
pub fn price_signal(short_ma: f64, long_ma: f64) -> Signal {
    if short_ma > long_ma {
        Signal::Buy
    } else if short_ma < long_ma {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Sentiment signal with exclusive thresholds
pub fn sentiment_signal(sentiment: u8, bullish: u8, bearish: u8) -> Signal {
    if sentiment > bullish {
        Signal::Buy
    } else if sentiment < bearish {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Trade only when both sources agree on a direction
pub fn combine(price: Option<Signal>, sentiment: Signal) -> Option<Side> {
    match (price?, sentiment) {
        (Signal::Buy, Signal::Buy) => Some(Side::Buy),
        (Signal::Sell, Signal::Sell) => Some(Side::Sell),
        _ => None,
    }
}
