//! # Tradable Symbols
//!
//! A tradable instrument is either a single leg, a two-leg spread or a three-leg
//! butterfly. The string form joins the legs with `-`: two segments make a
//! spread, three a butterfly, anything else stays a flat symbol.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

const LEG_SEPARATOR: char = '-';

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TradableSymbol {
    Flat(String),
    Spread {
        front: String,
        back: String,
    },
    Butterfly {
        front: String,
        middle: String,
        back: String,
    },
}

impl TradableSymbol {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self::Flat(symbol.into())
    }

    pub fn spread(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self::Spread {
            front: front.into(),
            back: back.into(),
        }
    }

    pub fn butterfly(
        front: impl Into<String>,
        middle: impl Into<String>,
        back: impl Into<String>,
    ) -> Self {
        Self::Butterfly {
            front: front.into(),
            middle: middle.into(),
            back: back.into(),
        }
    }

    /// Number of legs of the instrument.
    pub fn legs(&self) -> usize {
        match self {
            Self::Flat(_) => 1,
            Self::Spread { .. } => 2,
            Self::Butterfly { .. } => 3,
        }
    }
}

impl FromStr for TradableSymbol {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(LEG_SEPARATOR).collect();
        Ok(match parts.as_slice() {
            [front, back] => Self::spread(*front, *back),
            [front, middle, back] => Self::butterfly(*front, *middle, *back),
            _ => Self::flat(s),
        })
    }
}

impl From<&str> for TradableSymbol {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(symbol) => symbol,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for TradableSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat(symbol) => f.write_str(symbol),
            Self::Spread { front, back } => write!(f, "{front}{LEG_SEPARATOR}{back}"),
            Self::Butterfly {
                front,
                middle,
                back,
            } => write!(f, "{front}{LEG_SEPARATOR}{middle}{LEG_SEPARATOR}{back}"),
        }
    }
}
