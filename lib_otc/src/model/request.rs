//! # Outbound Requests
//!
//! An [`OtcRequest`] carries a correlation id, the creation time and exactly one
//! payload; the [`Method`] is derived from the payload variant, never stored
//! separately, so the two cannot disagree.

use std::fmt;
use std::str::FromStr;

use super::decimal::{self, Decimal};
use super::enums::{Channel, Exchange, Method, OrderType, Side};
use super::symbol::TradableSymbol;
use super::timestamp::Timestamp;
use crate::error::OtcError;

/// A request to the websocket API.
#[derive(Clone, Debug, PartialEq)]
pub struct OtcRequest {
    pub id: String,
    pub timestamp: Timestamp,
    pub payload: RequestPayload,
}

impl OtcRequest {
    pub fn new(id: impl Into<String>, payload: RequestPayload) -> Self {
        Self {
            id: id.into(),
            timestamp: Timestamp::now(),
            payload,
        }
    }

    pub fn method(&self) -> Method {
        self.payload.method()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestPayload {
    Auth(AuthRequest),
    Order(OrderRequest),
    Subscribe(ChannelSpec),
    Unsubscribe(ChannelSpec),
}

impl RequestPayload {
    pub fn method(&self) -> Method {
        match self {
            Self::Auth(_) => Method::Auth,
            Self::Order(_) => Method::Order,
            Self::Subscribe(_) => Method::Subscribe,
            Self::Unsubscribe(_) => Method::Unsubscribe,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub token: String,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest").field("token", &"<redacted>").finish()
    }
}

/// Request for placing an order.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderRequest {
    pub account_id: String,
    pub symbol: TradableSymbol,
    pub quantity: Decimal,
    pub side: Side,
    pub price: Decimal,
    pub order_type: OrderType,
    pub client_order_id: String,
}

impl OrderRequest {
    /// A fill-or-kill order without a client order id.
    pub fn fill_or_kill(
        account_id: impl Into<String>,
        symbol: TradableSymbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            symbol,
            quantity,
            side,
            price,
            order_type: OrderType::FillOrKill,
            client_order_id: String::new(),
        }
    }
}

/// Identifies one subscription; subscribe and unsubscribe carry the same spec.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelSpec {
    ServerInfo,
    Tickers { products: Vec<String> },
    Orders,
    OrderBookTop { products: Vec<String> },
    Rfq(RfqChannel),
}

impl ChannelSpec {
    pub fn channel(&self) -> Channel {
        match self {
            Self::ServerInfo => Channel::ServerInfo,
            Self::Tickers { .. } => Channel::Tickers,
            Self::Orders => Channel::Orders,
            Self::OrderBookTop { .. } => Channel::OrderBookTop,
            Self::Rfq(_) => Channel::Rfq,
        }
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tickers { products } | Self::OrderBookTop { products } => {
                write!(f, "{}[{}]", self.channel(), products.join(","))
            }
            Self::Rfq(rfq) => write!(f, "rfq[{rfq}]"),
            _ => write!(f, "{}", self.channel()),
        }
    }
}

/// Request-for-quote stream on one symbol, venue and size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RfqChannel {
    pub symbol: TradableSymbol,
    pub exchange: Exchange,
    pub size: Decimal,
}

impl RfqChannel {
    pub fn new(symbol: TradableSymbol, exchange: Exchange, size: Decimal) -> Self {
        Self {
            symbol,
            exchange,
            size,
        }
    }
}

impl FromStr for RfqChannel {
    type Err = OtcError;

    /// Parses `<symbol>@<exchange>[@<size>]`; the size defaults to `1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits: Vec<&str> = s.split('@').collect();
        let (symbol, exchange, size) = match bits.as_slice() {
            [symbol, exchange] => (*symbol, *exchange, None),
            [symbol, exchange, size] => (*symbol, *exchange, Some(*size)),
            _ => {
                return Err(OtcError::InvalidInput(format!(
                    "invalid RFQ format '{s}', expected <symbol>@<exchange>@<size>"
                )))
            }
        };
        if symbol.is_empty() {
            return Err(OtcError::InvalidInput(format!("missing symbol in RFQ '{s}'")));
        }
        let exchange = match exchange.parse::<Exchange>() {
            Ok(Exchange::Unspecified) | Err(_) => {
                return Err(OtcError::InvalidInput(format!(
                    "invalid exchange '{exchange}' in RFQ '{s}'"
                )))
            }
            Ok(exchange) => exchange,
        };
        let size = match size {
            Some(size) => decimal::from_wire(size)
                .map_err(|_| OtcError::InvalidInput(format!("invalid size '{size}' in RFQ '{s}'")))?,
            None => Decimal::ONE,
        };
        Ok(Self::new(TradableSymbol::from(symbol), exchange, size))
    }
}

impl fmt::Display for RfqChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}@{}", self.symbol, self.exchange, self.size)
    }
}
