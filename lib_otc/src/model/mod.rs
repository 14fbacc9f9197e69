//! # Message Model
//!
//! The typed entities produced and consumed by the codecs: requests, responses,
//! channel messages and the closed enumerations, decimals, timestamps and
//! symbols they are made of. Tagged unions of the protocol are sum types here.

/// Closed protocol enumerations with their wire names.
pub mod enums;
/// Nanosecond UTC timestamps.
pub mod timestamp;
/// String-transported decimal helpers.
pub mod decimal;
/// Flat/spread/butterfly symbols.
pub mod symbol;
/// Outbound requests and channel specifications.
pub mod request;
/// Request-scoped responses.
pub mod response;
/// Broadcast channel messages.
pub mod channel;

pub use channel::{ChannelData, OrderBookTop, OtcChannelMessage, OtcQuote, PriceAmount, ServerInfo, Ticker};
pub use decimal::Decimal;
pub use enums::{Channel, Exchange, Method, OrderType, OtcErrorCode, Side, SubscriptionStatus};
pub use request::{AuthRequest, ChannelSpec, OrderRequest, OtcRequest, RequestPayload, RfqChannel};
pub use response::{AuthResponse, ErrorResponse, OtcOrder, OtcResponse, ResponseData, SubscriptionAck};
pub use symbol::TradableSymbol;
pub use timestamp::Timestamp;

/// Anything the server can send: a correlated response or a channel message.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Response(OtcResponse),
    Channel(OtcChannelMessage),
}

impl From<OtcResponse> for Inbound {
    fn from(value: OtcResponse) -> Self {
        Self::Response(value)
    }
}

impl From<OtcChannelMessage> for Inbound {
    fn from(value: OtcChannelMessage) -> Self {
        Self::Channel(value)
    }
}
