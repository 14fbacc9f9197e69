//! # OTC Protobuf Schema
//!
//! Rust representations of the binary wire messages, declared with `prost`
//! derives instead of a build step. The shapes follow the public `.proto`
//! definition of the API: decimals and timestamps are nested messages, enums are
//! carried as `i32` and "which field is set" unions are `prost::Oneof` enums.
//!
//! These types never leave the codec; [`super::binary`] maps them to the model.

use prost::Message;

use crate::model::enums::{Channel, Exchange, Method, OrderType, OtcErrorCode, Side, SubscriptionStatus};

/// A decimal number in its exact string form.
#[derive(Clone, PartialEq, Message)]
pub struct Decimal {
    #[prost(string, tag = "1")]
    pub value: String,
}

/// Seconds since the Unix epoch plus a `0..1e9` nanosecond part.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Spread {
    #[prost(string, tag = "1")]
    pub front: String,
    #[prost(string, tag = "2")]
    pub back: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Butterfly {
    #[prost(string, tag = "1")]
    pub front: String,
    #[prost(string, tag = "2")]
    pub middle: String,
    #[prost(string, tag = "3")]
    pub back: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TradableSymbol {
    #[prost(oneof = "tradable_symbol::Symbol", tags = "1, 2, 3")]
    pub symbol: Option<tradable_symbol::Symbol>,
}

pub mod tradable_symbol {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Symbol {
        #[prost(string, tag = "1")]
        Flat(String),
        #[prost(message, tag = "2")]
        Spread(super::Spread),
        #[prost(message, tag = "3")]
        Butterfly(super::Butterfly),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct Auth {
    #[prost(string, tag = "1")]
    pub token: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct NewOrderRequest {
    #[prost(string, tag = "1")]
    pub account_id: String,
    #[prost(message, optional, tag = "2")]
    pub symbol: Option<TradableSymbol>,
    #[prost(message, optional, tag = "3")]
    pub quantity: Option<Decimal>,
    #[prost(enumeration = "Side", tag = "4")]
    pub side: i32,
    #[prost(message, optional, tag = "5")]
    pub price: Option<Decimal>,
    #[prost(enumeration = "OrderType", tag = "6")]
    pub order_type: i32,
    #[prost(string, tag = "7")]
    pub client_order_id: String,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct ServerInfoChannel {}

#[derive(Clone, PartialEq, Message)]
pub struct TickersChannel {
    #[prost(string, repeated, tag = "1")]
    pub products: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct OrdersChannel {}

#[derive(Clone, PartialEq, Message)]
pub struct OrderBookTopChannel {
    #[prost(string, repeated, tag = "1")]
    pub products: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RfqChannel {
    #[prost(message, optional, tag = "1")]
    pub symbol: Option<TradableSymbol>,
    #[prost(message, optional, tag = "2")]
    pub size: Option<Decimal>,
    #[prost(enumeration = "Exchange", tag = "3")]
    pub exchange: i32,
}

/// The channel selector shared by subscribe and unsubscribe requests.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ChannelSelector {
    #[prost(message, tag = "1")]
    ServerInfo(ServerInfoChannel),
    #[prost(message, tag = "2")]
    Tickers(TickersChannel),
    #[prost(message, tag = "3")]
    Orders(OrdersChannel),
    #[prost(message, tag = "4")]
    OrderBookTop(OrderBookTopChannel),
    #[prost(message, tag = "5")]
    Rfq(RfqChannel),
}

#[derive(Clone, PartialEq, Message)]
pub struct Subscribe {
    #[prost(oneof = "ChannelSelector", tags = "1, 2, 3, 4, 5")]
    pub channel: Option<ChannelSelector>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Unsubscribe {
    #[prost(oneof = "ChannelSelector", tags = "1, 2, 3, 4, 5")]
    pub channel: Option<ChannelSelector>,
}

/// Every client frame is one `OtcRequest`.
#[derive(Clone, PartialEq, Message)]
pub struct OtcRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<Timestamp>,
    #[prost(enumeration = "Method", tag = "3")]
    pub method: i32,
    #[prost(oneof = "otc_request::Request", tags = "4, 5, 6, 7")]
    pub request: Option<otc_request::Request>,
}

pub mod otc_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "4")]
        Auth(super::Auth),
        #[prost(message, tag = "5")]
        Order(super::NewOrderRequest),
        #[prost(message, tag = "6")]
        Subscribe(super::Subscribe),
        #[prost(message, tag = "7")]
        Unsubscribe(super::Unsubscribe),
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct AuthResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct OtcError {
    #[prost(enumeration = "OtcErrorCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Subscription {
    #[prost(enumeration = "Channel", tag = "1")]
    pub channel: i32,
    #[prost(enumeration = "SubscriptionStatus", tag = "2")]
    pub status: i32,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Order {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub client_order_id: String,
    #[prost(string, tag = "3")]
    pub account_id: String,
    #[prost(message, optional, tag = "4")]
    pub symbol: Option<TradableSymbol>,
    #[prost(string, tag = "5")]
    pub product_symbol: String,
    #[prost(message, optional, tag = "6")]
    pub amount: Option<Decimal>,
    #[prost(enumeration = "Side", tag = "7")]
    pub side: i32,
    #[prost(message, optional, tag = "8")]
    pub price: Option<Decimal>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OtcResponse {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<Timestamp>,
    #[prost(oneof = "otc_response::Response", tags = "3, 4, 5, 6")]
    pub response: Option<otc_response::Response>,
}

pub mod otc_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "3")]
        Auth(super::AuthResponse),
        #[prost(message, tag = "4")]
        Error(super::OtcError),
        #[prost(message, tag = "5")]
        Subscription(super::Subscription),
        #[prost(message, tag = "6")]
        Order(super::Order),
    }
}

// ---------------------------------------------------------------------------
// Channel messages
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct ServerInfo {
    #[prost(string, tag = "1")]
    pub socket_uid: String,
    #[prost(int64, tag = "2")]
    pub age_millis: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Ticker {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(string, tag = "2")]
    pub product_symbol: String,
    #[prost(message, optional, tag = "3")]
    pub timestamp: Option<Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub mid: Option<Decimal>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Tickers {
    #[prost(message, repeated, tag = "1")]
    pub tickers: Vec<Ticker>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PriceAmount {
    #[prost(message, optional, tag = "1")]
    pub price: Option<Decimal>,
    #[prost(message, optional, tag = "2")]
    pub amount: Option<Decimal>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OrderBookTop {
    #[prost(message, optional, tag = "1")]
    pub buy: Option<PriceAmount>,
    #[prost(message, optional, tag = "2")]
    pub sell: Option<PriceAmount>,
    #[prost(string, tag = "3")]
    pub symbol: String,
    #[prost(string, tag = "4")]
    pub product_symbol: String,
    #[prost(message, optional, tag = "5")]
    pub timestamp: Option<Timestamp>,
    #[prost(enumeration = "Exchange", tag = "6")]
    pub exchange: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct OrderBookTops {
    #[prost(message, repeated, tag = "1")]
    pub order_book_tops: Vec<OrderBookTop>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OtcQuote {
    #[prost(message, optional, tag = "1")]
    pub symbol: Option<TradableSymbol>,
    #[prost(enumeration = "Exchange", tag = "2")]
    pub exchange: i32,
    #[prost(message, optional, tag = "3")]
    pub timestamp: Option<Timestamp>,
    #[prost(string, tag = "4")]
    pub product_symbol: String,
    #[prost(message, optional, tag = "5")]
    pub buy: Option<PriceAmount>,
    #[prost(message, optional, tag = "6")]
    pub sell: Option<PriceAmount>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelMessage {
    #[prost(enumeration = "Channel", tag = "1")]
    pub channel: i32,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<Timestamp>,
    #[prost(oneof = "channel_message::Message", tags = "3, 4, 5, 6, 7")]
    pub message: Option<channel_message::Message>,
}

pub mod channel_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "3")]
        ServerInfo(super::ServerInfo),
        #[prost(message, tag = "4")]
        Tickers(super::Tickers),
        #[prost(message, tag = "5")]
        OtcQuote(super::OtcQuote),
        #[prost(message, tag = "6")]
        OrderBookTops(super::OrderBookTops),
        #[prost(message, tag = "7")]
        Order(super::Order),
    }
}

/// Every server frame is one `ServerMessage`.
#[derive(Clone, PartialEq, Message)]
pub struct ServerMessage {
    #[prost(oneof = "server_message::Kind", tags = "1, 2")]
    pub kind: Option<server_message::Kind>,
}

pub mod server_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Response(super::OtcResponse),
        #[prost(message, tag = "2")]
        ChannelMessage(super::ChannelMessage),
    }
}
