//! # Request-Scoped Responses
//!
//! Each [`OtcResponse`] echoes the id of the request it answers and carries
//! exactly one [`ResponseData`] variant.

use super::decimal::Decimal;
use super::enums::{Channel, OtcErrorCode, Side, SubscriptionStatus};
use super::symbol::TradableSymbol;
use super::timestamp::Timestamp;
use crate::error::OtcError;

#[derive(Clone, Debug, PartialEq)]
pub struct OtcResponse {
    pub id: String,
    pub timestamp: Timestamp,
    pub data: ResponseData,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResponseData {
    Auth(AuthResponse),
    Subscription(SubscriptionAck),
    Order(OtcOrder),
    Error(ErrorResponse),
}

impl OtcResponse {
    pub fn new(id: impl Into<String>, data: ResponseData) -> Self {
        Self {
            id: id.into(),
            timestamp: Timestamp::now(),
            data,
        }
    }

    pub fn auth(&self) -> Option<&AuthResponse> {
        match &self.data {
            ResponseData::Auth(auth) => Some(auth),
            _ => None,
        }
    }

    pub fn subscription(&self) -> Option<&SubscriptionAck> {
        match &self.data {
            ResponseData::Subscription(ack) => Some(ack),
            _ => None,
        }
    }

    pub fn order(&self) -> Option<&OtcOrder> {
        match &self.data {
            ResponseData::Order(order) => Some(order),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorResponse> {
        match &self.data {
            ResponseData::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Turns a server error response into [`OtcError::Protocol`].
    pub fn into_result(self) -> Result<OtcResponse, OtcError> {
        match self.data {
            ResponseData::Error(error) => Err(error.into()),
            _ => Ok(self),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthResponse {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionAck {
    pub channel: Channel,
    pub status: SubscriptionStatus,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: OtcErrorCode,
    pub message: String,
}

impl From<ErrorResponse> for OtcError {
    fn from(value: ErrorResponse) -> Self {
        OtcError::Protocol {
            code: value.code,
            message: value.message,
        }
    }
}

/// An order as reported by the server, both as a response and on the orders channel.
#[derive(Clone, Debug, PartialEq)]
pub struct OtcOrder {
    pub id: String,
    pub client_order_id: String,
    pub account_id: String,
    pub symbol: TradableSymbol,
    pub product_symbol: String,
    pub amount: Decimal,
    pub side: Side,
    pub price: Decimal,
}
