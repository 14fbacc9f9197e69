//! # Broadcast Channel Messages
//!
//! Channel messages are unsolicited: they carry no request id, only the channel
//! they belong to, a server timestamp and one [`ChannelData`] variant.

use super::decimal::Decimal;
use super::enums::{Channel, Exchange};
use super::response::OtcOrder;
use super::symbol::TradableSymbol;
use super::timestamp::Timestamp;

/// A message in a subscribed channel.
#[derive(Clone, Debug, PartialEq)]
pub struct OtcChannelMessage {
    pub channel: Channel,
    pub timestamp: Timestamp,
    pub data: ChannelData,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChannelData {
    ServerInfo(ServerInfo),
    Tickers(Vec<Ticker>),
    OtcQuote(OtcQuote),
    OrderBookTops(Vec<OrderBookTop>),
    Order(OtcOrder),
}

impl OtcChannelMessage {
    pub fn new(channel: Channel, data: ChannelData) -> Self {
        Self {
            channel,
            timestamp: Timestamp::now(),
            data,
        }
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        match &self.data {
            ChannelData::ServerInfo(info) => Some(info),
            _ => None,
        }
    }

    pub fn tickers(&self) -> Option<&[Ticker]> {
        match &self.data {
            ChannelData::Tickers(tickers) => Some(tickers),
            _ => None,
        }
    }

    pub fn otc_quote(&self) -> Option<&OtcQuote> {
        match &self.data {
            ChannelData::OtcQuote(quote) => Some(quote),
            _ => None,
        }
    }

    pub fn order_book_tops(&self) -> Option<&[OrderBookTop]> {
        match &self.data {
            ChannelData::OrderBookTops(tops) => Some(tops),
            _ => None,
        }
    }

    pub fn order(&self) -> Option<&OtcOrder> {
        match &self.data {
            ChannelData::Order(order) => Some(order),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    pub socket_uid: String,
    pub age_millis: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ticker {
    pub symbol: String,
    pub product_symbol: String,
    pub timestamp: Timestamp,
    pub mid: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceAmount {
    pub price: Decimal,
    pub amount: Decimal,
}

impl PriceAmount {
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }

    /// `amount@price`
    pub fn as_string(&self) -> String {
        format!("{}@{}", self.amount, self.price)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBookTop {
    pub buy: PriceAmount,
    pub sell: PriceAmount,
    pub symbol: String,
    pub product_symbol: String,
    pub timestamp: Timestamp,
    pub exchange: Exchange,
}

/// A streamed quote on an RFQ subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct OtcQuote {
    pub symbol: TradableSymbol,
    pub exchange: Exchange,
    pub timestamp: Timestamp,
    pub product_symbol: String,
    pub buy: PriceAmount,
    pub sell: PriceAmount,
}

impl OtcQuote {
    pub fn as_string(&self) -> String {
        format!(
            "{} buy: {}, sell: {}",
            self.symbol,
            self.buy.as_string(),
            self.sell.as_string()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_display() {
        let quote = OtcQuote {
            symbol: TradableSymbol::spread("brtz25", "brtf26"),
            exchange: Exchange::Ice,
            timestamp: Timestamp::EPOCH,
            product_symbol: "brt".into(),
            buy: PriceAmount::new(Decimal::new(7125, 2), Decimal::from(5)),
            sell: PriceAmount::new(Decimal::new(7150, 2), Decimal::from(10)),
        };
        assert_eq!(quote.as_string(), "brtz25-brtf26 buy: 5@71.25, sell: 10@71.50");
    }
}
