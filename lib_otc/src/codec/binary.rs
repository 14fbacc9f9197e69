//! # Binary Codec
//!
//! Maps the message model to the `prost` schema in [`super::proto`] and back.
//! Client frames are a bare `OtcRequest`; server frames are a `ServerMessage`
//! envelope holding either a response or a channel message.

use prost::Message;

use super::proto::{self, channel_message, otc_request, otc_response, server_message, tradable_symbol};
use super::{Codec, Encoding, Frame};
use crate::error::{OtcError, OtcResult};
use crate::model::decimal::{self, Decimal};
use crate::model::{
    AuthRequest, AuthResponse, Channel, ChannelData, ChannelSpec, ErrorResponse, Exchange, Inbound,
    Method, OrderBookTop, OrderRequest, OrderType, OtcChannelMessage, OtcErrorCode, OtcOrder,
    OtcQuote, OtcRequest, OtcResponse, PriceAmount, RequestPayload, ResponseData, RfqChannel,
    ServerInfo, Side, SubscriptionAck, SubscriptionStatus, Ticker, Timestamp, TradableSymbol,
};

/// Protocol-buffer codec; frames are websocket binary messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Binary
    }

    fn encode_request(&self, request: &OtcRequest) -> OtcResult<Frame> {
        Ok(Frame::Binary(request_to_proto(request).encode_to_vec()))
    }

    fn decode_request(&self, frame: &Frame) -> OtcResult<OtcRequest> {
        let message = proto::OtcRequest::decode(binary_payload(frame)?)?;
        request_from_proto(message)
    }

    fn encode_inbound(&self, inbound: &Inbound) -> OtcResult<Frame> {
        let kind = match inbound {
            Inbound::Response(response) => server_message::Kind::Response(response_to_proto(response)),
            Inbound::Channel(message) => server_message::Kind::ChannelMessage(channel_to_proto(message)),
        };
        let envelope = proto::ServerMessage { kind: Some(kind) };
        Ok(Frame::Binary(envelope.encode_to_vec()))
    }

    fn decode_inbound(&self, frame: &Frame) -> OtcResult<Option<Inbound>> {
        let envelope = proto::ServerMessage::decode(binary_payload(frame)?)?;
        match envelope.kind {
            Some(server_message::Kind::Response(response)) => {
                Ok(response_from_proto(response)?.map(Inbound::Response))
            }
            Some(server_message::Kind::ChannelMessage(message)) => {
                Ok(channel_from_proto(message)?.map(Inbound::Channel))
            }
            None => Err(OtcError::Decode(format!(
                "server frame of {} bytes carries neither a response nor a channel message",
                frame.len()
            ))),
        }
    }
}

fn binary_payload(frame: &Frame) -> OtcResult<&[u8]> {
    match frame {
        Frame::Binary(bytes) => Ok(bytes.as_slice()),
        Frame::Text(_) => Err(OtcError::Decode("expected a binary frame, got text".into())),
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

fn decimal_to_proto(value: &Decimal) -> Option<proto::Decimal> {
    Some(proto::Decimal {
        value: decimal::to_wire(value),
    })
}

fn decimal_from_proto(value: Option<proto::Decimal>, field: &str) -> OtcResult<Decimal> {
    match value {
        Some(value) => decimal::from_wire(&value.value),
        None => Err(OtcError::Decode(format!("missing decimal field '{field}'"))),
    }
}

fn timestamp_to_proto(value: &Timestamp) -> Option<proto::Timestamp> {
    let (seconds, nanos) = value.to_parts();
    Some(proto::Timestamp { seconds, nanos })
}

fn timestamp_from_proto(value: Option<proto::Timestamp>) -> Timestamp {
    value
        .map(|ts| Timestamp::from_parts(ts.seconds, ts.nanos))
        .unwrap_or_default()
}

fn symbol_to_proto(symbol: &TradableSymbol) -> Option<proto::TradableSymbol> {
    let symbol = match symbol {
        TradableSymbol::Flat(flat) => tradable_symbol::Symbol::Flat(flat.clone()),
        TradableSymbol::Spread { front, back } => tradable_symbol::Symbol::Spread(proto::Spread {
            front: front.clone(),
            back: back.clone(),
        }),
        TradableSymbol::Butterfly {
            front,
            middle,
            back,
        } => tradable_symbol::Symbol::Butterfly(proto::Butterfly {
            front: front.clone(),
            middle: middle.clone(),
            back: back.clone(),
        }),
    };
    Some(proto::TradableSymbol {
        symbol: Some(symbol),
    })
}

fn symbol_from_proto(value: Option<proto::TradableSymbol>) -> OtcResult<TradableSymbol> {
    match value.and_then(|symbol| symbol.symbol) {
        Some(tradable_symbol::Symbol::Flat(flat)) => Ok(TradableSymbol::Flat(flat)),
        Some(tradable_symbol::Symbol::Spread(spread)) => {
            Ok(TradableSymbol::spread(spread.front, spread.back))
        }
        Some(tradable_symbol::Symbol::Butterfly(fly)) => {
            Ok(TradableSymbol::butterfly(fly.front, fly.middle, fly.back))
        }
        None => Err(OtcError::Decode("missing tradable symbol".into())),
    }
}

fn price_amount_to_proto(value: &PriceAmount) -> Option<proto::PriceAmount> {
    Some(proto::PriceAmount {
        price: decimal_to_proto(&value.price),
        amount: decimal_to_proto(&value.amount),
    })
}

fn price_amount_from_proto(value: Option<proto::PriceAmount>) -> OtcResult<PriceAmount> {
    let value = value.ok_or_else(|| OtcError::Decode("missing price/amount level".into()))?;
    Ok(PriceAmount {
        price: decimal_from_proto(value.price, "price")?,
        amount: decimal_from_proto(value.amount, "amount")?,
    })
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn channel_spec_to_proto(spec: &ChannelSpec) -> proto::ChannelSelector {
    match spec {
        ChannelSpec::ServerInfo => proto::ChannelSelector::ServerInfo(proto::ServerInfoChannel {}),
        ChannelSpec::Tickers { products } => proto::ChannelSelector::Tickers(proto::TickersChannel {
            products: products.clone(),
        }),
        ChannelSpec::Orders => proto::ChannelSelector::Orders(proto::OrdersChannel {}),
        ChannelSpec::OrderBookTop { products } => {
            proto::ChannelSelector::OrderBookTop(proto::OrderBookTopChannel {
                products: products.clone(),
            })
        }
        ChannelSpec::Rfq(rfq) => proto::ChannelSelector::Rfq(proto::RfqChannel {
            symbol: symbol_to_proto(&rfq.symbol),
            size: decimal_to_proto(&rfq.size),
            exchange: rfq.exchange.to_proto(),
        }),
    }
}

fn channel_spec_from_proto(selector: Option<proto::ChannelSelector>) -> OtcResult<ChannelSpec> {
    match selector {
        Some(proto::ChannelSelector::ServerInfo(_)) => Ok(ChannelSpec::ServerInfo),
        Some(proto::ChannelSelector::Tickers(tickers)) => Ok(ChannelSpec::Tickers {
            products: tickers.products,
        }),
        Some(proto::ChannelSelector::Orders(_)) => Ok(ChannelSpec::Orders),
        Some(proto::ChannelSelector::OrderBookTop(top)) => Ok(ChannelSpec::OrderBookTop {
            products: top.products,
        }),
        Some(proto::ChannelSelector::Rfq(rfq)) => Ok(ChannelSpec::Rfq(RfqChannel {
            symbol: symbol_from_proto(rfq.symbol)?,
            exchange: Exchange::from_proto(rfq.exchange),
            size: decimal_from_proto(rfq.size, "size")?,
        })),
        None => Err(OtcError::Decode("subscription request without a channel".into())),
    }
}

fn request_to_proto(request: &OtcRequest) -> proto::OtcRequest {
    let body = match &request.payload {
        RequestPayload::Auth(auth) => otc_request::Request::Auth(proto::Auth {
            token: auth.token.clone(),
        }),
        RequestPayload::Order(order) => otc_request::Request::Order(proto::NewOrderRequest {
            account_id: order.account_id.clone(),
            symbol: symbol_to_proto(&order.symbol),
            quantity: decimal_to_proto(&order.quantity),
            side: order.side.to_proto(),
            price: decimal_to_proto(&order.price),
            order_type: order.order_type.to_proto(),
            client_order_id: order.client_order_id.clone(),
        }),
        RequestPayload::Subscribe(spec) => otc_request::Request::Subscribe(proto::Subscribe {
            channel: Some(channel_spec_to_proto(spec)),
        }),
        RequestPayload::Unsubscribe(spec) => otc_request::Request::Unsubscribe(proto::Unsubscribe {
            channel: Some(channel_spec_to_proto(spec)),
        }),
    };
    proto::OtcRequest {
        id: request.id.clone(),
        timestamp: timestamp_to_proto(&request.timestamp),
        method: request.method().to_proto(),
        request: Some(body),
    }
}

fn request_from_proto(message: proto::OtcRequest) -> OtcResult<OtcRequest> {
    let payload = match message.request {
        Some(otc_request::Request::Auth(auth)) => RequestPayload::Auth(AuthRequest { token: auth.token }),
        Some(otc_request::Request::Order(order)) => RequestPayload::Order(OrderRequest {
            account_id: order.account_id,
            symbol: symbol_from_proto(order.symbol)?,
            quantity: decimal_from_proto(order.quantity, "quantity")?,
            side: Side::from_proto(order.side),
            price: decimal_from_proto(order.price, "price")?,
            order_type: OrderType::from_proto(order.order_type),
            client_order_id: order.client_order_id,
        }),
        Some(otc_request::Request::Subscribe(sub)) => {
            RequestPayload::Subscribe(channel_spec_from_proto(sub.channel)?)
        }
        Some(otc_request::Request::Unsubscribe(unsub)) => {
            RequestPayload::Unsubscribe(channel_spec_from_proto(unsub.channel)?)
        }
        None => return Err(OtcError::Decode(format!("request {} carries no payload", message.id))),
    };
    let method = Method::from_proto(message.method);
    if method != payload.method() {
        tracing::debug!(
            "Request {} declares method {} but carries a {} payload",
            message.id,
            method,
            payload.method()
        );
    }
    Ok(OtcRequest {
        id: message.id,
        timestamp: timestamp_from_proto(message.timestamp),
        payload,
    })
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

fn order_to_proto(order: &OtcOrder) -> proto::Order {
    proto::Order {
        id: order.id.clone(),
        client_order_id: order.client_order_id.clone(),
        account_id: order.account_id.clone(),
        symbol: symbol_to_proto(&order.symbol),
        product_symbol: order.product_symbol.clone(),
        amount: decimal_to_proto(&order.amount),
        side: order.side.to_proto(),
        price: decimal_to_proto(&order.price),
    }
}

fn order_from_proto(order: proto::Order) -> OtcResult<OtcOrder> {
    Ok(OtcOrder {
        id: order.id,
        client_order_id: order.client_order_id,
        account_id: order.account_id,
        symbol: symbol_from_proto(order.symbol)?,
        product_symbol: order.product_symbol,
        amount: decimal_from_proto(order.amount, "amount")?,
        side: Side::from_proto(order.side),
        price: decimal_from_proto(order.price, "price")?,
    })
}

fn response_to_proto(response: &OtcResponse) -> proto::OtcResponse {
    let body = match &response.data {
        ResponseData::Auth(auth) => otc_response::Response::Auth(proto::AuthResponse {
            message: auth.message.clone(),
        }),
        ResponseData::Error(error) => otc_response::Response::Error(proto::OtcError {
            code: error.code.to_proto(),
            message: error.message.clone(),
        }),
        ResponseData::Subscription(ack) => otc_response::Response::Subscription(proto::Subscription {
            channel: ack.channel.to_proto(),
            status: ack.status.to_proto(),
            message: ack.message.clone(),
        }),
        ResponseData::Order(order) => otc_response::Response::Order(order_to_proto(order)),
    };
    proto::OtcResponse {
        id: response.id.clone(),
        timestamp: timestamp_to_proto(&response.timestamp),
        response: Some(body),
    }
}

fn response_from_proto(response: proto::OtcResponse) -> OtcResult<Option<OtcResponse>> {
    let data = match response.response {
        Some(otc_response::Response::Auth(auth)) => ResponseData::Auth(AuthResponse {
            message: auth.message,
        }),
        Some(otc_response::Response::Error(error)) => ResponseData::Error(ErrorResponse {
            code: OtcErrorCode::from_proto(error.code),
            message: error.message,
        }),
        Some(otc_response::Response::Subscription(sub)) => ResponseData::Subscription(SubscriptionAck {
            channel: Channel::from_proto(sub.channel),
            status: SubscriptionStatus::from_proto(sub.status),
            message: sub.message,
        }),
        Some(otc_response::Response::Order(order)) => ResponseData::Order(order_from_proto(order)?),
        None => {
            tracing::warn!("Response {} carries an unknown payload variant", response.id);
            return Ok(None);
        }
    };
    Ok(Some(OtcResponse {
        id: response.id,
        timestamp: timestamp_from_proto(response.timestamp),
        data,
    }))
}

// ---------------------------------------------------------------------------
// Channel messages
// ---------------------------------------------------------------------------

fn channel_to_proto(message: &OtcChannelMessage) -> proto::ChannelMessage {
    let body = match &message.data {
        ChannelData::ServerInfo(info) => channel_message::Message::ServerInfo(proto::ServerInfo {
            socket_uid: info.socket_uid.clone(),
            age_millis: info.age_millis,
        }),
        ChannelData::Tickers(tickers) => channel_message::Message::Tickers(proto::Tickers {
            tickers: tickers
                .iter()
                .map(|ticker| proto::Ticker {
                    symbol: ticker.symbol.clone(),
                    product_symbol: ticker.product_symbol.clone(),
                    timestamp: timestamp_to_proto(&ticker.timestamp),
                    mid: decimal_to_proto(&ticker.mid),
                })
                .collect(),
        }),
        ChannelData::OtcQuote(quote) => channel_message::Message::OtcQuote(proto::OtcQuote {
            symbol: symbol_to_proto(&quote.symbol),
            exchange: quote.exchange.to_proto(),
            timestamp: timestamp_to_proto(&quote.timestamp),
            product_symbol: quote.product_symbol.clone(),
            buy: price_amount_to_proto(&quote.buy),
            sell: price_amount_to_proto(&quote.sell),
        }),
        ChannelData::OrderBookTops(tops) => channel_message::Message::OrderBookTops(proto::OrderBookTops {
            order_book_tops: tops
                .iter()
                .map(|top| proto::OrderBookTop {
                    buy: price_amount_to_proto(&top.buy),
                    sell: price_amount_to_proto(&top.sell),
                    symbol: top.symbol.clone(),
                    product_symbol: top.product_symbol.clone(),
                    timestamp: timestamp_to_proto(&top.timestamp),
                    exchange: top.exchange.to_proto(),
                })
                .collect(),
        }),
        ChannelData::Order(order) => channel_message::Message::Order(order_to_proto(order)),
    };
    proto::ChannelMessage {
        channel: message.channel.to_proto(),
        timestamp: timestamp_to_proto(&message.timestamp),
        message: Some(body),
    }
}

fn channel_from_proto(message: proto::ChannelMessage) -> OtcResult<Option<OtcChannelMessage>> {
    let channel = Channel::from_proto(message.channel);
    let data = match message.message {
        Some(channel_message::Message::ServerInfo(info)) => ChannelData::ServerInfo(ServerInfo {
            socket_uid: info.socket_uid,
            age_millis: info.age_millis,
        }),
        Some(channel_message::Message::Tickers(tickers)) => ChannelData::Tickers(
            tickers
                .tickers
                .into_iter()
                .map(|ticker| {
                    Ok(Ticker {
                        symbol: ticker.symbol,
                        product_symbol: ticker.product_symbol,
                        timestamp: timestamp_from_proto(ticker.timestamp),
                        mid: decimal_from_proto(ticker.mid, "mid")?,
                    })
                })
                .collect::<OtcResult<Vec<_>>>()?,
        ),
        Some(channel_message::Message::OtcQuote(quote)) => ChannelData::OtcQuote(OtcQuote {
            symbol: symbol_from_proto(quote.symbol)?,
            exchange: Exchange::from_proto(quote.exchange),
            timestamp: timestamp_from_proto(quote.timestamp),
            product_symbol: quote.product_symbol,
            buy: price_amount_from_proto(quote.buy)?,
            sell: price_amount_from_proto(quote.sell)?,
        }),
        Some(channel_message::Message::OrderBookTops(tops)) => ChannelData::OrderBookTops(
            tops.order_book_tops
                .into_iter()
                .map(|top| {
                    Ok(OrderBookTop {
                        buy: price_amount_from_proto(top.buy)?,
                        sell: price_amount_from_proto(top.sell)?,
                        symbol: top.symbol,
                        product_symbol: top.product_symbol,
                        timestamp: timestamp_from_proto(top.timestamp),
                        exchange: Exchange::from_proto(top.exchange),
                    })
                })
                .collect::<OtcResult<Vec<_>>>()?,
        ),
        Some(channel_message::Message::Order(order)) => ChannelData::Order(order_from_proto(order)?),
        None => {
            tracing::warn!("Channel message on {} carries an unknown payload variant", channel);
            return Ok(None);
        }
    };
    Ok(Some(OtcChannelMessage {
        channel,
        timestamp: timestamp_from_proto(message.timestamp),
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decimal(text: &str) -> Decimal {
        decimal::from_wire(text).unwrap()
    }

    fn sample_order() -> OtcOrder {
        OtcOrder {
            id: "ord-1".into(),
            client_order_id: "client-1".into(),
            account_id: "acc-1".into(),
            symbol: TradableSymbol::butterfly("brtz25", "brtf26", "brtg26"),
            product_symbol: "brt".into(),
            amount: decimal("12.500"),
            side: Side::Sell,
            price: decimal("0.010"),
        }
    }

    #[test]
    fn order_request_round_trip() {
        let mut order = OrderRequest::fill_or_kill(
            "acc-1",
            TradableSymbol::spread("brtz25", "brtf26"),
            Side::Buy,
            decimal("25.00"),
            decimal("71.125"),
        );
        order.client_order_id = "mine-7".into();
        let request = OtcRequest {
            id: "req-1".into(),
            timestamp: Timestamp::from_nanos(1_714_564_800_123_456_789),
            payload: RequestPayload::Order(order),
        };
        let frame = BinaryCodec.encode_request(&request).unwrap();
        assert!(matches!(frame, Frame::Binary(_)));
        let decoded = BinaryCodec.decode_request(&frame).unwrap();
        assert_eq!(decoded, request);
        let RequestPayload::Order(order) = decoded.payload else {
            panic!("expected an order payload");
        };
        assert_eq!(order.quantity.to_string(), "25.00");
        assert_eq!(order.price.to_string(), "71.125");
    }

    #[test]
    fn rfq_subscribe_round_trip() {
        let request = OtcRequest::new(
            "req-2",
            RequestPayload::Subscribe(ChannelSpec::Rfq("brtz25-brtf26@ice@5.5".parse().unwrap())),
        );
        let frame = BinaryCodec.encode_request(&request).unwrap();
        assert_eq!(BinaryCodec.decode_request(&frame).unwrap(), request);
    }

    #[test]
    fn method_is_written_from_payload() {
        let request = OtcRequest::new("req-3", RequestPayload::Unsubscribe(ChannelSpec::Orders));
        let Frame::Binary(bytes) = BinaryCodec.encode_request(&request).unwrap() else {
            panic!("expected a binary frame");
        };
        let raw = proto::OtcRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(raw.method, Method::Unsubscribe.to_proto());
        assert_eq!(raw.timestamp.unwrap().nanos, request.timestamp.to_parts().1);
    }

    #[test]
    fn order_response_round_trip() {
        let response = OtcResponse {
            id: "req-1".into(),
            timestamp: Timestamp::from_millis(1_714_564_800_000),
            data: ResponseData::Order(sample_order()),
        };
        let frame = BinaryCodec.encode_inbound(&Inbound::Response(response.clone())).unwrap();
        assert_eq!(
            BinaryCodec.decode_inbound(&frame).unwrap(),
            Some(Inbound::Response(response))
        );
    }

    #[test]
    fn quote_channel_message_round_trip() {
        let message = OtcChannelMessage {
            channel: Channel::Rfq,
            timestamp: Timestamp::from_nanos(-1),
            data: ChannelData::OtcQuote(OtcQuote {
                symbol: TradableSymbol::flat("brtz25"),
                exchange: Exchange::Cme,
                timestamp: Timestamp::from_nanos(42),
                product_symbol: "brt".into(),
                buy: PriceAmount::new(decimal("71.10"), decimal("5")),
                sell: PriceAmount::new(decimal("71.20"), decimal("5")),
            }),
        };
        let frame = BinaryCodec.encode_inbound(&Inbound::Channel(message.clone())).unwrap();
        assert_eq!(
            BinaryCodec.decode_inbound(&frame).unwrap(),
            Some(Inbound::Channel(message))
        );
    }

    #[test]
    fn unknown_response_variant_is_absent() {
        // Payload fields under tags this client does not know are skipped by prost,
        // which leaves the union empty.
        let envelope = proto::ServerMessage {
            kind: Some(server_message::Kind::Response(proto::OtcResponse {
                id: "req-9".into(),
                timestamp: None,
                response: None,
            })),
        };
        let frame = Frame::Binary(envelope.encode_to_vec());
        assert_eq!(BinaryCodec.decode_inbound(&frame).unwrap(), None);
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        let frame = Frame::Binary(vec![0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(BinaryCodec.decode_inbound(&frame), Err(OtcError::Decode(_))));
        let empty = Frame::Binary(Vec::new());
        assert!(matches!(BinaryCodec.decode_inbound(&empty), Err(OtcError::Decode(_))));
        let text = Frame::Text("{}".into());
        assert!(matches!(BinaryCodec.decode_inbound(&text), Err(OtcError::Decode(_))));
    }

    #[test]
    fn unknown_enum_values_decode_to_unspecified() {
        let envelope = proto::ServerMessage {
            kind: Some(server_message::Kind::Response(proto::OtcResponse {
                id: "req-4".into(),
                timestamp: None,
                response: Some(otc_response::Response::Error(proto::OtcError {
                    code: 99,
                    message: "new".into(),
                })),
            })),
        };
        let decoded = BinaryCodec
            .decode_inbound(&Frame::Binary(envelope.encode_to_vec()))
            .unwrap();
        let Some(Inbound::Response(response)) = decoded else {
            panic!("expected a response");
        };
        assert_eq!(response.error().unwrap().code, OtcErrorCode::Unspecified);
        assert_eq!(response.timestamp, Timestamp::EPOCH);
    }
}
