//! # JSON Codec
//!
//! Text frames carrying one JSON object each. Field names are the snake_case
//! model names, enums travel as their lower-case wire names, decimals as strings
//! and timestamps as RFC 3339 strings.
//!
//! A server object with a `method` field is a response; otherwise an object with
//! a `channel` field is a channel message.

use serde_json::{json, Value};

use super::{Codec, Encoding, Frame};
use crate::error::{OtcError, OtcResult};
use crate::model::decimal::{self, Decimal};
use crate::model::{
    AuthRequest, AuthResponse, Channel, ChannelData, ChannelSpec, ErrorResponse, Exchange, Inbound,
    Method, OrderBookTop, OrderRequest, OrderType, OtcChannelMessage, OtcErrorCode, OtcOrder,
    OtcQuote, OtcRequest, OtcResponse, PriceAmount, RequestPayload, ResponseData, RfqChannel,
    ServerInfo, Side, SubscriptionAck, SubscriptionStatus, Ticker, Timestamp, TradableSymbol,
};

/// `method` value of server error responses.
const ERROR_METHOD: &str = "otcerror";

/// JSON codec; frames are websocket text messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Json
    }

    fn encode_request(&self, request: &OtcRequest) -> OtcResult<Frame> {
        let mut body = json!({
            "id": request.id,
            "method": request.method().as_str(),
            "timestamp": request.timestamp.to_rfc3339(),
        });
        match &request.payload {
            RequestPayload::Auth(auth) => {
                body["token"] = json!(auth.token);
            }
            RequestPayload::Order(order) => {
                body["account_id"] = json!(order.account_id);
                body["symbol"] = json!(order.symbol.to_string());
                body["quantity"] = json!(decimal::to_wire(&order.quantity));
                body["side"] = json!(order.side.as_str());
                body["price"] = json!(decimal::to_wire(&order.price));
                body["order_type"] = json!(order.order_type.as_str());
                body["client_order_id"] = json!(order.client_order_id);
            }
            RequestPayload::Subscribe(spec) | RequestPayload::Unsubscribe(spec) => {
                write_channel_spec(&mut body, spec);
            }
        }
        Ok(Frame::Text(body.to_string()))
    }

    fn decode_request(&self, frame: &Frame) -> OtcResult<OtcRequest> {
        let value = parse_object(frame)?;
        let method_name = str_field(&value, "method")?;
        let payload = match Method::from_wire(&method_name) {
            Method::Auth => RequestPayload::Auth(AuthRequest {
                token: str_field(&value, "token")?,
            }),
            Method::Order => RequestPayload::Order(OrderRequest {
                account_id: str_field(&value, "account_id")?,
                symbol: symbol_field(&value, "symbol")?,
                quantity: decimal_field(&value, "quantity")?,
                side: enum_field(&value, "side", Side::from_proto, Side::from_wire),
                price: decimal_field(&value, "price")?,
                order_type: enum_field(&value, "order_type", OrderType::from_proto, OrderType::from_wire),
                client_order_id: opt_str_field(&value, "client_order_id"),
            }),
            Method::Subscribe => RequestPayload::Subscribe(read_channel_spec(&value)?),
            Method::Unsubscribe => RequestPayload::Unsubscribe(read_channel_spec(&value)?),
            Method::Unspecified => {
                return Err(OtcError::Decode(format!("unknown request method '{method_name}'")))
            }
        };
        Ok(OtcRequest {
            id: str_field(&value, "id")?,
            timestamp: timestamp_field(&value, "timestamp")?,
            payload,
        })
    }

    fn encode_inbound(&self, inbound: &Inbound) -> OtcResult<Frame> {
        let body = match inbound {
            Inbound::Response(response) => response_to_json(response),
            Inbound::Channel(message) => channel_to_json(message),
        };
        Ok(Frame::Text(body.to_string()))
    }

    fn decode_inbound(&self, frame: &Frame) -> OtcResult<Option<Inbound>> {
        let value = parse_object(frame)?;
        if value.get("method").is_some() {
            Ok(response_from_json(&value)?.map(Inbound::Response))
        } else if value.get("channel").is_some() {
            Ok(channel_from_json(&value)?.map(Inbound::Channel))
        } else {
            Err(OtcError::Decode(format!(
                "server frame of {} bytes carries neither a method nor a channel",
                frame.len()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn parse_object(frame: &Frame) -> OtcResult<Value> {
    let text = match frame {
        Frame::Text(text) => text,
        Frame::Binary(_) => return Err(OtcError::Decode("expected a text frame, got binary".into())),
    };
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(OtcError::Decode(format!("expected a JSON object, got {value}")));
    }
    Ok(value)
}

fn field<'a>(value: &'a Value, key: &str) -> OtcResult<&'a Value> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| OtcError::Decode(format!("missing field '{key}'")))
}

fn str_field(value: &Value, key: &str) -> OtcResult<String> {
    field(value, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OtcError::Decode(format!("field '{key}' is not a string")))
}

fn opt_str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn decimal_value(value: &Value, key: &str) -> OtcResult<Decimal> {
    match value {
        Value::String(text) => decimal::from_wire(text),
        Value::Number(number) => decimal::from_wire(&number.to_string()),
        other => Err(OtcError::Decode(format!("field '{key}' is not a decimal: {other}"))),
    }
}

fn decimal_field(value: &Value, key: &str) -> OtcResult<Decimal> {
    decimal_value(field(value, key)?, key)
}

/// A missing timestamp reads as the epoch, like an unset binary field.
fn timestamp_field(value: &Value, key: &str) -> OtcResult<Timestamp> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(Timestamp::EPOCH),
        Some(Value::String(text)) => Timestamp::parse_rfc3339(text),
        Some(other) => Err(OtcError::Decode(format!("field '{key}' is not a timestamp: {other}"))),
    }
}

fn symbol_field(value: &Value, key: &str) -> OtcResult<TradableSymbol> {
    Ok(TradableSymbol::from(str_field(value, key)?.as_str()))
}

/// Enums are written by name; integers are accepted as well.
fn enum_field<E: Default>(
    value: &Value,
    key: &str,
    from_proto: fn(i32) -> E,
    from_wire: fn(&str) -> E,
) -> E {
    match value.get(key) {
        Some(Value::String(name)) => from_wire(name),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(from_proto)
            .unwrap_or_default(),
        _ => E::default(),
    }
}

fn products_field(value: &Value) -> OtcResult<Vec<String>> {
    match value.get("products") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| OtcError::Decode(format!("product {item} is not a string")))
            })
            .collect(),
        Some(other) => Err(OtcError::Decode(format!("products is not a list: {other}"))),
    }
}

fn array_field<'a>(value: &'a Value, key: &str) -> OtcResult<&'a Vec<Value>> {
    field(value, key)?
        .as_array()
        .ok_or_else(|| OtcError::Decode(format!("field '{key}' is not a list")))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn write_channel_spec(body: &mut Value, spec: &ChannelSpec) {
    body["channel"] = json!(spec.channel().as_str());
    match spec {
        ChannelSpec::Tickers { products } | ChannelSpec::OrderBookTop { products } => {
            body["products"] = json!(products);
        }
        ChannelSpec::Rfq(rfq) => {
            body["symbol"] = json!(rfq.symbol.to_string());
            body["size"] = json!(decimal::to_wire(&rfq.size));
            body["exchange"] = json!(rfq.exchange.as_str());
        }
        ChannelSpec::ServerInfo | ChannelSpec::Orders => {}
    }
}

fn read_channel_spec(value: &Value) -> OtcResult<ChannelSpec> {
    let name = str_field(value, "channel")?;
    match Channel::from_wire(&name) {
        Channel::ServerInfo => Ok(ChannelSpec::ServerInfo),
        Channel::Tickers => Ok(ChannelSpec::Tickers {
            products: products_field(value)?,
        }),
        Channel::Orders => Ok(ChannelSpec::Orders),
        Channel::OrderBookTop => Ok(ChannelSpec::OrderBookTop {
            products: products_field(value)?,
        }),
        Channel::Rfq => Ok(ChannelSpec::Rfq(RfqChannel {
            symbol: symbol_field(value, "symbol")?,
            exchange: enum_field(value, "exchange", Exchange::from_proto, Exchange::from_wire),
            size: decimal_field(value, "size")?,
        })),
        Channel::Unspecified => Err(OtcError::Decode(format!("unknown channel '{name}'"))),
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

fn order_to_json(order: &OtcOrder) -> Value {
    json!({
        "id": order.id,
        "client_order_id": order.client_order_id,
        "account_id": order.account_id,
        "symbol": order.symbol.to_string(),
        "product_symbol": order.product_symbol,
        "amount": decimal::to_wire(&order.amount),
        "side": order.side.as_str(),
        "price": decimal::to_wire(&order.price),
    })
}

fn order_from_json(value: &Value) -> OtcResult<OtcOrder> {
    Ok(OtcOrder {
        id: str_field(value, "id")?,
        client_order_id: opt_str_field(value, "client_order_id"),
        account_id: opt_str_field(value, "account_id"),
        symbol: symbol_field(value, "symbol")?,
        product_symbol: opt_str_field(value, "product_symbol"),
        amount: decimal_field(value, "amount")?,
        side: enum_field(value, "side", Side::from_proto, Side::from_wire),
        price: decimal_field(value, "price")?,
    })
}

fn response_to_json(response: &OtcResponse) -> Value {
    let mut body = json!({
        "id": response.id,
        "timestamp": response.timestamp.to_rfc3339(),
    });
    match &response.data {
        ResponseData::Auth(auth) => {
            body["method"] = json!(Method::Auth.as_str());
            body["message"] = json!(auth.message);
        }
        ResponseData::Error(error) => {
            body["method"] = json!(ERROR_METHOD);
            body["code"] = json!(error.code.as_str());
            body["message"] = json!(error.message);
        }
        ResponseData::Subscription(ack) => {
            let method = match ack.status {
                SubscriptionStatus::Unsubscribed => Method::Unsubscribe,
                _ => Method::Subscribe,
            };
            body["method"] = json!(method.as_str());
            body["channel"] = json!(ack.channel.as_str());
            body["status"] = json!(ack.status.as_str());
            body["message"] = json!(ack.message);
        }
        ResponseData::Order(order) => {
            body["method"] = json!(Method::Order.as_str());
            body["order"] = order_to_json(order);
        }
    }
    body
}

fn response_from_json(value: &Value) -> OtcResult<Option<OtcResponse>> {
    let id = str_field(value, "id")?;
    let method = str_field(value, "method")?;
    let data = if method == ERROR_METHOD {
        ResponseData::Error(ErrorResponse {
            code: enum_field(value, "code", OtcErrorCode::from_proto, OtcErrorCode::from_wire),
            message: opt_str_field(value, "message"),
        })
    } else {
        match Method::from_wire(&method) {
            Method::Auth => ResponseData::Auth(AuthResponse {
                message: opt_str_field(value, "message"),
            }),
            Method::Subscribe | Method::Unsubscribe => ResponseData::Subscription(SubscriptionAck {
                channel: enum_field(value, "channel", Channel::from_proto, Channel::from_wire),
                status: enum_field(
                    value,
                    "status",
                    SubscriptionStatus::from_proto,
                    SubscriptionStatus::from_wire,
                ),
                message: opt_str_field(value, "message"),
            }),
            Method::Order => ResponseData::Order(order_from_json(field(value, "order")?)?),
            Method::Unspecified => {
                tracing::warn!("Response {} has unknown method '{}'", id, method);
                return Ok(None);
            }
        }
    };
    Ok(Some(OtcResponse {
        id,
        timestamp: timestamp_field(value, "timestamp")?,
        data,
    }))
}

// ---------------------------------------------------------------------------
// Channel messages
// ---------------------------------------------------------------------------

fn price_amount_to_json(level: &PriceAmount) -> Value {
    json!({
        "price": decimal::to_wire(&level.price),
        "amount": decimal::to_wire(&level.amount),
    })
}

fn price_amount_from_json(value: &Value, key: &str) -> OtcResult<PriceAmount> {
    let level = field(value, key)?;
    Ok(PriceAmount {
        price: decimal_field(level, "price")?,
        amount: decimal_field(level, "amount")?,
    })
}

fn channel_to_json(message: &OtcChannelMessage) -> Value {
    let payload = match &message.data {
        ChannelData::ServerInfo(info) => json!({
            "socket_uid": info.socket_uid,
            "age_millis": info.age_millis,
        }),
        ChannelData::Tickers(tickers) => Value::Array(
            tickers
                .iter()
                .map(|ticker| {
                    json!({
                        "symbol": ticker.symbol,
                        "product_symbol": ticker.product_symbol,
                        "timestamp": ticker.timestamp.to_rfc3339(),
                        "mid": decimal::to_wire(&ticker.mid),
                    })
                })
                .collect(),
        ),
        ChannelData::OtcQuote(quote) => json!({
            "symbol": quote.symbol.to_string(),
            "exchange": quote.exchange.as_str(),
            "timestamp": quote.timestamp.to_rfc3339(),
            "product_symbol": quote.product_symbol,
            "buy": price_amount_to_json(&quote.buy),
            "sell": price_amount_to_json(&quote.sell),
        }),
        ChannelData::OrderBookTops(tops) => Value::Array(
            tops.iter()
                .map(|top| {
                    json!({
                        "buy": price_amount_to_json(&top.buy),
                        "sell": price_amount_to_json(&top.sell),
                        "symbol": top.symbol,
                        "product_symbol": top.product_symbol,
                        "timestamp": top.timestamp.to_rfc3339(),
                        "exchange": top.exchange.as_str(),
                    })
                })
                .collect(),
        ),
        ChannelData::Order(order) => order_to_json(order),
    };
    json!({
        "channel": message.channel.as_str(),
        "timestamp": message.timestamp.to_rfc3339(),
        "message": payload,
    })
}

fn channel_from_json(value: &Value) -> OtcResult<Option<OtcChannelMessage>> {
    let name = str_field(value, "channel")?;
    let channel = Channel::from_wire(&name);
    let data = match channel {
        Channel::ServerInfo => {
            let info = field(value, "message")?;
            ChannelData::ServerInfo(ServerInfo {
                socket_uid: opt_str_field(info, "socket_uid"),
                age_millis: info.get("age_millis").and_then(Value::as_i64).unwrap_or_default(),
            })
        }
        Channel::Tickers => ChannelData::Tickers(
            array_field(value, "message")?
                .iter()
                .map(|ticker| {
                    Ok(Ticker {
                        symbol: str_field(ticker, "symbol")?,
                        product_symbol: opt_str_field(ticker, "product_symbol"),
                        timestamp: timestamp_field(ticker, "timestamp")?,
                        mid: decimal_field(ticker, "mid")?,
                    })
                })
                .collect::<OtcResult<Vec<_>>>()?,
        ),
        Channel::Rfq => {
            let quote = field(value, "message")?;
            ChannelData::OtcQuote(OtcQuote {
                symbol: symbol_field(quote, "symbol")?,
                exchange: enum_field(quote, "exchange", Exchange::from_proto, Exchange::from_wire),
                timestamp: timestamp_field(quote, "timestamp")?,
                product_symbol: opt_str_field(quote, "product_symbol"),
                buy: price_amount_from_json(quote, "buy")?,
                sell: price_amount_from_json(quote, "sell")?,
            })
        }
        Channel::OrderBookTop => ChannelData::OrderBookTops(
            array_field(value, "message")?
                .iter()
                .map(|top| {
                    Ok(OrderBookTop {
                        buy: price_amount_from_json(top, "buy")?,
                        sell: price_amount_from_json(top, "sell")?,
                        symbol: str_field(top, "symbol")?,
                        product_symbol: opt_str_field(top, "product_symbol"),
                        timestamp: timestamp_field(top, "timestamp")?,
                        exchange: enum_field(top, "exchange", Exchange::from_proto, Exchange::from_wire),
                    })
                })
                .collect::<OtcResult<Vec<_>>>()?,
        ),
        Channel::Orders => ChannelData::Order(order_from_json(field(value, "message")?)?),
        Channel::Unspecified => {
            tracing::warn!("Channel message on unknown channel '{}'", name);
            return Ok(None);
        }
    };
    Ok(Some(OtcChannelMessage {
        channel,
        timestamp: timestamp_field(value, "timestamp")?,
        data,
    }))
}
