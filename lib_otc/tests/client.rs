//! End-to-end tests of the connection state machine against an in-process
//! mock server. No network is involved: the mock connector hands the client
//! one end of a pair of `futures-channel` queues and the test drives the other.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc as fmpsc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;

use lib_otc::connection::{FrameSink, FrameStream};
use lib_otc::{
    codec_for, AuthResponse, Channel, ChannelData, ChannelSpec, ClientConfig, Codec, ConnectionState, Connector,
    Decimal, Encoding, ErrorResponse, Exchange, FnHandler, Frame, Inbound, OrderRequest, OtcChannelMessage,
    OtcClient, OtcError, OtcErrorCode, OtcHandler, OtcRequest, OtcResponse, OtcResult, RequestPayload,
    ResponseData, RfqChannel, ServerInfo, Side, SubscriptionAck, SubscriptionState, SubscriptionStatus, Ticker,
    Timestamp, TradableSymbol,
};

const WAIT: Duration = Duration::from_secs(5);
const BINARY_URL: &str = "ws://mock.local/stream/v2/binary";

// ---------------------------------------------------------------------------
// Mock server
// ---------------------------------------------------------------------------

/// The server's end of one accepted connection.
struct ServerConn {
    url: String,
    codec: Arc<dyn Codec>,
    incoming: fmpsc::UnboundedReceiver<Frame>,
    outgoing: fmpsc::UnboundedSender<OtcResult<Frame>>,
}

impl ServerConn {
    async fn recv(&mut self) -> OtcRequest {
        let frame = timeout(WAIT, self.incoming.next())
            .await
            .expect("timed out waiting for a request")
            .expect("client hung up");
        self.codec.decode_request(&frame).expect("undecodable request")
    }

    fn send(&self, inbound: impl Into<Inbound>) {
        let frame = self.codec.encode_inbound(&inbound.into()).unwrap();
        self.outgoing.unbounded_send(Ok(frame)).unwrap();
    }

    fn send_raw(&self, frame: Frame) {
        self.outgoing.unbounded_send(Ok(frame)).unwrap();
    }

    async fn accept_auth(&mut self, token: &str) -> OtcRequest {
        let request = self.recv().await;
        match &request.payload {
            RequestPayload::Auth(auth) => assert_eq!(auth.token, token),
            other => panic!("expected auth, got {other:?}"),
        }
        self.send(OtcResponse::new(
            request.id.clone(),
            ResponseData::Auth(AuthResponse {
                message: "authenticated".into(),
            }),
        ));
        request
    }

    /// Acknowledges a subscribe or unsubscribe request.
    fn ack(&self, request: &OtcRequest) {
        let (spec, status) = match &request.payload {
            RequestPayload::Subscribe(spec) => (spec, SubscriptionStatus::Subscribed),
            RequestPayload::Unsubscribe(spec) => (spec, SubscriptionStatus::Unsubscribed),
            other => panic!("expected a subscription request, got {other:?}"),
        };
        self.send(OtcResponse::new(
            request.id.clone(),
            ResponseData::Subscription(SubscriptionAck {
                channel: spec.channel(),
                status,
                message: format!("{} {}", status, spec),
            }),
        ));
    }

    fn reject(&self, request: &OtcRequest, code: OtcErrorCode, message: &str) {
        self.send(OtcResponse::new(
            request.id.clone(),
            ResponseData::Error(ErrorResponse {
                code,
                message: message.into(),
            }),
        ));
    }
}

struct MockConnector {
    codec: Arc<dyn Codec>,
    accepted: mpsc::UnboundedSender<ServerConn>,
    refuse: AtomicBool,
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> OtcResult<(FrameSink, FrameStream)> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(OtcError::Transport(format!("connection refused: {url}")));
        }
        let (client_tx, server_rx) = fmpsc::unbounded::<Frame>();
        let (server_tx, client_rx) = fmpsc::unbounded::<OtcResult<Frame>>();
        let _ = self.accepted.send(ServerConn {
            url: url.to_string(),
            codec: self.codec.clone(),
            incoming: server_rx,
            outgoing: server_tx,
        });
        let sink = client_tx.sink_map_err(|e| OtcError::ConnectionLost(e.to_string()));
        Ok((Box::pin(sink), Box::pin(client_rx)))
    }
}

// ---------------------------------------------------------------------------
// Recording handler
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Seen {
    Response(OtcResponse),
    Event(OtcChannelMessage),
}

struct Recorder {
    tx: mpsc::UnboundedSender<Seen>,
}

impl OtcHandler for Recorder {
    fn on_response(&self, _client: &OtcClient, response: &OtcResponse) {
        let _ = self.tx.send(Seen::Response(response.clone()));
    }

    fn on_event(&self, _client: &OtcClient, message: &OtcChannelMessage) {
        let _ = self.tx.send(Seen::Event(message.clone()));
    }
}

struct Harness {
    client: OtcClient,
    connector: Arc<MockConnector>,
    accepted: mpsc::UnboundedReceiver<ServerConn>,
    seen: mpsc::UnboundedReceiver<Seen>,
}

impl Harness {
    fn new(config: ClientConfig) -> Self {
        let (seen_tx, seen) = mpsc::unbounded_channel();
        Self::with_handler(config, Arc::new(Recorder { tx: seen_tx }), seen)
    }

    fn with_handler(
        config: ClientConfig,
        handler: Arc<dyn OtcHandler>,
        seen: mpsc::UnboundedReceiver<Seen>,
    ) -> Self {
        let (accepted_tx, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(MockConnector {
            codec: codec_for(config.encoding),
            accepted: accepted_tx,
            refuse: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        });
        let client = OtcClient::with_connector(config, handler, connector.clone()).unwrap();
        Self {
            client,
            connector,
            accepted,
            seen,
        }
    }

    async fn accept(&mut self) -> ServerConn {
        timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Connects and completes authentication.
    async fn ready(&mut self) -> ServerConn {
        self.client.connect().unwrap();
        let mut conn = self.accept().await;
        conn.accept_auth("secret").await;
        self.client.wait_ready(WAIT).await.unwrap();
        conn
    }

    async fn next_response(&mut self) -> OtcResponse {
        loop {
            match timeout(WAIT, self.seen.recv()).await.expect("timed out waiting for a response") {
                Some(Seen::Response(response)) => return response,
                Some(Seen::Event(_)) => continue,
                None => panic!("handler dropped"),
            }
        }
    }

    async fn next_event(&mut self) -> OtcChannelMessage {
        loop {
            match timeout(WAIT, self.seen.recv()).await.expect("timed out waiting for an event") {
                Some(Seen::Event(message)) => return message,
                Some(Seen::Response(_)) => continue,
                None => panic!("handler dropped"),
            }
        }
    }
}

fn config(encoding: Encoding) -> ClientConfig {
    let mut config = ClientConfig::new(BINARY_URL).with_token("secret");
    config.encoding = encoding;
    config.reconnect_base_delay = Duration::from_millis(10);
    config.reconnect_max_delay = Duration::from_millis(50);
    config
}

fn tickers(products: &[&str]) -> ChannelSpec {
    ChannelSpec::Tickers {
        products: products.iter().map(|p| p.to_string()).collect(),
    }
}

fn ticker_event(symbol: &str, mid: &str) -> OtcChannelMessage {
    OtcChannelMessage::new(
        Channel::Tickers,
        ChannelData::Tickers(vec![Ticker {
            symbol: symbol.into(),
            product_symbol: symbol.into(),
            timestamp: Timestamp::now(),
            mid: Decimal::from_str(mid).unwrap(),
        }]),
    )
}

async fn wait_state(client: &OtcClient, state: ConnectionState) {
    let mut rx = client.watch_state();
    timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {state}"))
        .unwrap();
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

async fn auth_subscribe_and_stream(encoding: Encoding) {
    let mut h = Harness::new(config(encoding));
    h.client.connect().unwrap();
    let mut conn = h.accept().await;
    match encoding {
        Encoding::Binary => assert_eq!(conn.url, BINARY_URL),
        Encoding::Json => assert_eq!(conn.url, "ws://mock.local/stream/v2"),
    }
    wait_state(&h.client, ConnectionState::Authenticating).await;

    conn.accept_auth("secret").await;
    h.client.wait_ready(WAIT).await.unwrap();
    assert!(h.next_response().await.auth().is_some());

    let sent = h.client.subscribe_tickers(["x"]).unwrap();
    assert_eq!(h.client.subscription_state(&tickers(&["x"])), SubscriptionState::Pending);
    let request = conn.recv().await;
    assert_eq!(request.id, sent.id);
    assert_eq!(request.payload, RequestPayload::Subscribe(tickers(&["x"])));

    conn.ack(&request);
    let ack = h.next_response().await;
    assert_eq!(ack.id, sent.id);
    assert_eq!(h.client.subscription_state(&tickers(&["x"])), SubscriptionState::Subscribed);

    conn.send(ticker_event("x", "101.25"));
    let event = h.next_event().await;
    let tickers_seen = event.tickers().unwrap();
    assert_eq!(tickers_seen[0].symbol, "x");
    assert_eq!(tickers_seen[0].mid.to_string(), "101.25");
}

async fn reconnect_resubscribes(encoding: Encoding) {
    let mut h = Harness::new(config(encoding));
    let mut conn = h.ready().await;

    let first = h.client.subscribe_tickers(["x"]).unwrap();
    let request = conn.recv().await;
    conn.ack(&request);
    h.next_response().await;
    h.next_response().await;
    assert_eq!(h.client.subscription_state(&tickers(&["x"])), SubscriptionState::Subscribed);

    drop(conn);

    let mut conn = h.accept().await;
    conn.accept_auth("secret").await;
    let replayed = conn.recv().await;
    assert_ne!(replayed.id, first.id);
    assert_eq!(replayed.payload, RequestPayload::Subscribe(tickers(&["x"])));
    wait_state(&h.client, ConnectionState::Ready).await;
    assert_eq!(h.client.subscription_state(&tickers(&["x"])), SubscriptionState::Pending);

    conn.ack(&replayed);
    loop {
        if h.next_response().await.id == replayed.id {
            break;
        }
    }
    assert_eq!(h.client.active_channels(), vec![tickers(&["x"])]);
    assert_eq!(h.connector.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn binary_auth_subscribe_and_stream() {
    auth_subscribe_and_stream(Encoding::Binary).await;
}

#[tokio::test]
async fn json_auth_subscribe_and_stream() {
    auth_subscribe_and_stream(Encoding::Json).await;
}

#[tokio::test]
async fn binary_reconnect_resubscribes() {
    reconnect_resubscribes(Encoding::Binary).await;
}

#[tokio::test]
async fn json_reconnect_resubscribes() {
    reconnect_resubscribes(Encoding::Json).await;
}

#[tokio::test]
async fn uncorrelated_responses_reach_the_callback() {
    let mut h = Harness::new(config(Encoding::Binary));
    let conn = h.ready().await;
    h.next_response().await;

    conn.send(OtcResponse::new(
        "not-mine",
        ResponseData::Auth(AuthResponse {
            message: "stray".into(),
        }),
    ));
    let response = h.next_response().await;
    assert_eq!(response.id, "not-mine");
    assert_eq!(h.client.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn concurrent_subscribes_resolve_independently() {
    let mut h = Harness::new(config(Encoding::Json));
    let mut conn = h.ready().await;
    h.next_response().await;

    let a = h.client.subscribe_tickers(["a"]).unwrap();
    let b = h.client.subscribe_tickers(["b"]).unwrap();
    assert_ne!(a.id, b.id);

    let first = conn.recv().await;
    let second = conn.recv().await;
    assert_eq!(first.id, a.id);
    assert_eq!(second.id, b.id);

    conn.ack(&second);
    conn.ack(&first);
    assert_eq!(h.next_response().await.id, b.id);
    assert_eq!(h.next_response().await.id, a.id);
    assert_eq!(h.client.active_channels(), vec![tickers(&["a"]), tickers(&["b"])]);
    assert_eq!(h.client.pending_requests(), 0);
}

#[tokio::test]
async fn call_returns_the_correlated_response() {
    let mut h = Harness::new(config(Encoding::Binary));
    let mut conn = h.ready().await;

    let client = h.client.clone();
    let call = tokio::spawn(async move { client.call(RequestPayload::Subscribe(ChannelSpec::Orders)).await });
    let request = conn.recv().await;
    conn.ack(&request);

    let response = call.await.unwrap().unwrap();
    assert_eq!(response.id, request.id);
    assert_eq!(response.subscription().unwrap().channel, Channel::Orders);
}

#[tokio::test]
async fn server_errors_fail_the_call_and_revert_the_subscription() {
    let mut h = Harness::new(config(Encoding::Json));
    let mut conn = h.ready().await;

    let rfq = RfqChannel::new(
        TradableSymbol::flat("brn_fut_jun25"),
        Exchange::Ice,
        Decimal::from_str("25").unwrap(),
    );
    let client = h.client.clone();
    let spec = ChannelSpec::Rfq(rfq);
    let call = {
        let spec = spec.clone();
        tokio::spawn(async move { client.call(RequestPayload::Subscribe(spec)).await })
    };
    let request = conn.recv().await;
    conn.reject(&request, OtcErrorCode::Forbidden, "no permissions for product brn");

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        OtcError::Protocol {
            code: OtcErrorCode::Forbidden,
            message: "no permissions for product brn".into(),
        }
    );
    assert_eq!(h.client.subscription_state(&spec), SubscriptionState::Unsubscribed);
}

#[tokio::test]
async fn pending_calls_fail_when_the_connection_drops() {
    let mut h = Harness::new(config(Encoding::Binary));
    let mut conn = h.ready().await;

    let client = h.client.clone();
    let order = OrderRequest::fill_or_kill(
        "acc-1",
        TradableSymbol::flat("brn_fut_jun25"),
        Side::Buy,
        Decimal::from_str("10").unwrap(),
        Decimal::from_str("80.5").unwrap(),
    );
    let call = tokio::spawn(async move { client.call(RequestPayload::Order(order)).await });
    conn.recv().await;
    drop(conn);

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, OtcError::ConnectionLost(_)), "{err:?}");
}

#[tokio::test]
async fn undecodable_frames_do_not_end_the_session() {
    let mut h = Harness::new(config(Encoding::Binary));
    let conn = h.ready().await;

    conn.send_raw(Frame::Binary(vec![0xff, 0xff, 0xff]));
    conn.send_raw(Frame::Text("not protobuf".into()));
    conn.send(OtcChannelMessage::new(
        Channel::ServerInfo,
        ChannelData::ServerInfo(ServerInfo {
            socket_uid: "sock-1".into(),
            age_millis: 42,
        }),
    ));
    let event = h.next_event().await;
    assert_eq!(event.server_info().unwrap().socket_uid, "sock-1");
    assert_eq!(h.client.state(), ConnectionState::Ready);
    assert_eq!(h.connector.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn callbacks_can_subscribe_from_the_auth_response() {
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let handler = FnHandler::new(
        move |client: &OtcClient, response: &OtcResponse| {
            if response.auth().is_some() {
                client.subscribe_server_info().unwrap();
            }
            let _ = seen_tx.send(Seen::Response(response.clone()));
        },
        |_client: &OtcClient, _message: &OtcChannelMessage| {},
    );
    let mut h = Harness::with_handler(config(Encoding::Binary), Arc::new(handler), seen);
    let mut conn = h.ready().await;

    let request = conn.recv().await;
    assert_eq!(request.payload, RequestPayload::Subscribe(ChannelSpec::ServerInfo));
}

#[tokio::test]
async fn sends_are_rejected_until_ready() {
    let mut h = Harness::new(config(Encoding::Binary));
    assert_eq!(
        h.client.subscribe_orders().unwrap_err(),
        OtcError::NotReady(ConnectionState::Disconnected)
    );

    h.client.connect().unwrap();
    let mut conn = h.accept().await;
    wait_state(&h.client, ConnectionState::Authenticating).await;
    assert_eq!(
        h.client.subscribe_orders().unwrap_err(),
        OtcError::NotReady(ConnectionState::Authenticating)
    );
    assert_eq!(h.client.subscription_state(&ChannelSpec::Orders), SubscriptionState::Unsubscribed);

    conn.accept_auth("secret").await;
    h.client.wait_ready(WAIT).await.unwrap();
    assert!(h.client.subscribe_orders().is_ok());
}

#[tokio::test]
async fn empty_product_lists_are_rejected() {
    let mut h = Harness::new(config(Encoding::Binary));
    let _conn = h.ready().await;
    assert_eq!(
        h.client.subscribe_tickers(Vec::<String>::new()).unwrap_err(),
        OtcError::InvalidInput("no products specified to subscribe to on tickers channel".into())
    );
    assert_eq!(
        h.client.unsubscribe_tickers(Vec::<String>::new()).unwrap_err(),
        OtcError::InvalidInput("no products specified to unsubscribe from on tickers channel".into())
    );
    assert_eq!(h.client.pending_requests(), 0);
}

#[tokio::test]
async fn unauthenticated_clients_become_ready_immediately() {
    let mut config = config(Encoding::Json);
    config.api_token = None;
    let mut h = Harness::new(config);
    h.client.connect().unwrap();
    let mut conn = h.accept().await;
    h.client.wait_ready(WAIT).await.unwrap();

    h.client.subscribe_server_info().unwrap();
    let request = conn.recv().await;
    assert_eq!(request.payload, RequestPayload::Subscribe(ChannelSpec::ServerInfo));
}

#[tokio::test]
async fn rejected_authentication_fails_the_client() {
    let mut config = config(Encoding::Binary);
    config.reconnect = false;
    let mut h = Harness::new(config);
    h.client.connect().unwrap();
    let mut conn = h.accept().await;
    let auth = conn.recv().await;
    conn.reject(&auth, OtcErrorCode::Unauthenticated, "bad token");

    let err = timeout(WAIT, h.client.closed()).await.unwrap().unwrap_err();
    assert_eq!(
        err,
        OtcError::Protocol {
            code: OtcErrorCode::Unauthenticated,
            message: "bad token".into(),
        }
    );
    assert_eq!(h.client.state(), ConnectionState::Failed);
    assert!(h.next_response().await.error().is_some());
}

#[tokio::test(start_paused = true)]
async fn authentication_times_out() {
    let mut config = config(Encoding::Binary);
    config.reconnect = false;
    let mut h = Harness::new(config);
    h.client.connect().unwrap();
    let _conn = h.accept().await;

    let err = h.client.closed().await.unwrap_err();
    assert_eq!(err, OtcError::Timeout("authentication".into()));
    assert_eq!(h.client.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn retry_budget_is_exhausted() {
    let mut config = config(Encoding::Binary);
    config.max_reconnect_attempts = Some(2);
    config.reconnect_base_delay = Duration::from_millis(1);
    config.reconnect_max_delay = Duration::from_millis(4);
    let h = Harness::new(config);
    h.connector.refuse.store(true, Ordering::SeqCst);

    h.client.connect().unwrap();
    let err = timeout(WAIT, h.client.closed()).await.unwrap().unwrap_err();
    assert_eq!(err, OtcError::RetriesExhausted(3));
    assert_eq!(h.connector.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(h.client.state(), ConnectionState::Failed);
    assert!(matches!(
        h.client.wait_ready(WAIT).await,
        Err(OtcError::NotReady(ConnectionState::Failed))
    ));
}

#[tokio::test]
async fn close_stops_the_connection() {
    let mut h = Harness::new(config(Encoding::Json));
    let conn = h.ready().await;
    h.client.subscribe_orders().unwrap();

    h.client.close().await.unwrap();
    assert_eq!(h.client.state(), ConnectionState::Closed);
    assert!(h.client.active_channels().is_empty());
    assert_eq!(h.client.pending_requests(), 0);
    assert_eq!(
        h.client.subscribe_orders().unwrap_err(),
        OtcError::NotReady(ConnectionState::Closed)
    );
    drop(conn);
}

#[tokio::test(start_paused = true)]
async fn unanswered_calls_time_out() {
    let mut h = Harness::new(config(Encoding::Binary));
    let mut conn = h.ready().await;
    h.next_response().await;

    let client = h.client.clone();
    let call = tokio::spawn(async move {
        client
            .call_with_timeout(RequestPayload::Subscribe(ChannelSpec::ServerInfo), Duration::from_millis(250))
            .await
    });
    let request = conn.recv().await;

    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err, OtcError::Timeout(request.id.clone()));
    assert_eq!(h.client.pending_requests(), 0);

    // The late acknowledgement still reaches the callback and the tracker.
    conn.ack(&request);
    assert_eq!(h.next_response().await.id, request.id);
    assert_eq!(h.client.subscription_state(&ChannelSpec::ServerInfo), SubscriptionState::Subscribed);
}

#[tokio::test]
async fn rejected_repeat_subscribe_keeps_the_live_subscription() {
    let mut h = Harness::new(config(Encoding::Binary));
    let mut conn = h.ready().await;

    h.client.subscribe_tickers(["x"]).unwrap();
    let first = conn.recv().await;
    conn.ack(&first);
    wait_for_response(&mut h, &first.id).await;

    h.client.subscribe_tickers(["x"]).unwrap();
    let again = conn.recv().await;
    conn.reject(&again, OtcErrorCode::InvalidRequest, "already subscribed");
    wait_for_response(&mut h, &again.id).await;
    assert_eq!(h.client.subscription_state(&tickers(&["x"])), SubscriptionState::Subscribed);

    drop(conn);
    let mut conn = h.accept().await;
    conn.accept_auth("secret").await;
    let replayed = conn.recv().await;
    assert_eq!(replayed.payload, RequestPayload::Subscribe(tickers(&["x"])));
}

#[tokio::test]
async fn subscribing_on_first_auth_only_avoids_duplicates_after_reconnect() {
    let (seen_tx, seen) = mpsc::unbounded_channel();
    let first = AtomicBool::new(true);
    let handler = FnHandler::new(
        move |client: &OtcClient, response: &OtcResponse| {
            if response.auth().is_some() && first.swap(false, Ordering::SeqCst) {
                client.subscribe_server_info().unwrap();
            }
            let _ = seen_tx.send(Seen::Response(response.clone()));
        },
        |_client: &OtcClient, _message: &OtcChannelMessage| {},
    );
    let mut h = Harness::with_handler(config(Encoding::Json), Arc::new(handler), seen);
    let mut conn = h.ready().await;
    let request = conn.recv().await;
    conn.ack(&request);
    wait_for_response(&mut h, &request.id).await;

    drop(conn);
    let mut conn = h.accept().await;
    conn.accept_auth("secret").await;
    let replayed = conn.recv().await;
    assert_eq!(replayed.payload, RequestPayload::Subscribe(ChannelSpec::ServerInfo));
    conn.ack(&replayed);
    wait_for_response(&mut h, &replayed.id).await;

    // Nothing but the replay went out on the second session.
    assert!(timeout(Duration::from_millis(100), conn.incoming.next()).await.is_err());
}

#[tokio::test]
async fn dropped_waits_do_not_lose_the_outcome() {
    let mut config = config(Encoding::Binary);
    config.reconnect = false;
    let mut h = Harness::new(config);
    let conn = h.ready().await;

    assert!(timeout(Duration::from_millis(20), h.client.closed()).await.is_err());
    drop(conn);

    let err = timeout(WAIT, h.client.closed()).await.unwrap().unwrap_err();
    assert!(matches!(err, OtcError::ConnectionLost(_)), "{err:?}");
    // Every later wait sees the same outcome.
    assert_eq!(h.client.closed().await.unwrap_err(), err);
    assert_eq!(h.client.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn rfq_subscription_from_symbol_size_and_exchange() {
    let mut h = Harness::new(config(Encoding::Binary));
    let mut conn = h.ready().await;

    let sent = h
        .client
        .subscribe_rfq_for("brn_fut_jun25", Decimal::from_str("25").unwrap(), Exchange::Ice)
        .unwrap();
    let request = conn.recv().await;
    assert_eq!(request.id, sent.id);
    let RequestPayload::Subscribe(ChannelSpec::Rfq(rfq)) = &request.payload else {
        panic!("expected an rfq subscribe, got {:?}", request.payload);
    };
    assert_eq!(rfq.symbol, TradableSymbol::flat("brn_fut_jun25"));
    assert_eq!(rfq.exchange, Exchange::Ice);
    assert_eq!(rfq.size.as_str(), "25");
}

#[tokio::test]
async fn fire_and_forget_sends_leave_nothing_pending() {
    let mut h = Harness::new(config(Encoding::Binary));
    let mut conn = h.ready().await;

    let order = OrderRequest::fill_or_kill(
        "acc-1",
        TradableSymbol::flat("brn_fut_jun25"),
        Side::Sell,
        Decimal::from_str("1").unwrap(),
        Decimal::from_str("80.25").unwrap(),
    );
    let sent = h.client.place_order(order).unwrap();
    h.client.subscribe_orders().unwrap();
    assert_eq!(conn.recv().await.id, sent.id);
    conn.recv().await;
    assert_eq!(h.client.pending_requests(), 0);
}

#[tokio::test]
async fn wide_decimals_cross_the_wire_unchanged() {
    let mut h = Harness::new(config(Encoding::Json));
    let conn = h.ready().await;

    let mid = "123456789012345678901234567890.12345678901234567890123456789";
    conn.send(ticker_event("x", mid));
    let event = h.next_event().await;
    assert_eq!(event.tickers().unwrap()[0].mid.as_str(), mid);
}

async fn wait_for_response(h: &mut Harness, id: &str) {
    loop {
        if h.next_response().await.id == id {
            break;
        }
    }
}
