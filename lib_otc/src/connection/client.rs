//! # OTC Websocket Client
//!
//! [`OtcClient`] is the public face of the library. One client owns one logical
//! connection; it is cheap to clone and every clone drives the same connection.
//!
//! ## Lifecycle
//!
//! [`OtcClient::connect`] spawns the connection task, which connects,
//! authenticates, replays subscriptions and then reads until the connection
//! drops, reconnecting with exponential backoff. [`OtcClient::close`] stops it.
//!
//! ## Sending
//!
//! Every operation returns the [`OtcRequest`] that was queued so callers can
//! correlate by id. Operations never block: while the client is not `Ready`
//! they fail with [`OtcError::NotReady`] and nothing is sent. Callers that need
//! the response use [`OtcClient::call`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::manager;
use super::state::ConnectionState;
use super::transport::{Connector, TungsteniteConnector};
use crate::codec::{codec_for, Codec, Encoding, Frame};
use crate::core::{Correlator, Dispatcher, OtcHandler, SubscriptionState, SubscriptionTracker};
use crate::error::{OtcError, OtcResult};
use crate::model::{
    ChannelSpec, Decimal, Exchange, OrderRequest, OtcRequest, OtcResponse, RequestPayload, RfqChannel,
    TradableSymbol,
};

/// Default endpoint of the streaming API.
pub const DEFAULT_WS_URL: &str = "wss://ws.otc.example/stream/v2/binary";

/// Everything an [`OtcClient`] needs to know before connecting.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub ws_url: String,
    /// Bearer token sent in the auth request. `None` skips authentication.
    pub api_token: Option<String>,
    pub encoding: Encoding,
    pub reconnect: bool,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Consecutive failed sessions tolerated before giving up. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    pub auth_timeout: Duration,
    pub request_timeout: Duration,
    pub outbound_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_token: None,
            encoding: Encoding::from_url(DEFAULT_WS_URL),
            reconnect: true,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            max_reconnect_attempts: None,
            auth_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            outbound_queue_capacity: 1024,
        }
    }
}

impl ClientConfig {
    /// A config for `ws_url`, with the encoding inferred from the url.
    pub fn new(ws_url: impl Into<String>) -> Self {
        let ws_url = ws_url.into();
        Self {
            encoding: Encoding::from_url(&ws_url),
            ws_url,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Switches to JSON, dropping a `/binary` suffix from the url.
    pub fn json(mut self) -> Self {
        self.encoding = Encoding::Json;
        self
    }

    /// The url actually dialled for the configured encoding.
    pub fn endpoint(&self) -> String {
        self.encoding.endpoint_for(&self.ws_url)
    }

    pub fn validate(&self) -> OtcResult<()> {
        let endpoint = self.endpoint();
        let url = url::Url::parse(&endpoint)
            .map_err(|e| OtcError::Config(format!("invalid websocket url '{endpoint}': {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(OtcError::Config(format!(
                "websocket url must use ws:// or wss://, got '{endpoint}'"
            )));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(OtcError::Config("outbound queue capacity must be positive".into()));
        }
        if self.reconnect_base_delay > self.reconnect_max_delay {
            return Err(OtcError::Config(
                "reconnect base delay exceeds the maximum delay".into(),
            ));
        }
        Ok(())
    }
}

/// The spawned connection task and the outcome it publishes when it ends.
struct ConnectionTask {
    handle: JoinHandle<()>,
    outcome: watch::Receiver<Option<OtcResult<()>>>,
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) tracker: Arc<SubscriptionTracker>,
    pub(crate) dispatcher: Dispatcher,
    state_tx: watch::Sender<ConnectionState>,
    /// Present only while `Ready`; callers enqueue through it.
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
    shutdown: Mutex<CancellationToken>,
    task: Mutex<Option<ConnectionTask>>,
}

impl ClientInner {
    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!("Connection state {} -> {}", previous, state);
        }
    }

    pub(crate) fn open_outbound(&self, tx: mpsc::Sender<Frame>) {
        *self.outbound.lock().expect("Outbound lock poisoned") = Some(tx);
    }

    pub(crate) fn close_outbound(&self) {
        self.outbound.lock().expect("Outbound lock poisoned").take();
    }
}

/// Client for the OTC websocket API.
#[derive(Clone)]
pub struct OtcClient {
    inner: Arc<ClientInner>,
}

impl OtcClient {
    /// Creates a client that connects over `tokio-tungstenite`.
    pub fn new(config: ClientConfig, handler: Arc<dyn OtcHandler>) -> OtcResult<Self> {
        Self::with_connector(config, handler, Arc::new(TungsteniteConnector))
    }

    /// Creates a client over a custom transport.
    pub fn with_connector(
        config: ClientConfig,
        handler: Arc<dyn OtcHandler>,
        connector: Arc<dyn Connector>,
    ) -> OtcResult<Self> {
        config.validate()?;
        let correlator = Arc::new(Correlator::new());
        let tracker = Arc::new(SubscriptionTracker::new());
        let dispatcher = Dispatcher::new(correlator.clone(), tracker.clone(), handler);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Ok(Self {
            inner: Arc::new(ClientInner {
                codec: codec_for(config.encoding),
                config,
                connector,
                correlator,
                tracker,
                dispatcher,
                state_tx,
                outbound: Mutex::new(None),
                shutdown: Mutex::new(CancellationToken::new()),
                task: Mutex::new(None),
            }),
        })
    }

    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn encoding(&self) -> Encoding {
        self.inner.codec.encoding()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// # Connect
    ///
    /// Spawns the connection task. Returns immediately; use
    /// [`Self::wait_ready`] to wait for the handshake. Calling it while the
    /// task is running is a no-op.
    pub fn connect(&self) -> OtcResult<()> {
        let mut task = self.inner.task.lock().expect("Task lock poisoned");
        if task.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            tracing::debug!("Connection task already running");
            return Ok(());
        }
        let token = {
            let mut shutdown = self.inner.shutdown.lock().expect("Shutdown lock poisoned");
            if shutdown.is_cancelled() {
                *shutdown = CancellationToken::new();
            }
            shutdown.clone()
        };
        self.inner.set_state(ConnectionState::Disconnected);
        let (outcome_tx, outcome) = watch::channel(None);
        let client = self.clone();
        let handle = tokio::spawn(async move {
            let result = manager::run(client, token).await;
            outcome_tx.send_replace(Some(result));
        });
        *task = Some(ConnectionTask { handle, outcome });
        Ok(())
    }

    /// # Close
    ///
    /// Stops the connection task: queued writes are discarded, every pending
    /// request fails with [`OtcError::ConnectionLost`] and the tracked
    /// subscriptions are forgotten.
    pub async fn close(&self) -> OtcResult<()> {
        tracing::info!("Closing OTC client");
        self.inner
            .shutdown
            .lock()
            .expect("Shutdown lock poisoned")
            .cancel();
        self.inner.close_outbound();
        let result = self.closed().await;
        self.inner.correlator.cancel_all("client closed");
        self.inner.tracker.clear();
        self.inner.set_state(ConnectionState::Closed);
        result
    }

    /// Waits for the connection task to end and returns its outcome:
    /// `Ok(())` after [`Self::close`], the terminal error otherwise. Any number
    /// of callers may wait, and dropping one wait does not affect the others.
    pub async fn closed(&self) -> OtcResult<()> {
        let outcome = self
            .inner
            .task
            .lock()
            .expect("Task lock poisoned")
            .as_ref()
            .map(|task| task.outcome.clone());
        let Some(mut outcome) = outcome else {
            return Ok(());
        };
        let done = outcome.wait_for(Option::is_some).await.map(|done| done.clone());
        match done {
            Ok(result) => result.unwrap_or(Ok(())),
            Err(_) => Err(OtcError::Transport("connection task ended without an outcome".into())),
        }
    }

    /// Waits until the client is `Ready`. Fails early if the connection
    /// reaches a terminal state.
    pub async fn wait_ready(&self, timeout: Duration) -> OtcResult<()> {
        let mut rx = self.watch_state();
        let wait = rx.wait_for(|state| *state == ConnectionState::Ready || state.is_terminal());
        let reached = tokio::time::timeout(timeout, wait)
            .await
            .map(|result| result.map(|state| *state));
        match reached {
            Ok(Ok(ConnectionState::Ready)) => Ok(()),
            Ok(Ok(state)) => Err(OtcError::NotReady(state)),
            Ok(Err(_)) => Err(OtcError::NotReady(ConnectionState::Closed)),
            Err(_) => Err(OtcError::Timeout("waiting for ready".into())),
        }
    }

    // -----------------------------------------------------------------------
    // Channel operations
    // -----------------------------------------------------------------------

    pub fn subscribe_server_info(&self) -> OtcResult<OtcRequest> {
        self.subscribe(ChannelSpec::ServerInfo)
    }

    pub fn unsubscribe_server_info(&self) -> OtcResult<OtcRequest> {
        self.unsubscribe(ChannelSpec::ServerInfo)
    }

    pub fn subscribe_tickers<S: Into<String>>(&self, products: impl IntoIterator<Item = S>) -> OtcResult<OtcRequest> {
        self.subscribe(ChannelSpec::Tickers {
            products: products.into_iter().map(Into::into).collect(),
        })
    }

    pub fn unsubscribe_tickers<S: Into<String>>(&self, products: impl IntoIterator<Item = S>) -> OtcResult<OtcRequest> {
        self.unsubscribe(ChannelSpec::Tickers {
            products: products.into_iter().map(Into::into).collect(),
        })
    }

    pub fn subscribe_orders(&self) -> OtcResult<OtcRequest> {
        self.subscribe(ChannelSpec::Orders)
    }

    pub fn unsubscribe_orders(&self) -> OtcResult<OtcRequest> {
        self.unsubscribe(ChannelSpec::Orders)
    }

    pub fn subscribe_order_book_top<S: Into<String>>(
        &self,
        products: impl IntoIterator<Item = S>,
    ) -> OtcResult<OtcRequest> {
        self.subscribe(ChannelSpec::OrderBookTop {
            products: products.into_iter().map(Into::into).collect(),
        })
    }

    pub fn unsubscribe_order_book_top<S: Into<String>>(
        &self,
        products: impl IntoIterator<Item = S>,
    ) -> OtcResult<OtcRequest> {
        self.unsubscribe(ChannelSpec::OrderBookTop {
            products: products.into_iter().map(Into::into).collect(),
        })
    }

    pub fn subscribe_rfq(&self, rfq: RfqChannel) -> OtcResult<OtcRequest> {
        self.subscribe(ChannelSpec::Rfq(rfq))
    }

    pub fn unsubscribe_rfq(&self, rfq: RfqChannel) -> OtcResult<OtcRequest> {
        self.unsubscribe(ChannelSpec::Rfq(rfq))
    }

    /// Subscribes to quotes for `size` of `symbol` on `exchange`.
    pub fn subscribe_rfq_for(
        &self,
        symbol: impl Into<TradableSymbol>,
        size: Decimal,
        exchange: Exchange,
    ) -> OtcResult<OtcRequest> {
        self.subscribe_rfq(RfqChannel::new(symbol.into(), exchange, size))
    }

    pub fn unsubscribe_rfq_for(
        &self,
        symbol: impl Into<TradableSymbol>,
        size: Decimal,
        exchange: Exchange,
    ) -> OtcResult<OtcRequest> {
        self.unsubscribe_rfq(RfqChannel::new(symbol.into(), exchange, size))
    }

    /// Sends a subscribe request and tracks the channel.
    pub fn subscribe(&self, spec: ChannelSpec) -> OtcResult<OtcRequest> {
        self.send(RequestPayload::Subscribe(spec))
    }

    pub fn unsubscribe(&self, spec: ChannelSpec) -> OtcResult<OtcRequest> {
        self.send(RequestPayload::Unsubscribe(spec))
    }

    pub fn place_order(&self, order: OrderRequest) -> OtcResult<OtcRequest> {
        self.send(RequestPayload::Order(order))
    }

    /// Subscription state of `spec` as last acknowledged.
    pub fn subscription_state(&self, spec: &ChannelSpec) -> SubscriptionState {
        self.inner.tracker.state_of(spec)
    }

    pub fn active_channels(&self) -> Vec<ChannelSpec> {
        let mut channels: Vec<ChannelSpec> = self.inner.tracker.active_channels().into_iter().collect();
        channels.sort_by_key(|spec| spec.to_string());
        channels
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// # Send
    ///
    /// Validates `payload`, queues it and returns the request without waiting
    /// for the response. Nothing is registered with the correlator; the
    /// response only reaches `on_response`.
    pub fn send(&self, payload: RequestPayload) -> OtcResult<OtcRequest> {
        let request = self.prepare(payload)?;
        self.submit(&request)?;
        Ok(request)
    }

    /// # Call
    ///
    /// Sends `payload` and awaits its response for at most the configured
    /// request timeout. A server error response becomes [`OtcError::Protocol`].
    pub async fn call(&self, payload: RequestPayload) -> OtcResult<OtcResponse> {
        self.call_with_timeout(payload, self.inner.config.request_timeout).await
    }

    /// [`Self::call`] with an explicit deadline. On expiry the caller gets
    /// [`OtcError::Timeout`] and a late response only reaches `on_response`.
    pub async fn call_with_timeout(&self, payload: RequestPayload, timeout: Duration) -> OtcResult<OtcResponse> {
        let request = self.prepare(payload)?;
        let rx = self.inner.correlator.register(&request.id);
        if let Err(e) = self.submit(&request) {
            self.inner.correlator.remove(&request.id);
            return Err(e);
        }
        self.inner
            .correlator
            .wait(&request.id, rx, timeout)
            .await?
            .into_result()
    }

    /// Checks `payload` and readiness, then builds the request. Subscription
    /// requests are marked pending in the tracker.
    fn prepare(&self, payload: RequestPayload) -> OtcResult<OtcRequest> {
        validate_payload(&payload)?;
        self.ensure_ready()?;
        Ok(match payload {
            RequestPayload::Subscribe(spec) => self.inner.tracker.subscribe(spec),
            RequestPayload::Unsubscribe(spec) => self.inner.tracker.unsubscribe(spec),
            payload => OtcRequest::new(Correlator::new_id(), payload),
        })
    }

    /// Queues a prepared request, undoing its tracker update on failure.
    fn submit(&self, request: &OtcRequest) -> OtcResult<()> {
        if let Err(e) = self.enqueue(request) {
            self.inner.tracker.abandon(&request.id);
            return Err(e);
        }
        tracing::debug!("Queued {} request {}", request.method(), request.id);
        Ok(())
    }

    fn ensure_ready(&self) -> OtcResult<()> {
        match self.state() {
            ConnectionState::Ready => Ok(()),
            state => {
                tracing::warn!("Client not ready ({}), message dropped", state);
                Err(OtcError::NotReady(state))
            }
        }
    }

    fn enqueue(&self, request: &OtcRequest) -> OtcResult<()> {
        let frame = self.inner.codec.encode_request(request)?;
        let outbound = self.inner.outbound.lock().expect("Outbound lock poisoned");
        let Some(tx) = outbound.as_ref() else {
            let state = self.state();
            tracing::warn!("Client not ready ({}), message dropped", state);
            return Err(OtcError::NotReady(state));
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!("Outbound queue full, request {} dropped", request.id);
                OtcError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => OtcError::NotReady(self.state()),
        })
    }
}

/// Rejects malformed caller input before anything is sent.
fn validate_payload(payload: &RequestPayload) -> OtcResult<()> {
    let (spec, action) = match payload {
        RequestPayload::Subscribe(spec) => (spec, "subscribe to"),
        RequestPayload::Unsubscribe(spec) => (spec, "unsubscribe from"),
        RequestPayload::Auth(_) => {
            return Err(OtcError::InvalidInput(
                "authentication is handled by the connection".into(),
            ))
        }
        RequestPayload::Order(order) => {
            if order.account_id.is_empty() {
                return Err(OtcError::InvalidInput("order without an account id".into()));
            }
            return Ok(());
        }
    };
    match spec {
        ChannelSpec::Tickers { products } | ChannelSpec::OrderBookTop { products } if products.is_empty() => {
            Err(OtcError::InvalidInput(format!(
                "no products specified to {} on {} channel",
                action,
                spec.channel()
            )))
        }
        ChannelSpec::Rfq(rfq) if rfq.exchange == Exchange::Unspecified => Err(OtcError::InvalidInput(
            format!("no exchange specified for RFQ on {}", rfq.symbol),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::transport::NullConnector;
    use crate::core::LoggingHandler;

    fn client() -> OtcClient {
        OtcClient::with_connector(ClientConfig::default(), Arc::new(LoggingHandler), Arc::new(NullConnector))
            .unwrap()
    }

    #[test]
    fn default_config_is_binary() {
        let config = ClientConfig::default();
        assert_eq!(config.encoding, Encoding::Binary);
        assert_eq!(config.endpoint(), DEFAULT_WS_URL);
        assert_eq!(config.reconnect_base_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect_max_delay, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_config_strips_binary_suffix() {
        let config = ClientConfig::new("wss://ws.otc.example/stream/v2/binary").json();
        assert_eq!(config.endpoint(), "wss://ws.otc.example/stream/v2");
        assert_eq!(ClientConfig::new("ws://localhost:9000/stream").encoding, Encoding::Json);
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(matches!(ClientConfig::new("not a url").validate(), Err(OtcError::Config(_))));
        assert!(matches!(ClientConfig::new("https://host/binary").validate(), Err(OtcError::Config(_))));
    }

    #[test]
    fn empty_products_are_rejected_before_readiness() {
        let client = client();
        let err = client.subscribe_tickers(Vec::<String>::new()).unwrap_err();
        assert_eq!(
            err,
            OtcError::InvalidInput("no products specified to subscribe to on tickers channel".into())
        );
        let err = client.subscribe_order_book_top(Vec::<String>::new()).unwrap_err();
        assert_eq!(
            err,
            OtcError::InvalidInput(
                "no products specified to subscribe to on order_book_top channel".into()
            )
        );
    }

    #[test]
    fn sends_are_rejected_when_not_ready() {
        let client = client();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        let err = client.subscribe_server_info().unwrap_err();
        assert_eq!(err, OtcError::NotReady(ConnectionState::Disconnected));
        assert_eq!(client.pending_requests(), 0);
        assert_eq!(
            client.subscription_state(&ChannelSpec::ServerInfo),
            SubscriptionState::Unsubscribed
        );
    }
}
