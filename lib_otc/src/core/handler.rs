//! # Callback Handlers
//!
//! The client reports inbound traffic through two callbacks supplied at
//! construction: one for request-scoped responses, one for channel messages.
//!
//! Callbacks run on the connection's read task. They must be fast and must not
//! block; anything slow should be handed off to a channel or a spawned task.
//! Calling the client's subscribe/unsubscribe/order methods from inside a
//! callback is fine, those only enqueue.

use crate::connection::client::OtcClient;
use crate::model::{OtcChannelMessage, OtcResponse};

/// Receives every decoded inbound message.
///
/// The default implementations log what arrived, which is enough for a client
/// that only cares about awaiting its own requests.
pub trait OtcHandler: Send + Sync + 'static {
    /// Called for every response, correlated or not.
    fn on_response(&self, client: &OtcClient, response: &OtcResponse) {
        let _ = client;
        log_response(response);
    }

    /// Called for every channel message.
    fn on_event(&self, client: &OtcClient, message: &OtcChannelMessage) {
        let _ = client;
        tracing::debug!("Event on {}: {:?}", message.channel, message.data);
    }
}

/// Logs a response at a level matching its variant.
pub fn log_response(response: &OtcResponse) {
    if let Some(auth) = response.auth() {
        tracing::info!("Auth response: {}", auth.message);
    } else if let Some(sub) = response.subscription() {
        tracing::info!(
            "Subscription channel: {}, message: {}, status: {}",
            sub.channel,
            sub.message,
            sub.status
        );
    } else if let Some(order) = response.order() {
        tracing::info!("Order: {:?}", order);
    } else if let Some(error) = response.error() {
        tracing::error!("Error {}: {}", error.code, error.message);
    }
}

/// A handler that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

impl OtcHandler for LoggingHandler {}

/// Adapts a pair of closures into an [`OtcHandler`].
pub struct FnHandler<R, E> {
    on_response: R,
    on_event: E,
}

impl<R, E> FnHandler<R, E>
where
    R: Fn(&OtcClient, &OtcResponse) + Send + Sync + 'static,
    E: Fn(&OtcClient, &OtcChannelMessage) + Send + Sync + 'static,
{
    pub fn new(on_response: R, on_event: E) -> Self {
        Self {
            on_response,
            on_event,
        }
    }
}

impl<R, E> OtcHandler for FnHandler<R, E>
where
    R: Fn(&OtcClient, &OtcResponse) + Send + Sync + 'static,
    E: Fn(&OtcClient, &OtcChannelMessage) + Send + Sync + 'static,
{
    fn on_response(&self, client: &OtcClient, response: &OtcResponse) {
        (self.on_response)(client, response)
    }

    fn on_event(&self, client: &OtcClient, message: &OtcChannelMessage) {
        (self.on_event)(client, message)
    }
}
