//! # Inbound Dispatcher
//!
//! Routes every decoded inbound message to the components that care about it,
//! then to the user callbacks.
//!
//! ## Routing
//!
//! - **Responses** go to the [`Correlator`] (wakes the caller awaiting that id,
//!   if any) and to the [`SubscriptionTracker`] (subscription acks and errors).
//!   They are then forwarded to `on_response` whether or not they matched, so
//!   auth, status, order and error traffic is always observable.
//! - **Channel messages** are checked against the tracker and forwarded to
//!   `on_event`. There is no correlation and no bound on how many arrive.
//!
//! Routing and notification are separate steps so that the connection manager
//! can act on a routed response (e.g. finish authentication) before callbacks
//! see it.
//!
//! A panicking callback is caught and logged; it never takes the read loop down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::correlator::Correlator;
use super::handler::OtcHandler;
use super::subscriptions::{SubscriptionTracker, TrackerUpdate};
use crate::connection::client::OtcClient;
use crate::model::Inbound;

/// An inbound message after bookkeeping, ready for the callbacks.
#[derive(Debug)]
pub struct Routed {
    pub inbound: Inbound,
    /// Whether a response matched an outstanding request.
    pub correlated: bool,
    /// Change applied to the subscription tracker, if any.
    pub update: Option<TrackerUpdate>,
}

pub struct Dispatcher {
    correlator: Arc<Correlator>,
    tracker: Arc<SubscriptionTracker>,
    handler: Arc<dyn OtcHandler>,
}

impl Dispatcher {
    pub fn new(
        correlator: Arc<Correlator>,
        tracker: Arc<SubscriptionTracker>,
        handler: Arc<dyn OtcHandler>,
    ) -> Self {
        Self {
            correlator,
            tracker,
            handler,
        }
    }

    /// # Route
    ///
    /// Runs the correlator and tracker bookkeeping for `inbound`.
    pub fn route(&self, inbound: Inbound) -> Routed {
        let (correlated, update) = match &inbound {
            Inbound::Response(response) => {
                let correlated = self.correlator.resolve(response);
                let update = self.tracker.on_ack(response);
                (correlated, update)
            }
            Inbound::Channel(message) => {
                self.tracker.note_event(message);
                (false, None)
            }
        };
        Routed {
            inbound,
            correlated,
            update,
        }
    }

    /// # Notify
    ///
    /// Hands a routed message to the user callbacks, containing any panic.
    pub fn notify(&self, client: &OtcClient, routed: &Routed) {
        let outcome = match &routed.inbound {
            Inbound::Response(response) => catch_unwind(AssertUnwindSafe(|| {
                self.handler.on_response(client, response)
            })),
            Inbound::Channel(message) => catch_unwind(AssertUnwindSafe(|| {
                self.handler.on_event(client, message)
            })),
        };
        if let Err(panic) = outcome {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Callback panicked, message skipped: {}", reason);
        }
    }

    /// Route then notify.
    pub fn dispatch(&self, client: &OtcClient, inbound: Inbound) -> Routed {
        let routed = self.route(inbound);
        self.notify(client, &routed);
        routed
    }
}
