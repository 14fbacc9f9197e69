//! # Subscription Tracker
//!
//! Remembers which channels this client asked for and what the server has
//! acknowledged, so that a fresh connection can be brought back to the same set
//! of subscriptions. The server keeps no memory across connections.
//!
//! Per channel spec:
//!
//! ```text
//! Unsubscribed --subscribe sent--> Pending --ack subscribed--> Subscribed
//! Subscribed --unsubscribe sent--> PendingUnsub --ack unsubscribed--> Unsubscribed
//! ```
//!
//! An error while `Pending` drops back to `Unsubscribed`, unless the spec was
//! already `Subscribed` when the repeat subscribe went out. An error while
//! `PendingUnsub` means `Unsubscribed` if the server says the channel was not
//! subscribed, otherwise the previous state is restored.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use super::correlator::Correlator;
use crate::error::OtcError;
use crate::model::{
    Channel, ChannelSpec, OtcChannelMessage, OtcErrorCode, OtcRequest, OtcResponse, RequestPayload,
    ResponseData, SubscriptionStatus,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Unsubscribed,
    Pending,
    Subscribed,
    PendingUnsub,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unsubscribed => "unsubscribed",
            Self::Pending => "pending",
            Self::Subscribed => "subscribed",
            Self::PendingUnsub => "pending_unsub",
        };
        f.write_str(name)
    }
}

/// What an acknowledgement did to the tracked state.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackerUpdate {
    Subscribed(ChannelSpec),
    Unsubscribed(ChannelSpec),
    /// The server refused the request; the error is surfaced to the caller.
    Rejected { spec: ChannelSpec, error: OtcError },
}

struct InFlight {
    spec: ChannelSpec,
    previous: SubscriptionState,
}

#[derive(Default)]
struct TrackerState {
    channels: HashMap<ChannelSpec, SubscriptionState>,
    in_flight: HashMap<String, InFlight>,
}

impl TrackerState {
    fn set(&mut self, spec: ChannelSpec, state: SubscriptionState) {
        if state == SubscriptionState::Unsubscribed {
            self.channels.remove(&spec);
        } else {
            self.channels.insert(spec, state);
        }
    }

    fn get(&self, spec: &ChannelSpec) -> SubscriptionState {
        self.channels
            .get(spec)
            .copied()
            .unwrap_or(SubscriptionState::Unsubscribed)
    }
}

/// Thread-safe record of the client's channel subscriptions.
#[derive(Default)]
pub struct SubscriptionTracker {
    state: Mutex<TrackerState>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Subscribe
    ///
    /// Builds the subscribe request for `spec` and marks the spec `Pending`.
    pub fn subscribe(&self, spec: ChannelSpec) -> OtcRequest {
        let request = OtcRequest::new(Correlator::new_id(), RequestPayload::Subscribe(spec.clone()));
        let mut state = self.state.lock().expect("Tracker lock poisoned");
        let previous = state.get(&spec);
        state.set(spec.clone(), SubscriptionState::Pending);
        state.in_flight.insert(request.id.clone(), InFlight { spec, previous });
        request
    }

    /// # Unsubscribe
    ///
    /// Builds the unsubscribe request for `spec` and marks the spec `PendingUnsub`.
    pub fn unsubscribe(&self, spec: ChannelSpec) -> OtcRequest {
        let request = OtcRequest::new(Correlator::new_id(), RequestPayload::Unsubscribe(spec.clone()));
        let mut state = self.state.lock().expect("Tracker lock poisoned");
        let previous = state.get(&spec);
        state.set(spec.clone(), SubscriptionState::PendingUnsub);
        state.in_flight.insert(request.id.clone(), InFlight { spec, previous });
        request
    }

    /// Undoes [`Self::subscribe`]/[`Self::unsubscribe`] for a request that never
    /// made it onto the wire.
    pub fn abandon(&self, request_id: &str) {
        let mut state = self.state.lock().expect("Tracker lock poisoned");
        if let Some(in_flight) = state.in_flight.remove(request_id) {
            state.set(in_flight.spec, in_flight.previous);
        }
    }

    /// # On Acknowledgement
    ///
    /// Applies a subscription ack or error response to the spec its request id was
    /// issued for. Responses to anything other than a tracked subscription request
    /// return `None`.
    pub fn on_ack(&self, response: &OtcResponse) -> Option<TrackerUpdate> {
        let mut state = self.state.lock().expect("Tracker lock poisoned");
        let in_flight = match &response.data {
            ResponseData::Subscription(_) | ResponseData::Error(_) => {
                state.in_flight.remove(&response.id)?
            }
            _ => return None,
        };
        let current = state.get(&in_flight.spec);
        let spec = in_flight.spec;

        let update = match &response.data {
            ResponseData::Subscription(ack) => {
                let subscribed = match ack.status {
                    SubscriptionStatus::Subscribed => true,
                    SubscriptionStatus::Unsubscribed => false,
                    SubscriptionStatus::Unspecified => current != SubscriptionState::PendingUnsub,
                };
                if subscribed {
                    state.set(spec.clone(), SubscriptionState::Subscribed);
                    tracing::info!("Subscribed to {}", spec);
                    TrackerUpdate::Subscribed(spec)
                } else {
                    state.set(spec.clone(), SubscriptionState::Unsubscribed);
                    tracing::info!("Unsubscribed from {}", spec);
                    TrackerUpdate::Unsubscribed(spec)
                }
            }
            ResponseData::Error(error) => {
                let next = match current {
                    SubscriptionState::PendingUnsub if error.code == OtcErrorCode::NotSubscribed => {
                        SubscriptionState::Unsubscribed
                    }
                    SubscriptionState::PendingUnsub => match in_flight.previous {
                        SubscriptionState::Unsubscribed => SubscriptionState::Unsubscribed,
                        _ => SubscriptionState::Subscribed,
                    },
                    // A refused repeat subscribe leaves the live subscription in place.
                    _ if in_flight.previous == SubscriptionState::Subscribed => SubscriptionState::Subscribed,
                    _ => SubscriptionState::Unsubscribed,
                };
                state.set(spec.clone(), next);
                tracing::warn!(
                    "Subscription request for {} rejected ({}: {}), now {}",
                    spec,
                    error.code,
                    error.message,
                    next
                );
                TrackerUpdate::Rejected {
                    spec,
                    error: error.clone().into(),
                }
            }
            _ => return None,
        };
        Some(update)
    }

    /// Checks a channel message against the tracked subscriptions. Traffic on a
    /// channel with no subscription is logged and still delivered.
    pub fn note_event(&self, message: &OtcChannelMessage) -> bool {
        let active = self.is_channel_active(message.channel);
        if !active {
            tracing::warn!("Received {} message without an active subscription", message.channel);
        }
        active
    }

    /// Whether any spec on `channel` is subscribed or in transition.
    pub fn is_channel_active(&self, channel: Channel) -> bool {
        let state = self.state.lock().expect("Tracker lock poisoned");
        state.channels.keys().any(|spec| spec.channel() == channel)
    }

    /// Specs the server has acknowledged as subscribed.
    pub fn active_channels(&self) -> HashSet<ChannelSpec> {
        let state = self.state.lock().expect("Tracker lock poisoned");
        state
            .channels
            .iter()
            .filter(|(_, s)| **s == SubscriptionState::Subscribed)
            .map(|(spec, _)| spec.clone())
            .collect()
    }

    pub fn state_of(&self, spec: &ChannelSpec) -> SubscriptionState {
        self.state.lock().expect("Tracker lock poisoned").get(spec)
    }

    /// # On Disconnect
    ///
    /// Requests in flight died with the connection. Pending unsubscribes are
    /// complete by definition since the server forgets everything on disconnect.
    pub fn on_disconnect(&self) {
        let mut state = self.state.lock().expect("Tracker lock poisoned");
        state.in_flight.clear();
        state
            .channels
            .retain(|_, s| *s != SubscriptionState::PendingUnsub);
    }

    /// # Replay
    ///
    /// Builds a fresh subscribe request for every spec that is `Subscribed` or
    /// `Pending`, marking each `Pending` again. Called once per new session, right
    /// after authentication.
    pub fn replay(&self) -> Vec<OtcRequest> {
        let mut state = self.state.lock().expect("Tracker lock poisoned");
        let mut specs: Vec<ChannelSpec> = state
            .channels
            .iter()
            .filter(|(_, s)| matches!(s, SubscriptionState::Subscribed | SubscriptionState::Pending))
            .map(|(spec, _)| spec.clone())
            .collect();
        specs.sort_by_key(|spec| spec.to_string());

        specs
            .into_iter()
            .map(|spec| {
                let request = OtcRequest::new(Correlator::new_id(), RequestPayload::Subscribe(spec.clone()));
                state.set(spec.clone(), SubscriptionState::Pending);
                state.in_flight.insert(
                    request.id.clone(),
                    InFlight {
                        spec,
                        previous: SubscriptionState::Unsubscribed,
                    },
                );
                request
            })
            .collect()
    }

    /// Forgets everything; used when the client is closed.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("Tracker lock poisoned");
        state.channels.clear();
        state.in_flight.clear();
    }
}
