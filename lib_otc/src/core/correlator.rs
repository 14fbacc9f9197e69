//! # Request/Response Correlator
//!
//! Every request that expects a reply is registered here under its id before its
//! bytes are queued. The read loop later calls [`Correlator::resolve`] with each
//! inbound response; the waiter parked on the matching id is woken exactly once.
//!
//! ## Guarantees
//!
//! - **Unique ids**: ids are random UUID v4 strings, collision-free for the
//!   lifetime of a connection.
//! - **Exactly-once resolution**: a resolved id is remembered for a while, so a
//!   second response with the same id is recognised as a duplicate, dropped and
//!   logged instead of being delivered twice.
//! - **No orphaned waiters**: on disconnect [`Correlator::cancel_all`] fails every
//!   outstanding entry with [`OtcError::ConnectionLost`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{OtcError, OtcResult};
use crate::model::OtcResponse;

/// How many resolved ids are remembered for duplicate detection.
const RESOLVED_HISTORY: usize = 1024;

type Waiter = oneshot::Sender<OtcResult<OtcResponse>>;

/// The receiving half handed to the caller of [`Correlator::register`].
pub type ResponseReceiver = oneshot::Receiver<OtcResult<OtcResponse>>;

#[derive(Default)]
struct CorrelatorState {
    pending: HashMap<String, Waiter>,
    resolved: HashSet<String>,
    resolved_order: VecDeque<String>,
}

impl CorrelatorState {
    fn remember(&mut self, id: String) {
        if self.resolved.insert(id.clone()) {
            self.resolved_order.push_back(id);
        }
        while self.resolved_order.len() > RESOLVED_HISTORY {
            if let Some(oldest) = self.resolved_order.pop_front() {
                self.resolved.remove(&oldest);
            }
        }
    }
}

/// Tracks outstanding requests and matches responses to them.
#[derive(Default)]
pub struct Correlator {
    state: Mutex<CorrelatorState>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh correlation id.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// # Register
    ///
    /// Parks a waiter under `id`. Must be called before the request is queued so
    /// that a fast response cannot overtake the registration.
    ///
    /// Registering an id that is already pending replaces the previous waiter,
    /// which then observes [`OtcError::ConnectionLost`] through its dropped sender.
    pub fn register(&self, id: &str) -> ResponseReceiver {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().expect("Correlator lock poisoned");
        state.resolved.remove(id);
        if state.pending.insert(id.to_string(), tx).is_some() {
            tracing::warn!("Request id {} registered twice, previous waiter dropped", id);
        }
        rx
    }

    /// # Resolve
    ///
    /// Hands `response` to the waiter registered under its id. Returns `true` if a
    /// waiter was found (even if it has since stopped listening).
    ///
    /// Responses for ids that were already resolved are duplicates and are dropped
    /// with a warning. Responses for ids never registered (stale, or issued by
    /// someone else on the same connection) are logged at debug level.
    pub fn resolve(&self, response: &OtcResponse) -> bool {
        let waiter = {
            let mut state = self.state.lock().expect("Correlator lock poisoned");
            match state.pending.remove(&response.id) {
                Some(waiter) => {
                    state.remember(response.id.clone());
                    Some(waiter)
                }
                None => {
                    if state.resolved.contains(&response.id) {
                        tracing::warn!("Duplicate response for request {}, dropped", response.id);
                    } else {
                        tracing::debug!("Response {} matches no outstanding request", response.id);
                    }
                    None
                }
            }
        };
        match waiter {
            Some(waiter) => {
                if waiter.send(Ok(response.clone())).is_err() {
                    tracing::debug!("Waiter for request {} is gone", response.id);
                }
                true
            }
            None => false,
        }
    }

    /// Forgets `id` without resolving it, e.g. after a timeout or a failed enqueue.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state.lock().expect("Correlator lock poisoned");
        state.pending.remove(id).is_some()
    }

    /// # Cancel All
    ///
    /// Fails every outstanding request with [`OtcError::ConnectionLost`]. Called
    /// whenever the transport goes away and when the client is closed.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let drained: Vec<(String, Waiter)> = {
            let mut state = self.state.lock().expect("Correlator lock poisoned");
            state.pending.drain().collect()
        };
        let count = drained.len();
        for (_, waiter) in drained {
            let _ = waiter.send(Err(OtcError::ConnectionLost(reason.to_string())));
        }
        if count > 0 {
            tracing::info!("Cancelled {} outstanding request(s): {}", count, reason);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("Correlator lock poisoned").pending.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.state
            .lock()
            .expect("Correlator lock poisoned")
            .pending
            .contains_key(id)
    }

    /// # Wait
    ///
    /// Awaits the response registered under `id` for at most `timeout`. On expiry
    /// the entry is removed and the caller gets [`OtcError::Timeout`]; the request
    /// itself is not recalled.
    pub async fn wait(&self, id: &str, rx: ResponseReceiver, timeout: Duration) -> OtcResult<OtcResponse> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OtcError::ConnectionLost(format!(
                "request {id} abandoned before a response arrived"
            ))),
            Err(_) => {
                self.remove(id);
                Err(OtcError::Timeout(id.to_string()))
            }
        }
    }
}
