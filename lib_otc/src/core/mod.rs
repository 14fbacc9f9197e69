//! # Core Protocol Engine
//!
//! The bookkeeping that sits between the codec and the connection:
//!
//! - **`correlator`**: assigns request ids and matches responses to the callers
//!   awaiting them, exactly once.
//! - **`subscriptions`**: the per-channel subscription state machine, replayed
//!   after every reconnect.
//! - **`dispatcher`**: routes decoded inbound messages through the two above and
//!   on to the user callbacks.
//! - **`handler`**: the callback capability supplied by the user.

/// Request id allocation and response matching.
pub mod correlator;
/// Inbound routing to bookkeeping and callbacks.
pub mod dispatcher;
/// User callback trait and adapters.
pub mod handler;
/// Channel subscription state machine.
pub mod subscriptions;

pub use correlator::Correlator;
pub use dispatcher::{Dispatcher, Routed};
pub use handler::{FnHandler, LoggingHandler, OtcHandler};
pub use subscriptions::{SubscriptionState, SubscriptionTracker, TrackerUpdate};
