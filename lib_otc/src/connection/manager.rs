//! # Connection Manager
//!
//! The task spawned by [`OtcClient::connect`]. It owns the transport and runs
//! sessions back to back until the client is closed or the reconnect budget is
//! spent.
//!
//! ## Session
//!
//! 1. Connect (`Connecting`).
//! 2. Send the auth request and wait for its response (`Authenticating`).
//!    Without a token this step is skipped.
//! 3. Replay the tracked subscriptions, then open the outbound queue (`Ready`).
//! 4. Read frames, decode them and hand them to the dispatcher until the
//!    transport fails or the peer goes away.
//!
//! A single writer task drains the outbound queue into the sink, so frames hit
//! the wire in the order they were queued.
//!
//! ## Reconnect
//!
//! After a session ends every pending request fails with `ConnectionLost`. The
//! delay before the next attempt starts at `reconnect_base_delay`, doubles on
//! every failed session and is capped at `reconnect_max_delay`. A session that
//! reached `Ready` resets both the delay and the failure count.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::client::OtcClient;
use super::state::ConnectionState;
use super::transport::{FrameSink, FrameStream};
use crate::codec::Frame;
use crate::core::Correlator;
use crate::error::{OtcError, OtcResult};
use crate::model::{AuthRequest, OtcRequest, OtcResponse, RequestPayload, ResponseData};

/// How long the writer gets to flush and close the sink at the end of a session.
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// How a session ended.
enum SessionEnd {
    /// The client was closed.
    Shutdown,
    /// The session ended; `ready` tells whether it got past authentication.
    Dropped { reason: OtcError, ready: bool },
}

/// # Run
///
/// Drives sessions until shutdown. Returns `Ok(())` after an explicit close and
/// the terminal error otherwise.
pub(crate) async fn run(client: OtcClient, shutdown: CancellationToken) -> OtcResult<()> {
    let inner = client.inner();
    let config = inner.config.clone();
    let url = config.endpoint();
    let mut backoff = config.reconnect_base_delay;
    let mut failures: u32 = 0;

    loop {
        if shutdown.is_cancelled() {
            inner.set_state(ConnectionState::Closed);
            return Ok(());
        }

        inner.set_state(ConnectionState::Connecting);
        tracing::info!("Connecting to {} ({})", url, config.encoding);
        let end = run_session(&client, &url, &shutdown).await;

        inner.close_outbound();
        inner.set_state(ConnectionState::Disconnected);

        let (reason, ready) = match end {
            SessionEnd::Shutdown => {
                inner.correlator.cancel_all("client closed");
                inner.tracker.on_disconnect();
                inner.set_state(ConnectionState::Closed);
                tracing::info!("Connection to {} closed", url);
                return Ok(());
            }
            SessionEnd::Dropped { reason, ready } => (reason, ready),
        };

        inner.correlator.cancel_all(&reason.to_string());
        inner.tracker.on_disconnect();

        if ready {
            failures = 0;
            backoff = config.reconnect_base_delay;
        } else {
            failures = failures.saturating_add(1);
        }

        if !config.reconnect {
            tracing::error!("Connection to {} lost, reconnect disabled: {}", url, reason);
            inner.set_state(ConnectionState::Failed);
            return Err(reason);
        }
        if let Some(max) = config.max_reconnect_attempts {
            if failures > max {
                tracing::error!(
                    "Giving up on {} after {} failed attempt(s): {}",
                    url,
                    failures,
                    reason
                );
                inner.set_state(ConnectionState::Failed);
                return Err(OtcError::RetriesExhausted(failures));
            }
        }

        inner.set_state(ConnectionState::Reconnecting);
        tracing::warn!("Connection lost: {}. Reconnecting in {:?}", reason, backoff);
        tokio::select! {
            _ = shutdown.cancelled() => {
                inner.set_state(ConnectionState::Closed);
                return Ok(());
            }
            _ = sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(config.reconnect_max_delay);
    }
}

/// # Run Session
///
/// One connect, authenticate, read cycle.
async fn run_session(client: &OtcClient, url: &str, shutdown: &CancellationToken) -> SessionEnd {
    let inner = client.inner();
    let config = &inner.config;

    let connected = tokio::select! {
        _ = shutdown.cancelled() => return SessionEnd::Shutdown,
        connected = inner.connector.connect(url) => connected,
    };
    let (sink, mut stream): (FrameSink, FrameStream) = match connected {
        Ok(halves) => halves,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", url, e);
            return SessionEnd::Dropped { reason: e, ready: false };
        }
    };
    tracing::info!("Connected to {}", url);

    let (tx, rx) = mpsc::channel::<Frame>(config.outbound_queue_capacity);
    let writer_token = shutdown.child_token();
    let mut writer = tokio::spawn(write_loop(sink, rx, writer_token.clone()));

    let mut ready = false;
    let mut auth: Option<(String, oneshot::Receiver<OtcResult<OtcResponse>>)> = None;
    let mut auth_deadline = Instant::now();

    match &config.api_token {
        Some(token) => {
            inner.set_state(ConnectionState::Authenticating);
            let request = OtcRequest::new(
                Correlator::new_id(),
                RequestPayload::Auth(AuthRequest { token: token.clone() }),
            );
            let auth_rx = inner.correlator.register(&request.id);
            if let Err(e) = send_direct(client, &tx, &request) {
                inner.correlator.remove(&request.id);
                return finish(writer, writer_token, SessionEnd::Dropped { reason: e, ready }).await;
            }
            tracing::info!("Authenticating with request {}", request.id);
            auth_deadline = Instant::now() + config.auth_timeout;
            auth = Some((request.id, auth_rx));
        }
        None => {
            tracing::warn!("No API token provided, authentication skipped");
            become_ready(client, &tx);
            ready = true;
        }
    }

    let end = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break SessionEnd::Shutdown,

            _ = sleep_until(auth_deadline), if auth.is_some() => {
                if let Some((id, _)) = auth.take() {
                    inner.correlator.remove(&id);
                }
                tracing::error!("Authentication timed out after {:?}", config.auth_timeout);
                break SessionEnd::Dropped {
                    reason: OtcError::Timeout("authentication".into()),
                    ready,
                };
            }

            written = &mut writer => {
                let reason = match written {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => OtcError::ConnectionLost("writer stopped".into()),
                    Err(e) => OtcError::ConnectionLost(format!("writer task failed: {e}")),
                };
                tracing::error!("Write failed: {}", reason);
                // The writer is already gone; nothing left to await.
                return SessionEnd::Dropped { reason, ready };
            }

            frame = stream.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        tracing::error!("Read failed: {}", e);
                        break SessionEnd::Dropped { reason: e, ready };
                    }
                    None => {
                        break SessionEnd::Dropped {
                            reason: OtcError::ConnectionLost("stream ended".into()),
                            ready,
                        };
                    }
                };

                let inbound = match inner.codec.decode_inbound(&frame) {
                    Ok(Some(inbound)) => inbound,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!("Dropping undecodable frame ({} bytes): {}", frame.len(), e);
                        continue;
                    }
                };

                let routed = inner.dispatcher.route(inbound);
                let mut auth_failure = None;
                if let Some((_, auth_rx)) = auth.as_mut() {
                    if let Ok(result) = auth_rx.try_recv() {
                        auth = None;
                        match result.map(|response| response.data) {
                            Ok(ResponseData::Error(error)) => {
                                tracing::error!("Authentication rejected: {} {}", error.code, error.message);
                                auth_failure = Some(OtcError::Protocol {
                                    code: error.code,
                                    message: error.message,
                                });
                            }
                            Ok(ResponseData::Auth(response)) => {
                                tracing::info!("Authenticated: {}", response.message);
                                become_ready(client, &tx);
                                ready = true;
                            }
                            Ok(other) => {
                                tracing::error!("Unexpected response to authentication: {:?}", other);
                                auth_failure = Some(OtcError::Decode(
                                    "unexpected response to authentication".into(),
                                ));
                            }
                            Err(e) => auth_failure = Some(e),
                        }
                    }
                }
                inner.dispatcher.notify(client, &routed);
                if let Some(reason) = auth_failure {
                    break SessionEnd::Dropped { reason, ready };
                }
            }
        }
    };

    finish(writer, writer_token, end).await
}

/// Stops the writer and waits briefly for it to close the sink.
async fn finish(
    mut writer: JoinHandle<OtcResult<()>>,
    writer_token: CancellationToken,
    end: SessionEnd,
) -> SessionEnd {
    writer_token.cancel();
    if tokio::time::timeout(WRITER_SHUTDOWN_GRACE, &mut writer).await.is_err() {
        tracing::warn!("Writer did not stop in time, aborting");
        writer.abort();
    }
    end
}

/// Marks the client `Ready`: replays tracked subscriptions, then opens the
/// outbound queue to callers so replayed requests go out first.
fn become_ready(client: &OtcClient, tx: &mpsc::Sender<Frame>) {
    let inner = client.inner();
    let replay = inner.tracker.replay();
    if !replay.is_empty() {
        tracing::info!("Resubscribing to {} channel(s)", replay.len());
    }
    for request in replay {
        let _rx = inner.correlator.register(&request.id);
        if let Err(e) = send_direct(client, tx, &request) {
            tracing::error!("Failed to resubscribe with request {}: {}", request.id, e);
            inner.correlator.remove(&request.id);
            inner.tracker.abandon(&request.id);
        }
    }
    inner.open_outbound(tx.clone());
    inner.set_state(ConnectionState::Ready);
}

/// Queues `request` on the session's own sender, bypassing the ready gate.
fn send_direct(client: &OtcClient, tx: &mpsc::Sender<Frame>, request: &OtcRequest) -> OtcResult<()> {
    let frame = client.inner().codec.encode_request(request)?;
    tx.try_send(frame).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => OtcError::QueueFull,
        mpsc::error::TrySendError::Closed(_) => OtcError::ConnectionLost("writer stopped".into()),
    })
}

/// # Write Loop
///
/// Drains the outbound queue into the sink until cancelled or the sink fails.
async fn write_loop(
    mut sink: FrameSink,
    mut rx: mpsc::Receiver<Frame>,
    token: CancellationToken,
) -> OtcResult<()> {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                let _ = sink.close().await;
                return Ok(());
            }
            frame = rx.recv() => match frame {
                Some(frame) => sink.send(frame).await?,
                None => {
                    let _ = sink.close().await;
                    return Ok(());
                }
            },
        }
    }
}
