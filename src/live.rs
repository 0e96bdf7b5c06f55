//! Live channel lifecycle.
//!
//! The push transport (Socket.IO on the wire) is external; this module owns
//! the client-side handle: a `Connection` scoped to one session, a raw-event
//! sender the transport adapter feeds, and a `Subscription` a view drains
//! until it unmounts. Cancellation makes every later delivery a silent
//! no-op, and disconnects never clear the in-memory collections.
//!
//! Events are stamped with their arrival instant at the sender, not when a
//! subscriber drains them, so a delivery that sat buffered behind an
//! in-flight write still carries the instant it actually arrived.

use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::reconcile::{LiveEvent, StampedEvent};

/// Connect-time configuration: the channel authenticates with the bearer
/// token and scopes events to one store.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub server_url: String,
    pub token: String,
    pub store_id: String,
}

/// Open a scoped connection handle. Fails fast when the session is not
/// configured; no transport I/O happens here.
pub fn connect(config: LiveConfig) -> Result<Connection> {
    if config.token.trim().is_empty() {
        return Err(Error::Config { field: "userToken" });
    }
    if config.store_id.trim().is_empty() {
        return Err(Error::Config {
            field: "selectedStoreId",
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    info!(store_id = %config.store_id, "live channel handle opened");

    Ok(Connection {
        config,
        tx,
        rx: Some(rx),
        cancel,
    })
}

/// A live-channel handle owned by the session. Dropping or closing it
/// cancels every subscription derived from it.
pub struct Connection {
    config: LiveConfig,
    tx: mpsc::UnboundedSender<(String, Value, Instant)>,
    rx: Option<mpsc::UnboundedReceiver<(String, Value, Instant)>>,
    cancel: CancellationToken,
}

impl Connection {
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// The sender the transport adapter pushes raw `(event, payload)` pairs
    /// into.
    pub fn sender(&self) -> LiveSender {
        LiveSender {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Take the event stream for the owning view. The collections are owned
    /// by a single active view at a time, so there is exactly one
    /// subscription per connection.
    pub fn subscribe(&mut self) -> Result<Subscription> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| Error::transport("connection already subscribed"))?;
        Ok(Subscription {
            rx,
            cancel: self.cancel.child_token(),
        })
    }

    /// Tear the channel down. Safe to call more than once.
    pub fn close(&self) {
        self.cancel.cancel();
        info!(store_id = %self.config.store_id, "live channel handle closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Transport-facing side of the channel.
#[derive(Clone)]
pub struct LiveSender {
    tx: mpsc::UnboundedSender<(String, Value, Instant)>,
    cancel: CancellationToken,
}

impl LiveSender {
    /// Push a raw transport event. Returns false when the connection has
    /// been closed; deliveries after teardown are dropped silently, never an
    /// error.
    pub fn emit(&self, event: &str, payload: Value) -> bool {
        if self.cancel.is_cancelled() {
            debug!(event, "live event after close, dropping");
            return false;
        }
        self.tx.send((event.to_string(), payload, Instant::now())).is_ok()
    }

    /// Record a transport failure (connect/reconnect). The reconciled state
    /// is kept as-is; stale-but-present beats empty.
    pub fn report_error(&self, message: &str) {
        warn!(error = message, "live channel transport error");
    }
}

/// View-scoped event stream with explicit teardown.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<(String, Value, Instant)>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Await the next decoded event, stamped with its arrival instant.
    /// Returns `None` once the subscription is cancelled or the connection
    /// closed; undecodable events are skipped.
    pub async fn next_event(&mut self) -> Option<StampedEvent> {
        loop {
            tokio::select! {
                // Cancellation wins over buffered deliveries.
                biased;
                _ = self.cancel.cancelled() => return None,
                raw = self.rx.recv() => {
                    let (event, payload, received_at) = raw?;
                    if let Some(decoded) = LiveEvent::decode(&event, &payload) {
                        return Some(StampedEvent { event: decoded, received_at });
                    }
                    // Unknown or ill-formed event, already logged; keep draining.
                }
            }
        }
    }

    /// Unsubscribe. Pending and later deliveries become no-ops.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
