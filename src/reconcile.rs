//! Live event reconciliation.
//!
//! The push channel redelivers, reorders and occasionally truncates events,
//! so every handler here is idempotent and tolerant of unknown ids. Events
//! merge into the in-memory station board; order notifications carry no
//! usable payload and are turned into a re-fetch signal for the owning view.
//!
//! Events are stamped when the transport hands them over. A local write that
//! resolved after an event was received supersedes it: the board drops the
//! stale delivery instead of letting it overwrite the write's resolution.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::normalize::{normalize_station, Station};

// ---------------------------------------------------------------------------
// Typed events
// ---------------------------------------------------------------------------

/// Decoded push event. Station payloads mirror the REST resource shape;
/// `OrderUpdate` is an opaque notification.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    StationAdded(Station),
    StationUpdated {
        id: String,
        name: Option<String>,
        is_paused: Option<bool>,
    },
    StationPaused {
        id: String,
        is_paused: bool,
    },
    StationDeleted {
        id: String,
    },
    OrderUpdate,
}

impl LiveEvent {
    /// Decode a named transport event. Unknown names and ill-formed payloads
    /// are dropped with a log line, never an error.
    pub fn decode(event: &str, payload: &Value) -> Option<LiveEvent> {
        match event {
            "stationAdded" => match normalize_station(payload) {
                Some(station) => Some(LiveEvent::StationAdded(station)),
                None => {
                    warn!(event, "dropping stationAdded without id");
                    None
                }
            },
            "stationUpdated" => {
                let id = crate::normalize::entity_id(payload)?;
                Some(LiveEvent::StationUpdated {
                    id,
                    name: payload
                        .get("name")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string()),
                    is_paused: payload
                        .get("is_paused")
                        .or_else(|| payload.get("isPaused"))
                        .and_then(Value::as_bool),
                })
            }
            "stationPaused" => {
                let id = crate::normalize::entity_id(payload)?;
                let is_paused = payload
                    .get("is_paused")
                    .or_else(|| payload.get("isPaused"))
                    .and_then(Value::as_bool)?;
                Some(LiveEvent::StationPaused { id, is_paused })
            }
            "stationDeleted" => {
                let id = crate::normalize::entity_id(payload)?;
                Some(LiveEvent::StationDeleted { id })
            }
            "orderUpdate" => Some(LiveEvent::OrderUpdate),
            other => {
                debug!(event = other, "ignoring unknown live event");
                None
            }
        }
    }

    /// The station this event targets, when it targets one.
    pub fn station_id(&self) -> Option<&str> {
        match self {
            LiveEvent::StationAdded(station) => Some(&station.id),
            LiveEvent::StationUpdated { id, .. }
            | LiveEvent::StationPaused { id, .. }
            | LiveEvent::StationDeleted { id } => Some(id),
            LiveEvent::OrderUpdate => None,
        }
    }
}

/// A decoded event plus the instant the transport delivered it. The stamp is
/// what lets a board recognise deliveries that an optimistic write already
/// superseded while they sat in the subscription channel.
#[derive(Debug, Clone)]
pub struct StampedEvent {
    pub event: LiveEvent,
    pub received_at: Instant,
}

impl StampedEvent {
    /// Stamp an event with the current instant.
    pub fn now(event: LiveEvent) -> Self {
        Self {
            event,
            received_at: Instant::now(),
        }
    }
}

/// What the owning view must do after an event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileEffect {
    None,
    /// The order payload is opaque; re-fetch the current page. Visible state
    /// converges to server state within one round trip.
    RefetchOrders,
}

// ---------------------------------------------------------------------------
// Station board
// ---------------------------------------------------------------------------

/// In-memory station collection for a single active view, keyed by server
/// id. The revision counter increments on every visible change; the
/// `settled_writes` map records, per station, when the last local write
/// resolution was applied, so events received before that instant are
/// dropped rather than re-applied over it.
#[derive(Debug, Default)]
pub struct StationBoard {
    stations: Vec<Station>,
    revision: u64,
    settled_writes: HashMap<String, Instant>,
}

impl StationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Station> {
        self.stations.iter_mut().find(|s| s.id == id)
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Replace the whole collection from a fresh fetch.
    pub fn replace_all(&mut self, stations: Vec<Station>) {
        self.stations = stations;
        self.touch();
    }

    /// Insert a station unless its id is already present. Duplicate delivery
    /// of `stationAdded` is expected from the transport.
    pub fn insert_if_absent(&mut self, station: Station) -> bool {
        if self.get(&station.id).is_some() {
            debug!(id = %station.id, "stationAdded for known id, ignoring");
            return false;
        }
        self.stations.push(station);
        self.touch();
        true
    }

    /// Partial update: fields absent from the payload keep their current
    /// values. Unknown ids are dropped (out-of-order delivery).
    pub fn update_fields(&mut self, id: &str, name: Option<&str>, is_paused: Option<bool>) -> bool {
        let Some(station) = self.get_mut(id) else {
            debug!(id, "stationUpdated for unknown id, dropping");
            return false;
        };
        if let Some(name) = name {
            station.name = name.to_string();
        }
        if let Some(paused) = is_paused {
            station.is_paused = paused;
        }
        self.touch();
        true
    }

    /// Touch only the pause flag. A pause event for an unknown station means
    /// out-of-order delivery; it must never insert.
    pub fn set_paused(&mut self, id: &str, is_paused: bool) -> bool {
        let Some(station) = self.get_mut(id) else {
            debug!(id, "stationPaused for unknown id, dropping");
            return false;
        };
        station.is_paused = is_paused;
        self.touch();
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.stations.len();
        self.stations.retain(|s| s.id != id);
        if self.stations.len() != before {
            self.touch();
            true
        } else {
            false
        }
    }

    /// Record that a local write resolution (server value or rollback) for
    /// `id` was just applied. Station events received at or before this
    /// instant lose to the write when they are drained later.
    pub fn note_local_write(&mut self, id: &str) {
        self.settled_writes.insert(id.to_string(), Instant::now());
    }

    /// Apply one stamped event. Always safe to call, whatever the delivery
    /// order; returns the effect the owning view must perform.
    ///
    /// A station event that was received before the last local write for the
    /// same id resolved is stale by definition: the write's snapshot and
    /// resolution are newer. It is dropped here, logged, never surfaced.
    pub fn apply(&mut self, stamped: &StampedEvent) -> ReconcileEffect {
        if let Some(id) = stamped.event.station_id() {
            if let Some(settled_at) = self.settled_writes.get(id) {
                if stamped.received_at <= *settled_at {
                    debug!(id, "station event superseded by a local write, dropping");
                    return ReconcileEffect::None;
                }
            }
        }
        match &stamped.event {
            LiveEvent::StationAdded(station) => {
                self.insert_if_absent(station.clone());
            }
            LiveEvent::StationUpdated {
                id,
                name,
                is_paused,
            } => {
                self.update_fields(id, name.as_deref(), *is_paused);
            }
            LiveEvent::StationPaused { id, is_paused } => {
                self.set_paused(id, *is_paused);
            }
            LiveEvent::StationDeleted { id } => {
                self.remove(id);
            }
            LiveEvent::OrderUpdate => return ReconcileEffect::RefetchOrders,
        }
        ReconcileEffect::None
    }
}
