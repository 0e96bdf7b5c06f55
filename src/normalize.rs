//! Normalization boundary for raw server payloads.
//!
//! The server's vocabulary is inconsistent across endpoints (`_id` vs `id`,
//! `categorys` vs `categories`, `price_total` vs `totalPrice`, optional
//! fields everywhere). Every field-name ambiguity is resolved here, once per
//! entity, so the rest of the crate only ever sees the canonical shapes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

// ---------------------------------------------------------------------------
// Order status vocabulary
// ---------------------------------------------------------------------------

/// Closed UI status set derived from the raw server status strings.
///
/// `Unknown` carries the capitalized raw label so an unrecognised status can
/// still be rendered; it never matches the three closed states when
/// filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Pending,
    Ready,
    Missed,
    Unknown(String),
}

impl OrderStatus {
    /// Map a raw server status into the closed UI set. Total over all string
    /// inputs and idempotent over its own labels: `normalize(x.label()) == x`.
    pub fn normalize(raw: &str) -> OrderStatus {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "pending" | "created" => OrderStatus::Pending,
            "accepted" | "ready" => OrderStatus::Ready,
            "missed" | "rejected" => OrderStatus::Missed,
            "" => OrderStatus::Unknown("Unknown".to_string()),
            _ => OrderStatus::Unknown(capitalize(&lower)),
        }
    }

    /// The label shown to the user.
    pub fn label(&self) -> &str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Ready => "Ready",
            OrderStatus::Missed => "Missed",
            OrderStatus::Unknown(label) => label,
        }
    }

    /// The raw value the server expects when writing a status back.
    pub fn to_wire(&self) -> String {
        match self {
            OrderStatus::Pending => "pending".to_string(),
            OrderStatus::Ready => "accepted".to_string(),
            OrderStatus::Missed => "missed".to_string(),
            OrderStatus::Unknown(label) => label.to_lowercase(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Station name matching
// ---------------------------------------------------------------------------

/// Canonical comparison key for a station name: trimmed, case-folded, with
/// the legacy `Chef de ` display prefix stripped. Item station strings are
/// free text and must never be compared raw.
pub fn station_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower
        .strip_prefix("chef de ")
        .map(|rest| rest.trim().to_string())
        .unwrap_or(lower)
}

/// Whether two station names refer to the same station after normalisation.
pub fn station_matches(a: &str, b: &str) -> bool {
    station_key(a) == station_key(b)
}

// ---------------------------------------------------------------------------
// Canonical entity shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub station: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Server-assigned identity. The only stable key; `display_number` is a
    /// page-position artifact and must never be used for reconciliation.
    pub id: String,
    pub display_number: String,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_price: f64,
    pub client_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub is_paused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub assigned_station_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub is_available: bool,
}

// ---------------------------------------------------------------------------
// Raw payload readers
// ---------------------------------------------------------------------------

/// First present string field among `keys`, trimmed. Numeric ids are
/// stringified.
fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match raw.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn bool_field(raw: &Value, keys: &[&str], default: bool) -> bool {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_bool))
        .unwrap_or(default)
}

fn number_field(raw: &Value, keys: &[&str], default: f64) -> f64 {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_f64))
        .unwrap_or(default)
}

/// Entity id, accepting both Mongo-style `_id` and plain `id`.
pub fn entity_id(raw: &Value) -> Option<String> {
    string_field(raw, &["_id", "id"])
}

/// Unwrap a collection response: a bare array, or an array under any of
/// `keys`, or under a `data` wrapper. Returns `None` when no array is found.
pub fn unwrap_collection(resp: &Value, keys: &[&str]) -> Option<Vec<Value>> {
    if let Some(arr) = resp.as_array() {
        return Some(arr.clone());
    }
    for key in keys {
        if let Some(arr) = resp.get(*key).and_then(Value::as_array) {
            return Some(arr.clone());
        }
    }
    if let Some(data) = resp.get("data") {
        if !data.is_null() {
            return unwrap_collection(data, keys);
        }
    }
    None
}

fn parse_created_at(raw: &Value) -> DateTime<Utc> {
    raw.get("createdAt")
        .or_else(|| raw.get("created_at"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        // Unparseable timestamps sort last under the recency ordering.
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Normalize one raw order record. Returns `None` (and logs) for records
/// without a usable id; the page mapping skips them rather than failing the
/// whole fetch.
pub fn normalize_order(raw: &Value) -> Option<Order> {
    let id = match entity_id(raw) {
        Some(id) => id,
        None => {
            debug!("dropping order record without id");
            return None;
        }
    };

    let items = raw
        .get("items")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|item| OrderItem {
                    name: string_field(item, &["name"]).unwrap_or_default(),
                    quantity: item
                        .get("quantity")
                        .and_then(Value::as_u64)
                        .filter(|q| *q >= 1)
                        .unwrap_or(1) as u32,
                    station: string_field(item, &["station"]).unwrap_or_else(|| "Unknown".into()),
                })
                .collect()
        })
        .unwrap_or_default();

    let status = raw
        .get("status")
        .and_then(Value::as_str)
        .map(OrderStatus::normalize)
        .unwrap_or(OrderStatus::Unknown("Unknown".to_string()));

    let first = string_field(raw, &["client_first_name"]).unwrap_or_default();
    let last = string_field(raw, &["client_last_name"]).unwrap_or_default();
    let client_name = format!("{first} {last}").trim().to_string();

    Some(Order {
        id,
        display_number: String::new(),
        created_at: parse_created_at(raw),
        status,
        items,
        total_price: number_field(raw, &["price_total", "totalPrice", "total_price"], 0.0),
        client_name,
    })
}

/// Normalize one raw station record.
pub fn normalize_station(raw: &Value) -> Option<Station> {
    let id = entity_id(raw)?;
    Some(Station {
        id,
        name: string_field(raw, &["name"]).unwrap_or_default(),
        is_paused: bool_field(raw, &["is_paused", "isPaused"], false),
    })
}

/// Normalize one raw category record. `isActive` defaults to true when the
/// server omits it.
pub fn normalize_category(raw: &Value) -> Option<Category> {
    let id = entity_id(raw)?;
    Some(Category {
        id,
        name: string_field(raw, &["name"]).unwrap_or_default(),
        is_active: bool_field(raw, &["isActive", "is_active"], true),
        assigned_station_id: string_field(raw, &["assignedStationId", "assigned_station_id"]),
    })
}

/// Normalize one raw product record.
pub fn normalize_product(raw: &Value) -> Option<Product> {
    let id = entity_id(raw)?;
    Some(Product {
        id,
        name: string_field(raw, &["name"]).unwrap_or_default(),
        is_available: bool_field(raw, &["isAvailable", "is_available", "availability"], true),
    })
}
