//! Domain types shared by the dispatch stores and the wire protocol

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transport-session identifier of a single WebSocket connection
///
/// Distinct from the actor id the client claims after connecting: one actor
/// may reconnect many times, each time with a fresh connection id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh connection id (`conn_<uuid>`)
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role an actor claims when identifying a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    User,
    Driver,
    Ambulance,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::User => "user",
            ActorRole::Driver => "driver",
            ActorRole::Ambulance => "ambulance",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity bound to a connection once it has identified itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: ActorRole,
    pub actor_id: String,
    /// Driver operating the ambulance (ambulance connections only)
    pub driver_id: Option<String>,
}

impl Identity {
    pub fn new(role: ActorRole, actor_id: impl Into<String>) -> Self {
        Self {
            role,
            actor_id: actor_id.into(),
            driver_id: None,
        }
    }

    pub fn ambulance(ambulance_id: impl Into<String>, driver_id: impl Into<String>) -> Self {
        Self {
            role: ActorRole::Ambulance,
            actor_id: ambulance_id.into(),
            driver_id: Some(driver_id.into()),
        }
    }
}

/// A geographic position as sent by the clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the WGS84 latitude/longitude ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Last known position of an ambulance
///
/// Serialized flat (`{"ambulanceId", "lat", "lng", "timestamp"}`) with the
/// timestamp in epoch milliseconds, which is what the map clients consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    #[serde(rename = "ambulanceId")]
    pub actor_id: String,
    pub lat: f64,
    pub lng: f64,
    /// Server receipt time, never client supplied
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl LocationRecord {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// Booking lifecycle states reported by the persistent store
///
/// The dispatcher does not enforce transitions; it relays them and only
/// reacts to the terminal ones. Values outside the known set are carried
/// through as [`BookingStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    EnRoute,
    Arrived,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
    #[serde(untagged)]
    Other(String),
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::EnRoute => "en_route",
            BookingStatus::Arrived => "arrived",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Other(status) => status,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast group key, derived from a booking id only
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey(String);

impl RoomKey {
    pub fn for_booking(booking_id: &str) -> Self {
        Self(format!("booking:{}", booking_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
