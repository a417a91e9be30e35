//! Event vocabulary exchanged over the dispatch WebSocket
//!
//! Every frame is a JSON object tagged by `type`, payload fields inline and
//! camelCase:
//!
//! ```json
//! // Client → Server
//! {"type": "ambulance:connect", "ambulanceId": "amb1", "driverId": "d1"}
//! {"type": "ambulance:location", "ambulanceId": "amb1", "location": {"lat": 10, "lng": 20}, "bookingId": "bk1"}
//! {"type": "booking:track", "bookingId": "bk1", "userId": "u1"}
//! {"type": "ping"}
//!
//! // Server → Client
//! {"type": "welcome", "connectionId": "conn_..."}
//! {"type": "ambulance:location:update", "ambulanceId": "amb1", "bookingId": "bk1", "location": {...}, "timestamp": 1700000000000}
//! {"type": "pong"}
//! ```
//!
//! Unknown fields are ignored so older clients that attach extra context
//! (`userId` on a status change, for instance) keep working.

use crate::core::error::EventError;
use crate::core::model::{ActorRole, BookingStatus, Coordinates, LocationRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Identify as a user or a driver
    #[serde(rename = "user:connect")]
    Identify(IdentifyPayload),
    /// Identify as an ambulance operated by a driver
    #[serde(rename = "ambulance:connect")]
    IdentifyAmbulance(AmbulanceIdentifyPayload),
    #[serde(rename = "ambulance:location")]
    AmbulanceLocation(AmbulanceLocationPayload),
    #[serde(rename = "driver:location")]
    DriverLocation(DriverLocationPayload),
    #[serde(rename = "booking:assign")]
    AssignBooking(AssignPayload),
    #[serde(rename = "booking:status")]
    BookingStatus(StatusPayload),
    #[serde(rename = "booking:track")]
    TrackBooking(TrackPayload),
    #[serde(rename = "booking:untrack")]
    UntrackBooking(UntrackPayload),
    #[serde(rename = "ambulance:eta")]
    Eta(EtaPayload),
    #[serde(rename = "emergency:alert")]
    EmergencyAlert(AlertPayload),
    /// Opt into the fleet-wide monitoring feed
    #[serde(rename = "monitor:subscribe")]
    MonitorSubscribe,
    #[serde(rename = "monitor:unsubscribe")]
    MonitorUnsubscribe,
    /// Keepalive ping
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    pub user_id: String,
    pub user_type: ActorRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbulanceIdentifyPayload {
    pub ambulance_id: String,
    pub driver_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbulanceLocationPayload {
    pub ambulance_id: String,
    pub location: Coordinates,
    #[serde(default)]
    pub booking_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationPayload {
    pub driver_id: String,
    pub location: Coordinates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPayload {
    pub booking_id: String,
    pub ambulance_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub booking_id: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub ambulance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub booking_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntrackPayload {
    pub booking_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaPayload {
    pub ambulance_id: String,
    pub booking_id: String,
    pub eta: Reading,
    pub distance: Reading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub booking_id: String,
    pub message: String,
    #[serde(default = "default_severity", alias = "level")]
    pub severity: String,
}

fn default_severity() -> String {
    "high".to_string()
}

/// ETA or distance as the client computed it
///
/// Clients send either a number (minutes, kilometres) or a preformatted
/// string ("12 min"); it is relayed unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Number(f64),
    Text(String),
}

impl ClientEvent {
    /// Wire name of the event, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Identify(_) => "user:connect",
            ClientEvent::IdentifyAmbulance(_) => "ambulance:connect",
            ClientEvent::AmbulanceLocation(_) => "ambulance:location",
            ClientEvent::DriverLocation(_) => "driver:location",
            ClientEvent::AssignBooking(_) => "booking:assign",
            ClientEvent::BookingStatus(_) => "booking:status",
            ClientEvent::TrackBooking(_) => "booking:track",
            ClientEvent::UntrackBooking(_) => "booking:untrack",
            ClientEvent::Eta(_) => "ambulance:eta",
            ClientEvent::EmergencyAlert(_) => "emergency:alert",
            ClientEvent::MonitorSubscribe => "monitor:subscribe",
            ClientEvent::MonitorUnsubscribe => "monitor:unsubscribe",
            ClientEvent::Ping => "ping",
        }
    }

    /// Check the invariants serde cannot express: non-empty ids, sane
    /// coordinates, identify roles routed through the right event.
    pub fn validate(&self) -> Result<(), EventError> {
        let event = self.name();
        match self {
            ClientEvent::Identify(p) => {
                require_id(event, "userId", &p.user_id)?;
                if p.user_type == ActorRole::Ambulance {
                    return Err(EventError::invalid(
                        event,
                        "ambulances identify with ambulance:connect",
                    ));
                }
            }
            ClientEvent::IdentifyAmbulance(p) => {
                require_id(event, "ambulanceId", &p.ambulance_id)?;
                require_id(event, "driverId", &p.driver_id)?;
            }
            ClientEvent::AmbulanceLocation(p) => {
                require_id(event, "ambulanceId", &p.ambulance_id)?;
                require_coordinates(event, &p.location)?;
                if let Some(booking_id) = &p.booking_id {
                    require_id(event, "bookingId", booking_id)?;
                }
            }
            ClientEvent::DriverLocation(p) => {
                require_id(event, "driverId", &p.driver_id)?;
                require_coordinates(event, &p.location)?;
            }
            ClientEvent::AssignBooking(p) => {
                require_id(event, "bookingId", &p.booking_id)?;
                require_id(event, "ambulanceId", &p.ambulance_id)?;
                require_id(event, "userId", &p.user_id)?;
            }
            ClientEvent::BookingStatus(p) => {
                require_id(event, "bookingId", &p.booking_id)?;
                if let Some(ambulance_id) = &p.ambulance_id {
                    require_id(event, "ambulanceId", ambulance_id)?;
                }
            }
            ClientEvent::TrackBooking(p) => {
                require_id(event, "bookingId", &p.booking_id)?;
                require_id(event, "userId", &p.user_id)?;
            }
            ClientEvent::UntrackBooking(p) => require_id(event, "bookingId", &p.booking_id)?,
            ClientEvent::Eta(p) => {
                require_id(event, "ambulanceId", &p.ambulance_id)?;
                require_id(event, "bookingId", &p.booking_id)?;
            }
            ClientEvent::EmergencyAlert(p) => require_id(event, "bookingId", &p.booking_id)?,
            ClientEvent::MonitorSubscribe | ClientEvent::MonitorUnsubscribe | ClientEvent::Ping => {}
        }
        Ok(())
    }
}

fn require_id(event: &'static str, field: &str, value: &str) -> Result<(), EventError> {
    if value.trim().is_empty() {
        return Err(EventError::invalid(event, format!("empty {}", field)));
    }
    Ok(())
}

fn require_coordinates(event: &'static str, location: &Coordinates) -> Result<(), EventError> {
    if !location.is_valid() {
        return Err(EventError::invalid(
            event,
            format!("coordinates out of range ({}, {})", location.lat, location.lng),
        ));
    }
    Ok(())
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// First frame on every connection
    #[serde(rename = "welcome")]
    Welcome { connection_id: String },

    #[serde(rename = "connection:confirmed")]
    ConnectionConfirmed {
        user_id: String,
        user_type: ActorRole,
    },

    #[serde(rename = "ambulance:connected")]
    AmbulanceConnected { ambulance_id: String },

    /// Booking-scoped position of the assigned ambulance
    #[serde(rename = "ambulance:location:update")]
    AmbulanceLocationUpdate {
        ambulance_id: String,
        booking_id: String,
        location: Coordinates,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    /// Monitoring feed: every ambulance position
    #[serde(rename = "ambulance:location:broadcast")]
    AmbulanceLocationBroadcast {
        ambulance_id: String,
        location: Coordinates,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    /// Monitoring feed: every driver position
    #[serde(rename = "driver:location:update")]
    DriverLocationUpdate {
        driver_id: String,
        location: Coordinates,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "booking:assigned")]
    BookingAssigned {
        booking_id: String,
        ambulance_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<LocationRecord>,
    },

    #[serde(rename = "booking:status:update")]
    BookingStatusUpdate {
        booking_id: String,
        status: BookingStatus,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "ambulance:eta:update")]
    EtaUpdate {
        ambulance_id: String,
        booking_id: String,
        eta: Reading,
        distance: Reading,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "emergency:alert")]
    EmergencyAlert {
        booking_id: String,
        message: String,
        severity: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "monitor:subscribed")]
    MonitorSubscribed,

    #[serde(rename = "monitor:unsubscribed")]
    MonitorUnsubscribed,

    /// Keepalive response
    #[serde(rename = "pong")]
    Pong,
}

impl ServerEvent {
    /// Wire name of the event, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Welcome { .. } => "welcome",
            ServerEvent::ConnectionConfirmed { .. } => "connection:confirmed",
            ServerEvent::AmbulanceConnected { .. } => "ambulance:connected",
            ServerEvent::AmbulanceLocationUpdate { .. } => "ambulance:location:update",
            ServerEvent::AmbulanceLocationBroadcast { .. } => "ambulance:location:broadcast",
            ServerEvent::DriverLocationUpdate { .. } => "driver:location:update",
            ServerEvent::BookingAssigned { .. } => "booking:assigned",
            ServerEvent::BookingStatusUpdate { .. } => "booking:status:update",
            ServerEvent::EtaUpdate { .. } => "ambulance:eta:update",
            ServerEvent::EmergencyAlert { .. } => "emergency:alert",
            ServerEvent::MonitorSubscribed => "monitor:subscribed",
            ServerEvent::MonitorUnsubscribed => "monitor:unsubscribed",
            ServerEvent::Pong => "pong",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // === Deserialization ===

    #[test]
    fn test_ambulance_location_from_client_frame() {
        let frame = json!({
            "type": "ambulance:location",
            "ambulanceId": "amb1",
            "location": {"lat": 10.0, "lng": 20.0},
            "bookingId": "bk1"
        });

        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        match event {
            ClientEvent::AmbulanceLocation(p) => {
                assert_eq!(p.ambulance_id, "amb1");
                assert_eq!(p.location, Coordinates::new(10.0, 20.0));
                assert_eq!(p.booking_id.as_deref(), Some("bk1"));
            }
            other => panic!("Expected AmbulanceLocation, got {:?}", other),
        }
    }

    #[test]
    fn test_null_booking_id_is_absent() {
        let frame = r#"{"type":"ambulance:location","ambulanceId":"amb1","location":{"lat":1,"lng":2},"bookingId":null}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();
        match event {
            ClientEvent::AmbulanceLocation(p) => assert!(p.booking_id.is_none()),
            other => panic!("Expected AmbulanceLocation, got {:?}", other),
        }
    }

    #[test]
    fn test_status_payload_ignores_extra_fields() {
        let frame = r#"{"type":"booking:status","bookingId":"bk1","status":"accepted","driverId":"d1"}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();
        match event {
            ClientEvent::BookingStatus(p) => {
                assert_eq!(p.status, BookingStatus::Accepted);
                assert!(p.ambulance_id.is_none());
            }
            other => panic!("Expected BookingStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_alert_accepts_level_alias_and_default() {
        let with_level = r#"{"type":"emergency:alert","bookingId":"bk1","message":"help","level":"critical"}"#;
        match serde_json::from_str::<ClientEvent>(with_level).unwrap() {
            ClientEvent::EmergencyAlert(p) => assert_eq!(p.severity, "critical"),
            other => panic!("Expected EmergencyAlert, got {:?}", other),
        }

        let without = r#"{"type":"emergency:alert","bookingId":"bk1","message":"help"}"#;
        match serde_json::from_str::<ClientEvent>(without).unwrap() {
            ClientEvent::EmergencyAlert(p) => assert_eq!(p.severity, "high"),
            other => panic!("Expected EmergencyAlert, got {:?}", other),
        }
    }

    #[test]
    fn test_eta_readings_number_or_text() {
        let frame = r#"{"type":"ambulance:eta","ambulanceId":"amb1","bookingId":"bk1","eta":"12 min","distance":3.5}"#;
        match serde_json::from_str::<ClientEvent>(frame).unwrap() {
            ClientEvent::Eta(p) => {
                assert_eq!(p.eta, Reading::Text("12 min".to_string()));
                assert_eq!(p.distance, Reading::Number(3.5));
            }
            other => panic!("Expected Eta, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_and_monitor_unit_events() {
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(r#"{"type":"ping"}"#).unwrap(),
            ClientEvent::Ping
        ));
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(r#"{"type":"monitor:subscribe"}"#).unwrap(),
            ClientEvent::MonitorSubscribe
        ));
    }

    #[test]
    fn test_malformed_frames_fail_to_decode() {
        let missing_field = r#"{"type":"booking:assign","bookingId":"bk1","ambulanceId":"amb1"}"#;
        assert!(serde_json::from_str::<ClientEvent>(missing_field).is_err());

        let unknown_type = r#"{"type":"booking:teleport","bookingId":"bk1"}"#;
        assert!(serde_json::from_str::<ClientEvent>(unknown_type).is_err());

        let bad_status = r#"{"type":"booking:status","bookingId":"bk1","status":"lost"}"#;
        assert!(serde_json::from_str::<ClientEvent>(bad_status).is_err());
    }

    // === Validation ===

    #[test]
    fn test_validate_rejects_empty_ids() {
        let event = ClientEvent::TrackBooking(TrackPayload {
            booking_id: "  ".to_string(),
            user_id: "u1".to_string(),
        });
        let err = event.validate().unwrap_err();
        assert!(err.to_string().contains("empty bookingId"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_coordinates() {
        let event = ClientEvent::DriverLocation(DriverLocationPayload {
            driver_id: "d1".to_string(),
            location: Coordinates::new(120.0, 0.0),
        });
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ambulance_via_user_connect() {
        let event = ClientEvent::Identify(IdentifyPayload {
            user_id: "amb1".to_string(),
            user_type: ActorRole::Ambulance,
        });
        assert!(event.validate().is_err());
    }

    // === Serialization ===

    #[test]
    fn test_server_event_wire_names_and_case() {
        let msg = ServerEvent::AmbulanceLocationUpdate {
            ambulance_id: "amb1".to_string(),
            booking_id: "bk1".to_string(),
            location: Coordinates::new(10.0, 20.0),
            timestamp: DateTime::from_timestamp_millis(1_000).unwrap(),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ambulance:location:update");
        assert_eq!(json["ambulanceId"], "amb1");
        assert_eq!(json["bookingId"], "bk1");
        assert_eq!(json["location"]["lng"], 20.0);
        assert_eq!(json["timestamp"], 1_000);
        assert_eq!(json["type"], msg.name());
    }

    #[test]
    fn test_booking_assigned_omits_missing_location() {
        let msg = ServerEvent::BookingAssigned {
            booking_id: "bk1".to_string(),
            ambulance_id: "amb1".to_string(),
            location: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "booking:assigned");
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_pong_and_welcome() {
        assert_eq!(serde_json::to_value(ServerEvent::Pong).unwrap(), json!({"type": "pong"}));

        let welcome = ServerEvent::Welcome {
            connection_id: "conn_abc".to_string(),
        };
        let json = serde_json::to_value(&welcome).unwrap();
        assert_eq!(json["connectionId"], "conn_abc");
    }
}
