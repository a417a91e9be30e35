//! Read-only projections of the dispatch state for the HTTP surface

use super::router::DispatchState;
use crate::core::error::DispatchError;
use crate::core::model::{ActorRole, LocationRecord};
use serde::Serialize;

/// Identified connections per role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientCounts {
    pub users: usize,
    pub drivers: usize,
    pub ambulances: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: &'static str,
    pub connected_clients: ClientCounts,
    pub active_ambulances: usize,
    pub active_bookings: usize,
    /// Open sockets, identified or not
    pub total_connections: usize,
    pub monitoring_subscribers: usize,
}

/// The ambulance serving a booking and where it was last seen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAmbulance {
    pub booking_id: String,
    pub ambulance_id: String,
    pub location: Option<LocationRecord>,
}

impl DispatchState {
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            status: "online",
            connected_clients: ClientCounts {
                users: self.registry.count_by_role(ActorRole::User),
                drivers: self.registry.count_by_role(ActorRole::Driver),
                ambulances: self.registry.count_by_role(ActorRole::Ambulance),
            },
            active_ambulances: self.locations.len(),
            active_bookings: self.assignments.len(),
            total_connections: self.registry.len(),
            monitoring_subscribers: self.registry.monitor_count(),
        }
    }

    pub fn all_locations(&self) -> Vec<LocationRecord> {
        self.locations.all_latest()
    }

    pub fn ambulance_location(&self, ambulance_id: &str) -> Result<LocationRecord, DispatchError> {
        self.locations
            .get(ambulance_id)
            .cloned()
            .ok_or_else(|| DispatchError::AmbulanceNotFound {
                id: ambulance_id.to_string(),
            })
    }

    pub fn booking_ambulance(&self, booking_id: &str) -> Result<BookingAmbulance, DispatchError> {
        let ambulance_id = self
            .assignments
            .ambulance_for(booking_id)
            .ok_or_else(|| DispatchError::NoAssignment {
                booking_id: booking_id.to_string(),
            })?;

        Ok(BookingAmbulance {
            booking_id: booking_id.to_string(),
            ambulance_id: ambulance_id.to_string(),
            location: self.locations.get(ambulance_id).cloned(),
        })
    }
}
