//! Event router: the dispatch state machine
//!
//! `DispatchState` owns the four stores and applies one inbound event at a
//! time. Handlers never await, so an event is fully applied before the next
//! one is looked at.
//!
//! # Fan-out
//!
//! ```text
//! ambulance:location ──▶ LocationStore::update
//!                          │
//!                          ├─ pairing confirmed? ──▶ room booking:<id> (minus sender)
//!                          │
//!                          └─ monitoring feed ──▶ all others / monitor subscribers
//! ```

use super::assignments::AssignmentTable;
use super::locations::LocationStore;
use super::registry::{ConnectionRegistry, Outbound, Outbox};
use super::rooms::RoomManager;
use crate::config::MonitoringScope;
use crate::core::auth::{IdentityVerifier, TrustingVerifier};
use crate::core::events::{
    AlertPayload, AmbulanceLocationPayload, AssignPayload, ClientEvent, DriverLocationPayload,
    EtaPayload, ServerEvent, StatusPayload, TrackPayload,
};
use crate::core::model::{ActorRole, ConnectionId, Identity, RoomKey};
use chrono::Utc;
use std::sync::Arc;

pub struct DispatchState {
    pub(super) registry: ConnectionRegistry,
    pub(super) locations: LocationStore,
    pub(super) assignments: AssignmentTable,
    pub(super) rooms: RoomManager,
    monitoring: MonitoringScope,
    verifier: Arc<dyn IdentityVerifier>,
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new(MonitoringScope::All, Arc::new(TrustingVerifier))
    }
}

impl DispatchState {
    pub fn new(monitoring: MonitoringScope, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            locations: LocationStore::new(),
            assignments: AssignmentTable::new(),
            rooms: RoomManager::new(),
            monitoring,
            verifier,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn locations(&self) -> &LocationStore {
        &self.locations
    }

    pub fn assignments(&self) -> &AssignmentTable {
        &self.assignments
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// A socket opened
    pub fn connect(&mut self, connection_id: ConnectionId, tx: Outbound, credential: Option<String>) {
        tracing::debug!(connection_id = %connection_id, "Dispatch client connected");
        self.registry.attach(connection_id, tx, credential);
    }

    /// A socket closed: unregister, drop the ambulance's location, sweep rooms
    pub fn disconnect(&mut self, connection_id: &ConnectionId) {
        if !self.registry.is_attached(connection_id) {
            return;
        }

        let identity = self.registry.unregister(connection_id);
        if let Some(identity) = &identity
            && identity.role == ActorRole::Ambulance
            && self.locations.remove(&identity.actor_id).is_some()
        {
            tracing::debug!(ambulance_id = %identity.actor_id, "Cleared location of departed ambulance");
        }
        let rooms_left = self.rooms.leave_all(connection_id);

        tracing::debug!(
            connection_id = %connection_id,
            role = identity.as_ref().map(|i| i.role.as_str()),
            actor_id = identity.as_ref().map(|i| i.actor_id.as_str()),
            rooms_left,
            "Dispatch client disconnected"
        );
    }

    /// Apply one inbound event from `connection_id`
    ///
    /// Invalid events are logged and dropped; nothing is sent back.
    pub fn handle(&mut self, connection_id: &ConnectionId, event: ClientEvent) {
        if !self.registry.is_attached(connection_id) {
            tracing::debug!(connection_id = %connection_id, "Event from unknown connection ignored");
            return;
        }

        if let Err(e) = event.validate() {
            tracing::warn!(connection_id = %connection_id, error = %e, "Dropping invalid event");
            return;
        }

        if !self.sender_may_send(connection_id, &event) {
            tracing::warn!(
                connection_id = %connection_id,
                event = event.name(),
                "Dropping event from a connection not identified as its sender"
            );
            return;
        }

        match event {
            ClientEvent::Identify(p) => {
                let identity = Identity::new(p.user_type, p.user_id.clone());
                if self.identify(connection_id, identity) {
                    self.reply(
                        connection_id,
                        ServerEvent::ConnectionConfirmed {
                            user_id: p.user_id,
                            user_type: p.user_type,
                        },
                    );
                }
            }
            ClientEvent::IdentifyAmbulance(p) => {
                let identity = Identity::ambulance(p.ambulance_id.clone(), p.driver_id);
                if self.identify(connection_id, identity) {
                    self.reply(
                        connection_id,
                        ServerEvent::AmbulanceConnected {
                            ambulance_id: p.ambulance_id,
                        },
                    );
                }
            }
            ClientEvent::AmbulanceLocation(p) => self.on_ambulance_location(connection_id, p),
            ClientEvent::DriverLocation(p) => self.on_driver_location(connection_id, p),
            ClientEvent::AssignBooking(p) => self.assign(connection_id, p),
            ClientEvent::BookingStatus(p) => self.booking_status(p),
            ClientEvent::TrackBooking(p) => self.track(connection_id, p),
            ClientEvent::UntrackBooking(p) => {
                let room = RoomKey::for_booking(&p.booking_id);
                if self.rooms.leave(connection_id, &room) {
                    tracing::debug!(connection_id = %connection_id, room = %room, "Stopped tracking");
                }
            }
            ClientEvent::Eta(p) => self.eta(p),
            ClientEvent::EmergencyAlert(p) => self.emergency_alert(p),
            ClientEvent::MonitorSubscribe => {
                self.registry.set_monitoring(connection_id, true);
                self.reply(connection_id, ServerEvent::MonitorSubscribed);
            }
            ClientEvent::MonitorUnsubscribe => {
                self.registry.set_monitoring(connection_id, false);
                self.reply(connection_id, ServerEvent::MonitorUnsubscribed);
            }
            ClientEvent::Ping => self.reply(connection_id, ServerEvent::Pong),
        }
    }

    /// Under a binding verifier, actor-scoped events must come from that
    /// actor's own connection and every other booking event from an
    /// identified one.
    fn sender_may_send(&self, connection_id: &ConnectionId, event: &ClientEvent) -> bool {
        if !self.verifier.binds_senders() {
            return true;
        }

        let identity = self.registry.identity(connection_id);
        let is = |role: ActorRole, actor_id: &str| {
            identity.is_some_and(|i| i.role == role && i.actor_id == actor_id)
        };
        match event {
            ClientEvent::AmbulanceLocation(p) => is(ActorRole::Ambulance, &p.ambulance_id),
            ClientEvent::Eta(p) => is(ActorRole::Ambulance, &p.ambulance_id),
            ClientEvent::DriverLocation(p) => is(ActorRole::Driver, &p.driver_id),
            ClientEvent::AssignBooking(_)
            | ClientEvent::BookingStatus(_)
            | ClientEvent::TrackBooking(_)
            | ClientEvent::EmergencyAlert(_) => identity.is_some(),
            ClientEvent::Identify(_)
            | ClientEvent::IdentifyAmbulance(_)
            | ClientEvent::UntrackBooking(_)
            | ClientEvent::MonitorSubscribe
            | ClientEvent::MonitorUnsubscribe
            | ClientEvent::Ping => true,
        }
    }

    fn identify(&mut self, connection_id: &ConnectionId, identity: Identity) -> bool {
        let credential = self.registry.credential(connection_id);
        if let Err(e) = self.verifier.verify(credential, &identity) {
            tracing::warn!(connection_id = %connection_id, error = %e, "Identify rejected");
            return false;
        }

        // Ambulance id this connection gives up by re-identifying
        let abandoned = self
            .registry
            .identity(connection_id)
            .filter(|previous| {
                previous.role == ActorRole::Ambulance
                    && (identity.role != ActorRole::Ambulance || previous.actor_id != identity.actor_id)
            })
            .filter(|previous| {
                self.registry.lookup(ActorRole::Ambulance, &previous.actor_id) == Some(connection_id)
            })
            .map(|previous| previous.actor_id.clone());

        let role = identity.role;
        let actor_id = identity.actor_id.clone();
        if let Some(displaced) = self.registry.register(connection_id, identity) {
            tracing::debug!(
                connection_id = %connection_id,
                displaced = %displaced,
                role = role.as_str(),
                actor_id = %actor_id,
                "Identity moved to a newer connection"
            );
        }
        if let Some(old_id) = abandoned
            && self.locations.remove(&old_id).is_some()
        {
            tracing::debug!(ambulance_id = %old_id, "Cleared location of abandoned ambulance identity");
        }
        tracing::info!(connection_id = %connection_id, role = role.as_str(), actor_id = %actor_id, "Client identified");
        true
    }

    fn on_ambulance_location(&mut self, connection_id: &ConnectionId, p: AmbulanceLocationPayload) {
        let timestamp = self.locations.update(&p.ambulance_id, p.location).timestamp;

        if let Some(booking_id) = p.booking_id {
            if self.assignments.is_assigned(&booking_id, &p.ambulance_id) {
                let room = RoomKey::for_booking(&booking_id);
                let update = ServerEvent::AmbulanceLocationUpdate {
                    ambulance_id: p.ambulance_id.clone(),
                    booking_id,
                    location: p.location,
                    timestamp,
                };
                self.rooms
                    .broadcast(&room, &self.registry, &update, Some(connection_id));
            } else {
                tracing::debug!(
                    ambulance_id = %p.ambulance_id,
                    booking_id = %booking_id,
                    "Location names a booking the ambulance is not assigned to"
                );
            }
        }

        self.monitoring_feed(
            connection_id,
            ServerEvent::AmbulanceLocationBroadcast {
                ambulance_id: p.ambulance_id,
                location: p.location,
                timestamp,
            },
        );
    }

    fn on_driver_location(&mut self, connection_id: &ConnectionId, p: DriverLocationPayload) {
        self.monitoring_feed(
            connection_id,
            ServerEvent::DriverLocationUpdate {
                driver_id: p.driver_id,
                location: p.location,
                timestamp: Utc::now(),
            },
        );
    }

    fn assign(&mut self, connection_id: &ConnectionId, p: AssignPayload) {
        let room = RoomKey::for_booking(&p.booking_id);
        let outcome = self.assignments.assign(&p.booking_id, &p.ambulance_id);

        if outcome.is_conflict() {
            tracing::warn!(
                booking_id = %p.booking_id,
                ambulance_id = %p.ambulance_id,
                previous_ambulance = outcome.previous_ambulance.as_deref(),
                previous_booking = outcome.previous_booking.as_deref(),
                "Assignment overwrote an existing pairing"
            );
        }
        // Displaced ambulances stop receiving the rooms they no longer serve
        if let Some(old) = &outcome.previous_ambulance
            && let Some(conn) = self.registry.lookup(ActorRole::Ambulance, old)
        {
            self.rooms.leave(conn, &room);
        }
        if let Some(old_booking) = &outcome.previous_booking
            && let Some(conn) = self.registry.lookup(ActorRole::Ambulance, &p.ambulance_id)
        {
            self.rooms.leave(conn, &RoomKey::for_booking(old_booking));
        }

        self.rooms.join(connection_id, &room);

        let assigned = ServerEvent::BookingAssigned {
            booking_id: p.booking_id.clone(),
            ambulance_id: p.ambulance_id.clone(),
            location: self.locations.get(&p.ambulance_id).cloned(),
        };

        for (role, actor_id) in [
            (ActorRole::Ambulance, p.ambulance_id.as_str()),
            (ActorRole::User, p.user_id.as_str()),
        ] {
            if let Some(conn) = self.registry.lookup(role, actor_id).cloned() {
                self.rooms.join(&conn, &room);
                self.registry.deliver(&conn, &assigned);
            }
        }

        tracing::info!(
            booking_id = %p.booking_id,
            ambulance_id = %p.ambulance_id,
            user_id = %p.user_id,
            "Booking assigned"
        );
    }

    fn booking_status(&mut self, p: StatusPayload) {
        let room = RoomKey::for_booking(&p.booking_id);
        let terminal = p.status.is_terminal();
        tracing::info!(booking_id = %p.booking_id, status = %p.status, "Booking status updated");
        let update = ServerEvent::BookingStatusUpdate {
            booking_id: p.booking_id.clone(),
            status: p.status,
            timestamp: Utc::now(),
        };
        self.rooms.broadcast(&room, &self.registry, &update, None);

        if !terminal {
            return;
        }

        let ambulance_id = p
            .ambulance_id
            .or_else(|| self.assignments.ambulance_for(&p.booking_id).map(str::to_string));
        if let Some(ambulance_id) = ambulance_id {
            if self.assignments.release(&p.booking_id, &ambulance_id) {
                tracing::info!(booking_id = %p.booking_id, ambulance_id = %ambulance_id, "Assignment released");
            } else {
                tracing::debug!(booking_id = %p.booking_id, ambulance_id = %ambulance_id, "No matching assignment to release");
            }
        }
    }

    fn track(&mut self, connection_id: &ConnectionId, p: TrackPayload) {
        let room = RoomKey::for_booking(&p.booking_id);
        self.rooms.join(connection_id, &room);
        tracing::debug!(connection_id = %connection_id, user_id = %p.user_id, room = %room, "Tracking booking");

        // Replay the last known position so the map is not blank until the next update
        let Some(ambulance_id) = self.assignments.ambulance_for(&p.booking_id) else {
            return;
        };
        if let Some(record) = self.locations.get(ambulance_id) {
            let replay = ServerEvent::AmbulanceLocationUpdate {
                ambulance_id: ambulance_id.to_string(),
                booking_id: p.booking_id,
                location: record.coordinates(),
                timestamp: record.timestamp,
            };
            self.registry.deliver(connection_id, &replay);
        }
    }

    fn eta(&mut self, p: EtaPayload) {
        let room = RoomKey::for_booking(&p.booking_id);
        let update = ServerEvent::EtaUpdate {
            ambulance_id: p.ambulance_id,
            booking_id: p.booking_id,
            eta: p.eta,
            distance: p.distance,
            timestamp: Utc::now(),
        };
        self.rooms.broadcast(&room, &self.registry, &update, None);
    }

    fn emergency_alert(&mut self, p: AlertPayload) {
        let room = RoomKey::for_booking(&p.booking_id);
        tracing::warn!(booking_id = %p.booking_id, severity = %p.severity, message = %p.message, "Emergency alert");
        let alert = ServerEvent::EmergencyAlert {
            booking_id: p.booking_id,
            message: p.message,
            severity: p.severity,
            timestamp: Utc::now(),
        };
        self.rooms.broadcast(&room, &self.registry, &alert, None);
    }

    fn monitoring_feed(&self, sender: &ConnectionId, event: ServerEvent) {
        let monitors_only = self.monitoring == MonitoringScope::Subscribers;
        self.registry.broadcast_except(sender, &event, monitors_only);
    }

    fn reply(&self, connection_id: &ConnectionId, event: ServerEvent) {
        self.registry.deliver(connection_id, &event);
    }
}
