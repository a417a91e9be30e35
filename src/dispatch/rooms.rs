//! Per-booking broadcast groups
//!
//! Membership is tracked in both directions so a disconnect can sweep every
//! room a connection joined without scanning all rooms. Empty rooms are
//! dropped.

use super::registry::Outbox;
use crate::core::events::ServerEvent;
use crate::core::model::{ConnectionId, RoomKey};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: HashMap<RoomKey, BTreeSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<RoomKey>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the connection was not already a member
    pub fn join(&mut self, connection: &ConnectionId, room: &RoomKey) -> bool {
        let added = self
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection.clone());
        if added {
            self.memberships
                .entry(connection.clone())
                .or_default()
                .insert(room.clone());
        }
        added
    }

    /// Returns `true` if the connection was a member
    pub fn leave(&mut self, connection: &ConnectionId, room: &RoomKey) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(connection);
        if members.is_empty() {
            self.rooms.remove(room);
        }

        if let Some(joined) = self.memberships.get_mut(connection) {
            joined.remove(room);
            if joined.is_empty() {
                self.memberships.remove(connection);
            }
        }
        removed
    }

    /// Remove the connection from every room; returns how many it left
    pub fn leave_all(&mut self, connection: &ConnectionId) -> usize {
        let Some(joined) = self.memberships.remove(connection) else {
            return 0;
        };
        for room in &joined {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(connection);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        joined.len()
    }

    pub fn is_member(&self, connection: &ConnectionId, room: &RoomKey) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(connection))
    }

    pub fn members(&self, room: &RoomKey) -> impl Iterator<Item = &ConnectionId> {
        self.rooms.get(room).into_iter().flatten()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Deliver `event` to every member of `room` except `except`
    ///
    /// Returns the number of members that accepted the event.
    pub fn broadcast<O: Outbox>(
        &self,
        room: &RoomKey,
        outbox: &O,
        event: &ServerEvent,
        except: Option<&ConnectionId>,
    ) -> usize {
        self.members(room)
            .filter(|member| Some(*member) != except)
            .filter(|member| outbox.deliver(member, event))
            .count()
    }
}
