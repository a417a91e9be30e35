//! Connection registry
//!
//! Tracks every open connection (identified or not) with the sender that
//! feeds its WebSocket write loop, plus an index from (role, actor id) to
//! the connection currently representing that actor.

use crate::core::events::ServerEvent;
use crate::core::model::{ActorRole, ConnectionId, Identity};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Sender half feeding a connection's write loop
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// Something that can push an event to a connection
pub trait Outbox {
    /// Returns `false` when the connection is unknown or its write loop is gone
    fn deliver(&self, to: &ConnectionId, event: &ServerEvent) -> bool;
}

/// A handle to a single connection
struct ConnectionHandle {
    tx: Outbound,
    /// Credential presented at upgrade time
    credential: Option<String>,
    /// Set once the connection identified itself
    identity: Option<Identity>,
    /// Opted into the monitoring feed
    monitoring: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    actors: HashMap<ActorRole, HashMap<String, ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly opened, not yet identified connection
    pub fn attach(&mut self, id: ConnectionId, tx: Outbound, credential: Option<String>) {
        self.connections.insert(
            id,
            ConnectionHandle {
                tx,
                credential,
                identity: None,
                monitoring: false,
            },
        );
    }

    pub fn is_attached(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn credential(&self, id: &ConnectionId) -> Option<&str> {
        self.connections.get(id)?.credential.as_deref()
    }

    pub fn identity(&self, id: &ConnectionId) -> Option<&Identity> {
        self.connections.get(id)?.identity.as_ref()
    }

    /// Bind `identity` to connection `id`
    ///
    /// Overwrites any earlier entry for the same (role, actor id) without
    /// closing that connection; the displaced connection id is returned. If
    /// this connection had identified before under another identity, that
    /// registration is dropped first.
    pub fn register(&mut self, id: &ConnectionId, identity: Identity) -> Option<ConnectionId> {
        let handle = self.connections.get_mut(id)?;
        let previous_identity = handle.identity.replace(identity.clone());

        if let Some(previous) = previous_identity {
            remove_if_current(&mut self.actors, &previous, id);
        }

        self.actors
            .entry(identity.role)
            .or_default()
            .insert(identity.actor_id, id.clone())
            .filter(|displaced| displaced != id)
    }

    /// Forget connection `id`
    ///
    /// Returns the identity it held only if it was still the live
    /// registration for that actor; a connection displaced by a newer one
    /// leaves the newer entry untouched.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Identity> {
        let handle = self.connections.remove(id)?;
        let identity = handle.identity?;
        remove_if_current(&mut self.actors, &identity, id).then_some(identity)
    }

    pub fn lookup(&self, role: ActorRole, actor_id: &str) -> Option<&ConnectionId> {
        self.actors.get(&role)?.get(actor_id)
    }

    pub fn count_by_role(&self, role: ActorRole) -> usize {
        self.actors.get(&role).map_or(0, HashMap::len)
    }

    /// Open connections, identified or not
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns `false` if the connection is unknown
    pub fn set_monitoring(&mut self, id: &ConnectionId, enabled: bool) -> bool {
        match self.connections.get_mut(id) {
            Some(handle) => {
                handle.monitoring = enabled;
                true
            }
            None => false,
        }
    }

    pub fn monitor_count(&self) -> usize {
        self.connections.values().filter(|h| h.monitoring).count()
    }

    /// Send to every connection but `except`, optionally only to monitors
    pub fn broadcast_except(
        &self,
        except: &ConnectionId,
        event: &ServerEvent,
        monitors_only: bool,
    ) -> usize {
        self.connections
            .iter()
            .filter(|(id, handle)| *id != except && (!monitors_only || handle.monitoring))
            .filter(|(id, _)| self.deliver(id, event))
            .count()
    }
}

impl Outbox for ConnectionRegistry {
    fn deliver(&self, to: &ConnectionId, event: &ServerEvent) -> bool {
        let Some(handle) = self.connections.get(to) else {
            return false;
        };
        // If send fails, the receiver is dropped (client disconnected)
        if handle.tx.send(event.clone()).is_err() {
            tracing::debug!(
                connection_id = %to,
                event = event.name(),
                "Failed to send event to connection (likely disconnected)"
            );
            return false;
        }
        true
    }
}

fn remove_if_current(
    actors: &mut HashMap<ActorRole, HashMap<String, ConnectionId>>,
    identity: &Identity,
    id: &ConnectionId,
) -> bool {
    let Some(by_id) = actors.get_mut(&identity.role) else {
        return false;
    };
    if by_id.get(&identity.actor_id) == Some(id) {
        by_id.remove(&identity.actor_id);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(registry: &mut ConnectionRegistry, id: &str) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.attach(ConnectionId::from(id), tx, None);
        rx
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ConnectionRegistry::new();
        let _rx = attach(&mut registry, "c1");

        let displaced = registry.register(&"c1".into(), Identity::new(ActorRole::Driver, "d1"));
        assert!(displaced.is_none());
        assert_eq!(
            registry.lookup(ActorRole::Driver, "d1"),
            Some(&ConnectionId::from("c1"))
        );
        assert_eq!(registry.lookup(ActorRole::User, "d1"), None);
        assert_eq!(registry.count_by_role(ActorRole::Driver), 1);
        assert_eq!(registry.count_by_role(ActorRole::User), 0);
    }

    #[test]
    fn test_later_register_replaces_earlier() {
        let mut registry = ConnectionRegistry::new();
        let _rx1 = attach(&mut registry, "c1");
        let _rx2 = attach(&mut registry, "c2");

        registry.register(&"c1".into(), Identity::new(ActorRole::User, "u1"));
        let displaced = registry.register(&"c2".into(), Identity::new(ActorRole::User, "u1"));

        assert_eq!(displaced, Some(ConnectionId::from("c1")));
        assert_eq!(
            registry.lookup(ActorRole::User, "u1"),
            Some(&ConnectionId::from("c2"))
        );
        assert_eq!(registry.count_by_role(ActorRole::User), 1);
        // The stale socket is not closed
        assert!(registry.is_attached(&"c1".into()));
    }

    #[test]
    fn test_stale_unregister_keeps_newer_entry() {
        let mut registry = ConnectionRegistry::new();
        let _rx1 = attach(&mut registry, "c1");
        let _rx2 = attach(&mut registry, "c2");

        registry.register(&"c1".into(), Identity::ambulance("amb1", "d1"));
        registry.register(&"c2".into(), Identity::ambulance("amb1", "d1"));

        assert!(registry.unregister(&"c1".into()).is_none());
        assert_eq!(
            registry.lookup(ActorRole::Ambulance, "amb1"),
            Some(&ConnectionId::from("c2"))
        );

        let gone = registry.unregister(&"c2".into()).unwrap();
        assert_eq!(gone.driver_id.as_deref(), Some("d1"));
        assert_eq!(registry.lookup(ActorRole::Ambulance, "amb1"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reidentify_drops_previous_identity() {
        let mut registry = ConnectionRegistry::new();
        let _rx = attach(&mut registry, "c1");

        registry.register(&"c1".into(), Identity::new(ActorRole::User, "u1"));
        registry.register(&"c1".into(), Identity::new(ActorRole::Driver, "d1"));

        assert_eq!(registry.lookup(ActorRole::User, "u1"), None);
        assert_eq!(registry.count_by_role(ActorRole::Driver), 1);
    }

    #[test]
    fn test_register_unknown_connection_is_noop() {
        let mut registry = ConnectionRegistry::new();
        registry.register(&"ghost".into(), Identity::new(ActorRole::User, "u1"));
        assert_eq!(registry.lookup(ActorRole::User, "u1"), None);
        assert!(registry.unregister(&"ghost".into()).is_none());
    }

    #[test]
    fn test_broadcast_except_and_monitors() {
        let mut registry = ConnectionRegistry::new();
        let mut rx1 = attach(&mut registry, "c1");
        let mut rx2 = attach(&mut registry, "c2");
        let mut rx3 = attach(&mut registry, "c3");

        let sent = registry.broadcast_except(&"c1".into(), &ServerEvent::Pong, false);
        assert_eq!(sent, 2);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());

        registry.set_monitoring(&"c3".into(), true);
        assert_eq!(registry.monitor_count(), 1);
        let sent = registry.broadcast_except(&"c1".into(), &ServerEvent::Pong, true);
        assert_eq!(sent, 1);
        assert!(rx2.try_recv().is_err());
        assert!(rx3.try_recv().is_ok());
    }

    #[test]
    fn test_deliver_to_dead_connection() {
        let mut registry = ConnectionRegistry::new();
        let rx = attach(&mut registry, "c1");
        drop(rx);

        assert!(!registry.deliver(&"c1".into(), &ServerEvent::Pong));
        assert!(!registry.deliver(&"nope".into(), &ServerEvent::Pong));
        // Still registered: cleanup happens on disconnect
        assert_eq!(registry.len(), 1);
    }
}
