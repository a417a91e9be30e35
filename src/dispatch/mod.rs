//! The dispatcher: a single task that owns all coordination state
//!
//! Connection handlers and HTTP queries talk to it through a bounded command
//! channel, so every mutation and every read sees a consistent snapshot
//! without locks.
//!
//! # Architecture
//!
//! ```text
//! ws handler ──Connect/Event/Disconnect──▶ ┐
//!                                          ├─ mpsc ──▶ Dispatcher::run() ──▶ DispatchState
//! REST query ──Query(closure)────────────▶ ┘                                     │
//!                                                                   per-connection mpsc
//!                                                                                │
//!                                                                      write loop ──▶ client
//! ```

pub mod assignments;
pub mod locations;
pub mod registry;
pub mod rooms;
pub mod router;
pub mod status;

pub use registry::Outbound;
pub use router::DispatchState;
pub use status::{BookingAmbulance, ClientCounts, StatusReport};

use crate::core::error::DispatchError;
use crate::core::events::ClientEvent;
use crate::core::model::{ConnectionId, LocationRecord};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

type QueryFn = Box<dyn FnOnce(&DispatchState) + Send>;

/// Work items processed by the dispatcher task, in arrival order
pub enum DispatchCommand {
    Connect {
        connection_id: ConnectionId,
        tx: Outbound,
        credential: Option<String>,
    },
    Event {
        connection_id: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    /// Read-only access to the state; the closure carries its own reply channel
    Query(QueryFn),
}

/// Cheap, cloneable handle to the dispatcher task
#[derive(Clone)]
pub struct Dispatcher {
    commands: mpsc::Sender<DispatchCommand>,
}

impl Dispatcher {
    /// Spawn the dispatcher task owning `state`
    ///
    /// The task stops once every `Dispatcher` handle is dropped.
    pub fn spawn(state: DispatchState, buffer: usize) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(buffer);
        let handle = tokio::spawn(run(state, rx));
        (Self { commands }, handle)
    }

    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        tx: Outbound,
        credential: Option<String>,
    ) -> Result<(), DispatchError> {
        self.send(DispatchCommand::Connect {
            connection_id,
            tx,
            credential,
        })
        .await
    }

    pub async fn event(
        &self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), DispatchError> {
        self.send(DispatchCommand::Event {
            connection_id,
            event,
        })
        .await
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), DispatchError> {
        self.send(DispatchCommand::Disconnect { connection_id }).await
    }

    /// Run `f` against the state on the dispatcher task and return its result
    pub async fn query<T, F>(&self, f: F) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: FnOnce(&DispatchState) -> T + Send + 'static,
    {
        let (reply, answer) = oneshot::channel();
        self.send(DispatchCommand::Query(Box::new(move |state| {
            // The caller may have gone away; nothing to do then
            let _ = reply.send(f(state));
        })))
        .await?;
        answer.await.map_err(|_| DispatchError::DispatcherClosed)
    }

    pub async fn status_report(&self) -> Result<StatusReport, DispatchError> {
        self.query(DispatchState::status_report).await
    }

    pub async fn all_locations(&self) -> Result<Vec<LocationRecord>, DispatchError> {
        self.query(DispatchState::all_locations).await
    }

    pub async fn ambulance_location(&self, ambulance_id: String) -> Result<LocationRecord, DispatchError> {
        self.query(move |state| state.ambulance_location(&ambulance_id))
            .await?
    }

    pub async fn booking_ambulance(&self, booking_id: String) -> Result<BookingAmbulance, DispatchError> {
        self.query(move |state| state.booking_ambulance(&booking_id))
            .await?
    }

    async fn send(&self, command: DispatchCommand) -> Result<(), DispatchError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DispatchError::DispatcherClosed)
    }
}

async fn run(mut state: DispatchState, mut commands: mpsc::Receiver<DispatchCommand>) {
    tracing::info!("Dispatch loop started");

    while let Some(command) = commands.recv().await {
        match command {
            DispatchCommand::Connect {
                connection_id,
                tx,
                credential,
            } => state.connect(connection_id, tx, credential),
            DispatchCommand::Event {
                connection_id,
                event,
            } => {
                tracing::trace!(connection_id = %connection_id, event = event.name(), "Dispatching event");
                state.handle(&connection_id, event);
            }
            DispatchCommand::Disconnect { connection_id } => state.disconnect(&connection_id),
            DispatchCommand::Query(f) => f(&state),
        }
    }

    tracing::info!("Dispatch loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{AmbulanceIdentifyPayload, AmbulanceLocationPayload, ServerEvent};
    use crate::core::model::{ActorRole, Coordinates};

    #[tokio::test]
    async fn test_commands_apply_in_order() {
        let (dispatcher, _task) = Dispatcher::spawn(DispatchState::default(), 16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::from("c1");

        dispatcher.connect(conn.clone(), tx, None).await.unwrap();
        dispatcher
            .event(
                conn.clone(),
                ClientEvent::IdentifyAmbulance(AmbulanceIdentifyPayload {
                    ambulance_id: "amb1".to_string(),
                    driver_id: "d1".to_string(),
                }),
            )
            .await
            .unwrap();
        dispatcher
            .event(
                conn.clone(),
                ClientEvent::AmbulanceLocation(AmbulanceLocationPayload {
                    ambulance_id: "amb1".to_string(),
                    location: Coordinates::new(10.0, 20.0),
                    booking_id: None,
                }),
            )
            .await
            .unwrap();

        let record = dispatcher.ambulance_location("amb1".to_string()).await.unwrap();
        assert_eq!(record.coordinates(), Coordinates::new(10.0, 20.0));
        assert!(matches!(rx.recv().await, Some(ServerEvent::AmbulanceConnected { .. })));

        let report = dispatcher.status_report().await.unwrap();
        assert_eq!(report.connected_clients.ambulances, 1);

        dispatcher.disconnect(conn).await.unwrap();
        let count = dispatcher
            .query(|state| state.registry().count_by_role(ActorRole::Ambulance))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(dispatcher.all_locations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_booking_is_not_found() {
        let (dispatcher, _task) = Dispatcher::spawn(DispatchState::default(), 4);
        let err = dispatcher
            .booking_ambulance("bk-none".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoAssignment { .. }));
    }

    #[tokio::test]
    async fn test_closed_dispatcher_reports_error() {
        let (dispatcher, task) = Dispatcher::spawn(DispatchState::default(), 4);
        task.abort();
        let _ = task.await;

        let err = dispatcher.status_report().await.unwrap_err();
        assert!(matches!(err, DispatchError::DispatcherClosed));
    }
}
