//! Core types: domain model, wire events, errors and identity verification

pub mod auth;
pub mod error;
pub mod events;
pub mod model;

pub use auth::{IdentityVerifier, StaticTokenVerifier, TrustingVerifier};
pub use error::{ConfigError, DispatchError, EventError};
pub use events::{ClientEvent, ServerEvent};
pub use model::{
    ActorRole, BookingStatus, ConnectionId, Coordinates, Identity, LocationRecord, RoomKey,
};
