//! # Ambulance Dispatch
//!
//! Real-time coordination hub between patients, drivers and ambulances.
//!
//! Clients hold a WebSocket open, identify themselves, and exchange events:
//! ambulances stream their position, a dispatcher pairs a booking with an
//! ambulance, and everyone tracking that booking hears about it.
//!
//! ## Features
//!
//! - **Single-owner state**: one dispatcher task applies events in order
//! - **Booking rooms**: position, status, ETA and alerts scoped to a booking
//! - **Last-known location**: late trackers get the latest position at once
//! - **Monitoring feed**: fleet-wide positions for every client or subscribers only
//! - **Status API**: read-only HTTP views of connections, locations and assignments
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dispatch::prelude::*;
//!
//! let config = DispatchConfig::load()?;
//! ServerBuilder::new().with_config(config).serve().await?;
//! ```

pub mod config;
pub mod core;
pub mod dispatch;
pub mod server;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ActorRole, BookingStatus, ClientEvent, ConnectionId, Coordinates, DispatchError,
        Identity, IdentityVerifier, LocationRecord, RoomKey, ServerEvent, StaticTokenVerifier,
        TrustingVerifier,
    };

    // === Dispatch ===
    pub use crate::dispatch::{DispatchState, Dispatcher, StatusReport};

    // === Config ===
    pub use crate::config::{DispatchConfig, MonitoringScope};

    // === Server ===
    pub use crate::server::{RestExposure, ServerBuilder, ServerHost, WebSocketExposure};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
}
