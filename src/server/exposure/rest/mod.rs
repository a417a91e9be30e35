//! REST API exposure
//!
//! Read-only views of the dispatch state plus health checks. Every handler
//! goes through the dispatcher, so answers reflect all events applied before
//! the request arrived.
//!
//! | Route                               | Answer                                  |
//! |-------------------------------------|-----------------------------------------|
//! | `GET /api/status`                   | connection and activity counters        |
//! | `GET /api/ambulances/locations`     | every cached ambulance location         |
//! | `GET /api/ambulances/{id}/location` | one ambulance, 404 if not cached        |
//! | `GET /api/bookings/{id}/ambulance`  | assigned ambulance, 404 if unassigned   |

use super::super::host::ServerHost;
use crate::core::error::DispatchError;
use crate::core::model::LocationRecord;
use crate::dispatch::{BookingAmbulance, StatusReport};
use anyhow::Result;
use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with:
    /// - Health check routes
    /// - Status query routes
    /// - Custom routes
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let mut app = Self::health_routes().merge(Self::status_routes(host));

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app)
    }

    fn status_routes(host: Arc<ServerHost>) -> Router {
        Router::new()
            .route("/api/status", get(status))
            .route("/api/ambulances/locations", get(all_locations))
            .route("/api/ambulances/{id}/location", get(ambulance_location))
            .route("/api/bookings/{id}/ambulance", get(booking_ambulance))
            .with_state(host)
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "ambulance-dispatch"
        }))
    }
}

async fn status(State(host): State<Arc<ServerHost>>) -> Result<Json<StatusReport>, DispatchError> {
    Ok(Json(host.dispatcher().status_report().await?))
}

async fn all_locations(
    State(host): State<Arc<ServerHost>>,
) -> Result<Json<Vec<LocationRecord>>, DispatchError> {
    Ok(Json(host.dispatcher().all_locations().await?))
}

async fn ambulance_location(
    State(host): State<Arc<ServerHost>>,
    Path(id): Path<String>,
) -> Result<Json<LocationRecord>, DispatchError> {
    Ok(Json(host.dispatcher().ambulance_location(id).await?))
}

async fn booking_ambulance(
    State(host): State<Arc<ServerHost>>,
    Path(id): Path<String>,
) -> Result<Json<BookingAmbulance>, DispatchError> {
    Ok(Json(host.dispatcher().booking_ambulance(id).await?))
}
