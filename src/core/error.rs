//! Typed error handling for the dispatch coordinator
//!
//! # Error Categories
//!
//! - [`DispatchError`]: errors surfaced by the dispatcher and the status queries
//! - [`EventError`]: an inbound event was refused
//! - [`ConfigError`]: configuration parsing and validation failures
//!
//! An [`EventError`] never reaches the sender; it is logged and the event is
//! dropped. Only [`DispatchError`] turns into HTTP responses.

use crate::core::model::ActorRole;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// The main error type of the dispatch coordinator
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No location is cached for this ambulance
    #[error("Ambulance '{id}' not found")]
    AmbulanceNotFound { id: String },

    /// The booking has no active assignment
    #[error("No ambulance assigned to booking '{booking_id}'")]
    NoAssignment { booking_id: String },

    /// The dispatcher task has stopped
    #[error("Dispatcher is not running")]
    DispatcherClosed,
}

/// Why an inbound event was dropped
#[derive(Debug, Error)]
pub enum EventError {
    /// The identity verifier refused a claimed identity
    #[error("Identity rejected for {role} '{actor_id}': {reason}")]
    IdentityRejected {
        role: ActorRole,
        actor_id: String,
        reason: String,
    },

    /// An inbound event failed validation
    #[error("Invalid payload for '{event}': {reason}")]
    InvalidPayload { event: &'static str, reason: String },
}

impl EventError {
    pub fn invalid(event: &'static str, reason: impl Into<String>) -> Self {
        EventError::InvalidPayload {
            event,
            reason: reason.into(),
        }
    }
}

/// Configuration errors, reported before the server starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("Invalid allowed origin '{origin}'")]
    InvalidOrigin { origin: String },
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl DispatchError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::AmbulanceNotFound { .. } | DispatchError::NoAssignment { .. } => {
                StatusCode::NOT_FOUND
            }
            DispatchError::DispatcherClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DispatchError::AmbulanceNotFound { .. } => "AMBULANCE_NOT_FOUND",
            DispatchError::NoAssignment { .. } => "ASSIGNMENT_NOT_FOUND",
            DispatchError::DispatcherClosed => "DISPATCHER_UNAVAILABLE",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Query failed");
        }
        (status, Json(self.to_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_variants_map_to_404() {
        let err = DispatchError::NoAssignment {
            booking_id: "bk-unknown".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "ASSIGNMENT_NOT_FOUND");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("bk-unknown"));

        let err = DispatchError::AmbulanceNotFound {
            id: "amb9".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_dispatcher_closed_is_unavailable() {
        let err = DispatchError::DispatcherClosed;
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_identity_rejected_message() {
        let err = EventError::IdentityRejected {
            role: ActorRole::Ambulance,
            actor_id: "amb1".to_string(),
            reason: "token does not match".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Identity rejected for ambulance 'amb1': token does not match"
        );
    }

    #[test]
    fn test_error_response_shape() {
        let response = DispatchError::AmbulanceNotFound {
            id: "amb9".to_string(),
        }
        .to_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], "AMBULANCE_NOT_FOUND");
        assert_eq!(json["message"], "Ambulance 'amb9' not found");
    }

    #[test]
    fn test_invalid_payload_message() {
        let err = EventError::invalid("booking:assign", "empty bookingId");
        assert_eq!(
            err.to_string(),
            "Invalid payload for 'booking:assign': empty bookingId"
        );
    }
}
