//! Server host for transport-agnostic exposure
//!
//! `ServerHost` holds everything an exposure needs: the configuration and a
//! handle to the running dispatcher. REST and WebSocket routers are both
//! built from the same host, so they observe the same state.

use crate::config::DispatchConfig;
use crate::core::auth::IdentityVerifier;
use crate::dispatch::{DispatchState, Dispatcher};
use std::sync::Arc;

/// Host context shared by every exposure
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(ServerHost::start(config, Arc::new(TrustingVerifier)));
/// let rest_app = RestExposure::build_router(host.clone(), vec![])?;
/// let ws_app = WebSocketExposure::build_router(host)?;
/// ```
pub struct ServerHost {
    /// Effective configuration (file + environment)
    pub config: Arc<DispatchConfig>,

    /// Handle to the dispatcher task
    pub dispatcher: Dispatcher,
}

impl ServerHost {
    /// Spawn the dispatcher and build the host around it
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: DispatchConfig, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let state = DispatchState::new(config.monitoring, verifier);
        let (dispatcher, _task) = Dispatcher::spawn(state, config.command_buffer);

        tracing::debug!(
            monitoring = ?config.monitoring,
            command_buffer = config.command_buffer,
            "Dispatcher started"
        );

        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}
