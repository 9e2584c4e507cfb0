//! Credential agent collaborator.
//!
//! ConnMan asks a registered agent for passphrases and similar input while a
//! service connects. This crate does not export an agent on the bus; it only
//! carries the application's agent around so that `connect` can hand it back
//! to the caller.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::Result;
use crate::api::models::{ConnmanError, PropertyMap};

/// Error name the daemon expects when the user declines a request.
pub const CANCELED: &str = "net.connman.Agent.Error.Canceled";

fn canceled() -> ConnmanError {
    ConnmanError::Remote {
        name: CANCELED.to_string(),
        message: "request declined".to_string(),
    }
}

/// Answers the daemon's credential and authorization prompts.
///
/// Every method has a default: requests for input or a browser are
/// declined with [`CANCELED`], notifications are ignored.
#[async_trait]
pub trait Agent: Debug + Send + Sync {
    /// The daemon unregistered the agent.
    async fn release(&self) {}

    /// A connection attempt on `service` failed with `error`.
    async fn report_error(&self, _service: &str, _error: &str) -> Result<()> {
        Ok(())
    }

    /// The service needs a web login at `url`.
    async fn request_browser(&self, _service: &str, _url: &str) -> Result<()> {
        Err(canceled())
    }

    /// The daemon needs the listed `fields` (e.g. `Passphrase`) for `service`.
    async fn request_input(&self, _service: &str, _fields: &PropertyMap) -> Result<PropertyMap> {
        Err(canceled())
    }

    /// The pending request was cancelled by the daemon.
    async fn cancel(&self) {}
}

/// Opaque reference to the application's agent, returned by `connect`.
#[derive(Debug, Clone, Default)]
pub struct AgentHandle {
    agent: Option<Arc<dyn Agent>>,
}

impl AgentHandle {
    pub(crate) fn new(agent: Option<Arc<dyn Agent>>) -> Self {
        Self { agent }
    }

    /// Returns true if an agent was configured on the manager.
    pub fn is_set(&self) -> bool {
        self.agent.is_some()
    }

    pub fn agent(&self) -> Option<&Arc<dyn Agent>> {
        self.agent.as_ref()
    }
}
