//! Pull-style configuration and policy fetches

use serde_json::Value;

use crate::errors::AgentError;
use crate::transport::client::Transport;

impl Transport {
    /// Fetch the remote agent configuration document
    pub async fn fetch_config(&self) -> Result<Value, AgentError> {
        self.get_json("/agent/config").await
    }

    /// Fetch the current policy documents
    pub async fn fetch_policies(&self) -> Result<Value, AgentError> {
        self.get_json("/agent/policies").await
    }
}
