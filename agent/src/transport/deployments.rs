//! Deployment job API client

use serde::Deserialize;

use crate::deploy::job::{DeploymentJob, DeploymentStatusReport};
use crate::errors::AgentError;
use crate::transport::client::Transport;

/// List of deployment jobs response
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentListResponse {
    pub deployments: Vec<DeploymentJob>,
}

impl Transport {
    /// Fetch deployment jobs directed at this host
    pub async fn fetch_deployments(&self) -> Result<Vec<DeploymentJob>, AgentError> {
        let response: DeploymentListResponse = self.get_json("/agent/deployments").await?;
        Ok(response.deployments)
    }

    /// Post a job's final status and error message
    pub async fn send_deployment_status(
        &self,
        job_id: &str,
        report: &DeploymentStatusReport,
    ) -> Result<(), AgentError> {
        let path = format!("/agent/deployments/{}/status", job_id);
        self.post_json(&path, report).await
    }
}
