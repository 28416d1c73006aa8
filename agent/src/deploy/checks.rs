//! Pre/post-condition check execution

use tokio::process::Command;
use tracing::debug;

use crate::deploy::job::Check;
use crate::errors::AgentError;

/// Run one check; an `Err` means the condition does not hold
pub async fn run_check(check: &Check) -> Result<(), AgentError> {
    match check {
        Check::PathExists { path } => {
            debug!("Checking path exists: {}", path.display());
            if tokio::fs::metadata(path).await.is_ok() {
                Ok(())
            } else {
                Err(AgentError::DeployError(format!(
                    "Path does not exist: {}",
                    path.display()
                )))
            }
        }
        Check::ServiceRunning { service } => {
            debug!("Checking service running: {}", service);
            service_running(service).await
        }
    }
}

#[cfg(target_os = "linux")]
async fn service_running(service: &str) -> Result<(), AgentError> {
    let status = Command::new("systemctl")
        .args(["is-active", "--quiet", service])
        .status()
        .await
        .map_err(|e| AgentError::DeployError(format!("Failed to query systemctl: {}", e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(AgentError::DeployError(format!(
            "Service is not running: {}",
            service
        )))
    }
}

#[cfg(target_os = "macos")]
async fn service_running(service: &str) -> Result<(), AgentError> {
    let status = Command::new("launchctl")
        .args(["list", service])
        .status()
        .await
        .map_err(|e| AgentError::DeployError(format!("Failed to query launchctl: {}", e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(AgentError::DeployError(format!(
            "Service is not loaded: {}",
            service
        )))
    }
}

#[cfg(target_os = "windows")]
async fn service_running(service: &str) -> Result<(), AgentError> {
    let output = Command::new("sc")
        .args(["query", service])
        .output()
        .await
        .map_err(|e| AgentError::DeployError(format!("Failed to query sc: {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if output.status.success() && stdout.contains("RUNNING") {
        Ok(())
    } else {
        Err(AgentError::DeployError(format!(
            "Service is not running: {}",
            service
        )))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
async fn service_running(service: &str) -> Result<(), AgentError> {
    let _ = service;
    Err(AgentError::DeployError(
        "Service checks are not supported on this platform".to_string(),
    ))
}
