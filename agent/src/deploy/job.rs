//! Deployment job model and status state machine

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job status state machine
///
/// ```text
/// pending -> running -> {success, failed, rolled_back}
/// ```
///
/// Terminal states are never left; a job object is executed exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Received, not yet started
    #[default]
    Pending,

    /// Execution in progress
    Running,

    /// Compatibility check, all checks and all actions passed
    Success,

    /// Failed before any state changed, or with no rollback defined
    Failed,

    /// An action or post-check failed and rollback actions ran
    RolledBack,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::RolledBack
        )
    }

    /// Guarded transition; terminal states and skips are rejected
    pub fn advance(&mut self, to: JobStatus) -> Result<(), String> {
        let valid = matches!(
            (*self, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Success)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::RolledBack)
        );
        if !valid {
            return Err(format!("Invalid transition: {:?} -> {:?}", self, to));
        }
        *self = to;
        Ok(())
    }
}

/// A precondition or postcondition primitive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// The given filesystem path must exist
    PathExists { path: PathBuf },

    /// The named service must be in the running state
    ServiceRunning { service: String },
}

/// One executable deployment step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Fetch a URL to a local path, verifying the job's expected content
    /// hash when one is declared
    Download { url: String, dest: PathBuf },

    /// Invoke the platform package installer on a local artifact
    Install { artifact: PathBuf },

    /// Run an arbitrary executable with arguments
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// One remote-directed change to host state.
///
/// A job exclusively owns its checks, actions and rollback list; none are
/// shared across jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentJob {
    /// Unique job identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Target version being deployed
    #[serde(default)]
    pub version: String,

    /// Compatible operating systems (e.g. "linux", "windows")
    pub target_os: Vec<String>,

    /// Compatible architectures (e.g. "x86_64", "aarch64")
    pub target_arch: Vec<String>,

    /// Pre-condition checks, run in order before any action
    #[serde(default)]
    pub pre_checks: Vec<Check>,

    /// Actions, run in declared order
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Post-condition checks, run in order after all actions
    #[serde(default)]
    pub post_checks: Vec<Check>,

    /// Remediation steps, run only on failure
    #[serde(default)]
    pub rollback_actions: Vec<Action>,

    /// Expected content hashes for downloaded artifacts (algorithm -> hex)
    #[serde(default)]
    pub expected_hashes: HashMap<String, String>,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Execution start time
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Execution end time
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,

    /// Message of the error that decided the terminal status
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Final outcome posted back to the management service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatusReport {
    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentJob {
    /// Build the status report for this job's current state
    pub fn status_report(&self) -> DeploymentStatusReport {
        DeploymentStatusReport {
            status: self.status,
            error_message: self.last_error.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_happy_path() {
        let mut status = JobStatus::Pending;
        status.advance(JobStatus::Running).unwrap();
        status.advance(JobStatus::Success).unwrap();
        assert!(status.is_terminal());
    }

    #[test]
    fn test_status_rollback_path() {
        let mut status = JobStatus::Pending;
        status.advance(JobStatus::Running).unwrap();
        status.advance(JobStatus::RolledBack).unwrap();
        assert_eq!(status, JobStatus::RolledBack);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut status = JobStatus::Pending;
        status.advance(JobStatus::Running).unwrap();
        status.advance(JobStatus::Failed).unwrap();

        assert!(status.advance(JobStatus::Running).is_err());
        assert!(status.advance(JobStatus::Success).is_err());
    }

    #[test]
    fn test_cannot_skip_running() {
        let mut status = JobStatus::Pending;
        assert!(status.advance(JobStatus::Success).is_err());
        assert_eq!(status, JobStatus::Pending);
    }

    #[test]
    fn test_status_wire_format() {
        let raw = serde_json::to_string(&JobStatus::RolledBack).unwrap();
        assert_eq!(raw, "\"rolled_back\"");
    }
}
