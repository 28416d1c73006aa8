//! Deployment job engine
//!
//! Executes a job to completion or to a safely rolled-back state and
//! reports the outcome. Nothing on the host changes before the
//! compatibility gate and the pre-checks pass, so failures in those
//! stages never trigger rollback.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::deploy::actions::run_action;
use crate::deploy::checks::run_check;
use crate::deploy::job::{DeploymentJob, JobStatus};
use crate::errors::AgentError;
use crate::transport::client::Transport;

/// The executing host's identity, against which the compatibility gate
/// is evaluated
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    /// Identity of the machine this process runs on
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// How a failed stage decides the terminal status
struct StageFailure {
    /// Whether rollback actions may run (false while nothing changed)
    rollback_eligible: bool,
    message: String,
}

impl StageFailure {
    fn fail_fast(message: String) -> Self {
        Self {
            rollback_eligible: false,
            message,
        }
    }

    fn after_changes(message: String) -> Self {
        Self {
            rollback_eligible: true,
            message,
        }
    }
}

/// Deployment job engine with an owned, lock-guarded job registry
pub struct DeploymentEngine {
    jobs: RwLock<HashMap<String, DeploymentJob>>,
    host: HostInfo,
    transport: Arc<Transport>,
}

impl DeploymentEngine {
    pub fn new(host: HostInfo, transport: Arc<Transport>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            host,
            transport,
        }
    }

    /// Status lookup for the administrative layer
    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).map(|job| job.status)
    }

    /// Full job record lookup
    pub async fn job(&self, job_id: &str) -> Option<DeploymentJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Whether a job id has already been registered
    pub async fn is_registered(&self, job_id: &str) -> bool {
        self.jobs.read().await.contains_key(job_id)
    }

    /// Job counts by terminal state, for telemetry
    pub async fn job_counts(&self) -> HashMap<JobStatus, usize> {
        let jobs = self.jobs.read().await;
        let mut counts = HashMap::new();
        for job in jobs.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }

    /// Execute a job to a terminal state and report the outcome.
    ///
    /// Returns `Ok` only for `success`; a `failed` or `rolled_back`
    /// terminal state surfaces the triggering error. A job id is
    /// executed exactly once — re-submission is rejected.
    pub async fn execute(&self, mut job: DeploymentJob) -> Result<(), AgentError> {
        {
            let mut jobs = self.jobs.write().await;
            if jobs.contains_key(&job.id) {
                return Err(AgentError::DeployError(format!(
                    "Job already executed: {}",
                    job.id
                )));
            }

            job.status = JobStatus::Pending;
            job.status
                .advance(JobStatus::Running)
                .map_err(AgentError::DeployError)?;
            job.started_at = Some(Utc::now());
            jobs.insert(job.id.clone(), job.clone());
        }

        info!("Executing deployment job {} ({})", job.id, job.name);

        let outcome = self.run_stages(&job).await;
        let result = match outcome {
            Ok(()) => {
                job.status
                    .advance(JobStatus::Success)
                    .map_err(AgentError::DeployError)?;
                info!("Job {} succeeded", job.id);
                Ok(())
            }
            Err(failure) => {
                let terminal = if failure.rollback_eligible && !job.rollback_actions.is_empty() {
                    self.run_rollback(&job).await;
                    JobStatus::RolledBack
                } else {
                    JobStatus::Failed
                };
                job.status
                    .advance(terminal)
                    .map_err(AgentError::DeployError)?;
                job.last_error = Some(failure.message.clone());
                error!("Job {} ended as {:?}: {}", job.id, terminal, failure.message);
                Err(AgentError::DeployError(failure.message))
            }
        };

        job.finished_at = Some(Utc::now());

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(job.id.clone(), job.clone());
        }

        // Fire-and-forget: a reporting failure is logged, never treated
        // as a job failure.
        if let Err(e) = self
            .transport
            .send_deployment_status(&job.id, &job.status_report())
            .await
        {
            warn!("Failed to report status for job {}: {}", job.id, e);
        }

        result
    }

    async fn run_stages(&self, job: &DeploymentJob) -> Result<(), StageFailure> {
        // Compatibility gate: nothing has changed yet, so no rollback.
        if !job.target_os.iter().any(|os| os == &self.host.os) {
            return Err(StageFailure::fail_fast(format!(
                "Host OS {} not in compatible list {:?}",
                self.host.os, job.target_os
            )));
        }
        if !job.target_arch.iter().any(|arch| arch == &self.host.arch) {
            return Err(StageFailure::fail_fast(format!(
                "Host arch {} not in compatible list {:?}",
                self.host.arch, job.target_arch
            )));
        }

        for (idx, check) in job.pre_checks.iter().enumerate() {
            if let Err(e) = run_check(check).await {
                return Err(StageFailure::fail_fast(format!(
                    "Pre-check {} failed: {}",
                    idx, e
                )));
            }
        }

        for (idx, action) in job.actions.iter().enumerate() {
            if let Err(e) = run_action(action, &self.transport, &job.expected_hashes).await {
                return Err(StageFailure::after_changes(format!(
                    "Action {} failed: {}",
                    idx, e
                )));
            }
        }

        for (idx, check) in job.post_checks.iter().enumerate() {
            if let Err(e) = run_check(check).await {
                return Err(StageFailure::after_changes(format!(
                    "Post-check {} failed: {}",
                    idx, e
                )));
            }
        }

        Ok(())
    }

    /// Run every rollback action in order, best-effort: a failing step is
    /// logged and the rest still run.
    async fn run_rollback(&self, job: &DeploymentJob) {
        info!(
            "Rolling back job {} ({} actions)",
            job.id,
            job.rollback_actions.len()
        );

        for (idx, action) in job.rollback_actions.iter().enumerate() {
            if let Err(e) = run_action(action, &self.transport, &job.expected_hashes).await {
                warn!("Rollback action {} for job {} failed: {}", idx, job.id, e);
            }
        }
    }
}
