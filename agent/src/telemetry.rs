//! Heartbeat telemetry

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

use crate::deploy::job::JobStatus;
use crate::queue::store::QueueStats;

/// Host resource snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// CPU usage percentage (0-100)
    pub cpu_usage: f32,

    /// Memory usage in bytes
    pub memory_used: u64,

    /// Total memory in bytes
    pub memory_total: u64,

    /// Disk usage in bytes across all volumes
    pub disk_used: u64,

    /// Total disk space in bytes
    pub disk_total: u64,

    /// System uptime in seconds
    pub uptime_secs: u64,

    /// Hostname
    pub hostname: String,
}

/// Collect a host resource snapshot
pub fn collect_metrics() -> SystemMetrics {
    let mut sys = System::new_all();
    sys.refresh_all();

    let disks = Disks::new_with_refreshed_list();
    let (disk_used, disk_total) = disks.iter().fold((0u64, 0u64), |(used, total), disk| {
        (
            used + (disk.total_space() - disk.available_space()),
            total + disk.total_space(),
        )
    });

    SystemMetrics {
        cpu_usage: sys.global_cpu_usage(),
        memory_used: sys.used_memory(),
        memory_total: sys.total_memory(),
        disk_used,
        disk_total,
        uptime_secs: System::uptime(),
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Deployment job counts by state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCounts {
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub rolled_back: usize,
}

impl JobCounts {
    pub fn from_counts(counts: &std::collections::HashMap<JobStatus, usize>) -> Self {
        Self {
            running: counts.get(&JobStatus::Running).copied().unwrap_or(0),
            success: counts.get(&JobStatus::Success).copied().unwrap_or(0),
            failed: counts.get(&JobStatus::Failed).copied().unwrap_or(0),
            rolled_back: counts.get(&JobStatus::RolledBack).copied().unwrap_or(0),
        }
    }
}

/// Heartbeat document posted to the telemetry endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Agent version
    pub agent_version: String,

    /// Host OS
    pub os: String,

    /// Host architecture
    pub arch: String,

    /// Host resource snapshot
    pub system: SystemMetrics,

    /// Queue partition sizes
    pub queue: QueueStats,

    /// Deployment job counts
    pub jobs: JobCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_job_counts_from_status_map() {
        let mut counts: HashMap<JobStatus, usize> = HashMap::new();
        counts.insert(JobStatus::Running, 1);
        counts.insert(JobStatus::Success, 2);
        counts.insert(JobStatus::RolledBack, 3);

        let jobs = JobCounts::from_counts(&counts);
        assert_eq!(jobs.running, 1);
        assert_eq!(jobs.success, 2);
        assert_eq!(jobs.failed, 0);
        assert_eq!(jobs.rolled_back, 3);
    }
}
