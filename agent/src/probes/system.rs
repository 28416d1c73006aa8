//! System facts probe

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sysinfo::System;

use crate::errors::AgentError;
use crate::probes::Probe;

/// Host, OS and resource facts
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for SystemProbe {
    fn name(&self) -> &str {
        "system"
    }

    async fn collect(&self) -> Result<Map<String, Value>, AgentError> {
        let mut sys = System::new_all();
        sys.refresh_all();

        let mut facts = Map::new();
        facts.insert(
            "hostname".to_string(),
            json!(System::host_name().unwrap_or_else(|| "unknown".to_string())),
        );
        facts.insert("os".to_string(), json!(std::env::consts::OS));
        facts.insert("arch".to_string(), json!(std::env::consts::ARCH));
        facts.insert(
            "os_version".to_string(),
            json!(System::os_version().unwrap_or_default()),
        );
        facts.insert(
            "kernel_version".to_string(),
            json!(System::kernel_version().unwrap_or_default()),
        );
        facts.insert("cpu_count".to_string(), json!(sys.cpus().len()));
        facts.insert("memory_total".to_string(), json!(sys.total_memory()));
        facts.insert("memory_used".to_string(), json!(sys.used_memory()));
        facts.insert("uptime_secs".to_string(), json!(System::uptime()));

        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_probe_collects_core_facts() {
        let probe = SystemProbe::new();
        let facts = probe.collect().await.unwrap();

        assert!(facts.contains_key("hostname"));
        assert_eq!(facts["os"], json!(std::env::consts::OS));
        assert!(facts["cpu_count"].as_u64().unwrap() > 0);
    }
}
