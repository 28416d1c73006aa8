//! Disk inventory probe

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sysinfo::Disks;

use crate::errors::AgentError;
use crate::probes::Probe;

/// Mounted disks and capacity facts
pub struct StorageProbe;

impl StorageProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StorageProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for StorageProbe {
    fn name(&self) -> &str {
        "storage"
    }

    async fn collect(&self) -> Result<Map<String, Value>, AgentError> {
        let disks = Disks::new_with_refreshed_list();

        let volumes: Vec<Value> = disks
            .iter()
            .map(|disk| {
                json!({
                    "name": disk.name().to_string_lossy(),
                    "mount_point": disk.mount_point().to_string_lossy(),
                    "file_system": disk.file_system().to_string_lossy(),
                    "total_bytes": disk.total_space(),
                    "available_bytes": disk.available_space(),
                })
            })
            .collect();

        let mut facts = Map::new();
        facts.insert("volumes".to_string(), Value::Array(volumes));
        Ok(facts)
    }
}
