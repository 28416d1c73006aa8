//! Network interface probe

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sysinfo::Networks;

use crate::errors::AgentError;
use crate::probes::Probe;

/// Interface names, MACs and traffic counters
pub struct NetworkProbe;

impl NetworkProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NetworkProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    fn name(&self) -> &str {
        "network"
    }

    async fn collect(&self) -> Result<Map<String, Value>, AgentError> {
        let networks = Networks::new_with_refreshed_list();

        let interfaces: Vec<Value> = networks
            .iter()
            .map(|(name, data)| {
                json!({
                    "name": name,
                    "mac": data.mac_address().to_string(),
                    "received": data.total_received(),
                    "transmitted": data.total_transmitted(),
                })
            })
            .collect();

        let mut facts = Map::new();
        facts.insert("interfaces".to_string(), Value::Array(interfaces));
        Ok(facts)
    }
}
