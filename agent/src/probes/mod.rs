//! Inventory probes
//!
//! A probe produces one snapshot of host facts as an opaque JSON map.
//! The registry maps probe names to instances and is populated by host
//! platform at startup; nothing downstream depends on which variants
//! exist.

pub mod network;
pub mod storage;
pub mod system;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::AgentError;

/// Capability interface every probe implements
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable probe name, used as the registry key
    fn name(&self) -> &str;

    /// Permissions the probe needs on this host (informational)
    fn required_permissions(&self) -> &[&str] {
        &[]
    }

    /// Produce one snapshot of host facts
    async fn collect(&self) -> Result<Map<String, Value>, AgentError>;
}

/// Name-to-instance probe registry
#[derive(Default)]
pub struct ProbeRegistry {
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self { probes: Vec::new() }
    }

    pub fn register(&mut self, probe: Arc<dyn Probe>) {
        self.probes.push(probe);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Probe>> {
        self.probes.iter().find(|p| p.name() == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Probe>> {
        self.probes.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

/// Build the registry for the current host platform
pub fn platform_registry() -> ProbeRegistry {
    let mut registry = ProbeRegistry::new();

    registry.register(Arc::new(system::SystemProbe::new()));
    registry.register(Arc::new(storage::StorageProbe::new()));

    // Interface enumeration needs no elevated permissions on the
    // platforms we ship for; register it everywhere.
    registry.register(Arc::new(network::NetworkProbe::new()));

    registry
}
