//! Reliable network transport to the management service

pub mod client;
pub mod deployments;
pub mod ingest;
pub mod remote_config;
