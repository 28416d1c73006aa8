//! Inventa Agent Library
//!
//! Core modules for the Inventa endpoint agent.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod probes;
pub mod queue;
pub mod storage;
pub mod telemetry;
pub mod transport;
pub mod utils;
pub mod workers;
