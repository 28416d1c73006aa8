//! Periodic worker tasks

pub mod collector;
pub mod deployer;
pub mod drain;
pub mod heartbeat;
