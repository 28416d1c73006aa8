//! Deployment job engine

pub mod actions;
pub mod checks;
pub mod engine;
pub mod job;
