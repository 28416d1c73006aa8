//! Crash-durable local queue for collected inventory records

pub mod record;
pub mod store;
