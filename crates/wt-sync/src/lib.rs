//! Delivery of accumulated time to the remote collector.
//!
//! [`SyncManager`] drains the accumulator on every sync tick and either
//! gets an acknowledgement from the [`Collector`] or merges the snapshot
//! into the local buffer for the next attempt.

mod collector;
mod manager;

pub use collector::{
    Collector, DEFAULT_TIMEOUT, Delivery, DeliveryError, HttpCollector, WeeklyReport,
};
pub use manager::{FlushOutcome, SyncManager, SyncState};
