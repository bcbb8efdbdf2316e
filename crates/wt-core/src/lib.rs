//! Activity accounting engine for the web time tracker.
//!
//! This crate contains the parts of the engine that never block:
//! - Classification: productive / unproductive / neutral per domain
//! - Focus tracking and idle detection, producing closed spans
//! - Accumulation of spans into per-domain buckets
//! - The local buffer seam used by the sync manager

mod accumulator;
mod bucket;
pub mod buffer;
pub mod classify;
mod domain;
pub mod event;
pub mod focus;
pub mod idle;
mod tracker;
pub mod types;

pub use accumulator::{Accumulator, Span};
pub use bucket::{Buckets, TimeBucket};
pub use buffer::{BufferKey, LocalBuffer, MemoryBuffer};
pub use classify::RuleSet;
pub use domain::domain_from_url;
pub use event::HostEvent;
pub use focus::{FocusTarget, FocusTracker};
pub use idle::{IdleMonitor, IdleState, IdleTransition};
pub use tracker::{Tracker, TrackerStatus};
pub use types::{Classification, Domain, Identity, ValidationError};
