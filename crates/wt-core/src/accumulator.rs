//! In-memory accumulation of spans for the current unflushed window.

use crate::bucket::Buckets;
use crate::types::{Classification, Domain};

/// A contiguous stretch of time attributed to one domain.
///
/// `classification` is `None` for spans closed by idle entry: the user was
/// not engaged, so the time counts toward the bucket total only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub domain: Domain,
    pub duration_ms: u64,
    pub classification: Option<Classification>,
}

/// Owns the live bucket map.
#[derive(Debug, Default)]
pub struct Accumulator {
    buckets: Buckets,
}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            buckets: Buckets::new(),
        }
    }

    /// Applies a closed span to its domain's bucket.
    pub fn add_span(&mut self, span: &Span) {
        self.buckets
            .add_span(&span.domain, span.duration_ms, span.classification);
    }

    /// Returns every bucket accumulated so far and starts a fresh window.
    ///
    /// This never suspends, so a span is either fully in the returned map or
    /// fully in the next window.
    pub fn take_snapshot_and_reset(&mut self) -> Buckets {
        std::mem::take(&mut self.buckets)
    }

    /// Read-only view of the live buckets.
    pub const fn peek(&self) -> &Buckets {
        &self.buckets
    }
}
