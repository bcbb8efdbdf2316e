//! Snapshot delivery with a durable local buffer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use wt_core::{Accumulator, BufferKey, Buckets, Identity, LocalBuffer};

use crate::collector::{Collector, DEFAULT_TIMEOUT, Delivery, DeliveryError};

/// Delivery state of the sync manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No identity yet. Snapshots go to the unkeyed buffer.
    Disconnected,
    Idle,
    /// A delivery is in flight.
    Flushing,
    /// The last delivery failed; the next sync tick retries.
    Backoff,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Idle => "idle",
            Self::Flushing => "flushing",
            Self::Backoff => "backoff",
        };
        f.write_str(label)
    }
}

/// What a flush did with the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No identity: the snapshot was buffered unkeyed.
    Buffered { domains: usize },
    /// Nothing accrued and nothing buffered.
    NothingToSend,
    /// The collector acknowledged the payload.
    Delivered { domains: usize },
    /// Delivery failed; new time was buffered for retry.
    Failed { domains: usize },
}

/// Moves accumulated time to the collector exactly once.
///
/// Every flush drains the accumulator. The drained snapshot is either part
/// of an acknowledged delivery or merged into the local buffer, never both
/// and never neither. When the buffer itself misbehaves the manager keeps
/// the bookkeeping in memory and retries on every flush:
///
/// - snapshots it could not write are held under their owner's key;
/// - a buffer that was delivered but could not be cleared is left out of
///   later payloads until the clear succeeds;
/// - unkeyed time the identity could not take over is adopted again.
#[derive(Debug)]
pub struct SyncManager<B, C> {
    buffer: B,
    collector: C,
    identity: Option<Identity>,
    state: SyncState,
    delivery_timeout: Duration,
    unpersisted: BTreeMap<BufferKey, Buckets>,
    uncleared: BTreeSet<BufferKey>,
    adoption_pending: bool,
}

impl<B: LocalBuffer, C: Collector> SyncManager<B, C> {
    /// Creates a manager. A known identity adopts any unkeyed leftovers.
    pub fn new(buffer: B, collector: C, identity: Option<Identity>) -> Self {
        let mut manager = Self {
            buffer,
            collector,
            identity: None,
            state: SyncState::Disconnected,
            delivery_timeout: DEFAULT_TIMEOUT,
            unpersisted: BTreeMap::new(),
            uncleared: BTreeSet::new(),
            adoption_pending: false,
        };
        if let Some(identity) = identity {
            manager.adopt(identity);
        }
        manager
    }

    #[must_use]
    pub const fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub const fn state(&self) -> SyncState {
        self.state
    }

    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub const fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Sets the user identity.
    ///
    /// A new identity takes over the unkeyed buffer and is flushed right
    /// away; the previous identity's buffered data stays under its own key.
    /// Returns `None` if the identity did not change.
    pub async fn set_identity(
        &mut self,
        identity: Identity,
        accumulator: &mut Accumulator,
        now: DateTime<Utc>,
    ) -> Option<FlushOutcome> {
        if self.identity.as_ref() == Some(&identity) {
            return None;
        }
        tracing::info!(%identity, "identity established");
        self.adopt(identity);
        Some(self.flush(accumulator, now).await)
    }

    /// Drains `accumulator` and delivers everything owed to the collector.
    pub async fn flush(
        &mut self,
        accumulator: &mut Accumulator,
        now: DateTime<Utc>,
    ) -> FlushOutcome {
        let snapshot = accumulator.take_snapshot_and_reset();

        let Some(identity) = self.identity.clone() else {
            let mut fresh = self
                .unpersisted
                .remove(&BufferKey::Unkeyed)
                .unwrap_or_default();
            fresh.merge(&snapshot);
            let domains = fresh.len();
            self.persist(&BufferKey::Unkeyed, fresh);
            return if domains == 0 {
                FlushOutcome::NothingToSend
            } else {
                tracing::debug!(domains, "no identity yet, buffered snapshot");
                FlushOutcome::Buffered { domains }
            };
        };

        let key = BufferKey::Identity(identity.clone());
        let mut fresh = self.take_unpersisted(&key);
        fresh.merge(&snapshot);

        self.retry_clear(&key);
        let stuck = self.uncleared.contains(&key);
        if self.adoption_pending && !stuck {
            self.retry_adoption(&identity);
        }

        let (buffered, loaded) = if stuck {
            (Buckets::new(), false)
        } else {
            match self.buffer.load(&key) {
                Ok(buffered) => (buffered, true),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "failed to read local buffer, sending new time only"
                    );
                    (Buckets::new(), false)
                }
            }
        };

        let payload = buffered.merged(&fresh);
        if payload.is_empty() {
            self.state = SyncState::Idle;
            return FlushOutcome::NothingToSend;
        }

        let domains = payload.len();
        let delivery = Delivery::new(identity, now, payload);
        self.state = SyncState::Flushing;
        tracing::debug!(
            submission_id = %delivery.submission_id,
            domains,
            "delivering snapshot"
        );

        match self.deliver(&delivery).await {
            Ok(()) => {
                if loaded && !buffered.is_empty() {
                    if let Err(err) = self.buffer.clear(&key) {
                        tracing::error!(
                            error = %err,
                            owner = %key,
                            "delivered but failed to clear local buffer, holding it back"
                        );
                        self.uncleared.insert(key);
                    }
                }
                self.state = SyncState::Idle;
                tracing::info!(
                    submission_id = %delivery.submission_id,
                    domains,
                    "snapshot delivered"
                );
                FlushOutcome::Delivered { domains }
            }
            Err(err) => {
                tracing::warn!(
                    submission_id = %delivery.submission_id,
                    error = %err,
                    "delivery failed, buffering for retry"
                );
                self.persist(&key, fresh);
                self.state = SyncState::Backoff;
                FlushOutcome::Failed { domains }
            }
        }
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.delivery_timeout, self.collector.deliver(delivery)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.delivery_timeout)),
        }
    }

    fn adopt(&mut self, identity: Identity) {
        self.identity = Some(identity.clone());
        self.state = SyncState::Idle;
        self.adoption_pending = true;
        if !self.uncleared.contains(&BufferKey::Identity(identity.clone())) {
            self.retry_adoption(&identity);
        }
    }

    fn retry_adoption(&mut self, identity: &Identity) {
        match self.buffer.adopt_unkeyed(identity) {
            Ok(()) => self.adoption_pending = false,
            Err(err) => {
                tracing::warn!(error = %err, "failed to move unkeyed buffer to identity");
            }
        }
    }

    fn retry_clear(&mut self, key: &BufferKey) {
        if !self.uncleared.contains(key) {
            return;
        }
        match self.buffer.clear(key) {
            Ok(()) => {
                tracing::info!(owner = %key, "cleared delivered local buffer");
                self.uncleared.remove(key);
            }
            Err(err) => {
                tracing::warn!(error = %err, owner = %key, "local buffer still not cleared");
            }
        }
    }

    /// Takes the in-memory leftovers owed under `key`, including unkeyed
    /// time that the identity now owns.
    fn take_unpersisted(&mut self, key: &BufferKey) -> Buckets {
        let mut held = self.unpersisted.remove(key).unwrap_or_default();
        if let Some(unkeyed) = self.unpersisted.remove(&BufferKey::Unkeyed) {
            held.merge(&unkeyed);
        }
        held
    }

    fn persist(&mut self, key: &BufferKey, buckets: Buckets) {
        if buckets.is_empty() {
            return;
        }
        // A delivered buffer that is still on disk must not absorb new time.
        let written = if self.uncleared.contains(key) {
            false
        } else {
            match self.buffer.merge_into(key, &buckets) {
                Ok(()) => true,
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        owner = %key,
                        "failed to buffer snapshot, holding in memory"
                    );
                    false
                }
            }
        };
        if !written {
            self.unpersisted
                .entry(key.clone())
                .or_default()
                .merge(&buckets);
        }
    }
}
