//! Durable buffer of undelivered buckets.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use crate::bucket::Buckets;
use crate::types::Identity;

/// Who buffered data belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferKey {
    /// Accrued before any identity was known.
    Unkeyed,
    Identity(Identity),
}

impl fmt::Display for BufferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unkeyed => write!(f, "(unkeyed)"),
            Self::Identity(identity) => write!(f, "{identity}"),
        }
    }
}

/// Storage for buckets that have not reached the collector yet.
///
/// Every write merges (sums) into what is already stored; nothing here ever
/// overwrites buffered time.
pub trait LocalBuffer {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the buffered buckets for `key` (empty if none).
    fn load(&self, key: &BufferKey) -> Result<Buckets, Self::Error>;

    /// Sums `buckets` into the entry for `key`.
    fn merge_into(&mut self, key: &BufferKey, buckets: &Buckets) -> Result<(), Self::Error>;

    /// Drops the entry for `key` after successful delivery.
    fn clear(&mut self, key: &BufferKey) -> Result<(), Self::Error>;

    /// Moves all unkeyed data into `identity`'s entry.
    fn adopt_unkeyed(&mut self, identity: &Identity) -> Result<(), Self::Error>;

    /// Lists every key that currently holds data.
    fn keys(&self) -> Result<Vec<BufferKey>, Self::Error>;
}

/// A [`LocalBuffer`] held in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    entries: BTreeMap<BufferKey, Buckets>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalBuffer for MemoryBuffer {
    type Error = Infallible;

    fn load(&self, key: &BufferKey) -> Result<Buckets, Self::Error> {
        Ok(self.entries.get(key).cloned().unwrap_or_default())
    }

    fn merge_into(&mut self, key: &BufferKey, buckets: &Buckets) -> Result<(), Self::Error> {
        if !buckets.is_empty() {
            self.entries.entry(key.clone()).or_default().merge(buckets);
        }
        Ok(())
    }

    fn clear(&mut self, key: &BufferKey) -> Result<(), Self::Error> {
        self.entries.remove(key);
        Ok(())
    }

    fn adopt_unkeyed(&mut self, identity: &Identity) -> Result<(), Self::Error> {
        if let Some(unkeyed) = self.entries.remove(&BufferKey::Unkeyed) {
            self.merge_into(&BufferKey::Identity(identity.clone()), &unkeyed)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<BufferKey>, Self::Error> {
        Ok(self.entries.keys().cloned().collect())
    }
}
