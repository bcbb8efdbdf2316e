//! Per-domain time buckets.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::types::{Classification, Domain};

/// Accumulated time for a single domain, in milliseconds.
///
/// Neutral time is derived rather than stored:
/// `total - productive - unproductive`. Every mutation keeps
/// `productive + unproductive <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub total: u64,
    pub productive: u64,
    pub unproductive: u64,
}

impl TimeBucket {
    /// Adds a span. `None` marks an idle-closed span, which counts toward
    /// `total` only.
    pub const fn add(&mut self, duration_ms: u64, classification: Option<Classification>) {
        self.total = self.total.saturating_add(duration_ms);
        match classification {
            Some(Classification::Productive) => {
                self.productive = self.productive.saturating_add(duration_ms);
            }
            Some(Classification::Unproductive) => {
                self.unproductive = self.unproductive.saturating_add(duration_ms);
            }
            Some(Classification::Neutral) | None => {}
        }
    }

    /// Sums another bucket into this one component-wise.
    pub const fn merge(&mut self, other: &Self) {
        self.total = self.total.saturating_add(other.total);
        self.productive = self.productive.saturating_add(other.productive);
        self.unproductive = self.unproductive.saturating_add(other.unproductive);
    }

    /// Time that was neither productive nor unproductive.
    pub const fn neutral(&self) -> u64 {
        self.total
            .saturating_sub(self.productive)
            .saturating_sub(self.unproductive)
    }

    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Buckets keyed by domain.
///
/// Serializes as a JSON object `{domain: {total, productive, unproductive}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Buckets(BTreeMap<Domain, TimeBucket>);

impl Buckets {
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds a span to the domain's bucket, creating it on first use.
    ///
    /// Zero-length spans are ignored so they never create empty buckets.
    pub fn add_span(
        &mut self,
        domain: &Domain,
        duration_ms: u64,
        classification: Option<Classification>,
    ) {
        if duration_ms == 0 {
            return;
        }
        self.0
            .entry(domain.clone())
            .or_default()
            .add(duration_ms, classification);
    }

    /// Inserts or merges a whole bucket for a domain.
    pub fn merge_bucket(&mut self, domain: Domain, bucket: &TimeBucket) {
        if bucket.is_empty() {
            return;
        }
        self.0.entry(domain).or_default().merge(bucket);
    }

    /// Merges another set of buckets into this one.
    ///
    /// Merging is commutative and associative, so the order in which
    /// partial failures are folded together never changes the result.
    pub fn merge(&mut self, other: &Self) {
        for (domain, bucket) in &other.0 {
            self.merge_bucket(domain.clone(), bucket);
        }
    }

    /// Returns the merge of two bucket sets without modifying either.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    pub fn get(&self, domain: &Domain) -> Option<&TimeBucket> {
        self.0.get(domain)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Domain, TimeBucket> {
        self.0.iter()
    }

    /// Sum of all buckets.
    pub fn totals(&self) -> TimeBucket {
        let mut sum = TimeBucket::default();
        for bucket in self.0.values() {
            sum.merge(bucket);
        }
        sum
    }

    /// Domains ordered by descending total time, ties broken by name.
    pub fn by_total_desc(&self) -> Vec<(&Domain, &TimeBucket)> {
        let mut rows: Vec<_> = self.0.iter().collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

impl FromIterator<(Domain, TimeBucket)> for Buckets {
    fn from_iter<T: IntoIterator<Item = (Domain, TimeBucket)>>(iter: T) -> Self {
        let mut buckets = Self::new();
        for (domain, bucket) in iter {
            buckets.merge_bucket(domain, &bucket);
        }
        buckets
    }
}

impl<'a> IntoIterator for &'a Buckets {
    type Item = (&'a Domain, &'a TimeBucket);
    type IntoIter = btree_map::Iter<'a, Domain, TimeBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
