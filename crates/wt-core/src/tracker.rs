//! The accounting half of the engine.
//!
//! [`Tracker`] owns the focus tracker, the idle monitor and its probe, the
//! current rule set, and the accumulator. Host events and timer ticks are
//! applied one at a time; each call runs to completion without suspending.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::accumulator::{Accumulator, Span};
use crate::bucket::Buckets;
use crate::classify::RuleSet;
use crate::domain::domain_from_url;
use crate::focus::{FocusTarget, FocusTracker};
use crate::idle::{HostIdleProbe, IdleMonitor, IdleProbe, IdleState, IdleTransition};

/// Read-only view of live accounting state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerStatus {
    pub focus: FocusTarget,
    pub idle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    pub accumulated: Buckets,
}

#[derive(Debug)]
pub struct Tracker {
    rules: RuleSet,
    focus: FocusTracker,
    idle: IdleMonitor,
    probe: HostIdleProbe,
    accumulator: Accumulator,
}

impl Tracker {
    pub fn new(rules: RuleSet, idle_threshold: Duration) -> Self {
        Self {
            rules,
            focus: FocusTracker::new(),
            idle: IdleMonitor::new(),
            probe: HostIdleProbe::new(idle_threshold),
            accumulator: Accumulator::new(),
        }
    }

    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Replaces the rule set. Spans closed after this call use the new rules.
    pub fn set_rules(&mut self, rules: RuleSet) {
        if rules != self.rules {
            tracing::info!(
                productive = rules.productive().len(),
                unproductive = rules.unproductive().len(),
                "classification rules updated"
            );
            self.rules = rules;
        }
    }

    /// Handles a focus change to the page at `url`.
    ///
    /// URLs without a trackable domain stop tracking until the next
    /// trackable focus.
    pub fn focus_changed(&mut self, url: Option<&str>, now: DateTime<Utc>) {
        let domain = url.and_then(domain_from_url);
        if domain.is_none() {
            tracing::debug!(?url, "focused page has no trackable domain");
        }
        self.probe.touch(now);
        let span = self.focus.on_focus_changed(domain, now, &self.rules);
        self.apply(span);
        if self.idle.is_idle() {
            self.poll_idle(now);
        }
    }

    /// Records a host idle report. Transitions take effect on the next poll.
    pub fn report_idle_state(&mut self, state: IdleState, now: DateTime<Utc>) {
        self.probe.report(state, now);
        if !state.is_idle() {
            self.focus.on_activity(now);
        }
    }

    /// Polls the idle probe and pauses or resumes accounting on a transition.
    pub fn poll_idle(&mut self, now: DateTime<Utc>) -> Option<IdleTransition> {
        let transition = self.idle.observe(self.probe.query_idle(now))?;
        match transition {
            IdleTransition::Entered => {
                tracing::info!("user idle, pausing tracking");
                let spans = self.focus.on_idle_entered(now, &self.rules);
                self.apply(spans);
            }
            IdleTransition::Exited => {
                tracing::info!("user active, resuming tracking");
                self.focus.on_idle_exited(now);
            }
        }
        Some(transition)
    }

    /// Periodic accrual for the focused domain, up to the last activity.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let span = self.focus.on_tick(now, &self.rules);
        self.apply(span);
    }

    /// Books the running span up to `now`, pending tail included.
    ///
    /// Called once accounting stops. The user never crossed the idle
    /// threshold, so the tail counts as engaged time.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        let span = self.focus.on_stopped(now, &self.rules);
        self.apply(span);
    }

    /// Mutable access for the sync manager's snapshot.
    pub const fn accumulator_mut(&mut self) -> &mut Accumulator {
        &mut self.accumulator
    }

    pub fn status(&self) -> TrackerStatus {
        TrackerStatus {
            focus: self.focus.current().clone(),
            idle: self.focus.is_idle(),
            last_activity: self.focus.last_activity(),
            accumulated: self.accumulator.peek().clone(),
        }
    }

    fn apply(&mut self, spans: impl IntoIterator<Item = Span>) {
        for span in spans {
            tracing::trace!(
                domain = %span.domain,
                duration_ms = span.duration_ms,
                classification = ?span.classification,
                "span closed"
            );
            self.accumulator.add_span(&span);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::bucket::TimeBucket;
    use crate::types::Domain;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn bucket_for(tracker: &Tracker, domain: &str) -> TimeBucket {
        tracker
            .status()
            .accumulated
            .get(&Domain::new(domain).unwrap())
            .copied()
            .unwrap_or_default()
    }

    fn tracker() -> Tracker {
        Tracker::new(
            RuleSet::new(["a.com"], ["b.com"]),
            Duration::seconds(20),
        )
    }

    /// a.com for 10s, then b.com with one `active` report at 15s, nothing
    /// until the 20s threshold runs out at 35s, then 3s of renewed activity.
    /// The host ticks and polls every second, like the daemon.
    #[test]
    fn idle_close_attributes_idle_time_to_total_only() {
        let mut tracker = tracker();
        for s in 0..=38 {
            tracker.tick(t(s));
            tracker.poll_idle(t(s));
            match s {
                0 => tracker.focus_changed(Some("https://a.com/"), t(s)),
                10 => tracker.focus_changed(Some("https://b.com/"), t(s)),
                15 => tracker.report_idle_state(IdleState::Active, t(s)),
                34 => assert_eq!(
                    bucket_for(&tracker, "b.com"),
                    TimeBucket {
                        total: 5_000,
                        productive: 0,
                        unproductive: 5_000,
                    }
                ),
                35 => {
                    assert!(tracker.status().idle);
                    tracker.focus_changed(Some("https://b.com/"), t(s));
                    assert!(!tracker.status().idle);
                }
                38 => tracker.focus_changed(None, t(s)),
                _ => {}
            }
        }

        assert_eq!(
            bucket_for(&tracker, "a.com"),
            TimeBucket {
                total: 10_000,
                productive: 10_000,
                unproductive: 0,
            }
        );
        assert_eq!(
            bucket_for(&tracker, "b.com"),
            TimeBucket {
                total: 28_000,
                productive: 0,
                unproductive: 8_000,
            }
        );
    }

    #[test]
    fn idle_entry_on_productive_domain_only_grows_total() {
        let mut tracker = tracker();
        tracker.focus_changed(Some("https://a.com/"), t(0));
        tracker.report_idle_state(IdleState::Active, t(1));
        tracker.tick(t(1));
        let before = bucket_for(&tracker, "a.com");
        assert_eq!(before.productive, 1_000);

        tracker.report_idle_state(IdleState::Idle, t(4));
        assert_eq!(tracker.poll_idle(t(4)), Some(IdleTransition::Entered));
        let after = bucket_for(&tracker, "a.com");

        assert_eq!(after.total, before.total + 3_000);
        assert_eq!(after.productive, before.productive);
        assert_eq!(after.unproductive, before.unproductive);
    }

    #[test]
    fn ticks_accrue_incrementally() {
        let mut tracker = tracker();
        tracker.focus_changed(Some("https://b.com/feed"), t(0));
        for s in 1..=5 {
            tracker.report_idle_state(IdleState::Active, t(s));
            tracker.tick(t(s));
            assert_eq!(bucket_for(&tracker, "b.com").unproductive, 1_000 * s as u64);
        }
    }

    #[test]
    fn quiet_reading_is_booked_on_finish() {
        let mut tracker = tracker();
        tracker.focus_changed(Some("https://a.com/docs"), t(0));
        for s in 1..=12 {
            tracker.tick(t(s));
            assert_eq!(tracker.poll_idle(t(s)), None);
        }
        assert!(tracker.status().accumulated.is_empty());

        tracker.finish(t(12));
        assert_eq!(
            bucket_for(&tracker, "a.com"),
            TimeBucket {
                total: 12_000,
                productive: 12_000,
                unproductive: 0,
            }
        );
    }

    #[test]
    fn internal_pages_are_not_tracked() {
        let mut tracker = tracker();
        tracker.focus_changed(Some("chrome://settings"), t(0));
        tracker.tick(t(5));
        tracker.finish(t(5));
        assert!(tracker.status().accumulated.is_empty());
        assert_eq!(tracker.status().focus, FocusTarget::default());
    }

    #[test]
    fn rule_changes_apply_to_next_span() {
        let mut tracker = tracker();
        tracker.focus_changed(Some("https://c.com/"), t(0));
        tracker.report_idle_state(IdleState::Active, t(2));
        tracker.tick(t(2));
        tracker.set_rules(RuleSet::new(["c.com"], Vec::<String>::new()));
        tracker.report_idle_state(IdleState::Active, t(5));
        tracker.tick(t(5));

        let bucket = bucket_for(&tracker, "c.com");
        assert_eq!(bucket.total, 5_000);
        assert_eq!(bucket.productive, 3_000);
    }

    #[test]
    fn status_is_a_peek() {
        let mut tracker = tracker();
        tracker.focus_changed(Some("https://a.com/"), t(0));
        tracker.report_idle_state(IdleState::Active, t(1));
        tracker.tick(t(1));
        let first = tracker.status();
        let second = tracker.status();
        assert_eq!(first, second);
        assert_eq!(first.accumulated.len(), 1);
        assert!(!first.idle);
    }

    #[test]
    fn invariant_holds_across_event_sequences() {
        let mut tracker = tracker();
        let urls = ["https://a.com/", "https://b.com/", "https://c.com/", "about:blank"];
        for step in 0..60_i64 {
            let now = t(step);
            match step % 7 {
                0 | 3 => tracker.focus_changed(Some(urls[(step as usize / 2) % urls.len()]), now),
                1 => tracker.tick(now),
                2 => tracker.report_idle_state(IdleState::Idle, now),
                4 => {
                    tracker.poll_idle(now);
                }
                5 => tracker.report_idle_state(IdleState::Active, now),
                _ => {
                    tracker.poll_idle(now);
                    tracker.tick(now);
                }
            }
            for (_, bucket) in &tracker.status().accumulated {
                assert!(bucket.productive + bucket.unproductive <= bucket.total);
            }
        }
    }
}
