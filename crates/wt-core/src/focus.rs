//! Focus tracking: which domain is currently accruing time.
//!
//! The tracker never reads the clock itself. Every transition takes `now`
//! and returns the spans it closed, which the caller applies to the
//! [`Accumulator`](crate::Accumulator).
//!
//! Time up to the last activity signal is engaged and gets classified. Time
//! after it stays pending: the next activity signal or focus change proves
//! the user was present and books it classified, while idle entry books it
//! to the total only.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::accumulator::Span;
use crate::classify::RuleSet;
use crate::types::Domain;

/// The browsing context currently tracked.
///
/// `domain = None` means nothing trackable has focus. `started_at = None`
/// means tracking is paused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FocusTarget {
    pub domain: Option<Domain>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct FocusTracker {
    current: FocusTarget,
    idle: bool,
    last_activity: Option<DateTime<Utc>>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn current(&self) -> &FocusTarget {
        &self.current
    }

    pub const fn is_idle(&self) -> bool {
        self.idle
    }

    /// Last activity signal seen: focus changes, same-domain refreshes and
    /// `active` reports.
    pub const fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    /// True when a domain is focused, tracking is not paused, and the user
    /// is not idle.
    pub const fn is_tracking(&self) -> bool {
        self.current.domain.is_some() && self.current.started_at.is_some() && !self.idle
    }

    /// Handles a change of the focused browsing context.
    ///
    /// Refocusing the same domain only refreshes liveness. Otherwise the
    /// previous span is closed and classified, and the new target starts at
    /// `now` (or paused, while idle).
    pub fn on_focus_changed(
        &mut self,
        new_domain: Option<Domain>,
        now: DateTime<Utc>,
        rules: &RuleSet,
    ) -> Option<Span> {
        self.last_activity = Some(now);
        if new_domain == self.current.domain {
            return None;
        }

        let closed = self.close_span(now, Some(rules));
        let started_at = if self.idle || new_domain.is_none() {
            None
        } else {
            Some(now)
        };
        self.current = FocusTarget {
            domain: new_domain,
            started_at,
        };
        closed
    }

    /// Records user activity without a focus change.
    ///
    /// The pending tail up to `now` becomes engaged time and is booked on
    /// the next tick.
    pub const fn on_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    /// Closes the running span and pauses tracking.
    ///
    /// Engaged time up to the last activity signal keeps its classification.
    /// The stretch after it was spent idle and only counts toward the total.
    pub fn on_idle_entered(&mut self, now: DateTime<Utc>, rules: &RuleSet) -> Vec<Span> {
        let engaged = self.checkpoint(now, rules);
        let idle = self.close_span(now, None);
        self.idle = true;
        self.current.started_at = None;
        engaged.into_iter().chain(idle).collect()
    }

    /// Resumes tracking the current domain, if one is focused.
    pub fn on_idle_exited(&mut self, now: DateTime<Utc>) {
        self.idle = false;
        if self.current.domain.is_some() && self.current.started_at.is_none() {
            self.current.started_at = Some(now);
        }
    }

    /// Checkpoints engaged time so long single-page sessions accrue
    /// incrementally.
    ///
    /// Only time up to the last activity signal is booked. The span restarts
    /// there, so the tail after it stays pending until activity or idle
    /// entry decides how it counts.
    pub fn on_tick(&mut self, now: DateTime<Utc>, rules: &RuleSet) -> Option<Span> {
        self.checkpoint(now, rules)
    }

    /// Books the whole running span, pending tail included, as engaged time.
    ///
    /// Used when accounting stops before the idle threshold was crossed.
    pub fn on_stopped(&mut self, now: DateTime<Utc>, rules: &RuleSet) -> Option<Span> {
        let closed = self.close_span(now, Some(rules));
        if closed.is_some() {
            self.current.started_at = Some(now);
        }
        closed
    }

    fn checkpoint(&mut self, now: DateTime<Utc>, rules: &RuleSet) -> Option<Span> {
        let started_at = self.current.started_at?;
        let engaged_until = self.last_activity?.min(now);
        if engaged_until <= started_at {
            return None;
        }
        let closed = self.close_span(engaged_until, Some(rules));
        if closed.is_some() {
            self.current.started_at = Some(engaged_until);
        }
        closed
    }

    /// Computes the span from `started_at` to `until` for the current domain.
    ///
    /// With `rules = None` the span is idle-closed and left unclassified.
    fn close_span(&self, until: DateTime<Utc>, rules: Option<&RuleSet>) -> Option<Span> {
        if !self.is_tracking() {
            return None;
        }
        let domain = self.current.domain.clone()?;
        let started_at = self.current.started_at?;
        let duration_ms = u64::try_from((until - started_at).num_milliseconds()).unwrap_or(0);
        let classification = rules.map(|rules| rules.classify(&domain));
        Some(Span {
            domain,
            duration_ms,
            classification,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::types::Classification;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn domain(s: &str) -> Option<Domain> {
        Some(Domain::new(s).unwrap())
    }

    #[test]
    fn focus_change_closes_previous_span() {
        let rules = RuleSet::new(["a.com"], ["b.com"]);
        let mut tracker = FocusTracker::new();

        assert_eq!(tracker.on_focus_changed(domain("a.com"), t(0), &rules), None);
        let span = tracker
            .on_focus_changed(domain("b.com"), t(10), &rules)
            .unwrap();

        assert_eq!(span.domain.as_str(), "a.com");
        assert_eq!(span.duration_ms, 10_000);
        assert_eq!(span.classification, Some(Classification::Productive));
        assert_eq!(tracker.current().domain, domain("b.com"));
        assert_eq!(tracker.current().started_at, Some(t(10)));
    }

    #[test]
    fn same_domain_only_touches_liveness() {
        let rules = RuleSet::default();
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(0), &rules);

        assert_eq!(tracker.on_focus_changed(domain("a.com"), t(5), &rules), None);
        assert_eq!(tracker.current().started_at, Some(t(0)));
        assert_eq!(tracker.last_activity(), Some(t(5)));

        let span = tracker.on_tick(t(8), &rules).unwrap();
        assert_eq!(span.duration_ms, 5_000);
    }

    #[test]
    fn unresolvable_domain_never_opens_a_span() {
        let rules = RuleSet::default();
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(0), &rules);

        let span = tracker.on_focus_changed(None, t(3), &rules).unwrap();
        assert_eq!(span.duration_ms, 3_000);
        assert!(!tracker.is_tracking());

        assert_eq!(tracker.on_tick(t(10), &rules), None);
        assert_eq!(tracker.on_focus_changed(domain("c.com"), t(20), &rules), None);
        assert_eq!(tracker.current().started_at, Some(t(20)));
    }

    #[test]
    fn idle_entry_closes_span_without_classification() {
        let rules = RuleSet::new(["a.com"], Vec::<String>::new());
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(0), &rules);

        let spans = tracker.on_idle_entered(t(30), &rules);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].duration_ms, 30_000);
        assert_eq!(spans[0].classification, None);
        assert_eq!(tracker.current().started_at, None);
        assert_eq!(tracker.on_tick(t(40), &rules), None);
    }

    #[test]
    fn idle_entry_keeps_engaged_time_classified() {
        let rules = RuleSet::new(["a.com"], Vec::<String>::new());
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(0), &rules);
        tracker.on_activity(t(10));

        let spans = tracker.on_idle_entered(t(30), &rules);
        let booked: Vec<_> = spans
            .iter()
            .map(|span| (span.duration_ms, span.classification))
            .collect();
        assert_eq!(
            booked,
            [(10_000, Some(Classification::Productive)), (20_000, None)]
        );
    }

    #[test]
    fn idle_exit_resumes_current_domain() {
        let rules = RuleSet::default();
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(0), &rules);
        tracker.on_idle_entered(t(5), &rules);
        tracker.on_idle_exited(t(25));

        assert!(tracker.is_tracking());
        assert_eq!(tracker.current().started_at, Some(t(25)));
    }

    #[test]
    fn focus_change_while_idle_stays_paused() {
        let rules = RuleSet::default();
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(0), &rules);
        tracker.on_idle_entered(t(5), &rules);

        assert_eq!(tracker.on_focus_changed(domain("b.com"), t(8), &rules), None);
        assert_eq!(tracker.current().domain, domain("b.com"));
        assert_eq!(tracker.current().started_at, None);

        tracker.on_idle_exited(t(12));
        assert_eq!(tracker.current().started_at, Some(t(12)));
    }

    #[test]
    fn tick_checkpoints_without_double_counting() {
        let rules = RuleSet::new(["a.com"], Vec::<String>::new());
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(0), &rules);

        tracker.on_activity(t(1));
        let first = tracker.on_tick(t(1), &rules);
        tracker.on_activity(t(2));
        let second = tracker.on_tick(t(2), &rules);
        let last = tracker.on_focus_changed(None, t(2) + Duration::milliseconds(500), &rules);

        let total: u64 = [first, second, last]
            .into_iter()
            .flatten()
            .map(|s| s.duration_ms)
            .sum();
        assert_eq!(total, 2_500);
    }

    #[test]
    fn tick_stops_at_last_activity() {
        let rules = RuleSet::new(Vec::<String>::new(), ["b.com"]);
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("b.com"), t(0), &rules);
        tracker.on_activity(t(3));

        let span = tracker.on_tick(t(10), &rules).unwrap();
        assert_eq!(span.duration_ms, 3_000);
        assert_eq!(tracker.current().started_at, Some(t(3)));
        assert_eq!(tracker.on_tick(t(11), &rules), None);

        let rest = tracker.on_stopped(t(11), &rules).unwrap();
        assert_eq!(rest.duration_ms, 8_000);
        assert_eq!(rest.classification, Some(Classification::Unproductive));
    }

    #[test]
    fn backwards_clock_yields_zero_length_span() {
        let rules = RuleSet::default();
        let mut tracker = FocusTracker::new();
        tracker.on_focus_changed(domain("a.com"), t(10), &rules);
        assert_eq!(tracker.on_tick(t(5), &rules), None);

        let span = tracker.on_focus_changed(domain("b.com"), t(5), &rules).unwrap();
        assert_eq!(span.duration_ms, 0);
    }
}
