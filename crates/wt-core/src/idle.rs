//! Idle detection from polled host state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host-reported user presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

impl IdleState {
    /// Idle and locked screens both suspend accounting.
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle | Self::Locked)
    }
}

impl fmt::Display for IdleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Locked => "locked",
        };
        write!(f, "{s}")
    }
}

/// An idle state string the host sent that we do not understand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown idle state: {0}")]
pub struct UnknownIdleState(pub String);

impl FromStr for IdleState {
    type Err = UnknownIdleState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "idle" => Ok(Self::Idle),
            "locked" => Ok(Self::Locked),
            _ => Err(UnknownIdleState(s.to_string())),
        }
    }
}

/// A failed idle query. Treated as "no change".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("idle state query failed: {0}")]
pub struct HostQueryFailure(pub String);

/// Source of host idle state, polled on a fixed period.
pub trait IdleProbe {
    fn query_idle(&mut self, now: DateTime<Utc>) -> Result<IdleState, HostQueryFailure>;
}

/// Idle probe fed by host signals.
///
/// An explicit `idle`/`locked` report wins. Otherwise the user counts as
/// idle once no activity signal (focus change, refocus, `active` report) has
/// arrived for `threshold`.
#[derive(Debug)]
pub struct HostIdleProbe {
    threshold: Duration,
    reported: Option<IdleState>,
    last_activity: Option<DateTime<Utc>>,
}

impl HostIdleProbe {
    pub const fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            reported: None,
            last_activity: None,
        }
    }

    /// Records a host idle report. `active` also counts as activity.
    pub const fn report(&mut self, state: IdleState, now: DateTime<Utc>) {
        self.reported = Some(state);
        if !state.is_idle() {
            self.last_activity = Some(now);
        }
    }

    /// Records a liveness signal from the host.
    pub const fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
        if let Some(IdleState::Idle) = self.reported {
            self.reported = Some(IdleState::Active);
        }
    }
}

impl IdleProbe for HostIdleProbe {
    fn query_idle(&mut self, now: DateTime<Utc>) -> Result<IdleState, HostQueryFailure> {
        if let Some(state) = self.reported.filter(|state| state.is_idle()) {
            return Ok(state);
        }
        let Some(last_activity) = self.last_activity else {
            return Err(HostQueryFailure("no host signal received yet".to_string()));
        };
        if now - last_activity >= self.threshold {
            Ok(IdleState::Idle)
        } else {
            Ok(IdleState::Active)
        }
    }
}

/// An edge in the idle/active flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    Entered,
    Exited,
}

/// Tracks the idle flag and reports only transitions.
#[derive(Debug, Default)]
pub struct IdleMonitor {
    is_idle: bool,
}

impl IdleMonitor {
    pub const fn new() -> Self {
        Self { is_idle: false }
    }

    pub const fn is_idle(&self) -> bool {
        self.is_idle
    }

    /// Feeds one poll result. Repeated reports of the same state return
    /// `None`, as do failed queries.
    pub fn observe(
        &mut self,
        polled: Result<IdleState, HostQueryFailure>,
    ) -> Option<IdleTransition> {
        let state = match polled {
            Ok(state) => state,
            Err(err) => {
                tracing::debug!(%err, "idle query failed, keeping previous state");
                return None;
            }
        };
        let now_idle = state.is_idle();
        if now_idle == self.is_idle {
            return None;
        }
        self.is_idle = now_idle;
        Some(if now_idle {
            IdleTransition::Entered
        } else {
            IdleTransition::Exited
        })
    }
}
