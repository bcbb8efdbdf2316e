//! Host events delivered to the engine.

use serde::{Deserialize, Serialize};

use crate::classify::RuleSet;
use crate::idle::IdleState;
use crate::types::Identity;

/// One message from the browser host.
///
/// On the wire each event is a JSON object tagged by `type`, e.g.
/// `{"type":"focus_changed","url":"https://github.com/"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// The active tab or window changed, or the active tab navigated.
    /// `url` is absent when no tab has focus.
    FocusChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// The host's own idle detector reported a state.
    IdleState { state: IdleState },
    /// The user signed in (or switched accounts).
    SetIdentity { identity: Identity },
    /// The user replaced the classification lists.
    SetRules {
        #[serde(flatten)]
        rules: RuleSet,
    },
    /// Request a read-only status report.
    Query,
}

impl HostEvent {
    /// Parses one line of the host protocol.
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_focus_changes() {
        let event = HostEvent::parse_line(r#"{"type":"focus_changed","url":"https://a.com/x"}"#)
            .unwrap();
        assert_eq!(
            event,
            HostEvent::FocusChanged {
                url: Some("https://a.com/x".to_string())
            }
        );

        let event = HostEvent::parse_line(r#"{"type":"focus_changed"}"#).unwrap();
        assert_eq!(event, HostEvent::FocusChanged { url: None });
    }

    #[test]
    fn parses_rules_and_identity() {
        let event = HostEvent::parse_line(
            r#"{"type":"set_rules","productive":["Docs.rs"],"unproductive":[]}"#,
        )
        .unwrap();
        let HostEvent::SetRules { rules } = event else {
            panic!("expected set_rules, got {event:?}");
        };
        assert!(rules.productive().contains("docs.rs"));

        let event =
            HostEvent::parse_line(r#"{"type":"set_identity","identity":"user-1"}"#).unwrap();
        assert!(matches!(event, HostEvent::SetIdentity { .. }));
    }

    #[test]
    fn rejects_invalid_lines() {
        assert!(HostEvent::parse_line("not json").is_err());
        assert!(HostEvent::parse_line(r#"{"type":"reboot"}"#).is_err());
        assert!(HostEvent::parse_line(r#"{"type":"set_identity","identity":"  "}"#).is_err());
        assert!(HostEvent::parse_line(r#"{"type":"idle_state","state":"asleep"}"#).is_err());
    }

    #[test]
    fn parses_idle_reports_and_queries() {
        let event = HostEvent::parse_line(r#"{"type":"idle_state","state":"locked"}"#).unwrap();
        assert_eq!(
            event,
            HostEvent::IdleState {
                state: IdleState::Locked
            }
        );
        assert_eq!(
            HostEvent::parse_line(r#" {"type":"query"} "#).unwrap(),
            HostEvent::Query
        );
    }
}
