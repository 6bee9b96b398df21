//! Push-channel message taxonomy.
//!
//! Messages are JSON objects tagged by `"type"`. Unrecognized types are
//! ignored (the server may grow new ones); malformed frames are logged and
//! dropped, never fatal.

use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RealtimeMessage {
    /// Fetch fresh scores outside the computed schedule.
    RefreshScores,
    /// Server is terminating this session.
    Disconnect {
        #[serde(default)]
        reason: String,
    },
    TimerStart { duration: i64 },
    TimerPause,
    TimerResume,
    TimerReset,
}

const KNOWN_TYPES: &[&str] = &[
    "refresh-scores",
    "disconnect",
    "timer-start",
    "timer-pause",
    "timer-resume",
    "timer-reset",
];

/// Decode one text frame. Returns `None` for unknown message types and for
/// frames that fail to decode.
pub fn decode(frame: &str) -> Option<RealtimeMessage> {
    let value: serde_json::Value = match serde_json::from_str(frame) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "dropping undecodable realtime frame");
            return None;
        }
    };
    let msg_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_owned();
    if !KNOWN_TYPES.contains(&msg_type.as_str()) {
        debug!(msg_type, "ignoring unrecognized realtime message");
        return None;
    }
    match serde_json::from_value(value) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!(msg_type, error = %e, "dropping malformed realtime message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_full_taxonomy() {
        assert_eq!(
            decode(r#"{"type":"refresh-scores"}"#),
            Some(RealtimeMessage::RefreshScores)
        );
        assert_eq!(
            decode(r#"{"type":"disconnect","reason":"maintenance"}"#),
            Some(RealtimeMessage::Disconnect {
                reason: "maintenance".into()
            })
        );
        assert_eq!(
            decode(r#"{"type":"timer-start","duration":300}"#),
            Some(RealtimeMessage::TimerStart { duration: 300 })
        );
        assert_eq!(decode(r#"{"type":"timer-pause"}"#), Some(RealtimeMessage::TimerPause));
        assert_eq!(decode(r#"{"type":"timer-resume"}"#), Some(RealtimeMessage::TimerResume));
        assert_eq!(decode(r#"{"type":"timer-reset"}"#), Some(RealtimeMessage::TimerReset));
    }

    #[test]
    fn disconnect_reason_is_optional() {
        assert_eq!(
            decode(r#"{"type":"disconnect"}"#),
            Some(RealtimeMessage::Disconnect { reason: String::new() })
        );
    }

    #[test]
    fn unknown_types_are_ignored() {
        assert_eq!(decode(r#"{"type":"leaderboard-v2","data":[]}"#), None);
        assert_eq!(decode(r#"{"no_type":true}"#), None);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode(r#"{"type":"timer-start"}"#), None); // missing duration
    }
}
