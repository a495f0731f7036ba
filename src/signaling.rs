//! Relay wire format.
//!
//! Every relay payload is one JSON object carrying exactly one of
//! `{"sdp": {...}}` or `{"ice": {...}}`. Anything else decodes to
//! [`SignalingMessage::Unrecognized`]; there is no version field, so the
//! shape alone decides.

use crate::errors::RelayError;
use crate::peer::types::{IceCandidate, SessionDescription};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum SignalingMessage {
    Description(SessionDescription),
    Candidate(IceCandidate),
    /// Raw payload that matched neither shape
    Unrecognized(String),
}

#[derive(Serialize)]
struct WireMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sdp: Option<&'a SessionDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ice: Option<&'a IceCandidate>,
}

impl SignalingMessage {
    pub fn parse(raw: &str) -> Self {
        let unrecognized = || SignalingMessage::Unrecognized(raw.to_string());

        let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(raw) else {
            return unrecognized();
        };

        // a null member counts as absent
        let sdp = map.remove("sdp").filter(|v| !v.is_null());
        let ice = map.remove("ice").filter(|v| !v.is_null());

        match (sdp, ice) {
            (Some(sdp), None) => serde_json::from_value(sdp)
                .map(SignalingMessage::Description)
                .unwrap_or_else(|_| unrecognized()),
            (None, Some(ice)) => serde_json::from_value(ice)
                .map(SignalingMessage::Candidate)
                .unwrap_or_else(|_| unrecognized()),
            _ => unrecognized(),
        }
    }

    pub fn parse_bytes(raw: &[u8]) -> Self {
        match std::str::from_utf8(raw) {
            Ok(text) => Self::parse(text),
            Err(_) => SignalingMessage::Unrecognized(String::from_utf8_lossy(raw).into_owned()),
        }
    }

    pub fn to_wire(&self) -> Result<String, RelayError> {
        let wire = match self {
            SignalingMessage::Description(desc) => WireMessage {
                sdp: Some(desc),
                ice: None,
            },
            SignalingMessage::Candidate(cand) => WireMessage {
                sdp: None,
                ice: Some(cand),
            },
            SignalingMessage::Unrecognized(_) => {
                return Err(RelayError::Encode(
                    "unrecognized messages are never sent".to_string(),
                ))
            }
        };
        serde_json::to_string(&wire).map_err(|e| RelayError::Encode(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Description(_) => "description",
            SignalingMessage::Candidate(_) => "candidate",
            SignalingMessage::Unrecognized(_) => "unrecognized",
        }
    }
}
