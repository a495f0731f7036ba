use serde::Serialize;
use std::fmt;

/// Progress of one viewer-side negotiation.
///
/// `Failed` is terminal and reachable from every other state. `Connected` is
/// terminal for outbound signaling but still accepts late remote candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NegotiationState {
    Idle,
    AwaitingRemoteDescription,
    AwaitingLocalDescriptionApplied,
    Negotiated,
    Connected,
    Failed,
}

impl NegotiationState {
    /// An offer is only acceptable before any remote description was applied.
    pub fn accepts_offer(self) -> bool {
        matches!(
            self,
            NegotiationState::Idle | NegotiationState::AwaitingRemoteDescription
        )
    }

    pub fn has_remote_description(self) -> bool {
        matches!(
            self,
            NegotiationState::Negotiated | NegotiationState::Connected
        )
    }

    /// Whether local candidates may still be sent to the camera.
    pub fn sends_signaling(self) -> bool {
        !matches!(self, NegotiationState::Failed | NegotiationState::Connected)
    }

    pub fn is_failed(self) -> bool {
        self == NegotiationState::Failed
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::AwaitingRemoteDescription => "awaiting-remote-description",
            NegotiationState::AwaitingLocalDescriptionApplied => {
                "awaiting-local-description-applied"
            }
            NegotiationState::Negotiated => "negotiated",
            NegotiationState::Connected => "connected",
            NegotiationState::Failed => "failed",
        };
        f.write_str(name)
    }
}
