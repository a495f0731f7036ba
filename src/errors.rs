use thiserror::Error;

/// Failures raised while negotiating a session with the camera.
///
/// Only some of them end the session, see [`NegotiationError::is_fatal`].
#[derive(Debug, Clone, Error)]
pub enum NegotiationError {
    #[error("invalid remote description: {0}")]
    InvalidRemoteDescription(String),

    #[error("invalid local description: {0}")]
    InvalidLocalDescription(String),

    #[error("remote candidate rejected: {0}")]
    CandidateRejected(String),

    #[error("unrecognized signaling message: {0}")]
    UnrecognizedMessage(String),

    #[error("relay channel closed during negotiation")]
    ChannelClosedDuringNegotiation,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A second offer after one was already answered
    #[error("duplicate offer ignored: {0}")]
    DuplicateOffer(String),
}

impl NegotiationError {
    /// Candidate rejections, unrecognized messages and duplicate offers only
    /// produce diagnostics.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            NegotiationError::CandidateRejected(_)
                | NegotiationError::UnrecognizedMessage(_)
                | NegotiationError::DuplicateOffer(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to connect to relay: {0}")]
    Connect(String),

    #[error("relay channel is closed")]
    Closed,

    #[error("message cannot be encoded: {0}")]
    Encode(String),

    #[error("relay transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("missing configuration value `{0}`")]
    MissingValue(&'static str),

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid ICE server `{id}`: {reason}")]
    InvalidIceServer { id: String, reason: String },
}

/// Everything that can stop the viewer driver.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("peer connection error: {0}")]
    Peer(String),
}
