pub mod connection;
pub mod ice;
pub mod state;
pub mod types;

pub use connection::{PeerEvent, PeerSession, WebrtcPeer};
pub use ice::{CandidateBuffer, CandidateKind};
pub use state::NegotiationState;
pub use types::{
    ConnectionState, IceCandidate, RemoteTrack, SdpType, ServerConfig, SessionDescription,
};
