pub mod config;
pub mod errors;
pub mod logger;
pub mod negotiation;
pub mod peer;
pub mod relay;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::{default_ice_servers, ViewerConfig, DEFAULT_STUN_URLS};
pub use errors::{ConfigError, NegotiationError, RelayError, SessionError};
pub use negotiation::{NegotiationEngine, SessionEvent};
pub use peer::{
    ConnectionState, IceCandidate, NegotiationState, PeerEvent, PeerSession, RemoteTrack, SdpType,
    ServerConfig, SessionDescription, WebrtcPeer,
};
pub use relay::{RelayChannel, WsRelay};
pub use session::{drive, run_viewer};
pub use signaling::SignalingMessage;

use anyhow::Context;

/// Runs one viewer session from the command line.
///
/// The first argument, when given, is a TOML config file; otherwise the
/// `CAMLINK_*` environment variables are used. Ctrl-C ends the session.
pub fn run() -> anyhow::Result<()> {
    logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ViewerConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => ViewerConfig::from_env().context("failed to read config from environment")?,
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let state = runtime.block_on(session::run_viewer(config, async {
        let _ = tokio::signal::ctrl_c().await;
    }))?;

    log::info!("Session ended in state {}", state);
    Ok(())
}
