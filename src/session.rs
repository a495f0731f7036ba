use crate::config::ViewerConfig;
use crate::errors::SessionError;
use crate::negotiation::{NegotiationEngine, SessionEvent};
use crate::peer::connection::{PeerEvent, PeerSession, WebrtcPeer};
use crate::peer::state::NegotiationState;
use crate::relay::WsRelay;
use crate::signaling::SignalingMessage;
use std::future::Future;
use tokio::sync::mpsc;

/// Connects to the camera described by `config` and runs the session until it
/// fails or `shutdown` resolves. The peer connection and relay are closed on
/// the way out.
pub async fn run_viewer<S>(config: ViewerConfig, shutdown: S) -> Result<NegotiationState, SessionError>
where
    S: Future<Output = ()>,
{
    config.validate()?;

    let (peer, mut peer_events) = WebrtcPeer::new(&config.ice_servers).await?;

    // the ticket is a credential, keep it out of the logs
    log::info!(
        "Connecting to relay {} for camera {}",
        config.server,
        config.camera_id
    );
    let (relay, mut inbound) = match WsRelay::connect(&config.relay_url()).await {
        Ok(connected) => connected,
        Err(e) => {
            peer.close().await;
            return Err(e.into());
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut engine = NegotiationEngine::new(peer.clone(), relay.clone(), events_tx);
    log::info!("Session {} started", engine.id());
    engine.begin();

    let result = drive(
        &mut engine,
        &mut inbound,
        &mut peer_events,
        &mut events_rx,
        shutdown,
    )
    .await;

    log::debug!(
        "Session {} gathered {} local candidates",
        engine.id(),
        peer.local_candidates().len()
    );
    relay.close();
    peer.close().await;
    result
}

/// Single-task event loop: every relay message, peer event and engine event
/// is handled here, one at a time.
///
/// Stops when the engine fails, when `shutdown` resolves, or when every
/// source has run dry.
pub async fn drive<S>(
    engine: &mut NegotiationEngine,
    inbound: &mut mpsc::UnboundedReceiver<SignalingMessage>,
    peer_events: &mut mpsc::UnboundedReceiver<PeerEvent>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    shutdown: S,
) -> Result<NegotiationState, SessionError>
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut relay_open = true;
    let mut peer_open = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                log::info!("Shutdown requested in state {}", engine.state());
                break;
            }
            Some(event) = events.recv() => report(&event),
            msg = inbound.recv(), if relay_open => match msg {
                Some(msg) => {
                    // a fatal error has already moved the engine to Failed
                    let _ = engine.handle_inbound(msg).await;
                }
                None => {
                    // peer events queued before the relay dropped come first
                    while peer_open {
                        match peer_events.try_recv() {
                            Ok(event) => engine.on_peer_event(event).await,
                            Err(mpsc::error::TryRecvError::Empty) => break,
                            Err(mpsc::error::TryRecvError::Disconnected) => peer_open = false,
                        }
                    }
                    relay_open = false;
                    engine.on_channel_closed();
                }
            },
            event = peer_events.recv(), if peer_open => match event {
                Some(event) => engine.on_peer_event(event).await,
                None => peer_open = false,
            },
            else => break,
        }

        if engine.state().is_failed() {
            break;
        }
        // the engine keeps its own event sender alive, so `else` never fires
        if !relay_open && !peer_open {
            log::info!("Relay and peer both gone in state {}", engine.state());
            break;
        }
    }

    while let Ok(event) = events.try_recv() {
        report(&event);
    }

    match engine.state() {
        NegotiationState::Failed => Err(engine
            .failure()
            .cloned()
            .map(SessionError::from)
            .unwrap_or_else(|| SessionError::Peer("peer connection failed".to_string()))),
        state => Ok(state),
    }
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(NegotiationState::Connected) => {
            log::info!("Session connected, media is flowing")
        }
        SessionEvent::StateChanged(NegotiationState::Failed) => log::error!("Session failed"),
        SessionEvent::StateChanged(state) => log::debug!("Session state: {}", state),
        SessionEvent::Diagnostic(err) if err.is_fatal() => log::error!("Session error: {}", err),
        SessionEvent::Diagnostic(err) => log::warn!("Session diagnostic: {}", err),
        SessionEvent::RemoteMedia(track) => log::info!(
            "Remote {} media available (track {}, stream {})",
            track.kind,
            track.track_id,
            track.stream_id
        ),
    }
}
