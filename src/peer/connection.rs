use crate::errors::{NegotiationError, SessionError};
use crate::logger::{dump_candidate, dump_selected_pair};
use crate::peer::ice::analyze_candidates;
use crate::peer::types::{
    codec_kind, ConnectionState, IceCandidate, RemoteTrack, ServerConfig, SessionDescription,
};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Notifications raised by a peer session, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    ConnectionState(ConnectionState),
    RemoteTrack(RemoteTrack),
}

/// The negotiable connection capability the engine drives.
#[async_trait]
pub trait PeerSession: Send + Sync {
    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;

    /// Local description as currently applied, if any.
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    async fn close(&self);
}

/// [`PeerSession`] backed by a webrtc-rs peer connection.
pub struct WebrtcPeer {
    pc: Arc<RTCPeerConnection>,
    local_candidates: Arc<Mutex<Vec<IceCandidate>>>,
}

impl WebrtcPeer {
    /// Creates the peer connection and subscribes to its notifications.
    ///
    /// Every handler is registered exactly once, here; the returned receiver
    /// is the only way events leave the connection.
    pub async fn new(
        servers: &[ServerConfig],
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<PeerEvent>), SessionError> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| SessionError::Peer(format!("Failed to register codecs: {}", e)))?;
        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(|e| SessionError::Peer(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(rtc_config(servers))
                .await
                .map_err(|e| SessionError::Peer(format!("Failed to create peer connection: {}", e)))?,
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let local_candidates = Arc::new(Mutex::new(Vec::new()));

        let tx = events_tx.clone();
        let gathered = Arc::clone(&local_candidates);
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            let gathered = Arc::clone(&gathered);
            Box::pin(async move {
                let Some(cand) = cand else {
                    // a null candidate marks the end of gathering
                    log::info!("ICE candidate gathering completed");
                    if let Ok(list) = gathered.lock() {
                        analyze_candidates(&list);
                    }
                    return;
                };
                match cand.to_json() {
                    Ok(init) => {
                        let candidate = IceCandidate::from(init);
                        dump_candidate("LOCAL", &candidate);
                        if let Ok(mut list) = gathered.lock() {
                            list.push(candidate.clone());
                        }
                        let _ = tx.send(PeerEvent::LocalCandidate(candidate));
                    }
                    Err(e) => log::warn!("Failed to serialize local candidate: {}", e),
                }
            })
        }));

        pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            log::info!("ICE connection state: {}", state);
            Box::pin(async {})
        }));

        pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
            log::info!("ICE gathering state: {}", state);
            Box::pin(async {})
        }));

        let tx = events_tx.clone();
        let pc_weak: Weak<RTCPeerConnection> = Arc::downgrade(&pc);
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            log::info!("Connection state: {}", st);
            if st == RTCPeerConnectionState::Connected {
                log::info!("WebRTC connection established");
            }
            if st == RTCPeerConnectionState::Failed {
                if let Some(pc) = pc_weak.upgrade() {
                    tokio::spawn(async move {
                        dump_selected_pair(&pc, "BEFORE-FAIL").await;
                    });
                }
            }
            let _ = tx.send(PeerEvent::ConnectionState(st.into()));
            Box::pin(async {})
        }));

        let tx = events_tx;
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let remote = RemoteTrack {
                    kind: codec_kind(track.kind()).to_string(),
                    track_id: track.id(),
                    stream_id: track.stream_id(),
                };
                log::info!(
                    "Remote {} track received: stream={} track={}",
                    remote.kind,
                    remote.stream_id,
                    remote.track_id
                );
                let _ = tx.send(PeerEvent::RemoteTrack(remote));
                Box::pin(async {})
            },
        ));

        let peer = Arc::new(Self {
            pc,
            local_candidates,
        });
        Ok((peer, events_rx))
    }

    /// Local candidates discovered so far.
    pub fn local_candidates(&self) -> Vec<IceCandidate> {
        self.local_candidates
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.pc.connection_state().into()
    }
}

#[async_trait]
impl PeerSession for WebrtcPeer {
    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let rtc_desc: RTCSessionDescription = desc
            .try_into()
            .map_err(NegotiationError::InvalidRemoteDescription)?;
        self.pc
            .set_remote_description(rtc_desc)
            .await
            .map_err(|e| NegotiationError::InvalidRemoteDescription(e.to_string()))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| NegotiationError::InvalidLocalDescription(e.to_string()))?;
        answer
            .try_into()
            .map_err(NegotiationError::InvalidLocalDescription)
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let rtc_desc: RTCSessionDescription = desc
            .try_into()
            .map_err(NegotiationError::InvalidLocalDescription)?;
        self.pc
            .set_local_description(rtc_desc)
            .await
            .map_err(|e| NegotiationError::InvalidLocalDescription(e.to_string()))
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.pc
            .local_description()
            .await
            .and_then(|desc| desc.try_into().ok())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.pc
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| NegotiationError::CandidateRejected(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            log::warn!("Failed to close peer connection: {}", e);
        }
    }
}

fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(servers),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        ..Default::default()
    }
}

/// Converts configured servers, adding the URL scheme where it is missing.
pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}
