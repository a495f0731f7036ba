//! Viewer-side offer/answer negotiation.
//!
//! The camera always offers; this side answers. [`NegotiationEngine`] owns the
//! negotiation state and the buffer of remote candidates that arrive before
//! the offer has been applied. It is driven by a single task, so every
//! handler takes `&mut self` and runs to completion before the next event is
//! looked at.

use crate::errors::{NegotiationError, RelayError};
use crate::logger::dump_candidate;
use crate::peer::connection::{PeerEvent, PeerSession};
use crate::peer::ice::CandidateBuffer;
use crate::peer::state::NegotiationState;
use crate::peer::types::{ConnectionState, IceCandidate, RemoteTrack, SdpType, SessionDescription};
use crate::relay::RelayChannel;
use crate::signaling::SignalingMessage;
use crate::utils::random_id;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// What the engine reports to whoever drives it.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(NegotiationState),
    /// Non-fatal problem, or the cause right before `StateChanged(Failed)`
    Diagnostic(NegotiationError),
    RemoteMedia(RemoteTrack),
}

pub struct NegotiationEngine {
    id: String,
    peer: Arc<dyn PeerSession>,
    relay: Arc<dyn RelayChannel>,
    closed: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: NegotiationState,
    pending: CandidateBuffer,
    relay_open: bool,
    failure: Option<NegotiationError>,
}

impl NegotiationEngine {
    pub fn new(
        peer: Arc<dyn PeerSession>,
        relay: Arc<dyn RelayChannel>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let closed = relay.closed();
        Self {
            id: random_id(),
            peer,
            relay,
            closed,
            events,
            state: NegotiationState::Idle,
            pending: CandidateBuffer::new(),
            relay_open: true,
            failure: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Cause of the transition to `Failed`, if the engine raised it itself.
    pub fn failure(&self) -> Option<&NegotiationError> {
        self.failure.as_ref()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    /// Marks the relay as open and starts waiting for the camera's offer.
    pub fn begin(&mut self) {
        if self.state == NegotiationState::Idle {
            log::info!("[{}] Waiting for SDP offer from camera", self.id);
            self.set_state(NegotiationState::AwaitingRemoteDescription);
        }
    }

    /// Handles one decoded relay message.
    ///
    /// Returns `Err` only when the message ended the session; diagnostics for
    /// non-fatal problems go out as [`SessionEvent::Diagnostic`].
    pub async fn handle_inbound(&mut self, msg: SignalingMessage) -> Result<(), NegotiationError> {
        if self.state.is_failed() || !self.relay_open {
            log::debug!("[{}] Ignoring {} in state {}", self.id, msg.kind(), self.state);
            return Ok(());
        }

        match msg {
            SignalingMessage::Description(desc) => match desc.sdp_type {
                SdpType::Offer => self.accept_offer(desc).await,
                SdpType::Answer => {
                    log::error!("[{}] Received an SDP answer, camera must offer", self.id);
                    Err(self.fail(NegotiationError::ProtocolViolation(
                        "received an answer from the camera".to_string(),
                    )))
                }
            },
            SignalingMessage::Candidate(candidate) => {
                self.accept_remote_candidate(candidate).await;
                Ok(())
            }
            SignalingMessage::Unrecognized(raw) => {
                log::warn!("[{}] Unknown message: {}", self.id, raw);
                self.emit(SessionEvent::Diagnostic(
                    NegotiationError::UnrecognizedMessage(raw),
                ));
                Ok(())
            }
        }
    }

    /// Forwards a locally gathered candidate to the camera.
    pub async fn on_local_candidate(&mut self, candidate: IceCandidate) {
        if !self.state.sends_signaling() || !self.relay_open {
            log::debug!(
                "[{}] Dropping local candidate in state {}",
                self.id,
                self.state
            );
            return;
        }

        log::info!("[{}] Sending my ICE candidate", self.id);
        if let Err(e) = self.relay.send(&SignalingMessage::Candidate(candidate)).await {
            log::warn!("[{}] Failed to send local candidate: {}", self.id, e);
        }
    }

    pub fn on_connection_state_changed(&mut self, state: ConnectionState) {
        log::info!("[{}] Peer connection state: {:?}", self.id, state);
        match state {
            ConnectionState::Connected => {
                if self.state == NegotiationState::Negotiated {
                    self.set_state(NegotiationState::Connected);
                } else {
                    log::warn!(
                        "[{}] Peer reported connected while {}",
                        self.id,
                        self.state
                    );
                }
            }
            ConnectionState::Failed | ConnectionState::Closed => {
                if !self.state.is_failed() {
                    log::error!("[{}] Peer connection ended: {:?}", self.id, state);
                    self.set_state(NegotiationState::Failed);
                }
            }
            ConnectionState::New | ConnectionState::Connecting | ConnectionState::Disconnected => {}
        }
    }

    pub fn on_remote_track(&mut self, track: RemoteTrack) {
        if self.state.is_failed() {
            return;
        }
        log::info!(
            "[{}] Remote {} track {} on stream {}",
            self.id,
            track.kind,
            track.track_id,
            track.stream_id
        );
        self.emit(SessionEvent::RemoteMedia(track));
    }

    /// The relay went away. Harmless once connected, fatal before.
    pub fn on_channel_closed(&mut self) {
        if !self.relay_open {
            return;
        }
        self.relay_open = false;

        match self.state {
            NegotiationState::Connected => {
                log::info!("[{}] Relay closed, media keeps flowing", self.id)
            }
            NegotiationState::Failed => {}
            _ => {
                log::warn!("[{}] Relay closed while {}", self.id, self.state);
                self.fail(NegotiationError::ChannelClosedDuringNegotiation);
            }
        }
    }

    pub async fn on_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::LocalCandidate(candidate) => self.on_local_candidate(candidate).await,
            PeerEvent::ConnectionState(state) => self.on_connection_state_changed(state),
            PeerEvent::RemoteTrack(track) => self.on_remote_track(track),
        }
    }

    async fn accept_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        if !self.state.accepts_offer() {
            log::warn!("[{}] Ignoring SDP offer while {}", self.id, self.state);
            self.emit(SessionEvent::Diagnostic(NegotiationError::DuplicateOffer(
                format!("offer received while {}", self.state),
            )));
            return Ok(());
        }

        log::info!("[{}] Received SDP offer", self.id);
        if self.state == NegotiationState::Idle {
            self.set_state(NegotiationState::AwaitingRemoteDescription);
        }

        // A relay closure must win over a peer call that never returns.
        let mut closed = self.closed.clone();
        let outcome = tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => {
                Err(NegotiationError::ChannelClosedDuringNegotiation)
            }
            result = self.answer_offer(offer) => result,
        };

        if let Err(err) = outcome {
            if matches!(err, NegotiationError::ChannelClosedDuringNegotiation) {
                self.relay_open = false;
            }
            return Err(self.fail(err));
        }

        self.set_state(NegotiationState::Negotiated);
        self.drain_pending().await;
        Ok(())
    }

    async fn answer_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        self.peer
            .set_remote_description(offer)
            .await
            .map_err(as_remote_error)?;
        log::info!("[{}] Remote description set", self.id);
        self.set_state(NegotiationState::AwaitingLocalDescriptionApplied);

        let answer = self.peer.create_answer().await.map_err(as_local_error)?;
        if answer.sdp_type != SdpType::Answer {
            return Err(NegotiationError::InvalidLocalDescription(
                "peer produced an offer instead of an answer".to_string(),
            ));
        }
        self.peer
            .set_local_description(answer.clone())
            .await
            .map_err(as_local_error)?;
        log::info!("[{}] Local description (answer) set", self.id);

        let local = self
            .peer
            .local_description()
            .await
            .filter(|desc| desc.sdp_type == SdpType::Answer)
            .unwrap_or(answer);

        self.relay
            .send(&SignalingMessage::Description(local))
            .await
            .map_err(|e: RelayError| {
                log::error!("[{}] Failed to send SDP answer: {}", self.id, e);
                NegotiationError::ChannelClosedDuringNegotiation
            })?;
        log::info!("[{}] Sent SDP answer back", self.id);
        Ok(())
    }

    async fn accept_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.state.has_remote_description() {
            self.apply_remote_candidate(candidate).await;
        } else {
            dump_candidate("REMOTE (buffered)", &candidate);
            self.pending.push(candidate);
            log::debug!(
                "[{}] Buffered remote candidate ({} pending)",
                self.id,
                self.pending.len()
            );
        }
    }

    async fn apply_remote_candidate(&mut self, candidate: IceCandidate) {
        dump_candidate("REMOTE", &candidate);
        match self.peer.add_remote_candidate(candidate).await {
            Ok(()) => log::info!("[{}] Added remote ICE candidate", self.id),
            Err(e) => {
                log::warn!("[{}] Failed to add ICE candidate: {}", self.id, e);
                self.emit(SessionEvent::Diagnostic(as_candidate_error(e)));
            }
        }
    }

    async fn drain_pending(&mut self) {
        let pending = self.pending.take();
        if pending.is_empty() {
            return;
        }
        log::info!(
            "[{}] Applying {} buffered remote candidates",
            self.id,
            pending.len()
        );
        for candidate in pending {
            self.apply_remote_candidate(candidate).await;
        }
    }

    fn fail(&mut self, err: NegotiationError) -> NegotiationError {
        log::error!("[{}] Negotiation failed: {}", self.id, err);
        self.failure = Some(err.clone());
        self.emit(SessionEvent::Diagnostic(err.clone()));
        self.set_state(NegotiationState::Failed);
        err
    }

    fn set_state(&mut self, next: NegotiationState) {
        if self.state == next {
            return;
        }
        log::info!("[{}] Negotiation state: {} -> {}", self.id, self.state, next);
        self.state = next;
        self.emit(SessionEvent::StateChanged(next));
    }

    fn emit(&self, event: SessionEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}

fn as_remote_error(err: NegotiationError) -> NegotiationError {
    match err {
        NegotiationError::InvalidRemoteDescription(_) => err,
        other => NegotiationError::InvalidRemoteDescription(other.to_string()),
    }
}

fn as_local_error(err: NegotiationError) -> NegotiationError {
    match err {
        NegotiationError::InvalidLocalDescription(_) => err,
        other => NegotiationError::InvalidLocalDescription(other.to_string()),
    }
}

fn as_candidate_error(err: NegotiationError) -> NegotiationError {
    match err {
        NegotiationError::CandidateRejected(_) => err,
        other => NegotiationError::CandidateRejected(other.to_string()),
    }
}
