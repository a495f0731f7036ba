#![allow(dead_code)]

use async_trait::async_trait;
use camlink_lib::{
    IceCandidate, NegotiationError, PeerSession, RelayChannel, RelayError, SessionDescription,
    SessionEvent, SignalingMessage,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, Notify};

pub const OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 10.0.0.5\r\ns=camera\r\n";
pub const ANSWER_SDP: &str = "v=0\r\no=- 2 2 IN IP4 10.0.0.9\r\ns=viewer\r\n";

pub fn offer() -> SignalingMessage {
    SignalingMessage::Description(SessionDescription::offer(OFFER_SDP))
}

pub fn candidate(n: u8) -> IceCandidate {
    IceCandidate {
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
        ..IceCandidate::new(format!(
            "candidate:{n} 1 udp 2122260223 10.0.0.{n} 5000{n} typ host"
        ))
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// In-memory peer: rejects descriptions without `v=0`, candidates before a
/// remote description and duplicate candidates.
#[derive(Default)]
pub struct MockPeer {
    pub remote: Mutex<Option<SessionDescription>>,
    pub local: Mutex<Option<SessionDescription>>,
    pub added: Mutex<Vec<IceCandidate>>,
    pub closed: AtomicBool,
    /// Makes `set_local_description` fail.
    pub fail_local: AtomicBool,
    /// Makes `create_answer` hand back an offer.
    pub answer_as_offer: AtomicBool,
    /// When set, `set_remote_description` waits for a notification first.
    pub hold_remote: Option<Arc<Notify>>,
}

impl MockPeer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn holding(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            hold_remote: Some(gate),
            ..Self::default()
        })
    }

    pub fn added(&self) -> Vec<IceCandidate> {
        self.added.lock().unwrap().clone()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.lock().unwrap().is_some()
    }
}

#[async_trait]
impl PeerSession for MockPeer {
    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if let Some(gate) = &self.hold_remote {
            gate.notified().await;
        }
        if !desc.sdp.starts_with("v=0") {
            return Err(NegotiationError::InvalidRemoteDescription(
                "SdpInvalidSyntax".to_string(),
            ));
        }
        *self.remote.lock().unwrap() = Some(desc);
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        if !self.has_remote() {
            return Err(NegotiationError::InvalidLocalDescription(
                "no remote description".to_string(),
            ));
        }
        if self.answer_as_offer.load(Ordering::SeqCst) {
            return Ok(SessionDescription::offer(ANSWER_SDP));
        }
        Ok(SessionDescription::answer(ANSWER_SDP))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if self.fail_local.load(Ordering::SeqCst) {
            return Err(NegotiationError::InvalidLocalDescription(
                "local description rejected".to_string(),
            ));
        }
        *self.local.lock().unwrap() = Some(desc);
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().unwrap().clone()
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        if !self.has_remote() {
            return Err(NegotiationError::CandidateRejected(
                "remote description not set".to_string(),
            ));
        }
        let mut added = self.added.lock().unwrap();
        if added.contains(&candidate) {
            return Err(NegotiationError::CandidateRejected(
                "duplicate candidate".to_string(),
            ));
        }
        added.push(candidate);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct MockRelay {
    pub sent: Mutex<Vec<SignalingMessage>>,
    pub fail_sends: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl MockRelay {
    pub fn new() -> Arc<Self> {
        let (closed_tx, _) = watch::channel(false);
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            closed_tx,
        })
    }

    pub fn sent(&self) -> Vec<SignalingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close(&self) {
        self.closed_tx.send_replace(true);
    }
}

#[async_trait]
impl RelayChannel for MockRelay {
    async fn send(&self, message: &SignalingMessage) -> Result<(), RelayError> {
        if self.fail_sends.load(Ordering::SeqCst) || *self.closed_tx.borrow() {
            return Err(RelayError::Closed);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }
}
