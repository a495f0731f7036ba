use crate::peer::types::IceCandidate;

/// Remote candidates received before the remote description was applied.
///
/// Entries are released in arrival order by [`CandidateBuffer::take`], which
/// leaves the buffer empty. No eviction: a session only ever sees a handful of
/// candidates.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<IceCandidate>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: IceCandidate) {
        self.pending.push(candidate);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn take(&mut self) -> Vec<IceCandidate> {
        std::mem::take(&mut self.pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Host,
    ServerReflexive,
    PeerReflexive,
    Relay,
    Unknown,
}

impl CandidateKind {
    /// Reads the `typ` attribute of an SDP candidate line.
    pub fn classify(candidate: &str) -> Self {
        let mut tokens = candidate.split_whitespace();
        while let Some(token) = tokens.next() {
            if token == "typ" {
                return match tokens.next() {
                    Some("host") => CandidateKind::Host,
                    Some("srflx") => CandidateKind::ServerReflexive,
                    Some("prflx") => CandidateKind::PeerReflexive,
                    Some("relay") => CandidateKind::Relay,
                    _ => CandidateKind::Unknown,
                };
            }
        }
        CandidateKind::Unknown
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSummary {
    pub host: usize,
    pub srflx: usize,
    pub prflx: usize,
    pub relay: usize,
    pub unknown: usize,
}

pub fn summarize(candidates: &[IceCandidate]) -> CandidateSummary {
    let mut summary = CandidateSummary::default();
    for candidate in candidates {
        match CandidateKind::classify(&candidate.candidate) {
            CandidateKind::Host => summary.host += 1,
            CandidateKind::ServerReflexive => summary.srflx += 1,
            CandidateKind::PeerReflexive => summary.prflx += 1,
            CandidateKind::Relay => summary.relay += 1,
            CandidateKind::Unknown => summary.unknown += 1,
        }
    }
    summary
}

pub fn analyze_candidates(candidates: &[IceCandidate]) -> CandidateSummary {
    let summary = summarize(candidates);

    log::info!(
        "Candidate analysis: {} host, {} srflx, {} prflx, {} relay",
        summary.host,
        summary.srflx,
        summary.prflx,
        summary.relay
    );

    if summary.relay == 0 {
        log::warn!("No TURN relay candidates gathered; connection through NAT may fail");
    }
    summary
}
