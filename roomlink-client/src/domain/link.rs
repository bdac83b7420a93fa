use super::Backoff;
use instant::{Duration, Instant};
use roomlink_core::SessionId;
use std::fmt;

/// Lifecycle of the direct channel to one other room member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Negotiating,
    Connected,
    Closed,
    Errored,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::New => "new",
            LinkState::Negotiating => "negotiating",
            LinkState::Connected => "connected",
            LinkState::Closed => "closed",
            LinkState::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// What a failed link does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Renegotiate once `retry_at` passes
    Retry { attempt: u32, retry_at: Instant },
    /// Out of attempts; the link is dead
    Exhausted { attempts: u32 },
}

/// State tracking for a link to a remote session
#[derive(Debug, Clone)]
pub struct PeerLink {
    pub remote_id: SessionId,
    pub state: LinkState,
    /// Whether this side makes the first offer
    pub initiator: bool,
    /// Negotiation deadline while `Negotiating`
    pub deadline: Option<Instant>,
    /// Failures since the link was last connected
    pub attempts: u32,
    /// When an `Errored` link renegotiates
    pub retry_at: Option<Instant>,
    /// Highest envelope sequence accepted from the remote
    pub last_seq: Option<u64>,
}

impl PeerLink {
    /// Smaller session id initiates
    pub fn new(local_id: SessionId, remote_id: SessionId) -> Self {
        Self {
            remote_id,
            state: LinkState::New,
            initiator: local_id < remote_id,
            deadline: None,
            attempts: 0,
            retry_at: None,
            last_seq: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn start_negotiating(&mut self, now: Instant, timeout: Duration) {
        self.state = LinkState::Negotiating;
        self.deadline = Some(now + timeout);
        self.retry_at = None;
    }

    pub fn mark_connected(&mut self) {
        self.state = LinkState::Connected;
        self.deadline = None;
        self.retry_at = None;
        self.attempts = 0;
    }

    pub fn mark_closed(&mut self) {
        self.state = LinkState::Closed;
        self.deadline = None;
        self.retry_at = None;
    }

    /// Move to `Errored` and schedule the next attempt if any remain
    pub fn mark_failed(&mut self, now: Instant, backoff: &Backoff) -> FailureOutcome {
        self.attempts += 1;
        self.state = LinkState::Errored;
        self.deadline = None;
        match backoff.delay(self.attempts) {
            Some(delay) => {
                let retry_at = now + delay;
                self.retry_at = Some(retry_at);
                FailureOutcome::Retry {
                    attempt: self.attempts,
                    retry_at,
                }
            }
            None => {
                self.retry_at = None;
                FailureOutcome::Exhausted {
                    attempts: self.attempts,
                }
            }
        }
    }

    pub fn negotiation_expired(&self, now: Instant) -> bool {
        self.state == LinkState::Negotiating && self.deadline.is_some_and(|d| now >= d)
    }

    pub fn retry_due(&self, now: Instant) -> bool {
        self.state == LinkState::Errored && self.retry_at.is_some_and(|at| now >= at)
    }

    /// Accept an envelope sequence number, rejecting replays and reordering
    pub fn accept_seq(&mut self, seq: u64) -> bool {
        if self.last_seq.is_some_and(|last| seq <= last) {
            return false;
        }
        self.last_seq = Some(seq);
        true
    }
}
