mod backoff;
mod envelope;
mod link;

pub use backoff::Backoff;
pub use envelope::{PeerEnvelope, PeerMessage, PeerMessageType};
pub use link::{FailureOutcome, LinkState, PeerLink};
