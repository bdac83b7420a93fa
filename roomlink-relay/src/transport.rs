use crate::error::{RelayError, Result};
use roomlink_core::{ServerMessage, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, instrument};

/// Outbound half of one live connection
///
/// `deliver` must not block: the relay calls it while holding a room lock so
/// that per-room notification order equals the order changes were applied.
pub trait Transport: Send + Sync {
    fn deliver(&self, message: ServerMessage) -> Result<()>;
    fn close(&self);
}

/// Frame queued for a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    Close,
}

/// Transport backed by an unbounded channel drained by a websocket writer
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn new(sender: UnboundedSender<Outbound>) -> Self {
        Self { sender }
    }
}

impl Transport for ChannelTransport {
    fn deliver(&self, message: ServerMessage) -> Result<()> {
        self.sender
            .send(Outbound::Message(message))
            .map_err(|_| RelayError::Transport("connection writer closed".to_string()))
    }

    fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}

/// Session → transport handle map, kept apart from session metadata
#[derive(Default)]
pub struct TransportTable {
    handles: RwLock<HashMap<SessionId, Arc<dyn Transport>>>,
}

impl TransportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: SessionId, transport: Arc<dyn Transport>) -> Result<()> {
        self.handles
            .write()
            .map_err(RelayError::poisoned)?
            .insert(session_id, transport);
        Ok(())
    }

    pub fn unregister(&self, session_id: SessionId) -> Result<Option<Arc<dyn Transport>>> {
        Ok(self
            .handles
            .write()
            .map_err(RelayError::poisoned)?
            .remove(&session_id))
    }

    fn get(&self, session_id: SessionId) -> Result<Option<Arc<dyn Transport>>> {
        Ok(self
            .handles
            .read()
            .map_err(RelayError::poisoned)?
            .get(&session_id)
            .cloned())
    }

    /// Best-effort delivery; returns whether the message was handed off
    #[instrument(skip(self, message), fields(kind = message.kind()))]
    pub fn send(&self, session_id: SessionId, message: ServerMessage) -> bool {
        match self.get(session_id) {
            Ok(Some(transport)) => match transport.deliver(message) {
                Ok(()) => true,
                Err(e) => {
                    debug!(%session_id, error = %e, "Delivery failed");
                    false
                }
            },
            Ok(None) => {
                debug!(%session_id, "No transport for session");
                false
            }
            Err(e) => {
                debug!(%session_id, error = %e, "Transport lookup failed");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
