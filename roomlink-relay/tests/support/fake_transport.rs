use roomlink_core::ServerMessage;
use roomlink_relay::{RelayError, Result, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Transport that records everything the relay sends
#[derive(Default)]
pub struct FakeTransport {
    inbox: Mutex<Vec<ServerMessage>>,
    closed: AtomicBool,
}

impl FakeTransport {
    /// Drain recorded messages
    pub fn take(&self) -> Vec<ServerMessage> {
        std::mem::take(&mut *self.inbox.lock().unwrap())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn deliver(&self, message: ServerMessage) -> Result<()> {
        if self.is_closed() {
            return Err(RelayError::Transport("closed".to_string()));
        }
        self.inbox.lock().unwrap().push(message);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
