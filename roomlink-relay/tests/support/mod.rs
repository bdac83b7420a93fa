pub mod fake_transport;

use fake_transport::FakeTransport;
use roomlink_core::{ClientMessage, PlayerIdentity, RoomId, ServerMessage, SessionId};
use roomlink_relay::{Relay, RelayConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One connected test client
pub struct TestClient {
    pub session_id: SessionId,
    pub transport: Arc<FakeTransport>,
    next_correlation: AtomicU64,
}

impl TestClient {
    pub fn next_id(&self) -> u64 {
        self.next_correlation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn take(&self) -> Vec<ServerMessage> {
        self.transport.take()
    }
}

/// Relay with fake transports; no runtime required
pub struct RelayFixture {
    pub relay: Relay,
}

impl RelayFixture {
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            relay: Relay::new(config),
        }
    }

    /// Connected but not initialised
    pub fn connect(&self) -> TestClient {
        let transport = Arc::new(FakeTransport::default());
        let session_id = self.relay.connect(transport.clone()).unwrap();
        TestClient {
            session_id,
            transport,
            next_correlation: AtomicU64::new(0),
        }
    }

    /// Connected and initialised, inbox drained
    pub fn connect_as(&self, name: &str) -> TestClient {
        let client = self.connect();
        self.send(
            &client,
            ClientMessage::Init {
                correlation_id: client.next_id(),
                token: format!("token-{}", name),
                identity: PlayerIdentity::new(name.to_lowercase(), name).unwrap(),
            },
        );
        let replies = client.take();
        assert!(
            matches!(replies.as_slice(), [ServerMessage::Initialized { .. }]),
            "unexpected init replies: {:?}",
            replies
        );
        client
    }

    pub fn send(&self, client: &TestClient, message: ClientMessage) {
        self.relay.handle(client.session_id, message);
    }

    pub fn create_room(&self, client: &TestClient, name: &str, max_members: usize) -> RoomId {
        self.send(
            client,
            ClientMessage::CreateRoom {
                correlation_id: client.next_id(),
                name: name.to_string(),
                max_members: Some(max_members),
                private: false,
                password: None,
                description: None,
                game_version: None,
            },
        );
        match client.take().as_slice() {
            [ServerMessage::RoomJoined { room, .. }] => room.room_id.clone(),
            other => panic!("unexpected create replies: {:?}", other),
        }
    }

    pub fn join_room(&self, client: &TestClient, room_id: &RoomId) -> Vec<ServerMessage> {
        self.send(
            client,
            ClientMessage::JoinRoom {
                correlation_id: client.next_id(),
                room_id: room_id.clone(),
                password: None,
            },
        );
        client.take()
    }

    pub fn leave_room(&self, client: &TestClient) -> Vec<ServerMessage> {
        self.send(
            client,
            ClientMessage::LeaveRoom {
                correlation_id: client.next_id(),
            },
        );
        client.take()
    }
}

impl Default for RelayFixture {
    fn default() -> Self {
        Self::new()
    }
}
