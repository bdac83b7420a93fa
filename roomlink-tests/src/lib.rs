use cucumber::World;
use instant::Instant;
use roomlink_client::{
    ClientCommand, ClientConfig, ClientEvent, JoinFailure, LocalRequest, Notification,
    PeerCommand, PeerEvent, RoomManager,
};
use roomlink_core::{PlayerIdentity, RoomId, ServerMessage, SessionId};
use roomlink_relay::{Relay, RelayConfig, RelayError, Transport};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Relay-side transport for one participant; records deliveries in order
#[derive(Default)]
pub struct Inbox {
    messages: Mutex<Vec<ServerMessage>>,
    closed: AtomicBool,
}

impl Inbox {
    pub fn drain(&self) -> Vec<ServerMessage> {
        std::mem::take(&mut *self.messages.lock().expect("inbox poisoned"))
    }

    /// The relay force-closed this connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for Inbox {
    fn deliver(&self, message: ServerMessage) -> roomlink_relay::Result<()> {
        if self.is_closed() {
            return Err(RelayError::Transport("closed".to_string()));
        }
        self.messages.lock().expect("inbox poisoned").push(message);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A client room manager wired to the in-process relay
pub struct Participant {
    pub manager: RoomManager,
    pub inbox: Arc<Inbox>,
    pub connection: SessionId,
    pub dropped: bool,
    pub notifications: Vec<Notification>,
    pub peer_commands: Vec<PeerCommand>,
}

impl Participant {
    pub fn session_id(&self) -> SessionId {
        self.manager.session_id().expect("participant not initialised")
    }

    pub fn last_join_failure(&self) -> Option<&JoinFailure> {
        self.notifications.iter().rev().find_map(|n| match n {
            Notification::JoinFailed { reason, .. } => Some(reason),
            _ => None,
        })
    }

    /// Chat texts received, with their sender
    pub fn chats(&self) -> Vec<(SessionId, String)> {
        self.notifications
            .iter()
            .filter_map(|n| match n {
                Notification::PeerMessage {
                    from,
                    message: roomlink_client::PeerMessage::Chat { text },
                } => Some((*from, text.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Peer data waiting for the simulated data channel
struct Delivery {
    from: SessionId,
    to: SessionId,
    bytes: Vec<u8>,
}

#[derive(World)]
#[world(init = Self::new)]
pub struct RoomWorld {
    /// The relay under test; every participant talks to it in-process
    pub relay: Relay,

    /// Participants by name, iterated in a stable order
    pub participants: BTreeMap<String, Participant>,

    /// Room ids by the name they were created with
    pub room_ids: HashMap<String, RoomId>,

    /// Session pairs with an open data channel, smaller id first
    pub open_channels: BTreeSet<(SessionId, SessionId)>,

    deliveries: VecDeque<Delivery>,
}

impl fmt::Debug for RoomWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomWorld")
            .field("participants", &self.participants.keys().collect::<Vec<_>>())
            .field("room_ids", &self.room_ids)
            .field("open_channels", &self.open_channels)
            .finish()
    }
}

impl RoomWorld {
    pub fn new() -> Self {
        Self::with_relay(RelayConfig::default())
    }

    pub fn with_relay(config: RelayConfig) -> Self {
        Self {
            relay: Relay::new(config),
            participants: BTreeMap::new(),
            room_ids: HashMap::new(),
            open_channels: BTreeSet::new(),
            deliveries: VecDeque::new(),
        }
    }

    /// Swap in a relay with different settings; only before anyone connects
    pub fn reconfigure_relay(&mut self, config: RelayConfig) {
        assert!(
            self.participants.is_empty(),
            "relay reconfigured after participants connected"
        );
        self.relay = Relay::new(config);
    }

    /// Connect `name` and complete the init exchange
    pub fn connect(&mut self, name: &str) {
        if self.participants.contains_key(name) {
            return;
        }
        let identity = PlayerIdentity::new(format!("user-{}", name.to_lowercase()), name)
            .expect("valid identity");
        let inbox = Arc::new(Inbox::default());
        let connection = self
            .relay
            .connect(inbox.clone())
            .expect("relay accepts connection");

        self.participants.insert(
            name.to_string(),
            Participant {
                manager: RoomManager::new(
                    identity,
                    format!("token-{}", name.to_lowercase()),
                    &ClientConfig::default(),
                ),
                inbox,
                connection,
                dropped: false,
                notifications: Vec::new(),
                peer_commands: Vec::new(),
            },
        );
        self.feed(name, ClientEvent::RelayConnected);
        assert!(
            self.participant(name).manager.is_authenticated(),
            "{} did not authenticate",
            name
        );
    }

    pub fn participant(&self, name: &str) -> &Participant {
        self.participants
            .get(name)
            .unwrap_or_else(|| panic!("participant '{}' not found", name))
    }

    pub fn session_id(&self, name: &str) -> SessionId {
        self.participant(name).session_id()
    }

    pub fn room_id(&self, room: &str) -> RoomId {
        self.room_ids
            .get(room)
            .cloned()
            .unwrap_or_else(|| panic!("room '{}' was never created", room))
    }

    pub fn request(&mut self, name: &str, request: LocalRequest) {
        self.feed(name, ClientEvent::Request(request));
    }

    pub fn tick(&mut self, name: &str) {
        self.feed(name, ClientEvent::Tick(Instant::now()));
    }

    /// Feed one event to `name`, then run the system until it is quiet
    pub fn feed(&mut self, name: &str, event: ClientEvent) {
        self.dispatch(name, event);
        self.pump();
    }

    /// Open the simulated data channel between two participants
    pub fn open_channel(&mut self, a: &str, b: &str) {
        let (a_id, b_id) = (self.session_id(a), self.session_id(b));
        self.open_channels.insert(channel_key(a_id, b_id));
        self.dispatch(a, ClientEvent::Peer(PeerEvent::ChannelOpen { remote_id: b_id }));
        self.dispatch(b, ClientEvent::Peer(PeerEvent::ChannelOpen { remote_id: a_id }));
        self.pump();
    }

    fn dispatch(&mut self, name: &str, event: ClientEvent) {
        let Some(participant) = self.participants.get_mut(name) else {
            panic!("participant '{}' not found", name);
        };
        let from = participant.manager.session_id();

        for command in participant.manager.handle(event) {
            match command {
                ClientCommand::ToRelay(message) => {
                    if !participant.inbox.is_closed() {
                        self.relay.handle(participant.connection, message);
                    }
                }
                ClientCommand::Peer(command) => {
                    if let (PeerCommand::Send { remote_id, bytes }, Some(from)) = (&command, from) {
                        if self.open_channels.contains(&channel_key(from, *remote_id)) {
                            self.deliveries.push_back(Delivery {
                                from,
                                to: *remote_id,
                                bytes: bytes.clone(),
                            });
                        }
                    }
                    participant.peer_commands.push(command);
                }
                ClientCommand::Notify(notification) => participant.notifications.push(notification),
            }
        }
    }

    /// Deliver relay frames and channel data until nothing moves
    pub fn pump(&mut self) {
        loop {
            let mut progressed = false;
            let names: Vec<String> = self.participants.keys().cloned().collect();

            for name in &names {
                let (messages, closed) = {
                    let participant = &self.participants[name];
                    (
                        participant.inbox.drain(),
                        participant.inbox.is_closed() && !participant.dropped,
                    )
                };
                for message in messages {
                    progressed = true;
                    self.dispatch(name, ClientEvent::Relay(message));
                }
                if closed {
                    progressed = true;
                    if let Some(participant) = self.participants.get_mut(name) {
                        participant.dropped = true;
                    }
                    self.dispatch(name, ClientEvent::RelayDisconnected);
                }
            }

            while let Some(delivery) = self.deliveries.pop_front() {
                progressed = true;
                let receiver = self
                    .participants
                    .iter()
                    .find(|(_, p)| p.manager.session_id() == Some(delivery.to))
                    .map(|(name, _)| name.clone());
                if let Some(receiver) = receiver {
                    self.dispatch(
                        &receiver,
                        ClientEvent::Peer(PeerEvent::Data {
                            remote_id: delivery.from,
                            bytes: delivery.bytes,
                        }),
                    );
                }
            }

            if !progressed {
                break;
            }
        }
    }
}

impl Default for RoomWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn channel_key(a: SessionId, b: SessionId) -> (SessionId, SessionId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
