#![allow(dead_code)]

use chrono::Utc;
use roomlink_client::{
    ClientCommand, ClientConfig, ClientEvent, LocalRequest, Notification, PeerCommand, PeerEvent,
    PeerMessage, RoomManager,
};
use roomlink_core::{
    ClientMessage, Member, PlayerIdentity, RoomId, RoomSnapshot, RoomStatus, ServerMessage,
    SessionId,
};

/// Session ids in ascending order, so initiator roles are predictable
pub fn ordered_ids(count: usize) -> Vec<SessionId> {
    let mut ids: Vec<SessionId> = (0..count).map(|_| SessionId::new()).collect();
    ids.sort();
    ids
}

pub fn member(session_id: SessionId, name: &str, is_host: bool) -> Member {
    Member {
        session_id,
        identity: PlayerIdentity::new(format!("user-{}", name), name).unwrap(),
        is_host,
        joined_at: Utc::now(),
    }
}

/// A room manager driven by scripted events, recording everything it emits
pub struct Script {
    pub manager: RoomManager,
    pub local_id: Option<SessionId>,
    pub room_id: RoomId,
    pub emitted: Vec<ClientCommand>,
}

impl Script {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let identity = PlayerIdentity::new("user-local", "Local").unwrap();
        Self {
            manager: RoomManager::new(identity, "token-local", &config),
            local_id: None,
            room_id: RoomId::from("room0001"),
            emitted: Vec::new(),
        }
    }

    /// Feed one event; returns (and records) what it produced
    pub fn feed(&mut self, event: ClientEvent) -> Vec<ClientCommand> {
        let commands = self.manager.handle(event);
        self.emitted.extend(commands.clone());
        commands
    }

    pub fn relay(&mut self, message: ServerMessage) -> Vec<ClientCommand> {
        self.feed(ClientEvent::Relay(message))
    }

    pub fn peer(&mut self, event: PeerEvent) -> Vec<ClientCommand> {
        self.feed(ClientEvent::Peer(event))
    }

    pub fn request(&mut self, request: LocalRequest) -> Vec<ClientCommand> {
        self.feed(ClientEvent::Request(request))
    }

    /// Connect and answer `init` with the given session id
    pub fn authenticate_as(&mut self, session_id: SessionId) -> Vec<ClientCommand> {
        let init = self.feed(ClientEvent::RelayConnected);
        let correlation_id = relay_messages(&init)
            .first()
            .map(|m| m.correlation_id())
            .expect("init sent");
        self.local_id = Some(session_id);
        self.relay(ServerMessage::Initialized {
            correlation_id,
            session_id,
            ice_servers: vec![],
            heartbeat_interval_ms: 30_000,
        })
    }

    /// Join `self.room_id` as the last member; `others` are already inside
    pub fn join_with(&mut self, others: &[SessionId]) -> Vec<ClientCommand> {
        let local = self.local_id.expect("authenticated");
        let sent = self.request(LocalRequest::JoinRoom {
            room_id: self.room_id.clone(),
            password: None,
        });
        let correlation_id = relay_messages(&sent)[0].correlation_id();

        let mut members: Vec<Member> = others
            .iter()
            .enumerate()
            .map(|(i, id)| member(*id, &format!("peer{}", i), i == 0))
            .collect();
        members.push(member(local, "local", others.is_empty()));

        self.relay(ServerMessage::RoomJoined {
            correlation_id,
            room: RoomSnapshot {
                room_id: self.room_id.clone(),
                name: "Lobby".to_string(),
                host_id: others.first().copied().unwrap_or(local),
                status: if members.len() > 1 {
                    RoomStatus::Active
                } else {
                    RoomStatus::Waiting
                },
                members,
                max_members: 8,
                private: false,
            },
        })
    }

    pub fn open_channel(&mut self, remote_id: SessionId) -> Vec<ClientCommand> {
        self.peer(PeerEvent::ChannelOpen { remote_id })
    }

    pub fn chat(&mut self, to: Option<SessionId>, text: &str) -> Vec<ClientCommand> {
        self.request(LocalRequest::Send {
            to,
            message: PeerMessage::chat(text),
        })
    }
}

pub fn relay_messages(commands: &[ClientCommand]) -> Vec<ClientMessage> {
    commands
        .iter()
        .filter_map(|c| match c {
            ClientCommand::ToRelay(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

pub fn peer_commands(commands: &[ClientCommand]) -> Vec<PeerCommand> {
    commands
        .iter()
        .filter_map(|c| match c {
            ClientCommand::Peer(command) => Some(command.clone()),
            _ => None,
        })
        .collect()
}

pub fn notifications(commands: &[ClientCommand]) -> Vec<Notification> {
    commands
        .iter()
        .filter_map(|c| match c {
            ClientCommand::Notify(notification) => Some(notification.clone()),
            _ => None,
        })
        .collect()
}

/// Remote ids a batch of commands sends peer data to
pub fn send_targets(commands: &[ClientCommand]) -> Vec<SessionId> {
    peer_commands(commands)
        .into_iter()
        .filter_map(|c| match c {
            PeerCommand::Send { remote_id, .. } => Some(remote_id),
            _ => None,
        })
        .collect()
}

pub fn data(seq: u64, text: &str) -> Vec<u8> {
    roomlink_client::PeerEnvelope::wrap(seq, &PeerMessage::chat(text))
        .to_bytes()
        .unwrap()
}
