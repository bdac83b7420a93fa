use super::config::ClientConfig;
use super::events::{
    ClientCommand, ClientEvent, CreateRoomRequest, JoinFailure, LocalRequest, Notification,
    PeerCommand, PeerEvent, PendingRequest,
};
use crate::domain::{Backoff, FailureOutcome, LinkState, PeerEnvelope, PeerLink, PeerMessage};
use instant::{Duration, Instant};
use roomlink_core::{
    ClientMessage, CorrelationId, ErrorCode, IceServer, PlayerIdentity, RoomId, RoomSnapshot,
    RoomStatus, RoomSummary, ServerMessage, SessionId, SignalEnvelope, SignalKind,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Where the relay session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStatus {
    Disconnected,
    /// Socket open, `init` sent
    Initializing,
    Authenticated,
}

/// Locally produced negotiation payload waiting for an authenticated relay session
#[derive(Debug, Clone, PartialEq)]
struct QueuedSignal {
    remote_id: SessionId,
    kind: SignalKind,
    payload: Vec<u8>,
}

/// Client room manager
///
/// A synchronous state machine: feed it [`ClientEvent`]s, execute the
/// [`ClientCommand`]s it returns. It owns the local room snapshot and one
/// [`PeerLink`] per other member, and never blocks on the network itself.
pub struct RoomManager {
    identity: PlayerIdentity,
    token: String,

    negotiation_timeout: Duration,
    link_retry: Backoff,
    heartbeat_interval: Duration,

    relay: RelayStatus,
    session_id: Option<SessionId>,
    ice_servers: Vec<IceServer>,
    last_heartbeat: Option<Instant>,

    room: Option<RoomSnapshot>,
    /// Room to rejoin after a relay reconnect
    last_room: Option<(RoomId, Option<String>)>,
    links: BTreeMap<SessionId, PeerLink>,
    rooms: Vec<RoomSummary>,

    pending: HashMap<CorrelationId, PendingRequest>,
    next_correlation: CorrelationId,
    queued_signals: VecDeque<QueuedSignal>,
    next_seq: u64,

    out: Vec<ClientCommand>,
}

impl RoomManager {
    pub fn new(identity: PlayerIdentity, token: impl Into<String>, config: &ClientConfig) -> Self {
        Self {
            identity,
            token: token.into(),
            negotiation_timeout: config.negotiation_timeout,
            link_retry: config.link_retry,
            heartbeat_interval: config.heartbeat_interval,
            relay: RelayStatus::Disconnected,
            session_id: None,
            ice_servers: Vec::new(),
            last_heartbeat: None,
            room: None,
            last_room: None,
            links: BTreeMap::new(),
            rooms: Vec::new(),
            pending: HashMap::new(),
            next_correlation: 1,
            queued_signals: VecDeque::new(),
            next_seq: 0,
            out: Vec::new(),
        }
    }

    // ===== Queries =====

    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    pub fn relay_status(&self) -> RelayStatus {
        self.relay
    }

    pub fn is_authenticated(&self) -> bool {
        self.relay == RelayStatus::Authenticated
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Local view of the current room
    pub fn room(&self) -> Option<&RoomSnapshot> {
        self.room.as_ref()
    }

    pub fn is_host(&self) -> bool {
        match (&self.room, self.session_id) {
            (Some(room), Some(local)) => room.host_id == local,
            _ => false,
        }
    }

    /// Last room list received from the relay
    pub fn rooms(&self) -> &[RoomSummary] {
        &self.rooms
    }

    pub fn link(&self, remote_id: &SessionId) -> Option<&PeerLink> {
        self.links.get(remote_id)
    }

    pub fn link_state(&self, remote_id: &SessionId) -> Option<LinkState> {
        self.links.get(remote_id).map(|link| link.state)
    }

    pub fn links(&self) -> impl Iterator<Item = &PeerLink> {
        self.links.values()
    }

    pub fn connected_peers(&self) -> Vec<SessionId> {
        self.links
            .values()
            .filter(|link| link.is_connected())
            .map(|link| link.remote_id)
            .collect()
    }

    pub fn queued_signal_count(&self) -> usize {
        self.queued_signals.len()
    }

    pub fn pending_request_count(&self) -> usize {
        self.pending.len()
    }

    // ===== Event handling =====

    /// Apply one event and return the commands it produced, in order
    pub fn handle(&mut self, event: ClientEvent) -> Vec<ClientCommand> {
        match event {
            ClientEvent::RelayConnected => self.on_relay_connected(),
            ClientEvent::RelayDisconnected => self.on_relay_disconnected(),
            ClientEvent::Relay(message) => self.on_relay_message(message),
            ClientEvent::Peer(event) => self.on_peer_event(event),
            ClientEvent::Tick(now) => self.on_tick(now),
            ClientEvent::Request(request) => self.on_request(request),
        }
        std::mem::take(&mut self.out)
    }

    fn on_relay_connected(&mut self) {
        self.relay = RelayStatus::Initializing;
        self.pending.clear();

        let token = self.token.clone();
        let identity = self.identity.clone();
        self.request(PendingRequest::Init, |correlation_id| ClientMessage::Init {
            correlation_id,
            token,
            identity,
        });
    }

    fn on_relay_disconnected(&mut self) {
        if self.relay == RelayStatus::Disconnected {
            return;
        }
        warn!(session_id = ?self.session_id, "Relay connection lost");

        self.relay = RelayStatus::Disconnected;
        self.pending.clear();
        self.last_heartbeat = None;
        // The relay dropped our membership; links stay up until the rejoin snapshot
        self.room = None;
        self.notify(Notification::Disconnected { terminal: false });
    }

    fn on_relay_message(&mut self, message: ServerMessage) {
        debug!(kind = message.kind(), "Relay message");

        match message {
            ServerMessage::Initialized {
                correlation_id,
                session_id,
                ice_servers,
                heartbeat_interval_ms,
            } => {
                self.pending.remove(&correlation_id);
                self.on_initialized(session_id, ice_servers, heartbeat_interval_ms);
            }
            ServerMessage::RoomJoined {
                correlation_id,
                room,
            } => {
                let password = match self.pending.remove(&correlation_id) {
                    Some(PendingRequest::JoinRoom { password, .. }) => password,
                    Some(PendingRequest::CreateRoom { password }) => password,
                    _ => None,
                };
                self.enter_room(room, password);
            }
            ServerMessage::RoomLeft {
                correlation_id,
                room_id,
                destroyed,
            } => {
                self.pending.remove(&correlation_id);
                self.room = None;
                self.last_room = None;
                self.close_all_links();
                self.notify(Notification::RoomLeft { room_id, destroyed });
            }
            ServerMessage::RoomList {
                correlation_id,
                rooms,
            } => {
                self.pending.remove(&correlation_id);
                self.set_rooms(rooms);
            }
            ServerMessage::RoomListChanged { rooms } => self.set_rooms(rooms),
            ServerMessage::HeartbeatAck { correlation_id, .. }
            | ServerMessage::Ack { correlation_id } => {
                self.pending.remove(&correlation_id);
            }
            ServerMessage::Rejected {
                correlation_id,
                reason,
                message,
            } => {
                let pending = self.pending.remove(&correlation_id);
                self.request_failed(pending, JoinFailure::Rejected(reason), reason.code(), message);
            }
            ServerMessage::Error {
                correlation_id,
                code,
                message,
            } => {
                let pending = correlation_id.and_then(|id| self.pending.remove(&id));
                self.request_failed(pending, JoinFailure::Error(code), code, message);
            }
            ServerMessage::MemberJoined { room_id, member } => {
                if !self.in_room(&room_id) {
                    return;
                }
                let remote_id = member.session_id;
                if let Some(room) = self.room.as_mut() {
                    if !room.members.iter().any(|m| m.session_id == remote_id) {
                        room.members.push(member.clone());
                    }
                    refresh_status(room);
                }
                self.notify(Notification::MemberJoined(member));
                if Some(remote_id) != self.session_id && !self.links.contains_key(&remote_id) {
                    self.open_link(remote_id, Instant::now());
                }
            }
            ServerMessage::MemberLeft {
                room_id,
                session_id,
            } => {
                if !self.in_room(&room_id) {
                    return;
                }
                if let Some(room) = self.room.as_mut() {
                    room.members.retain(|m| m.session_id != session_id);
                    refresh_status(room);
                }
                self.drop_link(session_id);
                self.notify(Notification::MemberLeft { session_id });
            }
            ServerMessage::HostChanged {
                room_id,
                new_host_id,
            } => {
                if !self.in_room(&room_id) {
                    return;
                }
                if let Some(room) = self.room.as_mut() {
                    room.host_id = new_host_id;
                    for member in room.members.iter_mut() {
                        member.is_host = member.session_id == new_host_id;
                    }
                }
                self.notify(Notification::HostChanged { new_host_id });
            }
            ServerMessage::RoomClosed { room_id, reason } => {
                if !self.in_room(&room_id) {
                    return;
                }
                info!(%room_id, %reason, "Room closed by relay");
                self.room = None;
                self.last_room = None;
                self.queued_signals.clear();
                self.close_all_links();
                self.notify(Notification::RoomClosed { room_id, reason });
            }
            ServerMessage::Signal { envelope } => self.on_remote_signal(envelope),
        }
    }

    fn on_initialized(
        &mut self,
        session_id: SessionId,
        ice_servers: Vec<IceServer>,
        heartbeat_interval_ms: u64,
    ) {
        info!(%session_id, "Relay session authenticated");

        self.relay = RelayStatus::Authenticated;
        self.session_id = Some(session_id);
        self.ice_servers = ice_servers;
        if heartbeat_interval_ms > 0 {
            self.heartbeat_interval = Duration::from_millis(heartbeat_interval_ms);
        }
        self.last_heartbeat = Some(Instant::now());
        self.notify(Notification::Initialized { session_id });

        match self.last_room.clone() {
            Some((room_id, password)) => {
                info!(%room_id, "Rejoining room after reconnect");
                let pending = PendingRequest::JoinRoom {
                    room_id: room_id.clone(),
                    password: password.clone(),
                    rejoin: true,
                };
                self.request(pending, |correlation_id| ClientMessage::JoinRoom {
                    correlation_id,
                    room_id,
                    password,
                });
            }
            None => self.queued_signals.clear(),
        }
    }

    /// Adopt a fresh snapshot and reconcile links against its member list
    fn enter_room(&mut self, snapshot: RoomSnapshot, password: Option<String>) {
        let Some(local) = self.session_id else {
            warn!("Room snapshot before init ignored");
            return;
        };
        info!(room_id = %snapshot.room_id, members = snapshot.members.len(), "Joined room");

        let remotes: BTreeSet<SessionId> = snapshot
            .members
            .iter()
            .map(|m| m.session_id)
            .filter(|id| *id != local)
            .collect();
        let stale: Vec<SessionId> = self
            .links
            .keys()
            .filter(|id| !remotes.contains(id))
            .copied()
            .collect();
        for remote_id in stale {
            self.drop_link(remote_id);
        }

        self.last_room = Some((snapshot.room_id.clone(), password));
        self.room = Some(snapshot.clone());
        self.notify(Notification::RoomJoined(snapshot));

        let now = Instant::now();
        for remote_id in remotes {
            if !self.links.contains_key(&remote_id) {
                self.open_link(remote_id, now);
            }
        }
        self.flush_signals();
    }

    fn request_failed(
        &mut self,
        pending: Option<PendingRequest>,
        failure: JoinFailure,
        code: ErrorCode,
        message: String,
    ) {
        match pending {
            Some(PendingRequest::JoinRoom {
                room_id, rejoin, ..
            }) => {
                warn!(%room_id, ?failure, %message, "Join failed");
                if rejoin {
                    self.last_room = None;
                    self.queued_signals.clear();
                    self.close_all_links();
                }
                self.notify(Notification::JoinFailed {
                    room_id: Some(room_id),
                    reason: failure,
                    message,
                });
            }
            Some(PendingRequest::CreateRoom { .. }) => {
                warn!(?failure, %message, "Room creation failed");
                self.notify(Notification::JoinFailed {
                    room_id: None,
                    reason: failure,
                    message,
                });
            }
            Some(PendingRequest::Signal { to }) => {
                self.fail_link(to, format!("signal refused: {}", message), Instant::now());
            }
            Some(request) => {
                warn!(request = request.kind(), %code, %message, "Relay request failed");
                self.notify(Notification::RequestFailed {
                    request: request.kind(),
                    code,
                    message,
                });
            }
            None => {
                warn!(%code, %message, "Uncorrelated relay error");
                self.notify(Notification::RequestFailed {
                    request: "unknown",
                    code,
                    message,
                });
            }
        }
    }

    fn on_remote_signal(&mut self, envelope: SignalEnvelope) {
        let remote_id = envelope.from_session_id;
        if Some(envelope.to_session_id) != self.session_id
            || !self.in_room(&envelope.room_id)
            || !self.is_member(&remote_id)
        {
            debug!(from = %remote_id, "Dropping signal outside the current room");
            return;
        }

        let restart = !matches!(
            self.link_state(&remote_id),
            Some(LinkState::Negotiating) | Some(LinkState::Connected)
        );
        if restart {
            // Remote is (re)negotiating; answer it
            let Some(local) = self.session_id else {
                return;
            };
            let timeout = self.negotiation_timeout;
            let link = self
                .links
                .entry(remote_id)
                .or_insert_with(|| PeerLink::new(local, remote_id));
            link.start_negotiating(Instant::now(), timeout);
            self.peer(PeerCommand::Prepare {
                remote_id,
                initiator: false,
            });
            self.notify(Notification::LinkStateChanged {
                remote_id,
                state: LinkState::Negotiating,
            });
        }

        self.peer(PeerCommand::ApplySignal {
            remote_id,
            kind: envelope.kind,
            payload: envelope.payload,
        });
    }

    fn on_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::LocalSignal {
                remote_id,
                kind,
                payload,
            } => {
                if !self.links.contains_key(&remote_id) {
                    debug!(%remote_id, "Signal for unknown link dropped");
                    return;
                }
                if self.is_authenticated() && self.room.is_some() {
                    self.send_signal(remote_id, kind, payload);
                } else {
                    self.queued_signals.push_back(QueuedSignal {
                        remote_id,
                        kind,
                        payload,
                    });
                }
            }
            PeerEvent::ChannelOpen { remote_id } => {
                let Some(link) = self.links.get_mut(&remote_id) else {
                    return;
                };
                if link.is_connected() {
                    return;
                }
                link.mark_connected();
                info!(%remote_id, "Peer link connected");
                self.notify(Notification::LinkStateChanged {
                    remote_id,
                    state: LinkState::Connected,
                });
                self.report_connection(remote_id, true);
            }
            PeerEvent::ChannelClosed { remote_id } => match self.link_state(&remote_id) {
                Some(LinkState::Connected) => {
                    if let Some(link) = self.links.get_mut(&remote_id) {
                        link.mark_closed();
                    }
                    info!(%remote_id, "Peer closed the link");
                    self.notify(Notification::LinkStateChanged {
                        remote_id,
                        state: LinkState::Closed,
                    });
                }
                Some(LinkState::Negotiating) => {
                    self.fail_link(
                        remote_id,
                        "channel closed during negotiation".to_string(),
                        Instant::now(),
                    );
                }
                _ => {}
            },
            PeerEvent::ChannelFailed { remote_id, reason } => {
                if matches!(
                    self.link_state(&remote_id),
                    Some(LinkState::Negotiating) | Some(LinkState::Connected)
                ) {
                    self.fail_link(remote_id, reason, Instant::now());
                }
            }
            PeerEvent::Data { remote_id, bytes } => self.on_peer_data(remote_id, &bytes),
        }
    }

    fn on_peer_data(&mut self, remote_id: SessionId, bytes: &[u8]) {
        let Some(link) = self.links.get_mut(&remote_id) else {
            return;
        };
        if !link.is_connected() {
            debug!(%remote_id, state = %link.state, "Data on unconnected link dropped");
            return;
        }

        let envelope = match PeerEnvelope::from_bytes(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%remote_id, error = %e, "Undecodable peer envelope");
                return;
            }
        };
        if !link.accept_seq(envelope.seq) {
            debug!(%remote_id, seq = envelope.seq, "Stale envelope dropped");
            return;
        }

        match envelope.message() {
            Ok(PeerMessage::Heartbeat) => {}
            Ok(message) => self.notify(Notification::PeerMessage {
                from: remote_id,
                message,
            }),
            Err(e) => warn!(%remote_id, error = %e, "Invalid peer message"),
        }
    }

    fn on_tick(&mut self, now: Instant) {
        if self.is_authenticated() {
            let due = self
                .last_heartbeat
                .map_or(true, |at| now.saturating_duration_since(at) >= self.heartbeat_interval);
            if due {
                self.last_heartbeat = Some(now);
                self.request(PendingRequest::Heartbeat, |correlation_id| {
                    ClientMessage::Heartbeat { correlation_id }
                });
            }
        }

        let expired: Vec<SessionId> = self
            .links
            .values()
            .filter(|link| link.negotiation_expired(now))
            .map(|link| link.remote_id)
            .collect();
        for remote_id in expired {
            self.fail_link(remote_id, "negotiation timed out".to_string(), now);
        }

        let retries: Vec<SessionId> = self
            .links
            .values()
            .filter(|link| link.retry_due(now))
            .map(|link| link.remote_id)
            .collect();
        for remote_id in retries {
            let timeout = self.negotiation_timeout;
            let Some(link) = self.links.get_mut(&remote_id) else {
                continue;
            };
            link.start_negotiating(now, timeout);
            let initiator = link.initiator;
            debug!(%remote_id, attempt = link.attempts, "Retrying peer link");
            self.peer(PeerCommand::Prepare {
                remote_id,
                initiator,
            });
            self.notify(Notification::LinkStateChanged {
                remote_id,
                state: LinkState::Negotiating,
            });
        }
    }

    fn on_request(&mut self, request: LocalRequest) {
        match request {
            LocalRequest::CreateRoom(request) => {
                if self.require_relay("createRoom") {
                    self.create_room(request);
                }
            }
            LocalRequest::JoinRoom { room_id, password } => {
                if !self.require_relay("joinRoom") {
                    return;
                }
                let pending = PendingRequest::JoinRoom {
                    room_id: room_id.clone(),
                    password: password.clone(),
                    rejoin: false,
                };
                self.request(pending, |correlation_id| ClientMessage::JoinRoom {
                    correlation_id,
                    room_id,
                    password,
                });
            }
            LocalRequest::LeaveRoom => {
                self.last_room = None;
                self.queued_signals.clear();
                self.close_all_links();
                if self.is_authenticated() {
                    self.request(PendingRequest::LeaveRoom, |correlation_id| {
                        ClientMessage::LeaveRoom { correlation_id }
                    });
                } else {
                    let room_id = self.room.take().map(|room| room.room_id);
                    self.notify(Notification::RoomLeft {
                        room_id,
                        destroyed: false,
                    });
                }
            }
            LocalRequest::RefreshRooms => {
                if self.require_relay("getRooms") {
                    self.request(PendingRequest::GetRooms, |correlation_id| {
                        ClientMessage::GetRooms { correlation_id }
                    });
                }
            }
            LocalRequest::Send { to, message } => self.send_peer_message(to, message),
            LocalRequest::ConnectionReport {
                remote_id,
                success,
                nat_type,
            } => {
                if self.require_relay("connectionReport") {
                    self.request(PendingRequest::ConnectionReport, |correlation_id| {
                        ClientMessage::ConnectionReport {
                            correlation_id,
                            remote_id,
                            success,
                            nat_type,
                        }
                    });
                }
            }
        }
    }

    fn create_room(&mut self, request: CreateRoomRequest) {
        let pending = PendingRequest::CreateRoom {
            password: request.password.clone(),
        };
        self.request(pending, |correlation_id| ClientMessage::CreateRoom {
            correlation_id,
            name: request.name,
            max_members: request.max_members,
            private: request.private,
            password: request.password,
            description: request.description,
            game_version: request.game_version,
        });
    }

    // ===== Links =====

    fn open_link(&mut self, remote_id: SessionId, now: Instant) {
        let Some(local) = self.session_id else {
            return;
        };
        let mut link = PeerLink::new(local, remote_id);
        link.start_negotiating(now, self.negotiation_timeout);
        let initiator = link.initiator;
        self.links.insert(remote_id, link);

        debug!(%remote_id, initiator, "Negotiating peer link");
        self.peer(PeerCommand::Prepare {
            remote_id,
            initiator,
        });
        self.notify(Notification::LinkStateChanged {
            remote_id,
            state: LinkState::Negotiating,
        });
    }

    /// Tear a link down whatever its state
    fn drop_link(&mut self, remote_id: SessionId) {
        if self.links.remove(&remote_id).is_none() {
            return;
        }
        self.queued_signals.retain(|signal| signal.remote_id != remote_id);
        self.peer(PeerCommand::Close { remote_id });
        self.notify(Notification::LinkStateChanged {
            remote_id,
            state: LinkState::Closed,
        });
    }

    fn close_all_links(&mut self) {
        let remotes: Vec<SessionId> = self.links.keys().copied().collect();
        for remote_id in remotes {
            self.drop_link(remote_id);
        }
    }

    fn fail_link(&mut self, remote_id: SessionId, reason: String, now: Instant) {
        let backoff = self.link_retry;
        let Some(link) = self.links.get_mut(&remote_id) else {
            return;
        };
        let outcome = link.mark_failed(now, &backoff);
        self.peer(PeerCommand::Close { remote_id });
        self.notify(Notification::LinkStateChanged {
            remote_id,
            state: LinkState::Errored,
        });

        match outcome {
            FailureOutcome::Retry { attempt, .. } => {
                warn!(%remote_id, attempt, %reason, "Peer link failed, retrying");
                self.notify(Notification::PeerError {
                    remote_id,
                    error: reason,
                    terminal: false,
                });
            }
            FailureOutcome::Exhausted { attempts } => {
                warn!(%remote_id, attempts, %reason, "Peer link failed for good");
                self.links.remove(&remote_id);
                self.queued_signals.retain(|signal| signal.remote_id != remote_id);
                self.notify(Notification::PeerError {
                    remote_id,
                    error: reason,
                    terminal: true,
                });
                self.report_connection(remote_id, false);
            }
        }
    }

    /// At-most-once: links that are not connected are skipped silently
    fn send_peer_message(&mut self, to: Option<SessionId>, message: PeerMessage) {
        let targets: Vec<SessionId> = match to {
            Some(remote_id) => self
                .links
                .get(&remote_id)
                .filter(|link| link.is_connected())
                .map(|link| vec![link.remote_id])
                .unwrap_or_default(),
            None => self.connected_peers(),
        };
        if targets.is_empty() {
            debug!(?to, "No connected link, message dropped");
            return;
        }

        let seq = self.next_seq;
        let bytes = match PeerEnvelope::wrap(seq, &message).to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode peer message");
                return;
            }
        };
        self.next_seq += 1;

        for remote_id in targets {
            self.peer(PeerCommand::Send {
                remote_id,
                bytes: bytes.clone(),
            });
        }
    }

    // ===== Relay requests =====

    fn send_signal(&mut self, remote_id: SessionId, kind: SignalKind, payload: Vec<u8>) {
        let room_id = self.room.as_ref().map(|room| room.room_id.clone());
        let (Some(local), Some(room_id)) = (self.session_id, room_id) else {
            return;
        };
        let envelope = SignalEnvelope::new(kind, local, remote_id, room_id, payload);
        self.request(PendingRequest::Signal { to: remote_id }, |correlation_id| {
            ClientMessage::Signal {
                correlation_id,
                envelope,
            }
        });
    }

    /// Relay queued signals in production order, restamped with the current session
    fn flush_signals(&mut self) {
        while let Some(signal) = self.queued_signals.pop_front() {
            if self.links.contains_key(&signal.remote_id) {
                self.send_signal(signal.remote_id, signal.kind, signal.payload);
            }
        }
    }

    fn report_connection(&mut self, remote_id: SessionId, success: bool) {
        if !self.is_authenticated() {
            return;
        }
        self.request(PendingRequest::ConnectionReport, |correlation_id| {
            ClientMessage::ConnectionReport {
                correlation_id,
                remote_id,
                success,
                nat_type: None,
            }
        });
    }

    fn request(
        &mut self,
        pending: PendingRequest,
        build: impl FnOnce(CorrelationId) -> ClientMessage,
    ) {
        let correlation_id = self.next_correlation;
        self.next_correlation += 1;
        self.pending.insert(correlation_id, pending);
        self.out.push(ClientCommand::ToRelay(build(correlation_id)));
    }

    fn require_relay(&mut self, request: &'static str) -> bool {
        if self.is_authenticated() {
            return true;
        }
        self.notify(Notification::RequestFailed {
            request,
            code: ErrorCode::Transport,
            message: "relay session not authenticated".to_string(),
        });
        false
    }

    // ===== Helpers =====

    fn set_rooms(&mut self, rooms: Vec<RoomSummary>) {
        self.rooms = rooms.clone();
        self.notify(Notification::RoomsUpdated(rooms));
    }

    fn in_room(&self, room_id: &RoomId) -> bool {
        self.room.as_ref().is_some_and(|room| &room.room_id == room_id)
    }

    fn is_member(&self, session_id: &SessionId) -> bool {
        self.room
            .as_ref()
            .is_some_and(|room| room.members.iter().any(|m| &m.session_id == session_id))
    }

    fn peer(&mut self, command: PeerCommand) {
        self.out.push(ClientCommand::Peer(command));
    }

    fn notify(&mut self, notification: Notification) {
        self.out.push(ClientCommand::Notify(notification));
    }
}

fn refresh_status(room: &mut RoomSnapshot) {
    if room.status == RoomStatus::Closed {
        return;
    }
    room.status = if room.members.len() > 1 {
        RoomStatus::Active
    } else {
        RoomStatus::Waiting
    };
}
