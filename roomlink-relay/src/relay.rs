use crate::config::{to_chrono, RelayConfig};
use crate::error::{RelayError, Result};
use crate::mirror::{MirrorJob, MirrorOp};
use crate::rooms::{RoomSlot, RoomTable};
use crate::sessions::{Presence, SessionRecord, SessionTable};
use crate::stats::{RelayStats, StatsSnapshot};
use crate::transport::{Transport, TransportTable};
use chrono::{DateTime, Utc};
use roomlink_core::{
    ClientMessage, CorrelationId, ErrorCode, IceServer, PlayerIdentity, RejectReason, Room,
    RoomError, RoomId, RoomSettings, RoomSummary, ServerMessage, SessionId, SignalEnvelope,
    DEFAULT_MAX_MEMBERS,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

/// Signaling relay: session lifecycle, room membership and signal forwarding
///
/// Cheap to clone; every connection task holds one.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    config: RelayConfig,
    sessions: SessionTable,
    transports: TransportTable,
    rooms: RoomTable,
    stats: RelayStats,
    mirror: Option<UnboundedSender<MirrorJob>>,
    started_at: Instant,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self::build(config, None)
    }

    /// Relay that queues room changes for the directory mirror worker
    pub fn with_mirror(config: RelayConfig, mirror: UnboundedSender<MirrorJob>) -> Self {
        Self::build(config, Some(mirror))
    }

    fn build(config: RelayConfig, mirror: Option<UnboundedSender<MirrorJob>>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                config,
                sessions: SessionTable::new(),
                transports: TransportTable::new(),
                rooms: RoomTable::new(),
                stats: RelayStats::default(),
                mirror,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    pub fn ice_servers(&self) -> &[IceServer] {
        &self.inner.config.ice_servers
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner
            .stats
            .snapshot(self.session_count(), self.room_count())
    }

    pub fn session(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        self.inner.sessions.get(session_id)
    }

    /// Public summary of one open room
    pub fn room_summary(&self, room_id: &RoomId) -> Result<Option<RoomSummary>> {
        match self.inner.rooms.get(room_id)? {
            Some(slot) => {
                let room = slot.lock()?;
                Ok((!room.is_closed() && !room.is_private()).then(|| room.summary()))
            }
            None => Ok(None),
        }
    }

    /// Rooms visible to `viewer`
    pub fn list_rooms(&self, viewer: Option<SessionId>) -> Result<Vec<RoomSummary>> {
        self.inner.rooms.visible_summaries(viewer)
    }

    // ===== Connection lifecycle =====

    /// Register a new connection; it starts out `connecting`
    #[instrument(skip(self, transport))]
    pub fn connect(&self, transport: Arc<dyn Transport>) -> Result<SessionId> {
        let session_id = SessionId::new();
        self.inner.transports.register(session_id, transport)?;
        self.inner.sessions.insert(SessionRecord::new(session_id))?;
        self.inner.stats.session_opened();
        info!(%session_id, "Session connected");
        Ok(session_id)
    }

    /// Transport went away; leaves any room exactly as `leaveRoom` would
    #[instrument(skip(self))]
    pub fn disconnect(&self, session_id: SessionId) {
        self.teardown(session_id);
    }

    /// Record liveness for transport-level keepalives
    pub fn touch(&self, session_id: SessionId) {
        if let Err(e) = self.inner.sessions.touch(session_id, Utc::now()) {
            warn!(%session_id, error = %e, "Failed to refresh session");
        }
    }

    fn teardown(&self, session_id: SessionId) -> Option<Arc<dyn Transport>> {
        let record = match self.inner.sessions.get(session_id) {
            Ok(record) => record,
            Err(e) => {
                warn!(%session_id, error = %e, "Session lookup failed during teardown");
                None
            }
        };

        if let Some(room_id) = record.as_ref().and_then(|r| r.current_room().cloned()) {
            if let Err(e) = self.depart(session_id, &room_id) {
                warn!(%session_id, %room_id, error = %e, "Failed to leave room on disconnect");
            }
        }

        if let Err(e) = self.inner.sessions.remove(session_id) {
            warn!(%session_id, error = %e, "Failed to remove session");
        }

        let transport = self.inner.transports.unregister(session_id).unwrap_or_else(|e| {
            warn!(%session_id, error = %e, "Failed to remove transport");
            None
        });

        if record.is_some() {
            info!(%session_id, "Session closed");
        }
        transport
    }

    fn force_disconnect(&self, session_id: SessionId, reason: &str) {
        warn!(%session_id, reason, "Force-closing session");
        if let Some(transport) = self.teardown(session_id) {
            transport.close();
        }
    }

    // ===== Message dispatch =====

    /// Handle one raw text frame
    pub fn handle_text(&self, session_id: SessionId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(session_id, message),
            Err(e) => {
                self.touch(session_id);
                // Echo the correlation id if the frame got that far
                let correlation_id = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("correlationId").and_then(|c| c.as_u64()));
                debug!(%session_id, error = %e, "Malformed frame");
                self.send(
                    session_id,
                    ServerMessage::error(
                        correlation_id,
                        ErrorCode::Validation,
                        format!("malformed message: {}", e),
                    ),
                );
            }
        }
    }

    /// Handle one request; failures become a correlated `error` reply
    #[instrument(skip(self, message), fields(kind = message.kind(), correlation_id = message.correlation_id()))]
    pub fn handle(&self, session_id: SessionId, message: ClientMessage) {
        self.touch(session_id);
        let correlation_id = message.correlation_id();

        if let Err(err) = self.dispatch(session_id, message) {
            warn!(%session_id, error = %err, "Request failed");
            self.send(
                session_id,
                ServerMessage::error(Some(correlation_id), err.code(), err.to_string()),
            );
        }
    }

    fn dispatch(&self, session_id: SessionId, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::Init {
                correlation_id,
                token,
                identity,
            } => self.init(session_id, correlation_id, token, identity),

            ClientMessage::CreateRoom {
                correlation_id,
                name,
                max_members,
                private,
                password,
                description,
                game_version,
            } => {
                let mut settings = RoomSettings::new(name)
                    .with_max_members(max_members.unwrap_or(DEFAULT_MAX_MEMBERS))
                    .with_private(private);
                if let Some(password) = password {
                    settings = settings.with_password(password);
                }
                if let Some(description) = description {
                    settings = settings.with_description(description);
                }
                if let Some(game_version) = game_version {
                    settings = settings.with_game_version(game_version);
                }
                self.create_room(session_id, correlation_id, settings)
            }

            ClientMessage::JoinRoom {
                correlation_id,
                room_id,
                password,
            } => self.join_room(session_id, correlation_id, room_id, password),

            ClientMessage::LeaveRoom { correlation_id } => {
                self.leave_room(session_id, correlation_id)
            }

            ClientMessage::GetRooms { correlation_id } => {
                self.get_rooms(session_id, correlation_id)
            }

            ClientMessage::Signal {
                correlation_id,
                envelope,
            } => self.relay_signal(session_id, correlation_id, envelope),

            ClientMessage::Heartbeat { correlation_id } => {
                self.authenticated(session_id)?;
                self.send(
                    session_id,
                    ServerMessage::HeartbeatAck {
                        correlation_id,
                        server_time: Utc::now(),
                    },
                );
                Ok(())
            }

            ClientMessage::ConnectionReport {
                correlation_id,
                remote_id,
                success,
                nat_type,
            } => {
                self.authenticated(session_id)?;
                debug!(%session_id, %remote_id, success, ?nat_type, "Connection report");
                self.inner
                    .stats
                    .connection_report(success, nat_type.as_deref());
                self.send(session_id, ServerMessage::Ack { correlation_id });
                Ok(())
            }
        }
    }

    // ===== Operations =====

    fn init(
        &self,
        session_id: SessionId,
        correlation_id: CorrelationId,
        token: String,
        identity: PlayerIdentity,
    ) -> Result<()> {
        let record = self.record(session_id)?;
        if record.is_authenticated() {
            return Err(RelayError::Validation(
                "session already initialised".to_string(),
            ));
        }

        if token.trim().is_empty() {
            self.send(
                session_id,
                ServerMessage::error(Some(correlation_id), ErrorCode::Auth, "missing session token"),
            );
            self.force_disconnect(session_id, "init without token");
            return Ok(());
        }

        identity
            .validate()
            .map_err(|e| RelayError::Validation(e.to_string()))?;

        let player = identity.to_string();
        self.inner.sessions.update(session_id, |record| {
            record.identity = Some(identity);
            record.token = Some(token);
            record.set_presence(Presence::Idle);
        })?;

        info!(%session_id, %player, "Session authenticated");
        self.send(
            session_id,
            ServerMessage::Initialized {
                correlation_id,
                session_id,
                ice_servers: self.inner.config.ice_servers.clone(),
                heartbeat_interval_ms: self.inner.config.heartbeat_interval.as_millis() as u64,
            },
        );
        Ok(())
    }

    fn create_room(
        &self,
        session_id: SessionId,
        correlation_id: CorrelationId,
        settings: RoomSettings,
    ) -> Result<()> {
        let (record, identity) = self.authenticated(session_id)?;
        if let Some(current) = record.current_room() {
            return Err(RelayError::Validation(format!(
                "already in room {}; leave it first",
                current
            )));
        }

        let slot = self
            .inner
            .rooms
            .open(settings, session_id, identity, record.token.clone())?;

        let (room_id, summary) = {
            let room = slot.lock()?;
            let room_id = room.id().clone();

            if !self.place(session_id, &room_id)? {
                drop(room);
                self.depart(session_id, &room_id)?;
                return Ok(());
            }

            self.send(
                session_id,
                ServerMessage::RoomJoined {
                    correlation_id,
                    room: room.snapshot(),
                },
            );
            (room_id, room.summary())
        };

        self.inner.stats.room_opened();
        info!(%session_id, %room_id, name = %summary.name, max = summary.max_members, "Room created");

        self.notify_room_list_changed();
        self.mirror(&slot, MirrorOp::Opened(summary));
        Ok(())
    }

    fn join_room(
        &self,
        session_id: SessionId,
        correlation_id: CorrelationId,
        room_id: RoomId,
        password: Option<String>,
    ) -> Result<()> {
        let (record, identity) = self.authenticated(session_id)?;
        if let Some(current) = record.current_room() {
            if *current == room_id {
                self.reject(
                    session_id,
                    correlation_id,
                    RejectReason::AlreadyMember,
                    "already a member of this room",
                );
                return Ok(());
            }
            return Err(RelayError::Validation(format!(
                "already in room {}; leave it first",
                current
            )));
        }

        let Some(slot) = self.inner.rooms.get(&room_id)? else {
            self.reject(
                session_id,
                correlation_id,
                RejectReason::NotFound,
                format!("room {} not found", room_id),
            );
            return Ok(());
        };

        let summary = {
            let mut room = slot.lock()?;
            let existing = member_ids(&room);

            let member = match room.join(session_id, identity, password.as_deref()) {
                Ok(member) => member,
                Err(err) => match err.reject_reason() {
                    Some(reason) => {
                        debug!(%session_id, %room_id, %reason, "Join rejected");
                        self.reject(session_id, correlation_id, reason, err.to_string());
                        return Ok(());
                    }
                    None => return Err(err.into()),
                },
            };

            if !self.place(session_id, &room_id)? {
                room.leave(session_id)?;
                return Ok(());
            }

            // Existing members hear about the joiner before the joiner gets the snapshot
            for peer in existing {
                self.send(
                    peer,
                    ServerMessage::MemberJoined {
                        room_id: room_id.clone(),
                        member: member.clone(),
                    },
                );
            }
            self.send(
                session_id,
                ServerMessage::RoomJoined {
                    correlation_id,
                    room: room.snapshot(),
                },
            );
            room.summary()
        };

        info!(%session_id, %room_id, members = summary.member_count, "Session joined room");
        self.notify_room_list_changed();
        self.mirror(&slot, MirrorOp::Updated(summary));
        Ok(())
    }

    fn leave_room(&self, session_id: SessionId, correlation_id: CorrelationId) -> Result<()> {
        let (record, _) = self.authenticated(session_id)?;

        let Some(room_id) = record.current_room().cloned() else {
            self.send(
                session_id,
                ServerMessage::RoomLeft {
                    correlation_id,
                    room_id: None,
                    destroyed: false,
                },
            );
            return Ok(());
        };

        let destroyed = self.depart(session_id, &room_id)?;
        self.send(
            session_id,
            ServerMessage::RoomLeft {
                correlation_id,
                room_id: Some(room_id),
                destroyed,
            },
        );
        Ok(())
    }

    fn get_rooms(&self, session_id: SessionId, correlation_id: CorrelationId) -> Result<()> {
        let (record, _) = self.authenticated(session_id)?;
        let rooms = self.inner.rooms.visible_summaries(Some(session_id))?;

        if record.is_idle() {
            self.inner
                .sessions
                .update(session_id, |r| r.subscribed_to_room_list = true)?;
        }

        self.send(
            session_id,
            ServerMessage::RoomList {
                correlation_id,
                rooms,
            },
        );
        Ok(())
    }

    fn relay_signal(
        &self,
        session_id: SessionId,
        correlation_id: CorrelationId,
        envelope: SignalEnvelope,
    ) -> Result<()> {
        self.authenticated(session_id)?;
        if envelope.from_session_id != session_id {
            return Err(RelayError::Validation(
                "envelope sender does not match session".to_string(),
            ));
        }

        let target = envelope.to_session_id;
        let kind = envelope.kind;
        let room_id = envelope.room_id.clone();

        let delivered = match self.inner.rooms.get(&room_id)? {
            Some(slot) => {
                let mut room = slot.lock()?;
                let same_room = !room.is_closed()
                    && target != session_id
                    && room.is_member(session_id)
                    && room.is_member(target);
                if same_room {
                    room.touch();
                    self.send(target, ServerMessage::Signal { envelope })
                } else {
                    false
                }
            }
            None => false,
        };

        if delivered {
            self.inner.stats.signal_relayed();
            debug!(from = %session_id, to = %target, %room_id, ?kind, "Signal relayed");
            self.send(session_id, ServerMessage::Ack { correlation_id });
        } else {
            self.inner.stats.signal_rejected();
            self.reject(
                session_id,
                correlation_id,
                RejectReason::NotInSameRoom,
                format!("{} is not in room {} with you", target, room_id),
            );
        }
        Ok(())
    }

    // ===== Room departure and closure =====

    /// Remove a session from a room; shared by `leaveRoom`, disconnects and
    /// the liveness watchdog. Returns whether the room was destroyed.
    fn depart(&self, session_id: SessionId, room_id: &RoomId) -> Result<bool> {
        let Some(slot) = self.inner.rooms.get(room_id)? else {
            self.clear_presence(session_id, room_id)?;
            return Ok(false);
        };

        let remaining_summary = {
            let mut room = slot.lock()?;
            let departure = match room.leave(session_id) {
                Ok(departure) => departure,
                Err(RoomError::NotMember(_)) => {
                    self.clear_presence(session_id, room_id)?;
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };
            self.clear_presence(session_id, room_id)?;

            if departure.destroyed {
                // Same critical section as the last member leaving
                self.inner.rooms.remove(room_id)?;
                None
            } else {
                let remaining = member_ids(&room);
                if let Some(new_host_id) = departure.new_host {
                    for peer in &remaining {
                        self.send(
                            *peer,
                            ServerMessage::HostChanged {
                                room_id: room_id.clone(),
                                new_host_id,
                            },
                        );
                    }
                }
                for peer in &remaining {
                    self.send(
                        *peer,
                        ServerMessage::MemberLeft {
                            room_id: room_id.clone(),
                            session_id,
                        },
                    );
                }
                Some(room.summary())
            }
        };

        match remaining_summary {
            Some(summary) => {
                info!(%session_id, %room_id, members = summary.member_count, "Session left room");
                self.notify_room_list_changed();
                self.mirror(&slot, MirrorOp::Updated(summary));
                Ok(false)
            }
            None => {
                info!(%session_id, %room_id, "Last member left; room closed");
                self.room_closed(&slot, room_id);
                Ok(true)
            }
        }
    }

    /// Close a room with members still inside, if `should_close` holds
    fn force_close(
        &self,
        slot: &Arc<RoomSlot>,
        reason: &str,
        should_close: impl Fn(&Room) -> bool,
    ) -> Result<Option<RoomId>> {
        let room_id = {
            let mut room = slot.lock()?;
            if room.is_closed() || !should_close(&room) {
                return Ok(None);
            }
            let room_id = room.id().clone();
            let evicted = room.close();
            self.inner.rooms.remove(&room_id)?;

            for member in evicted {
                self.clear_presence(member.session_id, &room_id)?;
                self.send(
                    member.session_id,
                    ServerMessage::RoomClosed {
                        room_id: room_id.clone(),
                        reason: reason.to_string(),
                    },
                );
            }
            room_id
        };

        info!(%room_id, reason, "Room force-closed");
        self.room_closed(slot, &room_id);
        Ok(Some(room_id))
    }

    /// Follow-up for every closure path, after the room lock is released
    fn room_closed(&self, slot: &RoomSlot, room_id: &RoomId) {
        self.notify_room_list_changed();
        self.mirror(slot, MirrorOp::Closed(room_id.clone()));
    }

    // ===== Sweeps =====

    /// Force-close sessions silent for longer than the liveness timeout
    #[instrument(skip(self))]
    pub fn sweep_stale_sessions(&self, now: DateTime<Utc>) -> Result<Vec<SessionId>> {
        let cutoff = now - to_chrono(self.inner.config.liveness_timeout);
        let stale = self.inner.sessions.silent_since(cutoff)?;
        for session_id in &stale {
            self.force_disconnect(*session_id, "heartbeat timeout");
        }
        Ok(stale)
    }

    /// Close rooms whose last activity is older than the inactivity window
    #[instrument(skip(self))]
    pub fn sweep_inactive_rooms(&self, now: DateTime<Utc>) -> Result<Vec<RoomId>> {
        let window = to_chrono(self.inner.config.room_inactivity);
        let mut closed = Vec::new();

        for slot in self.inner.rooms.slots()? {
            if let Some(room_id) =
                self.force_close(&slot, "inactive", |room| room.is_inactive(now, window))?
            {
                closed.push(room_id);
            }
        }

        if !closed.is_empty() {
            info!(count = closed.len(), "Closed inactive rooms");
        }
        Ok(closed)
    }

    // ===== Helpers =====

    fn record(&self, session_id: SessionId) -> Result<SessionRecord> {
        self.inner
            .sessions
            .get(session_id)?
            .ok_or_else(|| RelayError::NotFound(format!("session {}", session_id)))
    }

    fn authenticated(&self, session_id: SessionId) -> Result<(SessionRecord, PlayerIdentity)> {
        let record = self.record(session_id)?;
        match (record.is_authenticated(), record.identity.clone()) {
            (true, Some(identity)) => Ok((record, identity)),
            _ => Err(RelayError::Auth("session not initialised".to_string())),
        }
    }

    /// Mark a session as inside `room_id`; false when it vanished meanwhile
    fn place(&self, session_id: SessionId, room_id: &RoomId) -> Result<bool> {
        Ok(self
            .inner
            .sessions
            .update(session_id, |r| r.set_presence(Presence::InRoom(room_id.clone())))?
            .is_some())
    }

    fn clear_presence(&self, session_id: SessionId, room_id: &RoomId) -> Result<()> {
        self.inner.sessions.update(session_id, |r| {
            if r.current_room() == Some(room_id) {
                r.set_presence(Presence::Idle);
            }
        })?;
        Ok(())
    }

    fn send(&self, session_id: SessionId, message: ServerMessage) -> bool {
        self.inner.transports.send(session_id, message)
    }

    fn reject(
        &self,
        session_id: SessionId,
        correlation_id: CorrelationId,
        reason: RejectReason,
        message: impl Into<String>,
    ) {
        self.send(
            session_id,
            ServerMessage::Rejected {
                correlation_id,
                reason,
                message: message.into(),
            },
        );
    }

    fn notify_room_list_changed(&self) {
        let subscribers = match self.inner.sessions.room_list_subscribers() {
            Ok(subscribers) => subscribers,
            Err(e) => {
                warn!(error = %e, "Failed to collect room list subscribers");
                return;
            }
        };

        for session_id in subscribers {
            match self.inner.rooms.visible_summaries(Some(session_id)) {
                Ok(rooms) => {
                    self.send(session_id, ServerMessage::RoomListChanged { rooms });
                }
                Err(e) => warn!(%session_id, error = %e, "Failed to build room list"),
            }
        }
    }

    fn mirror(&self, slot: &RoomSlot, op: MirrorOp) {
        let (Some(mirror), Some(token)) = (&self.inner.mirror, slot.owner_token()) else {
            return;
        };
        let job = MirrorJob {
            token: token.to_string(),
            op,
        };
        if mirror.send(job).is_err() {
            debug!("Mirror worker gone; dropping update");
        }
    }
}

fn member_ids(room: &Room) -> Vec<SessionId> {
    room.members().iter().map(|m| m.session_id).collect()
}
