use super::config::ClientConfig;
use super::events::{
    ClientCommand, ClientEvent, CreateRoomRequest, LocalRequest, Notification, PeerCommand,
    PeerEvent,
};
use super::manager::RoomManager;
use crate::domain::PeerMessage;
use crate::error::{ClientError, Result};
use crate::infrastructure::relay_connection::{self, RelaySocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use instant::{Duration, Instant};
use roomlink_core::{ClientMessage, PlayerIdentity, RoomId, SessionId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

type RelaySink = SplitSink<RelaySocket, Message>;

enum RuntimeInput {
    Event(ClientEvent),
    Shutdown,
}

/// Work handed back to the embedding application
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOutput {
    Peer(PeerCommand),
    Notify(Notification),
}

/// How a relay session ended
enum SessionEnd {
    Shutdown,
    Dropped { authenticated: bool },
}

/// Cloneable handle for feeding the runtime
#[derive(Clone)]
pub struct ClientHandle {
    tx: UnboundedSender<RuntimeInput>,
}

impl ClientHandle {
    pub fn send(&self, event: ClientEvent) -> Result<()> {
        self.tx
            .send(RuntimeInput::Event(event))
            .map_err(|_| ClientError::ChannelClosed)
    }

    pub fn request(&self, request: LocalRequest) -> Result<()> {
        self.send(ClientEvent::Request(request))
    }

    /// Report what the peer transport did with a `PeerCommand`
    pub fn peer_event(&self, event: PeerEvent) -> Result<()> {
        self.send(ClientEvent::Peer(event))
    }

    pub fn create_room(&self, request: CreateRoomRequest) -> Result<()> {
        self.request(LocalRequest::CreateRoom(request))
    }

    pub fn join_room(&self, room_id: RoomId, password: Option<String>) -> Result<()> {
        self.request(LocalRequest::JoinRoom { room_id, password })
    }

    pub fn leave_room(&self) -> Result<()> {
        self.request(LocalRequest::LeaveRoom)
    }

    pub fn refresh_rooms(&self) -> Result<()> {
        self.request(LocalRequest::RefreshRooms)
    }

    pub fn send_chat(&self, to: Option<SessionId>, text: impl Into<String>) -> Result<()> {
        self.request(LocalRequest::Send {
            to,
            message: PeerMessage::chat(text),
        })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.tx
            .send(RuntimeInput::Shutdown)
            .map_err(|_| ClientError::ChannelClosed)
    }
}

/// Drives a [`RoomManager`] over a live relay websocket
///
/// Reconnects with bounded backoff after unexpected drops; the manager
/// re-inits and rejoins its last room on its own.
pub struct ClientRuntime {
    config: ClientConfig,
    manager: RoomManager,
    inputs: UnboundedReceiver<RuntimeInput>,
    outputs: UnboundedSender<ClientOutput>,
}

impl ClientRuntime {
    pub fn new(
        config: ClientConfig,
        identity: PlayerIdentity,
        token: impl Into<String>,
    ) -> (Self, ClientHandle, UnboundedReceiver<ClientOutput>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let manager = RoomManager::new(identity, token, &config);

        let runtime = Self {
            config,
            manager,
            inputs: input_rx,
            outputs: output_tx,
        };
        (runtime, ClientHandle { tx: input_tx }, output_rx)
    }

    pub fn spawn(
        config: ClientConfig,
        identity: PlayerIdentity,
        token: impl Into<String>,
    ) -> (
        ClientHandle,
        UnboundedReceiver<ClientOutput>,
        JoinHandle<Result<()>>,
    ) {
        let (runtime, handle, outputs) = Self::new(config, identity, token);
        let task = tokio::spawn(runtime.run());
        (handle, outputs, task)
    }

    /// Run until shutdown or until reconnects are exhausted
    pub async fn run(mut self) -> Result<()> {
        let backoff = self.config.relay_reconnect;
        let mut failures = 0u32;

        loop {
            match relay_connection::connect(&self.config.relay_url).await {
                Ok(socket) => {
                    info!(url = %self.config.relay_url, "Connected to relay");
                    match self.run_session(socket).await {
                        SessionEnd::Shutdown => return Ok(()),
                        SessionEnd::Dropped { authenticated } => {
                            if authenticated {
                                failures = 0;
                            }
                        }
                    }
                }
                Err(e) => warn!(url = %self.config.relay_url, error = %e, "Relay connection failed"),
            }

            let _ = self.apply(ClientEvent::RelayDisconnected, None).await;

            failures += 1;
            let Some(delay) = backoff.delay(failures) else {
                warn!(attempts = backoff.max_attempts, "Giving up on the relay");
                self.emit(ClientOutput::Notify(Notification::Disconnected { terminal: true }));
                return Err(ClientError::RelayUnavailable(backoff.max_attempts));
            };
            debug!(attempt = failures, ?delay, "Reconnecting to relay");
            if !self.idle(delay).await {
                return Ok(());
            }
        }
    }

    async fn run_session(&mut self, socket: RelaySocket) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();
        let mut authenticated = false;

        if let Err(e) = self.apply(ClientEvent::RelayConnected, Some(&mut sink)).await {
            warn!(error = %e, "Failed to send init");
            return SessionEnd::Dropped { authenticated };
        }

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_inbound = Instant::now();

        loop {
            let step = tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Relay closed the connection");
                        return SessionEnd::Dropped { authenticated };
                    }
                    Some(Ok(frame)) => {
                        last_inbound = Instant::now();
                        match relay_connection::decode(&frame) {
                            Ok(Some(message)) => {
                                self.apply(ClientEvent::Relay(message), Some(&mut sink)).await
                            }
                            Ok(None) => Ok(()),
                            Err(e) => {
                                warn!(error = %e, "Undecodable relay frame");
                                Ok(())
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Relay websocket error");
                        return SessionEnd::Dropped { authenticated };
                    }
                },
                input = self.inputs.recv() => match input {
                    Some(RuntimeInput::Event(event)) => self.apply(event, Some(&mut sink)).await,
                    Some(RuntimeInput::Shutdown) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                },
                _ = ticker.tick() => {
                    if last_inbound.elapsed() >= self.config.relay_silence_timeout {
                        warn!("Relay silent for too long");
                        return SessionEnd::Dropped { authenticated };
                    }
                    self.apply(ClientEvent::Tick(Instant::now()), Some(&mut sink)).await
                }
            };

            authenticated |= self.manager.is_authenticated();
            if let Err(e) = step {
                warn!(error = %e, "Relay send failed");
                return SessionEnd::Dropped { authenticated };
            }
        }
    }

    /// Wait out a reconnect delay while still serving local events
    ///
    /// Returns `false` on shutdown.
    async fn idle(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                input = self.inputs.recv() => match input {
                    Some(RuntimeInput::Event(event)) => {
                        let _ = self.apply(event, None).await;
                    }
                    Some(RuntimeInput::Shutdown) | None => return false,
                },
                _ = ticker.tick() => {
                    let _ = self.apply(ClientEvent::Tick(Instant::now()), None).await;
                }
            }
        }
    }

    /// Run one event through the manager; notifications are emitted even if a relay send fails
    async fn apply(&mut self, event: ClientEvent, mut sink: Option<&mut RelaySink>) -> Result<()> {
        let mut result = Ok(());
        for command in self.manager.handle(event) {
            match command {
                ClientCommand::ToRelay(message) => match sink.as_deref_mut() {
                    Some(sink) if result.is_ok() => result = send_frame(sink, &message).await,
                    _ => debug!(kind = message.kind(), "No relay connection, request dropped"),
                },
                ClientCommand::Peer(command) => self.emit(ClientOutput::Peer(command)),
                ClientCommand::Notify(notification) => self.emit(ClientOutput::Notify(notification)),
            }
        }
        result
    }

    fn emit(&self, output: ClientOutput) {
        if self.outputs.send(output).is_err() {
            debug!("Output receiver dropped");
        }
    }
}

async fn send_frame(sink: &mut RelaySink, message: &ClientMessage) -> Result<()> {
    sink.send(relay_connection::encode(message)?).await?;
    Ok(())
}
