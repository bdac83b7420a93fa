use chrono::Utc;
use cucumber::{given, then, when};
use roomlink_client::{ClientEvent, Notification};
use roomlink_relay::RelayConfig;
use roomlink_tests::RoomWorld;
use std::time::Duration;

#[given(expr = "the relay expects heartbeats every {int} milliseconds")]
async fn relay_heartbeat_interval(world: &mut RoomWorld, millis: u64) {
    world.reconfigure_relay(
        RelayConfig::default().with_heartbeat_interval(Duration::from_millis(millis)),
    );
}

#[when(expr = "{int} milliseconds pass")]
async fn time_passes(_world: &mut RoomWorld, millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[when(expr = "{string} sends a heartbeat")]
async fn sends_heartbeat(world: &mut RoomWorld, name: String) {
    let before = world.relay.session(world.participant(&name).connection);
    world.tick(&name);
    let after = world.relay.session(world.participant(&name).connection);
    assert!(
        matches!((before, after), (Ok(Some(before)), Ok(Some(after))) if after.last_seen_at > before.last_seen_at),
        "{} did not heartbeat",
        name
    );
}

#[when("the relay sweeps silent sessions")]
async fn sweep_silent_sessions(world: &mut RoomWorld) {
    world
        .relay
        .sweep_stale_sessions(Utc::now())
        .expect("sweep succeeds");
    world.pump();
}

#[when(expr = "{string} loses the relay connection")]
async fn loses_connection(world: &mut RoomWorld, name: String) {
    world.relay.disconnect(world.participant(&name).connection);
    if let Some(participant) = world.participants.get_mut(&name) {
        participant.dropped = true;
    }
    world.feed(&name, ClientEvent::RelayDisconnected);
}

#[then(expr = "{string} was disconnected by the relay")]
async fn disconnected_by_relay(world: &mut RoomWorld, name: String) {
    let participant = world.participant(&name);
    assert!(participant.inbox.is_closed());
    assert!(participant
        .notifications
        .contains(&Notification::Disconnected { terminal: false }));
    assert!(participant.manager.room().is_none());
    assert!(!participant.manager.is_authenticated());
}
