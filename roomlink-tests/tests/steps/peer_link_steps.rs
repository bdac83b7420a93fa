use cucumber::{given, then, when};
use roomlink_client::{ClientEvent, LinkState, LocalRequest, PeerCommand, PeerEvent, PeerMessage};
use roomlink_core::SignalKind;
use roomlink_tests::RoomWorld;

#[given(expr = "the channel between {string} and {string} opens")]
async fn channel_opened(world: &mut RoomWorld, a: String, b: String) {
    open_channel(world, &a, &b);
}

#[when(expr = "the channel between {string} and {string} opens")]
async fn channel_opens(world: &mut RoomWorld, a: String, b: String) {
    open_channel(world, &a, &b);
}

fn open_channel(world: &mut RoomWorld, a: &str, b: &str) {
    world.open_channel(a, b);
    for (local, remote) in [(a, b), (b, a)] {
        let remote_id = world.session_id(remote);
        assert_eq!(
            world.participant(local).manager.link_state(&remote_id),
            Some(LinkState::Connected)
        );
    }
}

#[when(expr = "{string} sends an offer to {string}")]
async fn sends_offer(world: &mut RoomWorld, from: String, to: String) {
    let remote_id = world.session_id(&to);
    world.feed(
        &from,
        ClientEvent::Peer(PeerEvent::LocalSignal {
            remote_id,
            kind: SignalKind::Offer,
            payload: format!("offer from {}", from).into_bytes(),
        }),
    );
}

#[when(expr = "{string} sends the chat {string}")]
async fn sends_chat(world: &mut RoomWorld, name: String, text: String) {
    world.request(
        &name,
        LocalRequest::Send {
            to: None,
            message: PeerMessage::chat(text),
        },
    );
}

#[then(expr = "{string} is negotiating with {string}")]
async fn is_negotiating(world: &mut RoomWorld, local: String, remote: String) {
    let remote_id = world.session_id(&remote);
    let participant = world.participant(&local);
    assert_eq!(
        participant.manager.link_state(&remote_id),
        Some(LinkState::Negotiating)
    );
    assert!(participant
        .peer_commands
        .iter()
        .any(|c| matches!(c, PeerCommand::Prepare { remote_id: r, .. } if *r == remote_id)));
}

#[then(expr = "exactly one of {string} and {string} initiates")]
async fn one_initiator(world: &mut RoomWorld, a: String, b: String) {
    let (a_id, b_id) = (world.session_id(&a), world.session_id(&b));
    let a_initiates = world.participant(&a).manager.link(&b_id).map(|l| l.initiator);
    let b_initiates = world.participant(&b).manager.link(&a_id).map(|l| l.initiator);
    match (a_initiates, b_initiates) {
        (Some(a_initiates), Some(b_initiates)) => {
            assert_ne!(a_initiates, b_initiates);
            assert_eq!(a_initiates, a_id < b_id);
        }
        other => panic!("missing links: {:?}", other),
    }
}

#[then(expr = "{string} is asked to apply an offer from {string}")]
async fn applies_offer(world: &mut RoomWorld, local: String, remote: String) {
    let remote_id = world.session_id(&remote);
    let expected = format!("offer from {}", remote).into_bytes();
    assert!(world
        .participant(&local)
        .peer_commands
        .iter()
        .any(|c| matches!(
            c,
            PeerCommand::ApplySignal { remote_id: r, kind: SignalKind::Offer, payload }
                if *r == remote_id && *payload == expected
        )));
}

#[then(expr = "{string} has received no chat")]
async fn no_chat(world: &mut RoomWorld, name: String) {
    assert!(world.participant(&name).chats().is_empty());
}

#[then(expr = "{string} received the chat {string} from {string}")]
async fn received_chat(world: &mut RoomWorld, name: String, text: String, from: String) {
    let from_id = world.session_id(&from);
    assert_eq!(world.participant(&name).chats(), vec![(from_id, text)]);
}

#[then(expr = "the relay counted {int} successful connections")]
async fn successful_connections(world: &mut RoomWorld, count: u64) {
    assert_eq!(world.relay.stats().connections_succeeded, count);
}

#[then(expr = "{string} has no link to {string}")]
async fn no_link(world: &mut RoomWorld, local: String, remote: String) {
    let remote_id = world.participants[&remote].connection;
    let participant = world.participant(&local);
    assert!(participant.manager.link(&remote_id).is_none());
    assert!(participant
        .peer_commands
        .iter()
        .any(|c| matches!(c, PeerCommand::Close { remote_id: r } if *r == remote_id)));
}
